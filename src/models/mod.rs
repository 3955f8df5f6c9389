use std::fmt::Debug;

use burn::{
    nn::loss::CrossEntropyLossConfig,
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::{
    cli::{ArgumentError, ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
};

/// The name-keyed index of every architecture
pub mod registry;

/// Token embedding tables
pub mod embedding;

/// Sinusoidal positional encoding
pub mod positional_encoding;

/// Softmax Regression
pub mod softmax_regression;

/// Transformer encoder classifier
pub mod transformer;

/// Bidirectional LSTM
pub mod bilstm;

/// Convolutional classifier
pub mod cnn;

/// Gated recurrent unit
pub mod gru;

/// Elman recurrent network
pub mod rnn;

/// BERT
pub mod bert;

/// Stacked LSTM with masked mean pooling
pub mod net_lstm;

pub use registry::{lookup, Architecture, Registry, RegistryError, MODELS};

/// A trait for models that classify batches of token sequences
pub trait Model<B: Backend>: Debug + Send {
    /// The inputs this model reads from a batch
    fn data_requirements(&self) -> &'static [Requirement];

    /// Compute class logits: [batch_size, out_feat]
    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError>;

    /// Number of parameters
    fn num_params(&self) -> usize;

    /// Rows of the token embedding table, or `None` when token ids are read as raw features
    fn vocab_size(&self) -> Option<usize> {
        None
    }

    /// Run a forward pass and score it against the target class ids
    fn classify(
        &self,
        batch: &Batch<B>,
        targets: Tensor<B, 1, Int>,
    ) -> Result<ClassificationOutput<B>, ModelError> {
        let output = self.forward(batch)?;

        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        Ok(ClassificationOutput {
            loss,
            output,
            targets,
        })
    }
}

/// A trait for the configuration of each registered architecture
pub trait ModelConfig: burn::config::Config {
    /// The name the architecture is registered under
    const NAME: &'static str;

    /// The inputs the architecture reads from a batch
    const REQUIREMENTS: &'static [Requirement];

    /// Declare the architecture's own command line options
    fn add_required_arguments(group: &mut ArgumentGroup);

    /// Build the configuration from parsed arguments
    fn from_args(args: &ModelArgs) -> Result<Self, ModelError>;

    /// Build a model from parsed arguments
    fn make_model<B: Backend>(
        args: &ModelArgs,
        device: &B::Device,
    ) -> Result<Box<dyn Model<B>>, ModelError>;
}

/// Model Error
#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    /// The batch holds no sequences
    #[error("the batch is empty")]
    EmptyBatch,

    /// The batch lacks an input the model requires
    #[error("the batch is missing the required {0:?} input")]
    MissingInput(Requirement),

    /// The batch sequence length does not match what the model was built for
    #[error("expected sequences of length {expected}, got {found}")]
    SequenceLength {
        /// Length the model was built for
        expected: usize,

        /// Length of the batch
        found: usize,
    },

    /// The sequence is longer than the positional encoding covers
    #[error("sequence length {length} exceeds the maximum of {max}")]
    SequenceTooLong {
        /// Length of the batch
        length: usize,

        /// Longest supported length
        max: usize,
    },

    /// The arguments describe a model that cannot be built
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    /// An argument could not be read
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// A configuration file could not be loaded
    #[error("unable to load model configuration: {0}")]
    Config(String),
}

/// Fail on a batch with no sequences, which no forward pass can reduce over
pub(crate) fn check_non_empty<B: Backend>(batch: &Batch<B>) -> Result<(), ModelError> {
    match batch.dims() {
        [0, _] | [_, 0] => Err(ModelError::EmptyBatch),
        _ => Ok(()),
    }
}

/// Check that a batch is non-empty and has the fixed sequence length a model was built for
pub(crate) fn check_seq_length<B: Backend>(
    batch: &Batch<B>,
    expected: usize,
) -> Result<(), ModelError> {
    check_non_empty(batch)?;

    let [_, found] = batch.dims();

    if found != expected {
        return Err(ModelError::SequenceLength { expected, found });
    }

    Ok(())
}

/// Fail unless every named size is non-zero
pub(crate) fn require_non_zero(sizes: &[(&str, usize)]) -> Result<(), ModelError> {
    match sizes.iter().find(|(_, size)| *size == 0) {
        Some((name, _)) => Err(ModelError::InvalidConfig(format!("{} must be non-zero", name))),
        None => Ok(()),
    }
}
