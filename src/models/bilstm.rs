use burn::{
    module::Module,
    nn::{
        lstm::{Lstm, LstmConfig},
        Dropout, DropoutConfig, Embedding, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Bool, Int, Tensor},
};

use crate::{
    cli::{Argument, ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
    models::{
        self, check_seq_length,
        embedding::{embedding_layer, table_rows},
        require_non_zero, ModelConfig, ModelError,
    },
    utils::tensors::{last_real_step, last_step, reverse_time},
};

/// Hidden state size of each direction
pub static HIDDEN_SIZE: Argument =
    Argument::new("--bilstm-hidden-size", "128", "Hidden state size of each LSTM direction");

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Width of the token embeddings
    pub d_input: usize,

    /// Hidden state size of each direction
    #[config(default = 128)]
    pub hidden_size: usize,

    /// Dropout probability
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model around an existing embedding table
    pub fn init_with<B: Backend>(&self, embeddings: Embedding<B>, device: &B::Device) -> Model<B> {
        Model {
            embeddings,
            forward_lstm: LstmConfig::new(self.d_input, self.hidden_size, true).init(device),
            backward_lstm: LstmConfig::new(self.d_input, self.hidden_size, true).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(2 * self.hidden_size, self.out_feat).init(device),
            in_feat: self.in_feat,
        }
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "BiLSTM";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens, Requirement::Mask];

    fn add_required_arguments(group: &mut ArgumentGroup) {
        group.add(HIDDEN_SIZE);
    }

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        let (_, d_input) = args.embedding_shape();

        let config = Config::new(args.in_feat, args.out_feat, d_input)
            .with_hidden_size(args.get(&HIDDEN_SIZE)?)
            .with_dropout(args.dropout);

        require_non_zero(&[
            ("in_feat", config.in_feat),
            ("out_feat", config.out_feat),
            ("bilstm hidden size", config.hidden_size),
        ])?;

        Ok(config)
    }

    fn make_model<B: Backend>(
        args: &ModelArgs,
        device: &B::Device,
    ) -> Result<Box<dyn models::Model<B>>, ModelError> {
        let config = Self::from_args(args)?;
        let embeddings = embedding_layer(args, device)?;

        Ok(Box::new(config.init_with(embeddings, device)))
    }
}

/// Bidirectional LSTM classifier
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    forward_lstm: Lstm<B>,
    backward_lstm: Lstm<B>,
    dropout: Dropout,
    output: Linear<B>,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Read the sequence in both directions and classify the two final states
    pub fn forward(&self, tokens: Tensor<B, 2, Int>, mask: Tensor<B, 2, Bool>) -> Tensor<B, 2> {
        let embedded = self.embeddings.forward(tokens);

        // The forward direction ends at each sequence's last real token
        let (_, forward_states) = self.forward_lstm.forward(embedded.clone(), None);
        let forward_final = last_real_step(forward_states, mask.float());

        // The backward direction reads the padding first and ends on the first token
        let (_, backward_states) = self.backward_lstm.forward(reverse_time(embedded), None);
        let backward_final = last_step(backward_states);

        let features = Tensor::cat(vec![forward_final, backward_final], 1);

        self.output.forward(self.dropout.forward(features))
    }
}

impl<B: Backend> models::Model<B> for Model<B> {
    fn data_requirements(&self) -> &'static [Requirement] {
        Config::REQUIREMENTS
    }

    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError> {
        check_seq_length(batch, self.in_feat)?;

        Ok(self.forward(batch.tokens.clone(), batch.mask()?))
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn vocab_size(&self) -> Option<usize> {
        Some(table_rows(&self.embeddings))
    }
}
