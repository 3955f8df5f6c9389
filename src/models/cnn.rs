use burn::{
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig, Embedding, Linear, LinearConfig,
    },
    tensor::{activation::relu, backend::Backend, Int, Tensor},
};

use crate::{
    cli::{Argument, ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
    models::{
        self, check_seq_length,
        embedding::{embedding_layer, table_rows},
        require_non_zero, ModelConfig, ModelError,
    },
};

/// Number of filters per kernel size
pub static N_FILTERS: Argument =
    Argument::new("--cnn-n-filters", "100", "Number of convolution filters per kernel size");

/// Kernel sizes
pub static KERNEL_SIZES: Argument = Argument::new(
    "--cnn-kernel-sizes",
    "3,4,5",
    "Comma-separated convolution kernel sizes",
);

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Width of the token embeddings
    pub d_input: usize,

    /// Number of filters per kernel size
    #[config(default = 100)]
    pub n_filters: usize,

    /// One convolution per kernel size
    #[config(default = "vec![3, 4, 5]")]
    pub kernel_sizes: Vec<usize>,

    /// Dropout probability
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model around an existing embedding table
    pub fn init_with<B: Backend>(&self, embeddings: Embedding<B>, device: &B::Device) -> Model<B> {
        let convs = self
            .kernel_sizes
            .iter()
            .map(|kernel_size| {
                Conv1dConfig::new(self.d_input, self.n_filters, *kernel_size).init(device)
            })
            .collect();

        Model {
            embeddings,
            convs,
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.n_filters * self.kernel_sizes.len(), self.out_feat)
                .init(device),
            in_feat: self.in_feat,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_non_zero(&[
            ("in_feat", self.in_feat),
            ("out_feat", self.out_feat),
            ("cnn filters", self.n_filters),
            ("number of cnn kernel sizes", self.kernel_sizes.len()),
        ])?;

        for kernel_size in &self.kernel_sizes {
            if *kernel_size == 0 || *kernel_size > self.in_feat {
                return Err(ModelError::InvalidConfig(format!(
                    "kernel size {} must be between 1 and the sequence length {}",
                    kernel_size, self.in_feat
                )));
            }
        }

        Ok(())
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "CNN";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens];

    fn add_required_arguments(group: &mut ArgumentGroup) {
        group.add(N_FILTERS).add(KERNEL_SIZES);
    }

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        let (_, d_input) = args.embedding_shape();

        let config = Config::new(args.in_feat, args.out_feat, d_input)
            .with_n_filters(args.get(&N_FILTERS)?)
            .with_kernel_sizes(args.get_list(&KERNEL_SIZES)?)
            .with_dropout(args.dropout);

        config.validate()?;

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

/// Convolutional classifier with max-over-time pooling
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    convs: Vec<Conv1d<B>>,
    dropout: Dropout,
    output: Linear<B>,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Convolve over the embedded sequence and keep each filter's strongest response
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, _] = tokens.dims();

        // Conv1d reads [batch_size, channels, length]
        let embedded = self.embeddings.forward(tokens).swap_dims(1, 2);

        let pooled = self
            .convs
            .iter()
            .map(|conv| {
                let features = relu(conv.forward(embedded.clone()));
                let [_, n_filters, _] = features.dims();

                features.max_dim(2).reshape([batch_size, n_filters])
            })
            .collect();

        let features = Tensor::cat(pooled, 1);

        self.output.forward(self.dropout.forward(features))
    }
}

impl<B: Backend> models::Model<B> for Model<B> {
    fn data_requirements(&self) -> &'static [Requirement] {
        Config::REQUIREMENTS
    }

    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError> {
        check_seq_length(batch, self.in_feat)?;

        Ok(self.forward(batch.tokens.clone()))
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn vocab_size(&self) -> Option<usize> {
        Some(table_rows(&self.embeddings))
    }
}
