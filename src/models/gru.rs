use burn::{
    module::Module,
    nn::{
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig, Embedding, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    cli::{Argument, ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
    models::{
        self, check_seq_length,
        embedding::{embedding_layer, table_rows},
        require_non_zero, ModelConfig, ModelError,
    },
    utils::tensors::last_step,
};

/// Hidden state size
pub static HIDDEN_SIZE: Argument =
    Argument::new("--gru-hidden-size", "128", "Hidden state size of the GRU");

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Width of the token embeddings
    pub d_input: usize,

    /// Hidden state size
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
            gru: GruConfig::new(self.d_input, self.hidden_size, true).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.out_feat).init(device),
            in_feat: self.in_feat,
        }
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "GRU";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens];

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
            ("gru hidden size", config.hidden_size),
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

/// GRU classifier
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    gru: Gru<B>,
    dropout: Dropout,
    output: Linear<B>,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Classify the hidden state after the final time step
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let embedded = self.embeddings.forward(tokens);

        let states = self.gru.forward(embedded, None);

        self.output.forward(self.dropout.forward(last_step(states)))
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
