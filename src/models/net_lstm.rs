use burn::{
    module::Module,
    nn::{
        lstm::{Lstm, LstmConfig},
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
    utils::tensors::masked_mean,
};

/// Hidden state size of every layer
pub static HIDDEN_SIZE: Argument =
    Argument::new("--netlstm-hidden-size", "128", "Hidden state size of each LSTM layer");

/// Number of stacked layers
pub static N_LAYERS: Argument =
    Argument::new("--netlstm-n-layers", "2", "The number of LSTM layers to be stacked");

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Width of the token embeddings
    pub d_input: usize,

    /// Hidden state size of every layer
    #[config(default = 128)]
    pub hidden_size: usize,

    /// Number of stacked layers
    #[config(default = 2)]
    pub n_layers: usize,

    /// Dropout probability, applied between layers and before the output
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model around an existing embedding table
    pub fn init_with<B: Backend>(&self, embeddings: Embedding<B>, device: &B::Device) -> Model<B> {
        let layers = (0..self.n_layers)
            .map(|i| {
                let d_input = if i == 0 { self.d_input } else { self.hidden_size };

                LstmConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect();

        Model {
            embeddings,
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.out_feat).init(device),
            in_feat: self.in_feat,
        }
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "NetLSTM";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens, Requirement::Padding];

    fn add_required_arguments(group: &mut ArgumentGroup) {
        group.add(HIDDEN_SIZE).add(N_LAYERS);
    }

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        let (_, d_input) = args.embedding_shape();

        let config = Config::new(args.in_feat, args.out_feat, d_input)
            .with_hidden_size(args.get(&HIDDEN_SIZE)?)
            .with_n_layers(args.get(&N_LAYERS)?)
            .with_dropout(args.dropout);

        require_non_zero(&[
            ("in_feat", config.in_feat),
            ("out_feat", config.out_feat),
            ("netlstm hidden size", config.hidden_size),
            ("netlstm layers", config.n_layers),
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

/// Stacked LSTM classifier over the mean of the top layer's states
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    layers: Vec<Lstm<B>>,
    dropout: Dropout,
    output: Linear<B>,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Average the top layer's states over the real positions and classify the result
    pub fn forward(&self, tokens: Tensor<B, 2, Int>, padding: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut states = self.embeddings.forward(tokens);

        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                states = self.dropout.forward(states);
            }

            let (_, hidden) = layer.forward(states, None);
            states = hidden;
        }

        let pooled = masked_mean(states, padding);

        self.output.forward(self.dropout.forward(pooled))
    }
}

impl<B: Backend> models::Model<B> for Model<B> {
    fn data_requirements(&self) -> &'static [Requirement] {
        Config::REQUIREMENTS
    }

    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError> {
        check_seq_length(batch, self.in_feat)?;

        Ok(self.forward(batch.tokens.clone(), batch.padding()?))
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn vocab_size(&self) -> Option<usize> {
        Some(table_rows(&self.embeddings))
    }
}
