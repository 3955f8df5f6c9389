use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Embedding, Linear, LinearConfig},
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
};

/// Hidden state size
pub static HIDDEN_SIZE: Argument =
    Argument::new("--rnn-hidden-size", "128", "Hidden state size of the recurrent layer");

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
            input_to_hidden: LinearConfig::new(self.d_input, self.hidden_size).init(device),
            hidden_to_hidden: LinearConfig::new(self.hidden_size, self.hidden_size)
                .with_bias(false)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.out_feat).init(device),
            hidden_size: self.hidden_size,
            in_feat: self.in_feat,
        }
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "RNN";

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
            ("rnn hidden size", config.hidden_size),
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

/// Elman recurrent network: `h_t = tanh(W_x x_t + W_h h_{t-1} + b)`
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    input_to_hidden: Linear<B>,
    hidden_to_hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
    hidden_size: usize,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Run the recurrence over every time step and classify the final hidden state
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, seq_length] = tokens.dims();

        let embedded = self.embeddings.forward(tokens);

        // Project every step at once, then only the recurrent term is sequential
        let projected = self.input_to_hidden.forward(embedded);

        let mut hidden = Tensor::zeros([batch_size, self.hidden_size], &projected.device());

        for t in 0..seq_length {
            let x_t = projected
                .clone()
                .slice([0..batch_size, t..t + 1, 0..self.hidden_size])
                .reshape([batch_size, self.hidden_size]);

            hidden = (x_t + self.hidden_to_hidden.forward(hidden)).tanh();
        }

        self.output.forward(self.dropout.forward(hidden))
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
