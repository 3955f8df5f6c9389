//! A transformer classifier built from the encoder stack only. Each token's encoding is
//! flattened into one long feature vector for the output projection, so the model is tied to a
//! fixed sequence length. Supports pretrained word embeddings.

use burn::{
    module::Module,
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Embedding, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Bool, Int, Tensor},
};

use crate::{
    cli::{Argument, ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
    models::{
        self, check_seq_length,
        embedding::{embedding_layer, table_rows},
        positional_encoding::{PositionalEncoding, PositionalEncodingConfig},
        require_non_zero, ModelConfig, ModelError,
    },
};

/// Size of the feedforward network inside each encoder layer
pub static HIDDEN_SIZE: Argument = Argument::new(
    "--transformer-hidden-size",
    "2048",
    "Size of the feedforward network model inside the encoder layer",
);

/// Number of attention heads
pub static N_HEADS: Argument = Argument::new(
    "--transformer-n-heads",
    "8",
    "Number of heads in the multi-head attention of each encoder layer",
);

/// Number of encoder layers
pub static N_LAYERS: Argument = Argument::new(
    "--transformer-n-layers",
    "4",
    "The number of encoder layers to be stacked",
);

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Width of the token embeddings
    pub d_model: usize,

    /// Size of the feedforward network inside each encoder layer
    #[config(default = 2048)]
    pub hidden_size: usize,

    /// Number of attention heads
    #[config(default = 8)]
    pub n_heads: usize,

    /// Number of encoder layers
    #[config(default = 4)]
    pub n_layers: usize,

    /// Dropout probability
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model around an existing embedding table
    pub fn init_with<B: Backend>(&self, embeddings: Embedding<B>, device: &B::Device) -> Model<B> {
        let encoder = TransformerEncoderConfig::new(
            self.d_model,
            self.hidden_size,
            self.n_heads,
            self.n_layers,
        )
        .with_dropout(self.dropout)
        .init(device);

        Model {
            embeddings,
            pos_encoding: PositionalEncodingConfig::new(self.d_model)
                .with_max_len(self.in_feat)
                .with_dropout(self.dropout)
                .init(device),
            encoder,
            output: LinearConfig::new(self.in_feat * self.d_model, self.out_feat).init(device),
            in_feat: self.in_feat,
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        require_non_zero(&[
            ("in_feat", self.in_feat),
            ("out_feat", self.out_feat),
            ("embedding width", self.d_model),
            ("transformer hidden size", self.hidden_size),
            ("transformer heads", self.n_heads),
            ("transformer layers", self.n_layers),
        ])?;

        if self.d_model % self.n_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "embedding width {} is not divisible by {} attention heads",
                self.d_model, self.n_heads
            )));
        }

        Ok(())
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "Transformer";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens, Requirement::Mask];

    fn add_required_arguments(group: &mut ArgumentGroup) {
        group.add(HIDDEN_SIZE).add(N_HEADS).add(N_LAYERS);
    }

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        let (_, d_model) = args.embedding_shape();

        let config = Config::new(args.in_feat, args.out_feat, d_model)
            .with_hidden_size(args.get(&HIDDEN_SIZE)?)
            .with_n_heads(args.get(&N_HEADS)?)
            .with_n_layers(args.get(&N_LAYERS)?)
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

/// Transformer encoder classifier
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    embeddings: Embedding<B>,
    pos_encoding: PositionalEncoding<B>,
    encoder: TransformerEncoder<B>,
    output: Linear<B>,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Encode the tokens, attending only to positions where `mask` is true
    pub fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        mask: Tensor<B, 2, Bool>,
    ) -> Result<Tensor<B, 2>, ModelError> {
        let [batch_size, seq_length] = tokens.dims();

        let src = self.embeddings.forward(tokens);
        let src = self.pos_encoding.forward(src)?;

        // The encoder expects true at padding positions
        let encoded = self
            .encoder
            .forward(TransformerEncoderInput::new(src).mask_pad(mask.bool_not()));

        let [_, _, d_model] = encoded.dims();
        let flat = encoded.reshape([batch_size, seq_length * d_model]);

        Ok(self.output.forward(flat))
    }
}

impl<B: Backend> models::Model<B> for Model<B> {
    fn data_requirements(&self) -> &'static [Requirement] {
        Config::REQUIREMENTS
    }

    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError> {
        check_seq_length(batch, self.in_feat)?;

        self.forward(batch.tokens.clone(), batch.mask()?)
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn vocab_size(&self) -> Option<usize> {
        Some(table_rows(&self.embeddings))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{
        embedding::Pretrained,
        test_utils::{batch, TestBackend},
        Architecture,
    };

    fn args() -> ModelArgs {
        ModelArgs {
            in_feat: 6,
            out_feat: 3,
            vocab_size: 20,
            embedding_dim: 8,
            ..Default::default()
        }
        .with_option("--transformer-hidden-size", 16)
        .with_option("--transformer-n-heads", 2)
        .with_option("--transformer-n-layers", 1)
    }

    #[test]
    fn reads_options_with_defaults() {
        let config = Config::from_args(&ModelArgs::default()).unwrap();

        assert_eq!(config.hidden_size, 2048);
        assert_eq!(config.n_heads, 8);
        assert_eq!(config.n_layers, 4);
        assert_eq!(config.d_model, 128);
    }

    #[test]
    fn classifies_a_padded_batch() {
        let model = Architecture::Transformer
            .make_model::<TestBackend>(&args(), &Default::default())
            .unwrap();

        let logits = model
            .forward(&batch(6, vec![vec![1, 2, 3], vec![4, 5, 6, 7, 8, 9]]))
            .unwrap();

        assert_eq!(logits.dims(), [2, 3]);
    }

    #[test]
    fn uses_the_width_of_pretrained_embeddings() {
        let mut args = args();
        args.embeddings = Some(Pretrained {
            rows: 10,
            dim: 4,
            values: vec![0.5; 40],
        });

        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.d_model, 4);

        let model = Architecture::Transformer
            .make_model::<TestBackend>(&args, &Default::default())
            .unwrap();

        assert_eq!(model.forward(&batch(6, vec![vec![1, 2]])).unwrap().dims(), [1, 3]);
    }

    #[test]
    fn rejects_widths_not_divisible_by_heads() {
        let args = args().with_option("--transformer-n-heads", 3);

        assert!(matches!(
            Config::from_args(&args),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn requires_the_mask_input() {
        let device = Default::default();
        let model = Architecture::Transformer
            .make_model::<TestBackend>(&args(), &device)
            .unwrap();

        let tokens_only = Batch::new(Tensor::from_ints([[1, 2, 3, 0, 0, 0]], &device));

        assert!(matches!(
            model.forward(&tokens_only),
            Err(ModelError::MissingInput(Requirement::Mask))
        ));
    }
}
