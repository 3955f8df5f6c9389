use std::path::Path;

use burn::{
    nn::{
        transformer::TransformerEncoderConfig, DropoutConfig, Embedding, EmbeddingConfig,
        LayerNormConfig, LinearConfig,
    },
    tensor::backend::Backend,
};
use serde::Deserialize;

use crate::{
    cli::{Argument, ArgumentGroup, ModelArgs},
    data::Requirement,
    models::{self, embedding::embedding_layer, require_non_zero, ModelConfig, ModelError},
};

use super::{Embeddings, Model};

/// Path to a Hugging Face `config.json`
pub static CONFIG_FILE: Argument = Argument::new(
    "--bert-config",
    "",
    "Path to a Hugging Face BERT config.json; overrides the other BERT options",
);

/// Number of attention heads
pub static N_HEADS: Argument =
    Argument::new("--bert-n-heads", "12", "Number of attention heads in each encoder layer");

/// Number of encoder layers
pub static N_LAYERS: Argument =
    Argument::new("--bert-n-layers", "12", "Number of transformer encoder layers");

/// Size of the intermediate feedforward layer
pub static INTERMEDIATE_SIZE: Argument = Argument::new(
    "--bert-intermediate-size",
    "3072",
    "Size of the intermediate position-wise feedforward layer",
);

/// Max position embeddings
pub static MAX_POSITION_EMBEDDINGS: Argument = Argument::new(
    "--bert-max-position-embeddings",
    "512",
    "Longest sequence the position embeddings cover",
);

/// Layer normalization epsilon
pub static LAYER_NORM_EPS: Argument =
    Argument::new("--bert-layer-norm-eps", "1e-12", "Layer normalization epsilon");

/// The base BERT encoder configuration, field-compatible with Hugging Face `config.json`
#[derive(burn::config::Config, Debug)]
pub struct BertConfig {
    /// Number of attention heads in the multi-head attention
    pub num_attention_heads: usize,
    /// Number of transformer encoder layers/blocks
    pub num_hidden_layers: usize,
    /// Size of bert embedding (e.g., 768 for bert-base)
    pub hidden_size: usize,
    /// Size of the intermediate position wise feedforward layer
    pub intermediate_size: usize,
    /// Size of the vocabulary
    pub vocab_size: usize,
    /// Max position embeddings
    pub max_position_embeddings: usize,
    /// Layer normalization epsilon
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
    /// Number of segment types
    #[config(default = 2)]
    pub type_vocab_size: usize,
    /// Dropout value across layers, typically 0.1
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
}

/// The subset of a Hugging Face `config.json` the encoder reads. Other keys are ignored.
#[derive(Deserialize, Debug)]
struct HubConfig {
    num_attention_heads: usize,
    num_hidden_layers: usize,
    hidden_size: usize,
    intermediate_size: usize,
    vocab_size: usize,
    max_position_embeddings: usize,
    #[serde(default)]
    layer_norm_eps: Option<f64>,
    #[serde(default)]
    type_vocab_size: Option<usize>,
    #[serde(default)]
    hidden_dropout_prob: Option<f64>,
}

impl From<HubConfig> for BertConfig {
    fn from(hub: HubConfig) -> Self {
        let config = BertConfig::new(
            hub.num_attention_heads,
            hub.num_hidden_layers,
            hub.hidden_size,
            hub.intermediate_size,
            hub.vocab_size,
            hub.max_position_embeddings,
        );

        BertConfig {
            layer_norm_eps: hub.layer_norm_eps.unwrap_or(config.layer_norm_eps),
            type_vocab_size: hub.type_vocab_size.unwrap_or(config.type_vocab_size),
            hidden_dropout_prob: hub.hidden_dropout_prob.unwrap_or(config.hidden_dropout_prob),
            ..config
        }
    }
}

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// The base BERT config
    pub model: BertConfig,

    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Dropout before the classifier
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model with fresh word embeddings
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let word = EmbeddingConfig::new(self.model.vocab_size, self.model.hidden_size).init(device);

        self.init_with(word, device)
    }

    /// Initialize the model around an existing word embedding table
    pub fn init_with<B: Backend>(&self, word: Embedding<B>, device: &B::Device) -> Model<B> {
        let bert = &self.model;

        let embeddings = Embeddings {
            word,
            position: EmbeddingConfig::new(bert.max_position_embeddings, bert.hidden_size)
                .init(device),
            token_type: EmbeddingConfig::new(bert.type_vocab_size, bert.hidden_size)
                .init(device),
            layer_norm: LayerNormConfig::new(bert.hidden_size)
                .with_epsilon(bert.layer_norm_eps)
                .init(device),
            dropout: DropoutConfig::new(bert.hidden_dropout_prob).init(),
            max_position_embeddings: bert.max_position_embeddings,
        };

        let encoder = TransformerEncoderConfig::new(
            bert.hidden_size,
            bert.intermediate_size,
            bert.num_attention_heads,
            bert.num_hidden_layers,
        )
        .with_dropout(bert.hidden_dropout_prob)
        .init(device);

        Model {
            embeddings,
            encoder,
            pooler: LinearConfig::new(bert.hidden_size, bert.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(bert.hidden_size, self.out_feat).init(device),
        }
    }

    /// Read the base BERT config from a Hugging Face `config.json`
    pub fn load_bert_config(path: impl AsRef<Path>) -> Result<BertConfig, ModelError> {
        let path = path.as_ref();

        log::info!("Loading BERT config from {}", path.display());

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Config(format!("{}: {}", path.display(), e)))?;

        let hub: HubConfig = serde_json::from_str(&contents)
            .map_err(|e| ModelError::Config(format!("{}: {}", path.display(), e)))?;

        Ok(hub.into())
    }

    fn validate(&self) -> Result<(), ModelError> {
        let bert = &self.model;

        require_non_zero(&[
            ("in_feat", self.in_feat),
            ("out_feat", self.out_feat),
            ("bert hidden size", bert.hidden_size),
            ("bert attention heads", bert.num_attention_heads),
            ("bert layers", bert.num_hidden_layers),
            ("bert intermediate size", bert.intermediate_size),
            ("bert vocab size", bert.vocab_size),
            ("bert type vocab size", bert.type_vocab_size),
        ])?;

        if bert.hidden_size % bert.num_attention_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "bert hidden size {} is not divisible by {} attention heads",
                bert.hidden_size, bert.num_attention_heads
            )));
        }

        if self.in_feat > bert.max_position_embeddings {
            return Err(ModelError::SequenceTooLong {
                length: self.in_feat,
                max: bert.max_position_embeddings,
            });
        }

        Ok(())
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "BERT";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens, Requirement::Mask];

    fn add_required_arguments(group: &mut ArgumentGroup) {
        group
            .add(CONFIG_FILE)
            .add(N_HEADS)
            .add(N_LAYERS)
            .add(INTERMEDIATE_SIZE)
            .add(MAX_POSITION_EMBEDDINGS)
            .add(LAYER_NORM_EPS);
    }

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        let model = match args.optional(&CONFIG_FILE) {
            Some(path) => Self::load_bert_config(path)?,
            None => {
                let (vocab_size, hidden_size) = args.embedding_shape();

                BertConfig::new(
                    args.get(&N_HEADS)?,
                    args.get(&N_LAYERS)?,
                    hidden_size,
                    args.get(&INTERMEDIATE_SIZE)?,
                    vocab_size,
                    args.get(&MAX_POSITION_EMBEDDINGS)?,
                )
                .with_layer_norm_eps(args.get(&LAYER_NORM_EPS)?)
                .with_hidden_dropout_prob(args.dropout)
            }
        };

        let config = Config::new(model, args.in_feat, args.out_feat).with_dropout(args.dropout);

        config.validate()?;

        Ok(config)
    }

    fn make_model<B: Backend>(
        args: &ModelArgs,
        device: &B::Device,
    ) -> Result<Box<dyn models::Model<B>>, ModelError> {
        let config = Self::from_args(args)?;

        if args.embeddings.is_none() {
            return Ok(Box::new(config.init::<B>(device)));
        }

        let (rows, dim) = args.embedding_shape();
        if rows != config.model.vocab_size || dim != config.model.hidden_size {
            return Err(ModelError::InvalidConfig(format!(
                "pretrained embeddings are {}x{}, but BERT expects {}x{}",
                rows, dim, config.model.vocab_size, config.model.hidden_size
            )));
        }

        let word = embedding_layer(args, device)?;

        Ok(Box::new(config.init_with(word, device)))
    }
}
