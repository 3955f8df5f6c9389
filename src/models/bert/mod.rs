use burn::{
    module::Module,
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderInput},
        Dropout, Embedding, LayerNorm, Linear,
    },
    tensor::{backend::Backend, Bool, Data, ElementConversion, Int, Shape, Tensor},
};

use crate::{
    data::{Batch, Requirement},
    models::{self, check_non_empty, embedding::table_rows, ModelConfig, ModelError},
};

/// BERT configuration and command line options
pub mod config;

pub use config::{BertConfig, Config};

/// Word, position and segment embeddings, summed and normalized
#[derive(Module, Debug)]
pub struct Embeddings<B: Backend> {
    pub(super) word: Embedding<B>,
    pub(super) position: Embedding<B>,
    pub(super) token_type: Embedding<B>,
    pub(super) layer_norm: LayerNorm<B>,
    pub(super) dropout: Dropout,
    pub(super) max_position_embeddings: usize,
}

impl<B: Backend> Embeddings<B> {
    /// Embed a batch of tokens: [batch_size, seq_length, hidden_size]
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Result<Tensor<B, 3>, ModelError> {
        let [batch_size, seq_length] = tokens.dims();

        if seq_length > self.max_position_embeddings {
            return Err(ModelError::SequenceTooLong {
                length: seq_length,
                max: self.max_position_embeddings,
            });
        }

        let device = tokens.device();

        let positions = (0..batch_size)
            .flat_map(|_| (0..seq_length).map(|i| (i as i64).elem::<B::IntElem>()))
            .collect();
        let positions = Tensor::from_data(
            Data::new(positions, Shape::new([batch_size, seq_length])),
            &device,
        );

        // Every token belongs to the first segment
        let token_types = Tensor::<B, 2, Int>::zeros([batch_size, seq_length], &device);

        let embedded = self.word.forward(tokens)
            + self.position.forward(positions)
            + self.token_type.forward(token_types);

        Ok(self.dropout.forward(self.layer_norm.forward(embedded)))
    }
}

/// BERT encoder with a pooled [CLS] classification head
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    pub(super) embeddings: Embeddings<B>,
    pub(super) encoder: TransformerEncoder<B>,
    pub(super) pooler: Linear<B>,
    pub(super) dropout: Dropout,
    pub(super) output: Linear<B>,
}

impl<B: Backend> Model<B> {
    /// Encode the tokens and classify the pooled first position
    pub fn forward(
        &self,
        tokens: Tensor<B, 2, Int>,
        mask: Tensor<B, 2, Bool>,
    ) -> Result<Tensor<B, 2>, ModelError> {
        let [batch_size, _] = tokens.dims();

        let embedded = self.embeddings.forward(tokens)?;

        let encoded = self
            .encoder
            .forward(TransformerEncoderInput::new(embedded).mask_pad(mask.bool_not()));

        let [_, _, hidden_size] = encoded.dims();
        let cls = encoded
            .slice([0..batch_size, 0..1, 0..hidden_size])
            .reshape([batch_size, hidden_size]);

        let pooled = self.pooler.forward(cls).tanh();

        Ok(self.output.forward(self.dropout.forward(pooled)))
    }
}

impl<B: Backend> models::Model<B> for Model<B> {
    fn data_requirements(&self) -> &'static [Requirement] {
        Config::REQUIREMENTS
    }

    fn forward(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>, ModelError> {
        // Any length up to the position table is accepted
        check_non_empty(batch)?;

        self.forward(batch.tokens.clone(), batch.mask()?)
    }

    fn num_params(&self) -> usize {
        Module::num_params(self)
    }

    fn vocab_size(&self) -> Option<usize> {
        Some(table_rows(&self.embeddings.word))
    }
}
