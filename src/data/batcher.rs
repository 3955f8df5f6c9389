use std::{collections::BTreeMap, fmt::Debug};

use burn::{
    data::dataloader,
    tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor},
};
use derive_new::new;

use crate::utils::{classes::invert_map, tensors::pad_to};

use super::Batch;

/// The label that unknown classes fall back to, when the label list has one
pub static UNK_LABEL: &str = "UNK";

/// A trait for tokenized items that can be batched for classification
pub trait Item: Send + Sync + Clone + Debug {
    /// Returns the token ids for the item
    fn tokens(&self) -> &[usize];

    /// Returns the class label for the item
    fn class_label(&self) -> &str;
}

/// A simple tokenized, labelled item
#[derive(Clone, Debug, new)]
pub struct Tokenized {
    /// Token ids
    pub tokens: Vec<usize>,

    /// Class name
    pub label: String,
}

impl Item for Tokenized {
    fn tokens(&self) -> &[usize] {
        &self.tokens
    }

    fn class_label(&self) -> &str {
        &self.label
    }
}

/// A training batch for classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Model input
    pub input: Batch<B>,

    /// Class ids for the batch
    pub targets: Tensor<B, 1, Int>,
}

/// Collates variable-length token sequences into fixed-size batches
#[derive(Clone)]
pub struct Batcher<B: Backend> {
    /// Every sequence is padded or truncated to this length
    pub seq_length: usize,

    /// ID of the padding token
    pub pad_token_id: usize,

    /// The class id unknown labels fall back to
    pub unk_class_id: usize,

    /// A mapping from class ids to class name labels
    pub id2label: BTreeMap<usize, String>,

    /// A mapping from class name labels to class ids
    pub label2id: BTreeMap<String, usize>,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> Batcher<B> {
    /// Creates a new batcher
    pub fn new(
        seq_length: usize,
        pad_token_id: usize,
        labels: &[String],
        device: B::Device,
    ) -> Self {
        let id2label: BTreeMap<usize, String> = labels
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.trim().to_string()))
            .collect();

        let label2id: BTreeMap<String, usize> = invert_map(id2label.clone());

        let unk_class_id = label2id.get(UNK_LABEL).copied().unwrap_or(0);

        Self {
            seq_length,
            pad_token_id,
            unk_class_id,
            id2label,
            label2id,
            device,
        }
    }

    /// Look up the id of a class label, falling back to the unknown class
    pub fn class_id(&self, label: &str) -> usize {
        match self.label2id.get(label) {
            Some(id) => *id,
            None => {
                log::warn!(
                    "Unknown class label {:?}, using class id {}",
                    label,
                    self.unk_class_id
                );

                self.unk_class_id
            }
        }
    }

    /// Look up the label of a class id
    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.id2label.get(&class_id).map(String::as_str)
    }
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<Vec<usize>, Batch<B>> for Batcher<B> {
    /// Collects token id sequences into an inference batch carrying every optional input. An
    /// empty list gives an empty batch, which models reject with `ModelError::EmptyBatch`.
    fn batch(&self, items: Vec<Vec<usize>>) -> Batch<B> {
        let padded = pad_to::<B>(self.pad_token_id, items, self.seq_length, &self.device);

        Batch::new(padded.tokens)
            .with_padding(padded.padding)
            .with_mask(padded.mask)
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend, I: Item> dataloader::batcher::Batcher<I, Train<B>> for Batcher<B> {
    /// Collects labelled items into a training batch
    fn batch(&self, items: Vec<I>) -> Train<B> {
        let batch_size = items.len();

        let tokens: Vec<Vec<usize>> = items.iter().map(|item| item.tokens().to_vec()).collect();
        let input = dataloader::batcher::Batcher::<Vec<usize>, Batch<B>>::batch(self, tokens);

        let class_ids: Vec<B::IntElem> = items
            .iter()
            .map(|item| (self.class_id(item.class_label()) as i64).elem())
            .collect();

        let targets = Tensor::from_data(
            Data::new(class_ids, Shape::new([batch_size])),
            &self.device,
        );

        Train { input, targets }
    }
}
