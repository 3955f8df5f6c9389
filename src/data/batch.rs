use std::fmt::Display;

use burn::tensor::{backend::Backend, Bool, Int, Tensor};

use crate::models::ModelError;

/// A named input tensor that a model needs for its forward pass
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Requirement {
    /// Token ids
    Tokens,

    /// Float multiplier that zeroes out padding positions
    Padding,

    /// Boolean mask marking real (non-padding) positions
    Mask,
}

impl Requirement {
    /// The name a driver uses for this input
    pub fn as_str(&self) -> &'static str {
        match self {
            Requirement::Tokens => "tokens",
            Requirement::Padding => "padding",
            Requirement::Mask => "mask",
        }
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A batch of token sequences padded to a fixed length, with the optional inputs some models
/// need on top of the raw tokens
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    /// Token ids as 2D tensor: [batch_size, seq_length]
    pub tokens: Tensor<B, 2, Int>,

    /// 1.0 for real tokens and 0.0 for padding: [batch_size, seq_length]
    pub padding: Option<Tensor<B, 2>>,

    /// true for real tokens and false for padding: [batch_size, seq_length]
    pub mask: Option<Tensor<B, 2, Bool>>,
}

impl<B: Backend> Batch<B> {
    /// Create a batch holding only token ids
    pub fn new(tokens: Tensor<B, 2, Int>) -> Self {
        Self {
            tokens,
            padding: None,
            mask: None,
        }
    }

    /// Attach the float padding multiplier
    pub fn with_padding(mut self, padding: Tensor<B, 2>) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Attach the boolean mask
    pub fn with_mask(mut self, mask: Tensor<B, 2, Bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// The [batch_size, seq_length] dimensions of the batch
    pub fn dims(&self) -> [usize; 2] {
        self.tokens.dims()
    }

    /// Whether the batch carries the given input
    pub fn provides(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::Tokens => true,
            Requirement::Padding => self.padding.is_some(),
            Requirement::Mask => self.mask.is_some(),
        }
    }

    /// Fail with the first requirement the batch does not satisfy
    pub fn check(&self, requirements: &[Requirement]) -> Result<(), ModelError> {
        match requirements.iter().find(|r| !self.provides(**r)) {
            Some(missing) => Err(ModelError::MissingInput(*missing)),
            None => Ok(()),
        }
    }

    /// The padding multiplier, or an error if the driver did not supply it
    pub fn padding(&self) -> Result<Tensor<B, 2>, ModelError> {
        self.padding
            .clone()
            .ok_or(ModelError::MissingInput(Requirement::Padding))
    }

    /// The boolean mask, or an error if the driver did not supply it
    pub fn mask(&self) -> Result<Tensor<B, 2, Bool>, ModelError> {
        self.mask
            .clone()
            .ok_or(ModelError::MissingInput(Requirement::Mask))
    }
}
