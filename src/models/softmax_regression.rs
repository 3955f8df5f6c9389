//! A single linear layer over the padding-masked token ids, followed by dropout. The softmax
//! itself is left to the loss.

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{backend::Backend, Int, Tensor},
};

use crate::{
    cli::{ArgumentGroup, ModelArgs},
    data::{Batch, Requirement},
    models::{self, check_seq_length, require_non_zero, ModelConfig, ModelError},
};

/// The Model Configuration
#[derive(burn::config::Config, Debug)]
pub struct Config {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of classes
    pub out_feat: usize,

    /// Dropout probability
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Config {
    /// Initialize the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        Model {
            linear: LinearConfig::new(self.in_feat, self.out_feat).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            in_feat: self.in_feat,
        }
    }
}

impl ModelConfig for Config {
    const NAME: &'static str = "SoftmaxRegression";

    const REQUIREMENTS: &'static [Requirement] = &[Requirement::Tokens, Requirement::Padding];

    fn add_required_arguments(_group: &mut ArgumentGroup) {}

    fn from_args(args: &ModelArgs) -> Result<Self, ModelError> {
        require_non_zero(&[("in_feat", args.in_feat), ("out_feat", args.out_feat)])?;

        Ok(Config::new(args.in_feat, args.out_feat).with_dropout(args.dropout))
    }

    fn make_model<B: Backend>(
        args: &ModelArgs,
        device: &B::Device,
    ) -> Result<Box<dyn models::Model<B>>, ModelError> {
        Ok(Box::new(Self::from_args(args)?.init::<B>(device)))
    }
}

/// Softmax Regression
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
    in_feat: usize,
}

impl<B: Backend> Model<B> {
    /// Zero out padding positions, then project the raw ids to class logits
    pub fn forward(&self, tokens: Tensor<B, 2, Int>, padding: Tensor<B, 2>) -> Tensor<B, 2> {
        let masked = tokens.float() * padding;

        self.dropout.forward(self.linear.forward(masked))
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
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{
        test_utils::{batch, TestBackend},
        Architecture,
    };

    fn args() -> ModelArgs {
        ModelArgs {
            in_feat: 4,
            out_feat: 3,
            ..Default::default()
        }
    }

    #[test]
    fn produces_logits_per_class() {
        let model = Architecture::SoftmaxRegression
            .make_model::<TestBackend>(&args(), &Default::default())
            .unwrap();

        let logits = model
            .forward(&batch(4, vec![vec![1, 2], vec![3, 4, 5, 6]]))
            .unwrap();

        assert_eq!(logits.dims(), [2, 3]);
        assert_eq!(model.num_params(), 4 * 3 + 3);
    }

    #[test]
    fn padding_positions_do_not_contribute() {
        let device = Default::default();
        let model = Config::from_args(&args()).unwrap().init::<TestBackend>(&device);

        let short = batch(4, vec![vec![1, 2]]);
        let mut noisy = short.clone();
        noisy.tokens = Tensor::from_ints([[1, 2, 9, 9]], &device);

        let a = models::Model::forward(&model, &short).unwrap();
        let b = models::Model::forward(&model, &noisy).unwrap();

        assert_eq!(a.into_data().value, b.into_data().value);
    }

    #[test]
    fn requires_the_padding_input() {
        let device = Default::default();
        let model = Config::from_args(&args()).unwrap().init::<TestBackend>(&device);

        let tokens_only = Batch::new(Tensor::from_ints([[1, 2, 0, 0]], &device));

        assert!(matches!(
            models::Model::forward(&model, &tokens_only),
            Err(ModelError::MissingInput(Requirement::Padding))
        ));
    }

    #[test]
    fn rejects_batches_of_the_wrong_length() {
        let model = Architecture::SoftmaxRegression
            .make_model::<TestBackend>(&args(), &Default::default())
            .unwrap();

        assert!(matches!(
            model.forward(&batch(5, vec![vec![1]])),
            Err(ModelError::SequenceLength {
                expected: 4,
                found: 5
            })
        ));
    }
}
