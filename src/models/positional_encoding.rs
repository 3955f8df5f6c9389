use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig},
    tensor::{backend::Backend, Data, ElementConversion, Shape, Tensor},
};

use super::ModelError;

/// Configuration for the sinusoidal positional encoding
#[derive(Config, Debug)]
pub struct PositionalEncodingConfig {
    /// Width of the embeddings the encoding is added to
    pub d_model: usize,

    /// Longest sequence the encoding covers
    #[config(default = 5000)]
    pub max_len: usize,

    /// Dropout applied after adding the encoding
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl PositionalEncodingConfig {
    /// Initialize the positional encoding, computing its table for `max_len` positions
    pub fn init<B: Backend>(&self, device: &B::Device) -> PositionalEncoding<B> {
        let table = sinusoid_table(self.max_len, self.d_model);

        let table = Tensor::from_data(
            Data::new(
                table.into_iter().map(|v| v.elem::<B::FloatElem>()).collect(),
                Shape::new([1, self.max_len, self.d_model]),
            ),
            device,
        );

        PositionalEncoding {
            table,
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Adds a fixed sinusoidal signal to embeddings so attention can tell positions apart
#[derive(Module, Debug)]
pub struct PositionalEncoding<B: Backend> {
    /// [1, max_len, d_model], not trained
    table: Tensor<B, 3>,
    dropout: Dropout,
}

impl<B: Backend> PositionalEncoding<B> {
    /// Add the encoding to `x`: [batch_size, seq_length, d_model]
    pub fn forward(&self, x: Tensor<B, 3>) -> Result<Tensor<B, 3>, ModelError> {
        let [_batch_size, seq_length, d_model] = x.dims();
        let [_, max_len, width] = self.table.dims();

        if seq_length > max_len {
            return Err(ModelError::SequenceTooLong {
                length: seq_length,
                max: max_len,
            });
        }

        if d_model != width {
            return Err(ModelError::InvalidConfig(format!(
                "positional encoding expects width {}, got {}",
                width, d_model
            )));
        }

        let pe = self.table.clone().slice([0..1, 0..seq_length, 0..width]);

        Ok(self.dropout.forward(x + pe))
    }
}

/// The row-major `[positions, d_model]` table of encodings.
///
/// Even columns `2i` hold `sin(pos * exp(2i * -ln(10000) / d_model))` and odd columns `2i + 1`
/// hold `cos(pos * exp((2i + 1) * -ln(10000) / d_model))`; each column scales its frequency by
/// its own index.
pub fn sinusoid_table(positions: usize, d_model: usize) -> Vec<f32> {
    let scale = -libm::logf(10000.0) / d_model as f32;

    let frequencies: Vec<f32> = (0..d_model)
        .map(|col| libm::expf(col as f32 * scale))
        .collect();

    let mut table = Vec::with_capacity(positions * d_model);

    for pos in 0..positions {
        for (col, frequency) in frequencies.iter().enumerate() {
            let angle = pos as f32 * frequency;

            table.push(if col % 2 == 0 {
                libm::sinf(angle)
            } else {
                libm::cosf(angle)
            });
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());

        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{} != {}", a, e);
        }
    }

    #[test]
    fn first_position_alternates_zero_and_one() {
        let table = sinusoid_table(1, 6);

        assert_close(&table, &[0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn odd_columns_use_their_own_index_for_frequency() {
        let table = sinusoid_table(2, 4);

        // d_model = 4 gives frequencies 10000^(-col / 4): 1, 0.1, 0.01, 0.001
        let expected = [
            1.0f32.sin(),
            0.1f32.cos(),
            0.01f32.sin(),
            0.001f32.cos(),
        ];

        assert_close(&table[4..], &expected);
    }

    #[test]
    fn supports_odd_widths() {
        let table = sinusoid_table(3, 5);

        assert_eq!(table.len(), 15);
        assert_close(&table[..5], &[0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn adds_the_table_to_every_batch_item() {
        let device = Default::default();
        let encoding = PositionalEncodingConfig::new(4)
            .with_max_len(8)
            .with_dropout(0.0)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::zeros([2, 3, 4], &device);
        let output = encoding.forward(x).unwrap();

        let values = output.into_data().convert::<f32>().value;
        let table = sinusoid_table(3, 4);

        assert_close(&values[..12], &table);
        assert_close(&values[12..], &table);
    }

    #[test]
    fn holds_the_table_as_a_constant() {
        let encoding = PositionalEncodingConfig::new(6)
            .with_max_len(10)
            .init::<TestBackend>(&Default::default());

        assert_eq!(encoding.table.dims(), [1, 10, 6]);
        assert_eq!(encoding.num_params(), 0);
    }

    #[test]
    fn rejects_sequences_longer_than_max_len() {
        let device = Default::default();
        let encoding = PositionalEncodingConfig::new(4)
            .with_max_len(2)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 3>::zeros([1, 3, 4], &device);

        assert!(matches!(
            encoding.forward(x),
            Err(ModelError::SequenceTooLong { length: 3, max: 2 })
        ));
    }
}
