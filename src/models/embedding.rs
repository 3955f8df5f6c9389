use std::path::Path;

use burn::{
    module::{Module, Param},
    nn::{Embedding, EmbeddingConfig, EmbeddingRecord},
    tensor::{backend::Backend, Data, ElementConversion, Shape, Tensor},
};

use crate::{cli::ModelArgs, utils::files::read_lines};

use super::ModelError;

/// Pretrained embedding vectors, where the row index is the token id
#[derive(Debug, Clone, PartialEq)]
pub struct Pretrained {
    /// Number of vectors (the vocabulary size)
    pub rows: usize,

    /// Width of each vector
    pub dim: usize,

    /// Row-major vector values
    pub values: Vec<f32>,
}

impl Pretrained {
    /// Parse numbered lines of whitespace-separated floats, one vector per line
    pub fn from_lines(lines: &[(usize, String)]) -> Result<Self, EmbeddingError> {
        let mut dim = None;
        let mut values = Vec::new();

        for (number, line) in lines {
            let start = values.len();

            for value in line.split_whitespace() {
                let parsed: f32 = value.parse().map_err(|_| EmbeddingError::Invalid {
                    line: *number,
                    value: value.to_string(),
                })?;

                values.push(parsed);
            }

            let found = values.len() - start;

            match dim {
                None => dim = Some(found),
                Some(expected) if expected != found => {
                    return Err(EmbeddingError::Ragged {
                        line: *number,
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
        }

        let dim = dim.ok_or(EmbeddingError::Empty)?;

        Ok(Self {
            rows: lines.len(),
            dim,
            values,
        })
    }

    /// Load vectors from a text file
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let lines = read_lines(path)
            .await
            .map_err(|e| anyhow!("Unable to read embeddings from {}: {}", path.display(), e))?;

        let pretrained = Self::from_lines(&lines)?;

        log::info!(
            "Loaded {} pretrained embeddings of width {} from {}",
            pretrained.rows,
            pretrained.dim,
            path.display()
        );

        Ok(pretrained)
    }

    /// Build a frozen embedding layer holding these vectors
    pub fn init<B: Backend>(&self, device: &B::Device) -> Embedding<B> {
        let weight = Tensor::from_data(
            Data::new(
                self.values.iter().map(|v| v.elem::<B::FloatElem>()).collect(),
                Shape::new([self.rows, self.dim]),
            ),
            device,
        );

        EmbeddingConfig::new(self.rows, self.dim)
            .init(device)
            .load_record(EmbeddingRecord {
                weight: Param::from_tensor(weight),
            })
            .no_grad()
    }
}

/// Build the token embedding layer for a model: pretrained vectors when the arguments carry
/// them, otherwise a freshly initialized `vocab_size x embedding_dim` table
pub fn embedding_layer<B: Backend>(
    args: &ModelArgs,
    device: &B::Device,
) -> Result<Embedding<B>, ModelError> {
    if let Some(pretrained) = &args.embeddings {
        return Ok(pretrained.init(device));
    }

    if args.vocab_size == 0 || args.embedding_dim == 0 {
        return Err(ModelError::InvalidConfig(
            "vocab_size and embedding_dim must be non-zero".to_string(),
        ));
    }

    Ok(EmbeddingConfig::new(args.vocab_size, args.embedding_dim).init(device))
}

/// Number of rows in an embedding table, which bounds the token ids it accepts
pub fn table_rows<B: Backend>(embedding: &Embedding<B>) -> usize {
    let [rows, _] = embedding.weight.val().dims();

    rows
}

/// Embedding Error
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EmbeddingError {
    /// No vectors were found
    #[error("no embedding vectors found")]
    Empty,

    /// A line has a different width than the first
    #[error("line {line}: expected {expected} values, found {found}")]
    Ragged {
        /// 1-based line number
        line: usize,

        /// Width of the first vector
        expected: usize,

        /// Width of this vector
        found: usize,
    },

    /// A value is not a float
    #[error("line {line}: invalid value {value:?}")]
    Invalid {
        /// 1-based line number
        line: usize,

        /// The offending value
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::{Autodiff, NdArray},
        tensor::Int,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray;

    fn lines(rows: &[&str]) -> Vec<(usize, String)> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| (i + 1, row.to_string()))
            .collect()
    }

    #[test]
    fn parses_vectors() {
        let pretrained = Pretrained::from_lines(&lines(&["0 0.5", "1 -2"])).unwrap();

        assert_eq!(pretrained.rows, 2);
        assert_eq!(pretrained.dim, 2);
        assert_eq!(pretrained.values, vec![0.0, 0.5, 1.0, -2.0]);
    }

    #[test]
    fn rejects_ragged_and_malformed_rows() {
        assert_eq!(
            Pretrained::from_lines(&lines(&["0 1", "1 2 3"])),
            Err(EmbeddingError::Ragged {
                line: 2,
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            Pretrained::from_lines(&lines(&["0 x"])),
            Err(EmbeddingError::Invalid {
                line: 1,
                value: "x".to_string()
            })
        );
        assert_eq!(Pretrained::from_lines(&[]), Err(EmbeddingError::Empty));
    }

    #[test]
    fn looks_up_pretrained_rows_by_token_id() {
        let device = Default::default();
        let pretrained = Pretrained::from_lines(&lines(&["1 2", "3 4", "5 6"])).unwrap();

        let embedding = pretrained.init::<TestBackend>(&device);
        let tokens = Tensor::<TestBackend, 2, Int>::from_ints([[2, 0]], &device);

        let output = embedding.forward(tokens);

        assert_eq!(output.dims(), [1, 2, 2]);
        assert_eq!(
            output.into_data().convert::<f32>().value,
            vec![5.0, 6.0, 1.0, 2.0]
        );
    }

    #[test]
    fn pretrained_tables_are_frozen() {
        type Trainable = Autodiff<TestBackend>;

        let device = Default::default();
        let pretrained = Pretrained::from_lines(&lines(&["1 2", "3 4"])).unwrap();

        let frozen = pretrained.init::<Trainable>(&device);
        let fresh = EmbeddingConfig::new(2, 2).init::<Trainable>(&device);

        assert!(!frozen.weight.val().is_require_grad());
        assert!(fresh.weight.val().is_require_grad());
        assert_eq!(table_rows(&frozen), 2);
    }

    #[test]
    fn pretrained_vectors_override_the_configured_shape() {
        let mut args = ModelArgs::default();
        args.embeddings = Some(Pretrained::from_lines(&lines(&["1 2 3"])).unwrap());

        assert_eq!(args.embedding_shape(), (1, 3));
    }
}
