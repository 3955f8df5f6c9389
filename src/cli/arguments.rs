use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::embedding::Pretrained;

/// Help text for the options shared by every model
pub static COMMON_HELP: &str = "\
Common options:
  --in-feat            Fixed sequence length every batch is padded to (default: 50)
  --out-feat           Number of output classes (default: 2)
  --vocab-size         Size of the vocabulary (default: 30522)
  --embedding-dim      Size of each token embedding (default: 128)
  --batch-size         Batch size (default: 32)
  --dropout            Dropout probability (default: 0.1)
  --pad-token-id       ID of the padding token (default: 0)
  --embeddings         Path to pretrained embedding vectors, one per line
";

/// A model-specific command line option
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Argument {
    /// The flag, including leading dashes
    pub flag: &'static str,

    /// The value used when the option is not given
    pub default: &'static str,

    /// Help text
    pub help: &'static str,
}

impl Argument {
    /// Declare a new option
    pub const fn new(flag: &'static str, default: &'static str, help: &'static str) -> Self {
        Self {
            flag,
            default,
            help,
        }
    }
}

/// A titled group of options declared by one model
#[derive(Debug, Clone, Default)]
pub struct ArgumentGroup {
    /// Group heading used in help output
    pub title: String,

    /// The options, in declaration order
    pub arguments: Vec<Argument>,
}

impl ArgumentGroup {
    /// Create an empty group
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            arguments: Vec::new(),
        }
    }

    /// Declare an option in this group
    pub fn add(&mut self, argument: Argument) -> &mut Self {
        self.arguments.push(argument);
        self
    }

    /// Find a declared option by flag
    pub fn get(&self, flag: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.flag == flag)
    }
}

impl Display for ArgumentGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}:", self.title)?;

        if self.arguments.is_empty() {
            return writeln!(f, "  (none)");
        }

        for arg in &self.arguments {
            writeln!(f, "  {:<34} {} (default: {})", arg.flag, arg.help, arg.default)?;
        }

        Ok(())
    }
}

/// The arguments a model is built from: options shared by every model plus the values of
/// model-specific options, keyed by flag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelArgs {
    /// Fixed sequence length
    pub in_feat: usize,

    /// Number of output classes
    pub out_feat: usize,

    /// Size of the vocabulary
    pub vocab_size: usize,

    /// Size of each token embedding
    pub embedding_dim: usize,

    /// Batch size
    pub batch_size: usize,

    /// Dropout probability
    pub dropout: f64,

    /// ID of the padding token
    pub pad_token_id: usize,

    /// Pretrained embedding vectors, which override `vocab_size` and `embedding_dim`
    #[serde(skip)]
    pub embeddings: Option<Pretrained>,

    /// Values of model-specific options
    #[serde(deserialize_with = "deserialize_options")]
    pub options: BTreeMap<String, String>,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            in_feat: 50,
            out_feat: 2,
            vocab_size: 30522,
            embedding_dim: 128,
            batch_size: 32,
            dropout: 0.1,
            pad_token_id: 0,
            embeddings: None,
            options: BTreeMap::new(),
        }
    }
}

impl ModelArgs {
    /// Read arguments from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, ArgumentError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Set the value of a model-specific option
    pub fn with_option(mut self, flag: &str, value: impl ToString) -> Self {
        self.options.insert(normalize_flag(flag), value.to_string());
        self
    }

    /// Override arguments with any that were given on the command line
    pub fn parse(
        &mut self,
        pargs: &mut pico_args::Arguments,
        group: &ArgumentGroup,
    ) -> Result<(), ArgumentError> {
        if let Some(value) = pargs.opt_value_from_str("--in-feat")? {
            self.in_feat = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--out-feat")? {
            self.out_feat = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--vocab-size")? {
            self.vocab_size = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--embedding-dim")? {
            self.embedding_dim = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--batch-size")? {
            self.batch_size = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--dropout")? {
            self.dropout = value;
        }
        if let Some(value) = pargs.opt_value_from_str("--pad-token-id")? {
            self.pad_token_id = value;
        }

        for arg in &group.arguments {
            if let Some(value) = pargs.opt_value_from_str::<_, String>(arg.flag)? {
                self.options.insert(arg.flag.to_string(), value);
            }
        }

        Ok(())
    }

    /// The raw value of an option, falling back to its declared default
    pub fn raw(&self, argument: &Argument) -> &str {
        self.options
            .get(argument.flag)
            .map(String::as_str)
            .unwrap_or(argument.default)
    }

    /// The value of an option, or `None` when it is empty
    pub fn optional(&self, argument: &Argument) -> Option<&str> {
        Some(self.raw(argument)).filter(|value| !value.is_empty())
    }

    /// Parse the value of an option
    pub fn get<T: FromStr>(&self, argument: &Argument) -> Result<T, ArgumentError> {
        let value = self.raw(argument);

        value.trim().parse().map_err(|_| ArgumentError::Invalid {
            flag: argument.flag.to_string(),
            value: value.to_string(),
        })
    }

    /// Parse a comma-separated option into a list
    pub fn get_list<T: FromStr>(&self, argument: &Argument) -> Result<Vec<T>, ArgumentError> {
        let value = self.raw(argument);

        value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse().map_err(|_| ArgumentError::Invalid {
                    flag: argument.flag.to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    /// The vocabulary size and embedding width, taking pretrained vectors into account
    pub fn embedding_shape(&self) -> (usize, usize) {
        match &self.embeddings {
            Some(pretrained) => (pretrained.rows, pretrained.dim),
            None => (self.vocab_size, self.embedding_dim),
        }
    }
}

fn normalize_flag(flag: &str) -> String {
    if flag.starts_with("--") {
        flag.to_string()
    } else {
        format!("--{}", flag)
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(scalar_to_string)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        _ => None,
    }
}

fn deserialize_options<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;

    raw.into_iter()
        .map(|(flag, value)| match scalar_to_string(value) {
            Some(value) => Ok((normalize_flag(&flag), value)),
            None => Err(serde::de::Error::custom(format!(
                "option {} must be a scalar or a list of scalars",
                flag
            ))),
        })
        .collect()
}

/// Argument Error
#[derive(thiserror::Error, Debug)]
pub enum ArgumentError {
    /// An option value could not be parsed
    #[error("invalid value {value:?} for {flag}")]
    Invalid {
        /// The option flag
        flag: String,

        /// The value given
        value: String,
    },

    /// The YAML argument file could not be read
    #[error("unable to parse YAML arguments: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The command line could not be read
    #[error(transparent)]
    Cli(#[from] pico_args::Error),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    static HEADS: Argument = Argument::new("--heads", "8", "Number of heads");
    static KERNELS: Argument = Argument::new("--kernels", "3,4,5", "Kernel sizes");
    static CONFIG: Argument = Argument::new("--config-path", "", "Optional path");

    #[test]
    fn falls_back_to_declared_defaults() {
        let args = ModelArgs::default();

        assert_eq!(args.get::<usize>(&HEADS).unwrap(), 8);
        assert_eq!(args.get_list::<usize>(&KERNELS).unwrap(), vec![3, 4, 5]);
        assert_eq!(args.optional(&CONFIG), None);
    }

    #[test]
    fn given_values_override_defaults() {
        let args = ModelArgs::default()
            .with_option("heads", 2)
            .with_option("--config-path", "bert.json");

        assert_eq!(args.get::<usize>(&HEADS).unwrap(), 2);
        assert_eq!(args.optional(&CONFIG), Some("bert.json"));
    }

    #[test]
    fn reports_the_flag_of_malformed_values() {
        let args = ModelArgs::default().with_option("--heads", "many");

        let err = args.get::<usize>(&HEADS).unwrap_err();

        assert_eq!(err.to_string(), "invalid value \"many\" for --heads");
    }

    #[test]
    fn reads_yaml_with_scalar_and_list_options() {
        let args = ModelArgs::from_yaml(
            "in_feat: 12\nout_feat: 7\noptions:\n  heads: 4\n  --kernels: [2, 3]\n",
        )
        .unwrap();

        assert_eq!(args.in_feat, 12);
        assert_eq!(args.out_feat, 7);
        assert_eq!(args.dropout, 0.1);
        assert_eq!(args.get::<usize>(&HEADS).unwrap(), 4);
        assert_eq!(args.get_list::<usize>(&KERNELS).unwrap(), vec![2, 3]);
    }

    #[test]
    fn parses_command_line_overrides() {
        let mut group = ArgumentGroup::new("Test");
        group.add(HEADS);

        let mut pargs = pico_args::Arguments::from_vec(
            ["--in-feat", "20", "--heads", "16", "--dropout", "0.3"]
                .iter()
                .map(|s| std::ffi::OsString::from(*s))
                .collect(),
        );

        let mut args = ModelArgs::default();
        args.parse(&mut pargs, &group).unwrap();

        assert_eq!(args.in_feat, 20);
        assert_eq!(args.dropout, 0.3);
        assert_eq!(args.get::<usize>(&HEADS).unwrap(), 16);
        assert!(pargs.finish().is_empty());
    }

    #[test]
    fn renders_help_for_a_group() {
        let mut group = ArgumentGroup::new("Test");
        group.add(HEADS);

        let help = group.to_string();

        assert!(help.starts_with("Test:\n"));
        assert!(help.contains("--heads"));
        assert!(help.contains("(default: 8)"));
    }
}
