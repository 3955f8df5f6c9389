use std::{collections::BTreeMap, fmt::Display};

use burn::tensor::backend::Backend;
use lazy_static::lazy_static;

use crate::{
    cli::{ArgumentGroup, ModelArgs},
    data::Requirement,
};

use super::{
    bert, bilstm, cnn, gru, net_lstm, rnn, softmax_regression, transformer, Model, ModelConfig,
    ModelError,
};

/// Declare every registered architecture, generating the `Architecture` index and its dispatch
macro_rules! register_models {
    ($($variant:ident => $config:ty),+ $(,)?) => {
        /// Every registered model architecture
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub enum Architecture {
            $(
                #[doc = concat!("The ", stringify!($variant), " architecture")]
                $variant,
            )+
        }

        impl Architecture {
            /// All architectures, in declaration order
            pub const ALL: &'static [Architecture] = &[$(Architecture::$variant),+];

            /// The name the architecture is registered under
            pub fn name(&self) -> &'static str {
                match self {
                    $(Architecture::$variant => <$config as ModelConfig>::NAME,)+
                }
            }

            /// The inputs the architecture reads from a batch
            pub fn data_requirements(&self) -> &'static [Requirement] {
                match self {
                    $(Architecture::$variant => <$config as ModelConfig>::REQUIREMENTS,)+
                }
            }

            /// Declare the architecture's own command line options
            pub fn add_required_arguments(&self, group: &mut ArgumentGroup) {
                match self {
                    $(Architecture::$variant => {
                        <$config as ModelConfig>::add_required_arguments(group)
                    })+
                }
            }

            /// Build a model from parsed arguments
            pub fn make_model<B: Backend>(
                &self,
                args: &ModelArgs,
                device: &B::Device,
            ) -> Result<Box<dyn Model<B>>, ModelError> {
                log::info!("Building {} model", self.name());

                match self {
                    $(Architecture::$variant => <$config as ModelConfig>::make_model::<B>(args, device),)+
                }
            }
        }
    };
}

register_models! {
    SoftmaxRegression => softmax_regression::Config,
    Transformer => transformer::Config,
    BiLstm => bilstm::Config,
    Cnn => cnn::Config,
    Gru => gru::Config,
    Rnn => rnn::Config,
    Bert => bert::Config,
    NetLstm => net_lstm::Config,
}

impl Architecture {
    /// The architecture's options, as a titled group
    pub fn arguments(&self) -> ArgumentGroup {
        let mut group = ArgumentGroup::new(format!("{} options", self.name()));
        self.add_required_arguments(&mut group);

        group
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<&str> for Architecture {
    type Error = RegistryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        lookup(value)
    }
}

/// A string-keyed table of architectures
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: BTreeMap<&'static str, Architecture>,
}

impl Registry {
    /// A registry holding every declared architecture
    pub fn with_all() -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for architecture in Architecture::ALL {
            registry.register(*architecture)?;
        }

        Ok(registry)
    }

    /// Add an architecture under its name
    pub fn register(&mut self, architecture: Architecture) -> Result<(), RegistryError> {
        let name = architecture.name();

        if self.models.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        log::debug!("Registered model {}", name);
        self.models.insert(name, architecture);

        Ok(())
    }

    /// Find an architecture by its exact name
    pub fn get(&self, name: &str) -> Result<Architecture, RegistryError> {
        self.models
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Registered names, in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        self.models.keys().copied().collect()
    }

    /// Number of registered architectures
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

lazy_static! {
    /// The process-wide registry, built on first use
    pub static ref MODELS: Registry = Registry::with_all().unwrap_or_else(|e| {
        panic!("Model registry declares an architecture twice: {}", e)
    });
}

/// Find a registered architecture by its exact name
pub fn lookup(name: &str) -> Result<Architecture, RegistryError> {
    MODELS.get(name)
}

/// Registry Error
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistryError {
    /// No model found for the given string
    #[error("no model found for {0}")]
    Unknown(String),

    /// Two architectures share a name
    #[error("a model named {0} is already registered")]
    Duplicate(String),
}
