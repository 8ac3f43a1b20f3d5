use thiserror::Error;

/// Errors raised by the language layer itself.
///
/// Rendering never fails; these cover invalid construction of traversal
/// helpers and constructs a translator cannot express in its target.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LanguageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{translator} translator does not support {construct}")]
    Unsupported {
        translator: &'static str,
        construct: String,
    },
}

impl LanguageError {
    pub fn unsupported(translator: &'static str, construct: impl Into<String>) -> Self {
        LanguageError::Unsupported {
            translator,
            construct: construct.into(),
        }
    }
}

pub type Result<T, E = LanguageError> = std::result::Result<T, E>;
