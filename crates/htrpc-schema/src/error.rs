/// Errors produced while building, parsing with, or documenting validators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The value does not satisfy the validator. The message carries the
    /// dotted/bracketed path of the offending value.
    #[error("{0}")]
    Invalid(String),

    /// The validator has no documentation routine.
    #[error("validator '{0}' cannot be documented")]
    NotDocumentable(String),

    /// No built-in or registered validator with this name.
    #[error("unknown validator '{0}'")]
    UnknownValidator(String),

    /// A custom validator name collides with a built-in or an earlier registration.
    #[error("validator '{0}' is already registered")]
    DuplicateValidator(String),

    /// The process-wide registry was installed more than once.
    #[error("validator registry already installed")]
    RegistryInstalled,

    /// The schema itself is malformed (bad rename declaration, bad bound).
    #[error("malformed schema: {0}")]
    Malformed(String),
}

impl SchemaError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// The human-readable failure message, without any prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Invalid(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
