use thiserror::Error;

/// Every failure the engine can surface during a synthesis pass.
///
/// The type is `Clone` because a single failure is observed by every
/// [`Deferred`](crate::deferred::Deferred) derived from the failed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    #[error("In \"{component}\" component, the logical name of \"{name}\" ({resource_type}) is not prefixed with parent's name \"{parent}\"")]
    UnprefixedLogicalName {
        component: String,
        name: String,
        resource_type: String,
        parent: String,
    },

    #[error("In \"{component}\" component, the physical name of \"{name}\" ({resource_type}) is not prefixed")]
    UnprefixedPhysicalName {
        component: String,
        name: String,
        resource_type: String,
    },

    #[error("Component \"{name}\" ({kind}) is declared more than once under \"{parent}\"")]
    DuplicateComponentName {
        parent: String,
        name: String,
        kind: String,
    },

    #[error("Multiple linkable resources are named \"{0}\". Linkable names must be unique across the app")]
    DuplicateLinkName(String),

    #[error("Resource \"{0}\" is registered more than once")]
    DuplicateResource(String),

    #[error("\"{0}\" is not a linkable component")]
    NotLinkable(String),

    #[error("Cannot transform \"{0}\" resources after one has already been created")]
    LateTransform(String),

    #[error("Component \"{name}\": {message}")]
    VersionMismatch { name: String, message: String },

    #[error("Invalid {field} \"{value}\": {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{code}: {message}")]
    Backend {
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("Could not find {kind} for \"{name}\"")]
    NotFound { kind: String, name: String },

    #[error("Value of \"{0}\" was never resolved")]
    Unresolved(String),

    #[error("Circular dependency detected: {0}")]
    Cycle(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl SynthError {
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SynthError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// A non-retryable backend failure carrying the backend's error code.
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        SynthError::Backend {
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// A transient backend failure (throttling, connectivity).
    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        SynthError::Backend {
            code: code.into(),
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        SynthError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn backend_code(&self) -> Option<&str> {
        match self {
            SynthError::Backend { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SynthError {
    fn from(err: serde_json::Error) -> Self {
        SynthError::Serialization(err.to_string())
    }
}

pub type Result<T, E = SynthError> = std::result::Result<T, E>;
