use thiserror::Error;

/// Errors raised by the service registry and the lifetime manager.
///
/// Every variant is returned at the point of violation; nothing in the
/// container retries or rolls back.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Service '{type_name}' is already registered")]
    DuplicateRegistration { type_name: &'static str },

    #[error("Service '{type_name}' is not registered")]
    NotRegistered { type_name: &'static str },

    #[error("Type '{type_name}' declares no constructor")]
    NoConstructor { type_name: &'static str },

    #[error("Type '{type_name}' declares {count} constructors, expected exactly one")]
    AmbiguousConstructor { type_name: &'static str, count: usize },

    #[error("Factory for '{type_name}' produced no object")]
    NullProduct { type_name: &'static str },

    #[error("Lifetime participant '{type_name}' does not implement {capability}")]
    InvalidParticipant {
        type_name: &'static str,
        capability: &'static str,
    },

    /// A constructor read an argument that is missing or of another type than
    /// the parameter it declared at that position.
    #[error("Argument {position} of '{type_name}' is not a '{expected}'")]
    ArgumentMismatch {
        type_name: &'static str,
        position: usize,
        expected: &'static str,
    },

    /// Failure returned by a lifetime participant's callback, passed through untouched.
    #[error(transparent)]
    Participant(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for configuration field '{field}'")]
    InvalidField { field: String, value: String },
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl ContainerError {
    /// Returns the participant failure when this error came from a lifetime callback.
    pub fn participant_error(&self) -> Option<&anyhow::Error> {
        match self {
            ContainerError::Participant(error) => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_type() {
        let err = ContainerError::AmbiguousConstructor {
            type_name: "app::Session",
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Type 'app::Session' declares 2 constructors, expected exactly one"
        );
    }

    #[test]
    fn test_participant_error_is_transparent() {
        let err = ContainerError::from(anyhow::anyhow!("disk unavailable"));
        assert_eq!(err.to_string(), "disk unavailable");
        assert!(err.participant_error().is_some());
        assert!(ContainerError::NotRegistered { type_name: "x" }
            .participant_error()
            .is_none());
    }
}
