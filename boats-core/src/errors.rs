use thiserror::Error;

/// Error type for invalid model setup.
///
/// Numerical degeneracies inside the time loop are never reported through this type:
/// they are absorbed by the `eps` guards and clamping of the engines.
#[derive(Error, Debug)]
pub enum BoatsError {
    #[error("{0}")]
    Error(String),
    #[error("Shape mismatch for {name}. Expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Forcing {name} covers {available} timesteps but the run needs {required}")]
    ForcingTooShort {
        name: String,
        available: usize,
        required: usize,
    },
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Unknown processing type '{0}'")]
    UnknownProcessing(String),
    #[error("Unknown variable kind '{0}'")]
    UnknownVariableKind(String),
    #[error("Unknown state variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown regulation strategy '{0}'")]
    UnknownStrategy(String),
    #[error("Unknown run mode '{0}'")]
    UnknownRunMode(String),
    #[error("Variable {variable} is {actual} but was declared as {declared}")]
    KindMismatch {
        variable: String,
        declared: String,
        actual: String,
    },
    #[error("Output mode {mode}: {reason}")]
    InvalidOutputMode { mode: String, reason: String },
    #[error("Processing '{0}' needs a region")]
    MissingRegion(String),
    #[error("Region '{0}' is not defined on the grid")]
    UnknownRegion(String),
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, BoatsError>`.
pub type BoatsResult<T> = Result<T, BoatsError>;

/// Fail with [`BoatsError::ShapeMismatch`] unless `found` equals `expected`.
pub(crate) fn check_shape(name: &str, expected: &[usize], found: &[usize]) -> BoatsResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(BoatsError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        })
    }
}
