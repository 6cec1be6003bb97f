use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    NoOptions,
    MissingOption(&'static str),
    InvalidOption { name: &'static str, message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NoOptions => write!(
                f,
                "Need to provide options or set NEXUS_CONFIG before initializing the app."
            ),
            AppError::MissingOption(name) => write!(f, "Missing required option '{name}'"),
            AppError::InvalidOption { name, message } => {
                write!(f, "Invalid option '{name}': {message}")
            }
        }
    }
}

impl std::error::Error for AppError {}
