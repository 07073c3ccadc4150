//! WolfSync Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for WolfSync operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfSync error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid tenant path pattern: {0}")]
    Pattern(#[from] regex::Error),

    // Precondition errors
    #[error("This node is not the HA master")]
    NotMaster,

    #[error("Trust credential already exists at {}", .0.display())]
    CredentialExists(PathBuf),

    // External tool errors
    #[error("Failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer failed with exit code {}: {output}", display_code(.code))]
    TransferFailed { code: Option<i32>, output: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Check if this error is an operator-facing precondition failure
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::NotMaster | Error::CredentialExists(_))
    }
}
