//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run could not start (source identifier attribute unresolved)
    #[error("Setup failed for entity {entity}: {message}")]
    Setup { entity: String, message: String },

    /// Metadata service transport failure
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Record access failure (query, create, update, delete)
    #[error("Record access error: {0}")]
    RecordAccess(String),

    /// Record lookup by identifier found nothing
    #[error("Record {id} not found in {entity}")]
    NotFound { entity: String, id: String },

    /// A source record could not be shaped into a target payload
    #[error("Transform failed for field {field}: {message}")]
    Transform { field: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Setup error for an entity.
    pub fn setup(entity: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Setup {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        MigrateError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a Transform error
    pub fn transform(field: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transform {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True when the error only signals a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrateError::NotFound { .. })
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::Setup { .. } => 2,
            MigrateError::Metadata(_)
            | MigrateError::RecordAccess(_)
            | MigrateError::NotFound { .. }
            | MigrateError::Transform { .. } => 3,
            MigrateError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
