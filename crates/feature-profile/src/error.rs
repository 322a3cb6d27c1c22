//! Error types for feature profiles.

use std::path::PathBuf;
use thiserror::Error;

use crate::profile::FeatureId;

/// Errors raised while loading or checking feature profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Unknown field {field} in {context}")]
    UnknownField { field: String, context: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate profile {0}")]
    Duplicate(FeatureId),

    #[error("Profile {0} not found")]
    NotFound(FeatureId),

    #[error("Profile {profile} depends on {missing} which is not loaded")]
    MissingDependency { profile: FeatureId, missing: FeatureId },

    #[error("Dependency cycle: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    DependencyCycle(Vec<FeatureId>),
}

/// Result type for feature profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
