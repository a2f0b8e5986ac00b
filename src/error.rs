//! Unified error handling for the scene pipeline.
//!
//! Degenerate clustering outcomes (no photos, no usable radius) are not
//! errors; they are reported through [`crate::Degeneracy`] on the clustering
//! outcome. Everything here aborts the current park only.

use thiserror::Error;

/// Errors raised while processing a park.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A photo record or park input is missing a required field or carries
    /// an unusable value.
    #[error("invalid input for park {park_unit}: {reason}")]
    InputData { park_unit: String, reason: String },

    /// A tag scored for term frequency has no inverse document frequency,
    /// meaning the two tables were built from different corpora.
    #[error(
        "tag '{tag}' in cluster {cluster_label} of park {park_unit} is missing from the idf table"
    )]
    Consistency {
        park_unit: String,
        cluster_label: i32,
        tag: String,
    },

    /// Generic storage adapter failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[cfg(feature = "persistence")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SceneError {
    /// Shorthand for [`SceneError::InputData`].
    pub fn input(park_unit: &str, reason: impl Into<String>) -> Self {
        SceneError::InputData {
            park_unit: park_unit.to_string(),
            reason: reason.into(),
        }
    }

    /// Park unit the error relates to, if any.
    pub fn park_unit(&self) -> Option<&str> {
        match self {
            SceneError::InputData { park_unit, .. } | SceneError::Consistency { park_unit, .. } => {
                Some(park_unit)
            }
            _ => None,
        }
    }
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Conversions from `Option` into pipeline errors.
pub trait OptionExt<T> {
    /// Turn `None` into [`SceneError::InputData`].
    fn ok_or_input(self, park_unit: &str, reason: &str) -> Result<T>;

    /// Turn `None` into [`SceneError::Consistency`].
    fn ok_or_inconsistent(self, park_unit: &str, cluster_label: i32, tag: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_input(self, park_unit: &str, reason: &str) -> Result<T> {
        self.ok_or_else(|| SceneError::input(park_unit, reason))
    }

    fn ok_or_inconsistent(self, park_unit: &str, cluster_label: i32, tag: &str) -> Result<T> {
        self.ok_or_else(|| SceneError::Consistency {
            park_unit: park_unit.to_string(),
            cluster_label,
            tag: tag.to_string(),
        })
    }
}
