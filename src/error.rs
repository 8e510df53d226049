use std::path::PathBuf;

/// Failures that end a run or a notification attempt
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    #[error("could not open {url}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("no product listing found (tried {})", .tried.join(", "))]
    NoListingFound { tried: Vec<String> },
    #[error("no ranking snapshot found in {}", .dir.display())]
    NoArtifactFound { dir: PathBuf },
    #[error("snapshot storage failed")]
    Storage(#[source] anyhow::Error),
    #[error("delivery failed")]
    Delivery(#[source] anyhow::Error),
    #[error("{0}")]
    Configuration(String),
}

impl ScoutError {
    /// Pipeline stage the error belongs to, for the user-facing message
    pub fn stage(&self) -> &'static str {
        match self {
            ScoutError::Navigation { .. } => "navigation",
            ScoutError::NoListingFound { .. } => "listing resolution",
            ScoutError::NoArtifactFound { .. } => "artifact lookup",
            ScoutError::Storage(_) => "snapshot storage",
            ScoutError::Delivery(_) => "delivery",
            ScoutError::Configuration(_) => "configuration",
        }
    }

    /// Whether reloading the page and extracting again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScoutError::Navigation { .. } | ScoutError::NoListingFound { .. }
        )
    }
}
