use thiserror::Error;

/// Infrastructure and caller errors.
///
/// Expected business outcomes (a resource already leased, not enough bonus
/// credit, releasing a lease twice) are ordinary return values and never
/// show up here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaseError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LeaseError {
    pub fn resource_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "resource",
            id,
        }
    }

    pub fn lease_not_found(id: i64) -> Self {
        Self::NotFound { entity: "lease", id }
    }

    pub fn notification_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "notification",
            id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The request was refused as made. Retrying it unchanged will not help.
    pub fn is_rejection(&self) -> bool {
        self.is_not_found() || matches!(self, Self::InvalidArgument(_))
    }
}

impl From<rusqlite::Error> for LeaseError {
    fn from(e: rusqlite::Error) -> Self {
        LeaseError::Storage(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid config: {0}")]
    Invalid(String),
}
