//! Error types for antizapret-rules.

use thiserror::Error;

/// Error type for antizapret-rules operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure while fetching a resource
    #[error("cannot fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transport-level failure while publishing to a remote service
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote server answered with a non-success status
    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Read failure in the middle of a fetched resource
    #[error("cannot read {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV structural error in the dump
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Dump record with too few fields after the header row
    #[error("malformed dump record at line {line}: expected at least 2 fields, got {fields}")]
    MalformedRecord { line: u64, fields: usize },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid magic bytes in a binary artifact
    #[error("invalid magic bytes")]
    InvalidMagic,

    /// Unsupported binary format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Truncated or inconsistent compiled rule-set
    #[error("invalid rule-set: {0}")]
    InvalidRuleSet(String),

    /// Truncated or inconsistent geosite file
    #[error("invalid geosite data: {0}")]
    InvalidGeosite(String),

    /// MaxMind DB build or lookup failure
    #[error("IP database error: {0}")]
    Mmdb(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure wrapped with the pipeline stage it happened in
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias for antizapret-rules operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attaches the failing pipeline stage to an error.
pub trait Context<T> {
    fn stage(self, stage: &'static str) -> Result<T>;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn stage(self, stage: &'static str) -> Result<T> {
        self.map_err(|e| Error::Stage {
            stage,
            source: Box::new(e.into()),
        })
    }
}

impl From<maxminddb::MaxMindDBError> for Error {
    fn from(e: maxminddb::MaxMindDBError) -> Self {
        Error::Mmdb(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wraps_message() {
        let result: std::result::Result<(), Error> = Err(Error::Config("missing token".into()));
        let err = result.stage("cannot publish artifacts").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot publish artifacts: configuration error: missing token"
        );
    }

    #[test]
    fn test_stage_from_io() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.stage("cannot create file").unwrap_err();
        assert!(matches!(err, Error::Stage { stage: "cannot create file", .. }));
    }
}
