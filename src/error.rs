use thiserror::Error;

use crate::domain::remote::remote_error::RemoteError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON document: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to read or write tabular data: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Remote store operation failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("FID field '{0}' does not exist in the local source.")]
    MissingFidField(String),

    #[error("FID field '{field}' should be an integer, found {value} on feature {index}.")]
    NonIntegerFid { field: String, index: usize, value: String },

    #[error("FID field '{field}' should be unique, value {value} appears more than once.")]
    DuplicateFid { field: String, value: i64 },

    #[error("Local source {0} contains no zone.")]
    EmptySource(String),

    #[error("Simplify tolerance should be >= 1, got {0}.")]
    InvalidSimplifyTolerance(f64),

    #[error("Configuration of dataset {0} already exists. Use UploadMode::Overwrite to replace the zones and every computation run associated.")]
    ConfigurationExists(String),

    #[error("ZoneSet {uuid} is not complete (state: {state}). Upload all zones before computing over them.")]
    IncompleteZoneSet { uuid: String, state: String },

    #[error("No local source available for dataset {0}. A source file is required to upload zones.")]
    MissingSource(String),

    #[error("No shards to download for dataset {0}.")]
    NoShardsToDownload(String),

    #[error("Output file should be a .csv file, got '{0}'.")]
    UnsupportedOutputFormat(String),

    #[error("Unsupported coordinate reference system '{0}'. Only EPSG:4326 and EPSG:3857 sources are supported.")]
    UnsupportedCrs(String),

    #[error("Satellite dataset not correctly defined: '{0}'. Use either \"Landsat\" or \"Sentinel-2\".")]
    UnknownSatelliteType(String),

    #[error("Invalid computation parameters: {0}")]
    InvalidParameters(String),
}

impl Error {
    /// Caller misuse: raised immediately and never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::MissingFidField(_)
                | Error::NonIntegerFid { .. }
                | Error::DuplicateFid { .. }
                | Error::EmptySource(_)
                | Error::InvalidSimplifyTolerance(_)
                | Error::ConfigurationExists(_)
                | Error::IncompleteZoneSet { .. }
                | Error::MissingSource(_)
                | Error::NoShardsToDownload(_)
                | Error::UnsupportedOutputFormat(_)
                | Error::UnsupportedCrs(_)
                | Error::UnknownSatelliteType(_)
                | Error::InvalidParameters(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
