use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Reads a JSON document from disk: session configurations, computation
/// parameters and GeoJSON zone sources all go through here.
///
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the document does not match `T`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let file_path = file_path.as_ref();
    let data = fs::read_to_string(file_path).map_err(Error::IoError)?;

    let parsed: T = serde_json::from_str(&data).map_err(Error::DeserializationError)?;
    log::debug!("Parsed {} ({} bytes).", file_path.display(), data.len());

    Ok(parsed)
}
