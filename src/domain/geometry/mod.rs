//! Minimal GeoJSON model and the local normalisation applied to zones before upload.

pub mod feature;
pub mod ops;
