use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::parameters_dto::ComputationParametersDto;
use crate::error::{Error, Result};

/// Imagery source of a computation. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SatelliteType {
    #[serde(rename = "Landsat")]
    Landsat,
    #[serde(rename = "Sentinel-2")]
    Sentinel2,
}

impl FromStr for SatelliteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Landsat" => Ok(SatelliteType::Landsat),
            "Sentinel-2" => Ok(SatelliteType::Sentinel2),
            _ => Err(Error::UnknownSatelliteType(s.to_string())),
        }
    }
}

impl fmt::Display for SatelliteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatelliteType::Landsat => write!(f, "Landsat"),
            SatelliteType::Sentinel2 => write!(f, "Sentinel-2"),
        }
    }
}

impl SatelliteType {
    /// Pixel size in metres used for the region reductions.
    pub fn scale(&self) -> u32 {
        match self {
            SatelliteType::Landsat => 30,
            SatelliteType::Sentinel2 => 10,
        }
    }

    /// First acquisition date of the archive, the default start of a time window.
    pub fn archive_start(&self) -> NaiveDate {
        match self {
            SatelliteType::Landsat => NaiveDate::from_ymd_opt(1980, 1, 1),
            SatelliteType::Sentinel2 => NaiveDate::from_ymd_opt(2017, 3, 28),
        }
        .unwrap_or_default()
    }

    /// Remote image collections merged for this source.
    pub fn collections(&self) -> &'static [&'static str] {
        match self {
            SatelliteType::Landsat => &["LANDSAT/LC08/C02/T1_L2", "LANDSAT/LE07/C02/T1_L2", "LANDSAT/LT05/C02/T1_L2", "LANDSAT/LT04/C02/T1_L2"],
            SatelliteType::Sentinel2 => &["COPERNICUS/S2_SR_HARMONIZED"],
        }
    }

    /// Image property holding the cloud cover percentage.
    pub fn cloud_property(&self) -> &'static str {
        match self {
            SatelliteType::Landsat => "CLOUD_COVER",
            SatelliteType::Sentinel2 => "CLOUDY_PIXEL_PERCENTAGE",
        }
    }
}

/// Everything that determines the result of a computation run.
///
/// Persisted in the run's configuration object for provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationParameters {
    pub satellite_type: SatelliteType,
    pub start: NaiveDate,
    pub end: NaiveDate,

    /// Maximum cloud cover accepted for an image, in percent.
    pub cloud_filter: f64,
    pub cloud_masking: bool,
    pub mosaic_same_day: bool,
    pub watermask_expression: String,
    pub activechannel_expression: String,
    pub vegetation_expression: String,
}

impl ComputationParameters {
    pub fn new(satellite_type: SatelliteType) -> Self {
        ComputationParameters {
            satellite_type,
            start: satellite_type.archive_start(),
            end: NaiveDate::from_ymd_opt(2030, 12, 31).unwrap_or_default(),
            cloud_filter: 80.0,
            cloud_masking: true,
            mosaic_same_day: true,
            watermask_expression: "MNDWI >  0.0".to_string(),
            activechannel_expression: "MNDWI > -0.4 && NDVI < 0.2".to_string(),
            vegetation_expression: "NDVI > 0.15".to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::InvalidParameters(format!("start {} should be before end {}", self.start, self.end)));
        }

        if !(0.0..=100.0).contains(&self.cloud_filter) {
            return Err(Error::InvalidParameters(format!("cloud filter {} should be a percentage", self.cloud_filter)));
        }

        for (name, expression) in [
            ("watermask_expression", &self.watermask_expression),
            ("activechannel_expression", &self.activechannel_expression),
            ("vegetation_expression", &self.vegetation_expression),
        ] {
            if expression.trim().is_empty() {
                return Err(Error::InvalidParameters(format!("{} is empty", name)));
            }
        }

        Ok(())
    }
}

impl TryFrom<ComputationParametersDto> for ComputationParameters {
    type Error = Error;

    fn try_from(dto: ComputationParametersDto) -> Result<Self> {
        let satellite_type = SatelliteType::from_str(&dto.satellite_type)?;
        let defaults = ComputationParameters::new(satellite_type);

        let parse_date = |value: Option<String>, default: NaiveDate| -> Result<NaiveDate> {
            match value {
                None => Ok(default),
                Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|e| Error::InvalidParameters(format!("invalid date '{}': {}", value, e))),
            }
        };

        let parameters = ComputationParameters {
            satellite_type,
            start: parse_date(dto.start, defaults.start)?,
            end: parse_date(dto.end, defaults.end)?,
            cloud_filter: dto.cloud_filter.unwrap_or(defaults.cloud_filter),
            cloud_masking: dto.cloud_masking.unwrap_or(defaults.cloud_masking),
            mosaic_same_day: dto.mosaic_same_day.unwrap_or(defaults.mosaic_same_day),
            watermask_expression: dto.watermask_expression.unwrap_or(defaults.watermask_expression),
            activechannel_expression: dto.activechannel_expression.unwrap_or(defaults.activechannel_expression),
            vegetation_expression: dto.vegetation_expression.unwrap_or(defaults.vegetation_expression),
        };

        parameters.validate()?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(satellite_type: &str) -> ComputationParametersDto {
        ComputationParametersDto {
            satellite_type: satellite_type.to_string(),
            start: Some("1990-01-01".to_string()),
            end: Some("1990-01-31".to_string()),
            cloud_filter: None,
            cloud_masking: None,
            mosaic_same_day: Some(false),
            watermask_expression: None,
            activechannel_expression: None,
            vegetation_expression: None,
        }
    }

    #[test]
    fn satellite_type_is_a_closed_set() {
        assert_eq!("Landsat".parse::<SatelliteType>().unwrap().scale(), 30);
        assert_eq!("Sentinel-2".parse::<SatelliteType>().unwrap().scale(), 10);

        let err = ComputationParameters::try_from(dto("MODIS")).unwrap_err();
        assert!(matches!(err, Error::UnknownSatelliteType(ref s) if s == "MODIS"));
        assert!(err.is_precondition());
    }

    #[test]
    fn dto_defaults_follow_the_satellite() {
        let mut sentinel = dto("Sentinel-2");
        sentinel.start = None;

        let parameters = ComputationParameters::try_from(sentinel).unwrap_err();
        // Sentinel-2 archive starts in 2017, after the requested end.
        assert!(matches!(parameters, Error::InvalidParameters(_)));

        let landsat = ComputationParameters::try_from(dto("Landsat")).unwrap();
        assert_eq!(landsat.cloud_filter, 80.0);
        assert!(!landsat.mosaic_same_day);
        assert_eq!(landsat.vegetation_expression, "NDVI > 0.15");
    }

    #[test]
    fn serializes_satellite_with_platform_names() {
        let value = serde_json::to_value(ComputationParameters::new(SatelliteType::Sentinel2)).unwrap();

        assert_eq!(value["satellite_type"], "Sentinel-2");
        assert_eq!(value["start"], "2017-03-28");
    }
}
