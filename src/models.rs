//! Wire models exchanged with the AIS stream server.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AisViewerError;
use crate::viewport::BoundingBox;
use serde_helpers::*;

/// Maritime Mobile Service Identity (MMSI)
///
/// Kept exactly as the server sent it. Leading zeros are significant (coast
/// stations and group calls start with `0`), so the identity is never parsed
/// into a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mmsi(String);

impl TryFrom<&str> for Mmsi {
    type Error = AisViewerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl TryFrom<String> for Mmsi {
    type Error = AisViewerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(AisViewerError::InvalidMmsi(value));
        }
        Ok(Self(value))
    }
}

impl Mmsi {
    /// The identity as received
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position report streamed by the server, one JSON object per text frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VesselReport {
    #[serde(rename = "MMSI", deserialize_with = "deserialize_mmsi")]
    pub mmsi: Mmsi,
    /// Name of the vessel, None if empty or missing
    #[serde(default, deserialize_with = "deserialize_trimmed_string")]
    pub name: Option<String>,
    /// Longitude in WGS84 decimal degrees
    pub lon: f64,
    /// Latitude in WGS84 decimal degrees
    pub lat: f64,
    /// Course over ground in degrees
    pub cog: f64,
    /// Direction of the bow in degrees
    #[serde(rename = "trueHeading")]
    pub true_heading: f64,
    /// Speed over ground in knots
    pub sog: f64,
    /// Time the position was recorded at the source
    pub timestamp: DateTime<Utc>,
    /// Time the backend received the report, epoch milliseconds on the wire
    #[serde(
        rename = "timestampReceived",
        deserialize_with = "deserialize_epoch_millis"
    )]
    pub timestamp_received: DateTime<Utc>,
}

impl VesselReport {
    /// Parse a report from a text frame
    pub fn from_json(text: &str) -> Result<Self, AisViewerError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Display name, or a placeholder when the vessel has not announced one
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unknown")
    }
}

/// Maximum age of the streamed data in minutes, as selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DataAge(u8);

impl DataAge {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 60;

    pub fn minutes(&self) -> u8 {
        self.0
    }
}

impl Default for DataAge {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<u8> for DataAge {
    type Error = AisViewerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(AisViewerError::InvalidAge(value));
        }
        Ok(Self(value))
    }
}

/// Region subscription sent to the server.
///
/// Corner 1 is the north-east corner of the viewport, corner 2 the
/// south-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubscriptionRequest {
    pub lat1: f64,
    pub long1: f64,
    pub lat2: f64,
    pub long2: f64,
    pub age: DataAge,
}

impl SubscriptionRequest {
    pub fn new(bounds: &BoundingBox, age: DataAge) -> Self {
        Self {
            lat1: bounds.ne.lat,
            long1: bounds.ne.lon,
            lat2: bounds.sw.lat,
            long2: bounds.sw.lon,
            age,
        }
    }
}

/// Custom deserializers
mod serde_helpers {
    use super::Mmsi;
    use chrono::{DateTime, Utc};
    use serde::{self, de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawMmsi {
        Text(String),
        Number(u64),
    }

    pub fn deserialize_mmsi<'de, D>(deserializer: D) -> Result<Mmsi, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawMmsi::deserialize(deserializer)? {
            RawMmsi::Text(s) => Mmsi::try_from(s).map_err(de::Error::custom),
            RawMmsi::Number(n) => Mmsi::try_from(n.to_string()).map_err(de::Error::custom),
        }
    }

    pub fn deserialize_trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(s.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }))
    }

    /// Epoch milliseconds, fractional parts are truncated
    pub fn deserialize_epoch_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(de::Error::custom(format!("invalid timestamp: {}", value)));
        }
        DateTime::from_timestamp_millis(value.trunc() as i64)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", value)))
    }
}
