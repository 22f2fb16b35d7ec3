//! Runtime configuration.
//!
//! Reads from environment variables (a `.env` file is loaded by the binary):
//!   PIMS_DATABASE_URL          - Postgres connection string (falls back to DATABASE_URL)
//!   PIMS_DATABASE_POOL_SIZE    - pool size (default 10)
//!   PIMS_STORAGE_SRID          - projection properties are stored in (default 3005)
//!   PIMS_GEOGRAPHIC_SRID       - projection returned for display (default 4326)
//!   PIMS_DEFAULT_PROVINCE_CODE - province stamped on new addresses (default BC)
//!   PIMS_DEFAULT_COUNTRY_CODE  - country stamped on new addresses (default CA)
//!   PIMS_DATA_SOURCE_CODE      - data source of new properties (default PMBC)

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use pims_spatial::{CoordinateTransform, Srid};

use crate::error::PimsError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PimsConfig {
    pub database: DatabaseConfig,
    pub spatial: SpatialConfig,
    pub defaults: InventoryDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/pims".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpatialConfig {
    pub storage_srid: Srid,
    pub geographic_srid: Srid,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            storage_srid: Srid::BC_ALBERS,
            geographic_srid: Srid::WGS84,
        }
    }
}

/// Codes stamped onto a property the first time it enters inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryDefaults {
    pub unknown_code: String,
    pub data_source_code: String,
    pub province_code: String,
    pub country_code: String,
}

impl Default for InventoryDefaults {
    fn default() -> Self {
        Self {
            unknown_code: "UNKNOWN".to_string(),
            data_source_code: "PMBC".to_string(),
            province_code: "BC".to_string(),
            country_code: "CA".to_string(),
        }
    }
}

impl PimsConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) =
            std::env::var("PIMS_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))
        {
            config.database.url = url;
        }
        if let Some(size) = env_parse::<u32>("PIMS_DATABASE_POOL_SIZE")? {
            config.database.max_connections = size;
        }
        if let Some(srid) = env_parse::<i32>("PIMS_STORAGE_SRID")? {
            config.spatial.storage_srid = Srid(srid);
        }
        if let Some(srid) = env_parse::<i32>("PIMS_GEOGRAPHIC_SRID")? {
            config.spatial.geographic_srid = Srid(srid);
        }
        if let Ok(code) = std::env::var("PIMS_DEFAULT_PROVINCE_CODE") {
            config.defaults.province_code = code;
        }
        if let Ok(code) = std::env::var("PIMS_DEFAULT_COUNTRY_CODE") {
            config.defaults.country_code = code;
        }
        if let Ok(code) = std::env::var("PIMS_DATA_SOURCE_CODE") {
            config.defaults.data_source_code = code;
        }

        Ok(config)
    }

    /// Reject SRID settings the transformer cannot serve.
    pub fn validate(&self, transform: &dyn CoordinateTransform) -> Result<(), PimsError> {
        let SpatialConfig {
            storage_srid,
            geographic_srid,
        } = self.spatial;
        if !transform.supports(geographic_srid, storage_srid) {
            return Err(PimsError::Configuration(format!(
                "no transform between {geographic_srid} and {storage_srid}"
            )));
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(None),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pims_spatial::ProjectionTransformer;

    #[test]
    fn defaults_match_bc_inventory() {
        let config = PimsConfig::default();
        assert_eq!(config.spatial.storage_srid, Srid::BC_ALBERS);
        assert_eq!(config.spatial.geographic_srid, Srid::WGS84);
        assert_eq!(config.defaults.unknown_code, "UNKNOWN");
        assert_eq!(config.defaults.data_source_code, "PMBC");
        assert_eq!(config.defaults.province_code, "BC");
        assert_eq!(config.defaults.country_code, "CA");
    }

    #[test]
    fn default_srids_validate() {
        let config = PimsConfig::default();
        assert!(config.validate(&ProjectionTransformer::new()).is_ok());
    }

    #[test]
    fn unsupported_storage_srid_is_configuration_error() {
        let mut config = PimsConfig::default();
        config.spatial.storage_srid = Srid(3857);
        let err = config.validate(&ProjectionTransformer::new()).unwrap_err();
        assert!(matches!(err, PimsError::Configuration(_)));
    }

    #[test]
    fn database_url_falls_back_to_unprefixed_variable() {
        std::env::remove_var("PIMS_DATABASE_URL");
        std::env::set_var("DATABASE_URL", "postgresql://db.internal:5432/pims");
        let config = PimsConfig::from_env().unwrap();
        std::env::remove_var("DATABASE_URL");
        assert_eq!(config.database.url, "postgresql://db.internal:5432/pims");
    }

    #[test]
    fn round_trips_through_json() {
        let config = PimsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PimsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.database.connect_timeout, Duration::from_secs(30));
        assert_eq!(back.spatial.storage_srid, Srid::BC_ALBERS);
    }
}
