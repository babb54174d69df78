use crate::geocode::stations::Coordinates;
use crate::geocode::*;

use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = concat!("station-geocoder/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHECKPOINT_EVERY: usize = 100;
// Seoul city hall
pub const DEFAULT_FALLBACK: Coordinates = Coordinates {
    lat: 37.5665,
    lng: 126.9780,
};

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocoderSettings {
    pub endpoint: Option<String>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
    #[serde(rename = "countryCodes")]
    pub country_codes: Option<Vec<String>>,
    #[serde(rename = "resultLimit")]
    pub result_limit: Option<u32>,
    #[serde(rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
    #[serde(rename = "requestsPerSecond")]
    pub requests_per_second: Option<f64>,
    #[serde(rename = "jitterMs")]
    pub jitter_ms: Option<u64>,
}

impl GeocoderSettings {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn rules(&self) -> GeoResult<ResolverRules> {
        let defaults = ResolverRules::default();
        let result_limit = match self.result_limit {
            Some(0) => {
                return InvalidConfigSnafu {
                    message: "resultLimit must be at least 1",
                }
                .fail();
            }
            Some(x) => x,
            None => defaults.result_limit,
        };
        Ok(ResolverRules {
            result_limit,
            address_details: defaults.address_details,
            country_codes: self
                .country_codes
                .clone()
                .unwrap_or(defaults.country_codes),
        })
    }

    pub fn rate_limit(&self) -> RateLimitPolicy {
        let default = RateLimitPolicy::DEFAULT_POLICY;
        RateLimitPolicy {
            requests_per_second: self
                .requests_per_second
                .unwrap_or(default.requests_per_second),
            jitter: self
                .jitter_ms
                .map(Duration::from_millis)
                .unwrap_or(default.jitter),
        }
    }
}

/// The supported spreadsheet formats.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputProvider {
    Xlsx,
    Csv,
}

/// Header names of the columns to read.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    /// Tried in order, the first non-empty cell is the station name.
    pub name: Vec<String>,
    pub province: String,
    pub district: String,
    pub neighborhood: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSettings {
    pub provider: Option<String>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    #[serde(rename = "nameColumns")]
    pub name_columns: Option<Vec<String>>,
    #[serde(rename = "provinceColumn")]
    pub province_column: Option<String>,
    #[serde(rename = "districtColumn")]
    pub district_column: Option<String>,
    #[serde(rename = "neighborhoodColumn")]
    pub neighborhood_column: Option<String>,
}

impl InputSettings {
    /// The configured provider, or the one matching the file extension.
    pub fn provider_for(&self, path: &Path) -> GeoResult<InputProvider> {
        let name = match &self.provider {
            Some(p) => p.to_lowercase(),
            None => path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default(),
        };
        match name.as_str() {
            "xlsx" | "xlsm" | "excel" => Ok(InputProvider::Xlsx),
            "csv" => Ok(InputProvider::Csv),
            _ => UnknownProviderSnafu {
                provider: name,
                path: path.display().to_string(),
            }
            .fail(),
        }
    }

    pub fn columns(&self) -> ColumnNames {
        ColumnNames {
            name: self
                .name_columns
                .clone()
                .unwrap_or_else(|| vec!["사전투표소명".to_string(), "투표소명".to_string()]),
            province: self
                .province_column
                .clone()
                .unwrap_or_else(|| "시도".to_string()),
            district: self
                .district_column
                .clone()
                .unwrap_or_else(|| "구시군명".to_string()),
            neighborhood: self
                .neighborhood_column
                .clone()
                .unwrap_or_else(|| "읍면동명".to_string()),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "checkpointEvery")]
    pub checkpoint_every: Option<usize>,
    #[serde(rename = "fallbackCoordinates")]
    pub fallback_coordinates: Option<Coordinates>,
}

impl OutputSettings {
    pub fn checkpoint_every(&self) -> GeoResult<usize> {
        match self.checkpoint_every {
            Some(0) => InvalidConfigSnafu {
                message: "checkpointEvery must be at least 1",
            }
            .fail(),
            Some(x) => Ok(x),
            None => Ok(DEFAULT_CHECKPOINT_EVERY),
        }
    }

    pub fn fallback_coordinates(&self) -> Coordinates {
        self.fallback_coordinates.unwrap_or(DEFAULT_FALLBACK)
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeConfig {
    #[serde(default)]
    pub geocoder: GeocoderSettings,
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl GeocodeConfig {
    /// Checks the settings that would only fail in the middle of a run.
    pub fn validate(&self) -> GeoResult<()> {
        if self.geocoder.user_agent().trim().is_empty() {
            return InvalidConfigSnafu {
                message: "userAgent must identify the application",
            }
            .fail();
        }
        if self.geocoder.endpoint().trim().is_empty() {
            return InvalidConfigSnafu {
                message: "endpoint must not be empty",
            }
            .fail();
        }
        self.geocoder.rules()?;
        self.output.checkpoint_every()?;
        let rate_limit = self.geocoder.rate_limit();
        if rate_limit.checked_interval().is_none() {
            return InvalidConfigSnafu {
                message: format!(
                    "requestsPerSecond {} is too low",
                    rate_limit.requests_per_second
                ),
            }
            .fail();
        }
        if rate_limit.is_unlimited() {
            warn!("Rate limiting is disabled: only do this against your own geocoding instance");
        }
        Ok(())
    }
}

pub fn read_config(path: &Path) -> GeoResult<GeocodeConfig> {
    let config: GeocodeConfig = super::io_common::read_json(path)?;
    config.validate()?;
    Ok(config)
}
