// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One row of the polling-station spreadsheet.
///
/// The three address fields follow the Korean administrative hierarchy:
/// province (시도), city or district (구시군) and neighborhood (읍면동).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RawAddressRecord {
    pub province: String,
    pub city_district: String,
    pub neighborhood: String,
    /// Only used for logging.
    pub station_name: String,
}

impl RawAddressRecord {
    pub fn new(province: &str, city_district: &str, neighborhood: &str, station_name: &str) -> Self {
        RawAddressRecord {
            province: province.trim().to_string(),
            city_district: city_district.trim().to_string(),
            neighborhood: neighborhood.trim().to_string(),
            station_name: station_name.trim().to_string(),
        }
    }
}

/// The granularity of one address variant.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VariantKind {
    /// Province, district and the neighborhood as written in the source.
    Original,
    /// Province, district and the neighborhood with numbered sub-districts collapsed.
    Normalized,
    /// Province and district.
    District,
    /// Province alone.
    Province,
}

impl VariantKind {
    pub const ALL: [VariantKind; 4] = [
        VariantKind::Original,
        VariantKind::Normalized,
        VariantKind::District,
        VariantKind::Province,
    ];
}

/// The candidate address strings for one record, most specific first.
///
/// There are always exactly four of them, see [`VariantKind`].
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct AddressVariants(pub(crate) [String; 4]);

impl AddressVariants {
    pub fn get(&self, kind: VariantKind) -> &str {
        let idx = match kind {
            VariantKind::Original => 0,
            VariantKind::Normalized => 1,
            VariantKind::District => 2,
            VariantKind::Province => 3,
        };
        self.0[idx].as_str()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VariantKind, &str)> {
        VariantKind::ALL
            .iter()
            .copied()
            .zip(self.0.iter().map(|s| s.as_str()))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A search hit as returned by a Nominatim-style endpoint.
///
/// The coordinates are kept as strings because this is how the provider
/// encodes them.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}

/// A free-text search request.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub limit: u32,
    pub address_details: bool,
    pub country_codes: Vec<String>,
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub matched_display_name: String,
    /// The exact address string that produced the match.
    pub matched_variant: String,
    /// 1-based position of that variant.
    pub attempt_index: u32,
}

/// Errors for a single lookup.
///
/// None of them are fatal for the resolver: it moves on to the next variant.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LookupError {
    /// The request could not be sent or the connection failed.
    Transport(String),
    /// The provider answered with a non-success status code.
    Status(u16),
    /// The body could not be decoded.
    Decode(String),
}

impl Error for LookupError {}

impl Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Transport(msg) => write!(f, "transport error: {}", msg),
            LookupError::Status(code) => write!(f, "HTTP error status: {}", code),
            LookupError::Decode(msg) => write!(f, "could not decode response: {}", msg),
        }
    }
}

// ********* Configuration **********

/// How the resolver queries the provider.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResolverRules {
    pub result_limit: u32,
    pub address_details: bool,
    pub country_codes: Vec<String>,
}

impl ResolverRules {
    pub const DEFAULT_RESULT_LIMIT: u32 = 3;
    pub const DEFAULT_COUNTRY_CODE: &'static str = "kr";

    pub fn query(&self, text: &str) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            limit: self.result_limit,
            address_details: self.address_details,
            country_codes: self.country_codes.clone(),
        }
    }
}

impl Default for ResolverRules {
    fn default() -> Self {
        ResolverRules {
            result_limit: Self::DEFAULT_RESULT_LIMIT,
            address_details: true,
            country_codes: vec![Self::DEFAULT_COUNTRY_CODE.to_string()],
        }
    }
}
