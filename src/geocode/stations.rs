//! The station records consumed by the web application.

use crate::geocode::io_common::{read_json, write_json, StationRow};
use crate::geocode::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use std::collections::BTreeMap;

pub const UNKNOWN_DISTRICT: &str = "알 수 없음";
const ID_PREFIX: &str = "station_";

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct YoutubeUrls {
    pub morning: String,
    pub afternoon: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PollingStation {
    pub id: String,
    pub name: String,
    /// The province, used to group stations in reports.
    pub district: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sigungu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dong: Option<String>,
    pub address: String,
    pub coordinates: Coordinates,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
    #[serde(rename = "entryCount", default)]
    pub entry_count: u64,
    #[serde(rename = "exitCount", default)]
    pub exit_count: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
    #[serde(default)]
    pub alerts: Vec<JSValue>,
    #[serde(rename = "youtubeUrls", default)]
    pub youtube_urls: YoutubeUrls,
    /// `None` marks a station that still needs geocoding.
    #[serde(default)]
    pub geocoded_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocode_attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reprocessed: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

pub fn station_id(number: usize) -> String {
    format!("{}{}", ID_PREFIX, number)
}

/// The timestamp format of `lastUpdated`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl PollingStation {
    /// A new, not yet geocoded station. `number` is the 1-based row number in the source list.
    pub fn from_row(
        number: usize,
        row: &StationRow,
        fallback: Coordinates,
        now: &str,
    ) -> PollingStation {
        let name = match &row.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => format!("투표소_{}", number),
        };
        let district = if row.province.is_empty() {
            UNKNOWN_DISTRICT.to_string()
        } else {
            row.province.clone()
        };
        let address = [
            row.province.as_str(),
            row.district.as_str(),
            row.neighborhood.as_str(),
        ]
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<&str>>()
        .join(" ");
        PollingStation {
            id: station_id(number),
            name,
            district,
            sido: Some(row.province.clone()),
            sigungu: Some(row.district.clone()),
            dong: Some(row.neighborhood.clone()),
            address,
            coordinates: fallback,
            is_active: false,
            entry_count: 0,
            exit_count: 0,
            last_updated: now.to_string(),
            alerts: Vec::new(),
            youtube_urls: YoutubeUrls::default(),
            geocoded_address: None,
            matched_address: None,
            geocode_attempt: None,
            reprocessed: false,
        }
    }

    /// An empty `geocoded_address` counts as unresolved.
    pub fn is_geocoded(&self) -> bool {
        matches!(&self.geocoded_address, Some(a) if !a.is_empty())
    }

    /// The number in `station_<n>`, if the id follows this convention.
    pub fn number(&self) -> Option<usize> {
        self.id.strip_prefix(ID_PREFIX)?.parse::<usize>().ok()
    }

    /// The address parts to geocode.
    ///
    /// Older files only carry the joined `address`: it is split on whitespace,
    /// the first two words being the province and the district.
    pub fn address_record(&self) -> RawAddressRecord {
        match (&self.sido, &self.sigungu, &self.dong) {
            (Some(sido), Some(sigungu), Some(dong)) => {
                RawAddressRecord::new(sido, sigungu, dong, &self.name)
            }
            _ => {
                let parts: Vec<&str> = self.address.split_whitespace().collect();
                let province = parts.first().copied().unwrap_or("");
                let district = parts.get(1).copied().unwrap_or("");
                let neighborhood = parts.get(2..).map(|p| p.join(" ")).unwrap_or_default();
                RawAddressRecord::new(province, district, &neighborhood, &self.name)
            }
        }
    }

    pub fn apply_result(&mut self, res: &GeocodeResult) {
        self.coordinates = Coordinates {
            lat: res.latitude,
            lng: res.longitude,
        };
        self.geocoded_address = Some(res.matched_display_name.clone());
        self.matched_address = Some(res.matched_variant.clone());
        self.geocode_attempt = Some(res.attempt_index);
    }

    /// Substitutes the fallback point and flags the station for a later pass.
    pub fn mark_unresolved(&mut self, fallback: Coordinates) {
        self.coordinates = fallback;
        self.geocoded_address = None;
        self.matched_address = None;
        self.geocode_attempt = None;
    }
}

pub fn read_stations(path: &Path) -> GeoResult<Vec<PollingStation>> {
    read_json(path)
}

pub fn write_stations(path: &Path, stations: &[PollingStation]) -> GeoResult<()> {
    write_json(path, &stations)
}

/// Merges sets of stations, in order. A station appearing in a later set
/// replaces the earlier one with the same id.
///
/// The result is sorted by station number; stations without a number come last, by id.
pub fn merge_stations(sets: Vec<Vec<PollingStation>>) -> Vec<PollingStation> {
    let mut by_id: BTreeMap<(usize, String), PollingStation> = BTreeMap::new();
    for set in sets {
        for s in set {
            let key = (s.number().unwrap_or(usize::MAX), s.id.clone());
            by_id.insert(key, s);
        }
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::config_reader::DEFAULT_FALLBACK;

    fn row(name: Option<&str>, province: &str, district: &str, neighborhood: &str) -> StationRow {
        StationRow {
            name: name.map(|s| s.to_string()),
            province: province.to_string(),
            district: district.to_string(),
            neighborhood: neighborhood.to_string(),
        }
    }

    fn station(number: usize) -> PollingStation {
        PollingStation::from_row(
            number,
            &row(Some("test"), "서울", "종로구", "청운효자동"),
            DEFAULT_FALLBACK,
            "2025-05-01T00:00:00.000Z",
        )
    }

    #[test]
    fn new_station_from_row() {
        let s = station(12);
        assert_eq!(s.id, "station_12");
        assert_eq!(s.number(), Some(12));
        assert_eq!(s.address, "서울 종로구 청운효자동");
        assert_eq!(s.district, "서울");
        assert_eq!(s.coordinates, DEFAULT_FALLBACK);
        assert!(!s.is_geocoded());
    }

    #[test]
    fn missing_name_and_province() {
        let s = PollingStation::from_row(
            7,
            &row(None, "", "", "청운효자동"),
            DEFAULT_FALLBACK,
            "now",
        );
        assert_eq!(s.name, "투표소_7");
        assert_eq!(s.district, UNKNOWN_DISTRICT);
        assert_eq!(s.address, "청운효자동");
    }

    #[test]
    fn json_field_names() {
        let mut s = station(1);
        let js = serde_json::to_value(&s).unwrap();
        assert!(js["geocoded_address"].is_null());
        assert!(js.get("matched_address").is_none());
        assert!(js.get("reprocessed").is_none());
        assert_eq!(js["isActive"], serde_json::json!(false));
        assert_eq!(js["youtubeUrls"]["morning"], serde_json::json!(""));

        s.apply_result(&GeocodeResult {
            latitude: 37.58,
            longitude: 126.97,
            matched_display_name: "청운효자동, 종로구, 서울".to_string(),
            matched_variant: "서울 종로구 청운효자동".to_string(),
            attempt_index: 1,
        });
        let js = serde_json::to_value(&s).unwrap();
        assert_eq!(js["coordinates"]["lat"], serde_json::json!(37.58));
        assert_eq!(js["geocode_attempt"], serde_json::json!(1));
        assert_eq!(js["matched_address"], serde_json::json!("서울 종로구 청운효자동"));
    }

    #[test]
    fn empty_geocoded_address_is_unresolved() {
        let mut js = serde_json::to_value(station(3)).unwrap();
        js["geocoded_address"] = serde_json::json!("");
        let s: PollingStation = serde_json::from_value(js.clone()).unwrap();
        assert!(!s.is_geocoded());

        js["geocoded_address"] = serde_json::json!("청운효자동, 종로구, 서울");
        let s: PollingStation = serde_json::from_value(js).unwrap();
        assert!(s.is_geocoded());
    }

    #[test]
    fn address_record_from_joined_address() {
        let mut s = station(1);
        s.sido = None;
        s.sigungu = None;
        s.dong = None;
        s.address = "경기 수원시 장안구 파장동".to_string();
        let r = s.address_record();
        assert_eq!(r.province, "경기");
        assert_eq!(r.city_district, "수원시");
        assert_eq!(r.neighborhood, "장안구 파장동");
    }

    #[test]
    fn merge_later_sets_win() {
        let a = vec![station(2), station(1)];
        let mut replaced = station(2);
        replaced.reprocessed = true;
        let b = vec![replaced, station(10)];
        let merged = merge_stations(vec![a, b]);
        let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["station_1", "station_2", "station_10"]);
        assert!(merged[1].reprocessed);
    }
}
