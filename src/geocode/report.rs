use crate::geocode::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Failed stations are listed by name for provinces with at most this many failures.
const LIST_FAILED_UP_TO: usize = 5;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DistrictStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    #[serde(rename = "successRate")]
    pub success_rate: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    #[serde(rename = "successRate")]
    pub success_rate: String,
    #[serde(rename = "processedAt")]
    pub processed_at: String,
    #[serde(rename = "processingTime", skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    #[serde(rename = "byDistrict")]
    pub by_district: BTreeMap<String, DistrictStats>,
}

/// Percentage with one decimal, "0.0" when there is nothing to count.
pub fn success_rate(success: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", success as f64 * 100.0 / total as f64)
}

pub fn compute_stats(stations: &[PollingStation], elapsed: Option<Duration>) -> GeocodingStats {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for s in stations {
        let c = counts.entry(s.district.clone()).or_insert((0, 0));
        c.0 += 1;
        if s.is_geocoded() {
            c.1 += 1;
        }
    }
    let by_district = counts
        .into_iter()
        .map(|(name, (total, success))| {
            let stats = DistrictStats {
                total,
                success,
                failed: total - success,
                success_rate: format!("{}%", success_rate(success, total)),
            };
            (name, stats)
        })
        .collect();
    let total = stations.len();
    let success = stations.iter().filter(|s| s.is_geocoded()).count();
    GeocodingStats {
        total,
        success,
        failed: total - success,
        success_rate: success_rate(success, total),
        processed_at: timestamp_now(),
        processing_time: elapsed.map(|d| format!("{:.1}s", d.as_secs_f64())),
        by_district,
    }
}

/// Human-readable summary of a set of stations.
pub fn report_lines(stations: &[PollingStation]) -> Vec<String> {
    let stats = compute_stats(stations, None);
    let mut lines = vec![
        format!("Total stations: {}", stats.total),
        format!("Geocoded: {}", stats.success),
        format!("Failed: {}", stats.failed),
        format!("Success rate: {}%", stats.success_rate),
    ];
    if stats.by_district.is_empty() {
        return lines;
    }
    lines.push("By province:".to_string());
    for (name, d) in stats.by_district.iter() {
        lines.push(format!(
            "  {}: {}/{} ({}), {} failed",
            name, d.success, d.total, d.success_rate, d.failed
        ));
        if d.failed > 0 && d.failed <= LIST_FAILED_UP_TO {
            for s in stations
                .iter()
                .filter(|s| &s.district == name && !s.is_geocoded())
            {
                lines.push(format!("    - {} ({})", s.name, s.address));
            }
        }
    }
    lines
}
