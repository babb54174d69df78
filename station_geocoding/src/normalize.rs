//! Address variants for the fallback chain.

use crate::config::*;

/// Marks a numbered sub-district: `청운제1동` is the first part of `청운동`.
const SUBDIVISION_MARKER: char = '제';
/// The suffix of a neighborhood (동).
const UNIT_SUFFIX: char = '동';
/// Interpunct used in merged neighborhood names (`종로1·2·3·4가동`).
const SEPARATOR: char = '·';

/// Builds the four address variants of a record, most specific first.
///
/// ```
/// use station_geocoding::{address_variants, RawAddressRecord, VariantKind};
///
/// let record = RawAddressRecord::new("서울", "종로구", "청운제1동", "청운효자동 사전투표소");
/// let variants = address_variants(&record);
/// assert_eq!(variants.get(VariantKind::Original), "서울 종로구 청운제1동");
/// assert_eq!(variants.get(VariantKind::Normalized), "서울 종로구 청운동");
/// assert_eq!(variants.get(VariantKind::District), "서울 종로구");
/// assert_eq!(variants.get(VariantKind::Province), "서울");
/// ```
pub fn address_variants(record: &RawAddressRecord) -> AddressVariants {
    let province = record.province.as_str();
    let district = record.city_district.as_str();
    let normalized = normalize_neighborhood(&record.neighborhood);
    AddressVariants([
        join_parts(&[province, district, record.neighborhood.as_str()]),
        join_parts(&[province, district, normalized.as_str()]),
        join_parts(&[province, district]),
        join_parts(&[province]),
    ])
}

/// Collapses a numbered sub-district to its base neighborhood and strips separators.
///
/// Only the first `제<digits>동` occurrence is collapsed.
pub fn normalize_neighborhood(neighborhood: &str) -> String {
    let mut res = match find_subdivision(neighborhood) {
        Some((start, end)) => {
            let mut s = String::with_capacity(neighborhood.len());
            s.push_str(&neighborhood[..start]);
            s.push(UNIT_SUFFIX);
            s.push_str(&neighborhood[end..]);
            // 신사동제1동 -> 신사동동 -> 신사동
            let doubled: String = [UNIT_SUFFIX, UNIT_SUFFIX].iter().collect();
            if s.ends_with(&doubled) {
                s.pop();
            }
            s
        }
        None => neighborhood.to_string(),
    };
    res.retain(|c| c != SEPARATOR);
    res
}

// Byte range of the first marker + ASCII digits + suffix sequence.
fn find_subdivision(s: &str) -> Option<(usize, usize)> {
    for (start, c) in s.char_indices() {
        if c != SUBDIVISION_MARKER {
            continue;
        }
        let after_marker = start + c.len_utf8();
        let digits = s[after_marker..]
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            continue;
        }
        let suffix_pos = after_marker + digits;
        if s[suffix_pos..].starts_with(UNIT_SUFFIX) {
            return Some((start, suffix_pos + UNIT_SUFFIX.len_utf8()));
        }
    }
    None
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}
