/*!
Address normalization and fallback geocoding for polling-station lists.

The entry point is [`resolve`]: it derives the [`AddressVariants`] of a
record and tries each of them, in order, against a [`GeocodingClient`],
stopping at the first success.

See the [manual] for the complete description of the command line tool.
*/
mod config;
pub mod manual;
mod normalize;
mod pacing;

use log::{debug, info, warn};

pub use crate::config::*;
pub use crate::normalize::{address_variants, normalize_neighborhood};
pub use crate::pacing::{Pacer, RateLimitPolicy};

/// A free-text geocoding provider.
///
/// Implementations are expected to send one request per call and to identify
/// themselves to the provider (User-Agent).
pub trait GeocodingClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, LookupError>;
}

impl<C: GeocodingClient + ?Sized> GeocodingClient for &C {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, LookupError> {
        (**self).search(query)
    }
}

impl<C: GeocodingClient + ?Sized> GeocodingClient for Box<C> {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, LookupError> {
        (**self).search(query)
    }
}

/// Geocodes a record by trying its address variants in order.
///
/// Arguments:
/// * `client` the provider to query
/// * `record` the address to resolve
/// * `rules` the query parameters
/// * `pacer` the rate limiter, called before every request
///
/// Returns `None` when every variant failed or returned no result. Lookup
/// errors are logged and never returned.
pub fn resolve<C: GeocodingClient + ?Sized>(
    client: &C,
    record: &RawAddressRecord,
    rules: &ResolverRules,
    pacer: &mut Pacer,
) -> Option<GeocodeResult> {
    let variants = address_variants(record);
    debug!("resolve: {}: variants {:?}", record.station_name, variants);

    for (idx, (kind, variant)) in variants.iter().enumerate() {
        let attempt_index = (idx + 1) as u32;
        debug!("  Attempt {} ({:?}): {}", attempt_index, kind, variant);

        pacer.wait();
        let places = match client.search(&rules.query(variant)) {
            Ok(places) => places,
            Err(e) => {
                warn!("  Error with {}: {}", variant, e);
                continue;
            }
        };
        if places.is_empty() {
            debug!("  No result for {}", variant);
            continue;
        }

        let place = select_place(&places, record);
        match parse_coordinates(place) {
            Some((latitude, longitude)) => {
                info!(
                    "  {}: {}, {} (attempt {}: {})",
                    record.station_name, latitude, longitude, attempt_index, variant
                );
                return Some(GeocodeResult {
                    latitude,
                    longitude,
                    matched_display_name: place.display_name.clone(),
                    matched_variant: variant.to_string(),
                    attempt_index,
                });
            }
            None => {
                warn!(
                    "  Malformed coordinates for {}: {:?}, {:?}",
                    variant, place.lat, place.lon
                );
            }
        }
    }
    warn!("All attempts failed for: {}", record.station_name);
    None
}

/// Picks the first place whose display name mentions both the province and
/// the district, or the first place if none does.
///
/// `places` must not be empty.
pub fn select_place<'a>(places: &'a [Place], record: &RawAddressRecord) -> &'a Place {
    places
        .iter()
        .find(|p| {
            p.display_name.contains(record.province.as_str())
                && p.display_name.contains(record.city_district.as_str())
        })
        .unwrap_or(&places[0])
}

fn parse_coordinates(place: &Place) -> Option<(f64, f64)> {
    let lat = place.lat.trim().parse::<f64>().ok()?;
    let lon = place.lon.trim().parse::<f64>().ok()?;
    if lat.is_finite() && lon.is_finite() {
        Some((lat, lon))
    } else {
        None
    }
}
