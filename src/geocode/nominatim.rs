//! Blocking client of a Nominatim `/search` endpoint.

use crate::geocode::*;

use log::debug;
use reqwest::blocking::Client;

pub struct NominatimClient {
    client: Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(settings: &GeocoderSettings) -> GeoResult<NominatimClient> {
        let client = Client::builder()
            .user_agent(settings.user_agent())
            .timeout(settings.timeout())
            .build()
            .context(HttpClientSnafu {})?;
        Ok(NominatimClient {
            client,
            endpoint: settings.endpoint(),
        })
    }
}

/// The query string parameters of a search.
pub fn search_params(query: &SearchQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", query.text.clone()),
        ("format", "json".to_string()),
        ("limit", query.limit.to_string()),
    ];
    if query.address_details {
        params.push(("addressdetails", "1".to_string()));
    }
    if !query.country_codes.is_empty() {
        params.push(("countrycodes", query.country_codes.join(",")));
    }
    params
}

impl GeocodingClient for NominatimClient {
    fn search(&self, query: &SearchQuery) -> Result<Vec<Place>, LookupError> {
        let params = search_params(query);
        debug!("search: {} {:?}", self.endpoint, params);
        let res = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        if !res.status().is_success() {
            return Err(LookupError::Status(res.status().as_u16()));
        }
        res.json::<Vec<Place>>()
            .map_err(|e| LookupError::Decode(e.to_string()))
    }
}
