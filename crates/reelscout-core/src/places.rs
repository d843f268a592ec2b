use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::metadata::PlaceDetails;

const MAPS_API_URL: &str = "https://maps.googleapis.com/maps/api";

const FIND_PLACE_FIELDS: &str = "name,formatted_address,place_id,geometry/location";
const DETAILS_FIELDS: &str = "name,formatted_address,url,place_id,geometry/location";

/// Resolver over the Google Maps Places API: text query to the most
/// likely candidate, then a details lookup for the Maps URI.
pub struct PlaceResolver {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlaceResolver {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: MAPS_API_URL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_PLACES_API")
            .map_err(|_| anyhow!("GOOGLE_PLACES_API environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Resolve a free-text place name. `Ok(None)` means the API had no
    /// match; `Err` is an API or transport failure.
    pub async fn resolve(&self, location_name: &str) -> Result<Option<PlaceDetails>> {
        if location_name.is_empty() {
            warn!("empty location name, nothing to resolve");
            return Ok(None);
        }

        debug!(location_name, "find place request");
        let find: FindPlaceResponse = self
            .http
            .get(format!("{}/place/findplacefromtext/json", self.base_url))
            .query(&[
                ("input", location_name),
                ("inputtype", "textquery"),
                ("fields", FIND_PLACE_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        let candidate = match find.status.as_str() {
            "OK" => match find.candidates.into_iter().next() {
                Some(c) => c,
                None => return Ok(None),
            },
            "ZERO_RESULTS" => {
                warn!(location_name, "no Google Maps results");
                return Ok(None);
            }
            status => {
                return Err(anyhow!(
                    "Google Maps API error for '{}': {}{}",
                    location_name,
                    status,
                    find.error_message
                        .map(|m| format!(" ({m})"))
                        .unwrap_or_default()
                ));
            }
        };

        let Some(place_id) = candidate.place_id else {
            warn!(location_name, "candidate without place_id");
            return Ok(None);
        };

        debug!(%place_id, "place details request");
        let details: PlaceDetailsResponse = self
            .http
            .get(format!("{}/place/details/json", self.base_url))
            .query(&[
                ("place_id", place_id.as_str()),
                ("fields", DETAILS_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if details.status != "OK" {
            return Err(anyhow!(
                "Google Maps details error for place_id '{}': {}",
                place_id,
                details.status
            ));
        }

        Ok(details.result.map(|r| r.into_details(place_id)))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<FindPlaceCandidate>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct FindPlaceCandidate {
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Deserialize)]
struct PlaceDetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<RawPlace>,
}

#[derive(Deserialize)]
struct RawPlace {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
struct RawGeometry {
    location: RawLatLng,
}

#[derive(Deserialize)]
struct RawLatLng {
    lat: f64,
    lng: f64,
}

impl RawPlace {
    fn into_details(self, place_id: String) -> PlaceDetails {
        let location = self.geometry.map(|g| g.location);
        PlaceDetails {
            name: self.name,
            address: self.formatted_address,
            place_id,
            latitude: location.as_ref().map(|l| l.lat),
            longitude: location.as_ref().map(|l| l.lng),
            google_maps_uri: self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_mapping() {
        let response: PlaceDetailsResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "result": {
                    "name": "Joe's Stone Crab",
                    "formatted_address": "11 Washington Ave, Miami Beach, FL 33139",
                    "url": "https://maps.google.com/?cid=123",
                    "geometry": {"location": {"lat": 25.768, "lng": -80.135}}
                }
            }"#,
        )
        .unwrap();

        let details = response
            .result
            .unwrap()
            .into_details("place-1".to_string());
        assert_eq!(details.name.as_deref(), Some("Joe's Stone Crab"));
        assert_eq!(details.place_id, "place-1");
        assert_eq!(details.latitude, Some(25.768));
        assert_eq!(details.longitude, Some(-80.135));
        assert_eq!(
            details.google_maps_uri.as_deref(),
            Some("https://maps.google.com/?cid=123")
        );
    }

    #[test]
    fn missing_geometry_yields_no_coordinates() {
        let raw: RawPlace = serde_json::from_str(r#"{"name": "Somewhere"}"#).unwrap();
        let details = raw.into_details("place-2".to_string());
        assert_eq!(details.latitude, None);
        assert_eq!(details.longitude, None);
    }

    #[test]
    fn find_place_statuses_parse() {
        let zero: FindPlaceResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "candidates": []}"#).unwrap();
        assert_eq!(zero.status, "ZERO_RESULTS");

        let denied: FindPlaceResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#,
        )
        .unwrap();
        assert_eq!(denied.error_message.as_deref(), Some("bad key"));
    }

    #[tokio::test]
    async fn empty_name_resolves_to_none_without_request() {
        let resolver = PlaceResolver::new("test-key").with_base_url("http://127.0.0.1:0");
        assert!(resolver.resolve("").await.unwrap().is_none());
    }
}
