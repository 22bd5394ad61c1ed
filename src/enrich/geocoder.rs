//! Reverse geocoding: turning a coordinate into a short place description.

use crate::enrich::error::GeocodeError;
use crate::types::lat_lon::LatLon;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const UNKNOWN_LOCATION: &str = "Unknown location";
pub const GEOCODING_ERROR: &str = "Geocoding error";

/// The parts of a reverse-geocoding answer the enricher cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub country: Option<String>,
}

impl Place {
    /// City, else town, else village.
    pub fn locality(&self) -> Option<&str> {
        [&self.address.city, &self.address.town, &self.address.village]
            .into_iter()
            .find_map(|part| non_empty(part.as_deref()))
    }

    /// `"{locality}, {country}"` when both are known, otherwise the full address.
    pub fn label(&self) -> Option<String> {
        match (self.locality(), non_empty(self.address.country.as_deref())) {
            (Some(locality), Some(country)) => Some(format!("{locality}, {country}")),
            _ => non_empty(self.display_name.as_deref()).map(str::to_string),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The text written into the `location` column for a geocoder answer.
pub fn describe_place(place: Option<&Place>) -> String {
    place
        .and_then(Place::label)
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the service has no place for the coordinate.
    async fn reverse(&self, point: LatLon) -> Result<Option<Place>, GeocodeError>;
}

/// [`ReverseGeocoder`] for a Nominatim-compatible `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(GeocodeError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn reverse_url(&self, point: LatLon) -> String {
        format!(
            "{}/reverse?format=jsonv2&addressdetails=1&lat={}&lon={}",
            self.base_url,
            point.latitude(),
            point.longitude()
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, point: LatLon) -> Result<Option<Place>, GeocodeError> {
        let url = self.reverse_url(point);
        debug!("Reverse geocoding {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(GeocodeError::Request)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body = response.text().await.map_err(GeocodeError::Request)?;
        parse_reverse_response(&body)
    }
}

/// Nominatim reports "nothing here" as `{"error": "..."}` with a 200 status.
fn parse_reverse_response(body: &str) -> Result<Option<Place>, GeocodeError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(GeocodeError::Parse)?;
    if value.get("error").is_some() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(GeocodeError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(city: Option<&str>, town: Option<&str>, country: Option<&str>, display: &str) -> Place {
        Place {
            display_name: Some(display.to_string()),
            address: Address {
                city: city.map(str::to_string),
                town: town.map(str::to_string),
                village: None,
                country: country.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_label_prefers_locality_and_country() {
        let bologna = place(Some("Bologna"), None, Some("Italia"), "Via Zamboni, Bologna, Italia");
        assert_eq!(describe_place(Some(&bologna)), "Bologna, Italia");

        let town = place(None, Some("Zeist"), Some("Nederland"), "long form");
        assert_eq!(describe_place(Some(&town)), "Zeist, Nederland");
    }

    #[test]
    fn test_label_falls_back_to_display_name() {
        let no_country = place(Some("Bologna"), None, None, "Bologna, Emilia-Romagna");
        assert_eq!(describe_place(Some(&no_country)), "Bologna, Emilia-Romagna");

        let blank_city = place(Some(" "), None, Some("Italia"), "Appennino, Italia");
        assert_eq!(describe_place(Some(&blank_city)), "Appennino, Italia");
    }

    #[test]
    fn test_label_unknown() {
        assert_eq!(describe_place(None), UNKNOWN_LOCATION);
        assert_eq!(describe_place(Some(&Place::default())), UNKNOWN_LOCATION);
    }

    #[test]
    fn test_parse_reverse_response() {
        let body = r#"{
            "place_id": 1,
            "display_name": "Piazza Maggiore, Bologna, Italia",
            "address": { "village": "Borgo", "country": "Italia", "postcode": "40124" }
        }"#;
        let parsed = parse_reverse_response(body).unwrap().unwrap();
        assert_eq!(parsed.locality(), Some("Borgo"));
        assert_eq!(parsed.label().unwrap(), "Borgo, Italia");

        assert_eq!(
            parse_reverse_response(r#"{"error":"Unable to geocode"}"#).unwrap(),
            None
        );
        assert!(matches!(
            parse_reverse_response("<html>"),
            Err(GeocodeError::Parse(_))
        ));
    }

    #[test]
    fn test_reverse_url() {
        let geocoder =
            NominatimGeocoder::new("https://geo.test/", "egms-test", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            geocoder.reverse_url(LatLon(52.0, 10.5)),
            "https://geo.test/reverse?format=jsonv2&addressdetails=1&lat=52&lon=10.5"
        );
    }
}
