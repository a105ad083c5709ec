use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::models::Poi;

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("event-radar/0.1")
        .build()
        .expect("failed to build mapbox client")
});

const GEOCODING_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("missing mapbox access token")]
    MissingToken,
    #[error("http error: {0}")]
    Http(String),
    #[error("mapbox api error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    place_type: Vec<String>,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    text: Option<String>,
    place_name: Option<String>,
    center: [f64; 2], // [lng, lat]
    address: Option<String>,
}

/// A forward-geocoded address: where to fly the map.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub lng: f64,
    pub lat: f64,
    pub formatted_address: String,
}

/// Forward geocoding: free-text query to the best-match coordinates.
pub async fn geocode(query: &str, access_token: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let url = endpoint(query, access_token, 1)?;
    let payload = fetch_features(url).await?;

    Ok(payload.features.into_iter().next().map(|feature| {
        let [lng, lat] = feature.center;
        GeocodedAddress {
            lng,
            lat,
            formatted_address: feature
                .place_name
                .or(feature.text)
                .unwrap_or_else(|| "Unknown location".to_string()),
        }
    }))
}

/// Reverse lookup: the most relevant feature at a point, as a `Poi` with a
/// coordinate-derived id. The fallback identity when no Foursquare record
/// exists for a map feature.
pub async fn place_at(lng: f64, lat: f64, access_token: &str) -> Result<Option<Poi>, GeocodeError> {
    let url = endpoint(&format!("{lng},{lat}"), access_token, 1)?;
    let payload = fetch_features(url).await?;

    Ok(payload.features.into_iter().next().map(transform_feature))
}

fn endpoint(query: &str, access_token: &str, limit: u32) -> Result<Url, GeocodeError> {
    let mut url = Url::parse(&format!("{GEOCODING_URL}/{query}.json"))
        .map_err(|err| GeocodeError::Http(err.to_string()))?;
    url.query_pairs_mut()
        .append_pair("access_token", access_token)
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

async fn fetch_features(url: Url) -> Result<PlacesResponse, GeocodeError> {
    let response = CLIENT
        .get(url)
        .send()
        .await
        .map_err(|err| GeocodeError::Http(err.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| GeocodeError::Http(err.to_string()))?;

    if !status.is_success() {
        return Err(GeocodeError::Api(format!("status {}: {}", status, text)));
    }

    serde_json::from_str(&text).map_err(|err| GeocodeError::Parse(err.to_string()))
}

/// Stable id for features the provider does not identify: the coordinates
/// at 6-decimal precision.
fn feature_id(lng: f64, lat: f64) -> String {
    format!("{lat:.6},{lng:.6}")
}

fn extract_category(feature: &FeatureDoc) -> String {
    if let Some(category) = feature.properties.get("category").and_then(|v| v.as_str()) {
        return category.to_string();
    }
    feature
        .place_type
        .first()
        .cloned()
        .unwrap_or_else(|| "place".to_string())
}

fn transform_feature(feature: FeatureDoc) -> Poi {
    let [lng, lat] = feature.center;
    let category = extract_category(&feature);
    let name = feature
        .text
        .clone()
        .unwrap_or_else(|| "Unknown Place".to_string());
    let address = feature
        .place_name
        .clone()
        .or(feature.text)
        .unwrap_or_else(|| "Unknown location".to_string());
    let properties = json!({
        "category": category,
        "address": feature.address,
    });

    Poi {
        id: feature_id(lng, lat),
        name,
        address,
        category,
        latitude: lat,
        longitude: lng,
        photos: Vec::new(),
        image_url: None,
        rating: None,
        price: None,
        hours: None,
        open_now: None,
        phone: None,
        website: None,
        tips: Vec::new(),
        tips_count: 0,
        popularity: None,
        distance: None,
        properties,
        source: "mapbox".to_string(),
        fetched_at: Utc::now(),
    }
}
