use std::time::{Duration, Instant};

use chrono::Utc;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;

use crate::models::{Poi, PoiPhoto, PoiTip};

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("event-radar/0.1")
        .build()
        .expect("failed to build foursquare client")
});

static REQUEST_QUEUE: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));
static LAST_REQUEST: Lazy<AsyncMutex<Option<Instant>>> = Lazy::new(|| AsyncMutex::new(None));

const RATE_LIMIT_WINDOW_MS: u64 = 250;

const SEARCH_URL: &str = "https://places-api.foursquare.com/places/search";
const API_VERSION: &str = "2025-06-17";

/// Search radius around the clicked point, in meters.
const SEARCH_RADIUS_M: u32 = 50;
/// The nearest result is treated as a miss beyond this distance.
const MAX_MATCH_DISTANCE_M: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum PlacesError {
    #[error("missing foursquare api key")]
    MissingKey,
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid coordinates: lat {0}, lng {1}")]
    InvalidCoordinates(f64, f64),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<PlaceDoc>,
}

#[derive(Debug, Deserialize)]
struct PlaceDoc {
    fsq_place_id: String,
    name: String,
    #[serde(default)]
    categories: Vec<CategoryDoc>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    location: LocationDoc,
    distance: Option<f64>,
    rating: Option<f64>,
    price: Option<i64>,
    hours: Option<HoursDoc>,
    #[serde(default)]
    photos: Vec<PhotoDoc>,
    #[serde(default)]
    tips: Vec<TipDoc>,
    popularity: Option<f64>,
    tel: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryDoc {
    name: String,
    short_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationDoc {
    formatted_address: Option<String>,
    address: Option<String>,
    locality: Option<String>,
    region: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HoursDoc {
    display: Option<String>,
    open_now: Option<bool>,
    #[serde(default)]
    regular: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PhotoDoc {
    id: String,
    prefix: String,
    suffix: String,
    width: u32,
    height: u32,
    #[serde(default)]
    classifications: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TipDoc {
    text: String,
    created_at: Option<String>,
}

/// Photo URL assembly: prefix + size + suffix.
pub fn photo_url(prefix: &str, suffix: &str, size: &str) -> String {
    format!("{prefix}{size}{suffix}")
}

/// Search for the place at a clicked location, optionally biased by the
/// feature name from the map. Returns `None` when nothing plausible is
/// nearby: no results, or the nearest result sits farther than 100 m from
/// the query point.
pub async fn search_place(
    lat: f64,
    lng: f64,
    query: Option<&str>,
    api_key: &str,
) -> Result<Option<Poi>, PlacesError> {
    if !crate::utils::valid_lat_lng(lat, lng) {
        return Err(PlacesError::InvalidCoordinates(lat, lng));
    }

    let fields = [
        "fsq_place_id",
        "name",
        "categories",
        "latitude",
        "longitude",
        "location",
        "distance",
        "tel",
        "website",
        "rating",
        "price",
        "hours",
        "photos",
        "tips",
        "popularity",
        "stats",
    ]
    .join(",");

    let mut url = Url::parse(SEARCH_URL).map_err(|err| PlacesError::Http(err.to_string()))?;
    url.query_pairs_mut()
        .append_pair("ll", &format!("{lat},{lng}"))
        .append_pair("radius", &SEARCH_RADIUS_M.to_string())
        .append_pair("limit", "1")
        .append_pair("fields", &fields);
    if let Some(query) = query {
        url.query_pairs_mut().append_pair("query", query);
    }

    let text = fetch_payload(url, api_key).await?;
    let payload: SearchResponse =
        serde_json::from_str(&text).map_err(|err| PlacesError::Parse(err.to_string()))?;

    let place = match payload.results.into_iter().next() {
        Some(place) => place,
        None => return Ok(None),
    };

    if matches!(place.distance, Some(d) if d > MAX_MATCH_DISTANCE_M) {
        return Ok(None);
    }

    Ok(Some(transform_place(place)))
}

/// Fetch additional photos for a known place id.
pub async fn fetch_place_photos(
    place_id: &str,
    api_key: &str,
    limit: u32,
) -> Result<Vec<PoiPhoto>, PlacesError> {
    let url = Url::parse(&format!(
        "https://places-api.foursquare.com/places/{place_id}/photos?limit={limit}"
    ))
    .map_err(|err| PlacesError::Http(err.to_string()))?;

    let text = fetch_payload(url, api_key).await?;
    let photos: Vec<PhotoDoc> =
        serde_json::from_str(&text).map_err(|err| PlacesError::Parse(err.to_string()))?;

    Ok(photos.into_iter().map(transform_photo).collect())
}

async fn fetch_payload(url: Url, api_key: &str) -> Result<String, PlacesError> {
    let _guard = REQUEST_QUEUE.lock().await;
    wait_for_rate_limit().await;

    let response = CLIENT
        .get(url)
        .header("Accept", "application/json")
        .header("X-Places-Api-Version", API_VERSION)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|err| PlacesError::Http(err.to_string()))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| PlacesError::Http(err.to_string()))?;

    if !status.is_success() {
        return Err(PlacesError::Http(format!("status {}: {}", status, text)));
    }

    Ok(text)
}

async fn wait_for_rate_limit() {
    let mut last = LAST_REQUEST.lock().await;
    if let Some(previous) = *last {
        let elapsed = previous.elapsed();
        let window = Duration::from_millis(RATE_LIMIT_WINDOW_MS);
        if elapsed < window {
            sleep(window - elapsed).await;
        }
    }
    *last = Some(Instant::now());
}

fn transform_place(place: PlaceDoc) -> Poi {
    let photos: Vec<PoiPhoto> = place.photos.into_iter().map(transform_photo).collect();
    let image_url = photos
        .first()
        .map(|photo| photo_url(&photo.prefix, &photo.suffix, "500x500"));

    let tips: Vec<PoiTip> = place
        .tips
        .into_iter()
        .map(|tip| PoiTip {
            text: tip.text,
            created_at: tip.created_at,
        })
        .collect();

    let category = extract_category(&place.categories);
    let address = format_address(&place.location);
    let properties = json!({
        "category": category,
        "address": place.location.address,
        "locality": place.location.locality,
        "region": place.location.region,
        "hours": place.hours.as_ref().map(|h| h.regular.clone()),
    });

    Poi {
        id: place.fsq_place_id,
        name: place.name,
        address,
        category,
        latitude: place.latitude,
        longitude: place.longitude,
        photos,
        image_url,
        rating: place.rating,
        price: place.price,
        hours: place.hours.as_ref().and_then(|h| h.display.clone()),
        open_now: place.hours.as_ref().and_then(|h| h.open_now),
        phone: place.tel,
        website: place.website,
        // The summary counter from the provider drifts from the actual
        // retrievable list, so the count always comes from the list.
        tips_count: tips.len(),
        tips,
        popularity: place.popularity,
        distance: place.distance,
        properties,
        source: "foursquare".to_string(),
        fetched_at: Utc::now(),
    }
}

fn transform_photo(photo: PhotoDoc) -> PoiPhoto {
    PoiPhoto {
        id: photo.id,
        prefix: photo.prefix,
        suffix: photo.suffix,
        width: photo.width,
        height: photo.height,
        classifications: photo.classifications,
    }
}

fn extract_category(categories: &[CategoryDoc]) -> String {
    categories
        .first()
        .map(|c| c.short_name.clone().unwrap_or_else(|| c.name.clone()))
        .unwrap_or_else(|| "Place".to_string())
}

fn format_address(location: &LocationDoc) -> String {
    if let Some(formatted) = &location.formatted_address {
        return formatted.clone();
    }

    let parts: Vec<&str> = [
        location.address.as_deref(),
        location.locality.as_deref(),
        location.region.as_deref(),
        location.postcode.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        "Address not available".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PLACE: &str = r#"{
        "fsq_place_id": "4b5f9a8cf964a520d3be29e3",
        "name": "Blue Bottle Coffee",
        "categories": [
            {"name": "Coffee Shop and Cafe", "short_name": "Coffee Shop"},
            {"name": "Cafe", "short_name": "Cafe"}
        ],
        "latitude": 37.7897,
        "longitude": -122.4,
        "location": {
            "address": "54 Mint St",
            "locality": "San Francisco",
            "region": "CA",
            "postcode": "94103"
        },
        "distance": 18.0,
        "rating": 8.9,
        "price": 2,
        "hours": {"display": "Open until 6:00 PM", "open_now": true},
        "photos": [
            {"id": "ph1", "prefix": "https://fastly.4sqi.net/img/general/", "suffix": "/123.jpg", "width": 1920, "height": 1440}
        ],
        "tips": [
            {"text": "Great pour over", "created_at": "2024-11-02T09:00:00Z"},
            {"text": "Long line at lunch"}
        ],
        "popularity": 0.97,
        "stats": {"total_tips": 57},
        "tel": "+14155551234",
        "website": "https://bluebottlecoffee.com"
    }"#;

    #[test]
    fn transforms_place_payload() {
        let doc: PlaceDoc = serde_json::from_str(SAMPLE_PLACE).expect("parse place");
        let poi = transform_place(doc);

        assert_eq!(poi.id, "4b5f9a8cf964a520d3be29e3");
        assert_eq!(poi.category, "Coffee Shop");
        assert_eq!(poi.address, "54 Mint St, San Francisco, CA, 94103");
        assert_eq!(
            poi.image_url.as_deref(),
            Some("https://fastly.4sqi.net/img/general/500x500/123.jpg")
        );
        assert_eq!(poi.hours.as_deref(), Some("Open until 6:00 PM"));
        assert_eq!(poi.open_now, Some(true));
        assert_eq!(poi.source, "foursquare");
        // stats.total_tips says 57; the count must come from the list.
        assert_eq!(poi.tips_count, 2);
        assert_eq!(poi.tips[1].created_at, None);
    }

    #[test]
    fn category_falls_back_to_name_then_place() {
        let unnamed: Vec<CategoryDoc> =
            serde_json::from_str(r#"[{"name": "Dive Bar"}]"#).expect("parse");
        assert_eq!(extract_category(&unnamed), "Dive Bar");
        assert_eq!(extract_category(&[]), "Place");
    }

    #[test]
    fn address_prefers_formatted_form() {
        let location: LocationDoc = serde_json::from_str(
            r#"{"formatted_address": "54 Mint St, San Francisco, CA 94103", "address": "54 Mint St"}"#,
        )
        .expect("parse");
        assert_eq!(format_address(&location), "54 Mint St, San Francisco, CA 94103");
        assert_eq!(format_address(&LocationDoc::default()), "Address not available");
    }

    #[test]
    fn builds_photo_urls() {
        assert_eq!(
            photo_url("https://x/", "/1.jpg", "original"),
            "https://x/original/1.jpg"
        );
    }
}
