use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an event was crawled from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Meetup,
    Eventbrite,
    Linkedin,
    Luma,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Meetup => "meetup",
            Platform::Eventbrite => "eventbrite",
            Platform::Linkedin => "linkedin",
            Platform::Luma => "luma",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Physical,
    Virtual,
    Hybrid,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Active,
    Cancelled,
    Postponed,
}

/// An event as produced by the platform crawlers.
///
/// Latitude/longitude are kept as the crawlers' decimal strings; they are
/// parsed on demand and events with unparsable coordinates simply skip
/// geographic filtering.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Event {
    pub id: String, // stable hash: source|source_id|starts_at
    pub title: String,
    pub description: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub organizer: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub price: Option<String>,
    pub ticket_url: Option<String>,
    pub event_url: Option<String>,
    pub image_url: Option<String>,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub rsvp_total: Option<i64>,
    pub rsvp_count: Option<i64>,
    pub wait_list_count: Option<i64>,
    pub source: Option<Platform>,
    pub source_id: Option<String>,
    pub raw_data: serde_json::Value,
}

impl Event {
    /// Coordinates as finite floats, when the event carries usable ones.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = crate::utils::parse_coordinate(self.latitude.as_deref())?;
        let lng = crate::utils::parse_coordinate(self.longitude.as_deref())?;
        Some((lat, lng))
    }
}

/// Photo attached to a place record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PoiPhoto {
    pub id: String,
    pub prefix: String,
    pub suffix: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<String>,
}

/// Community tip attached to a place record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PoiTip {
    pub text: String,
    pub created_at: Option<String>,
}

/// A point of interest, normalized from whichever provider supplied it.
///
/// `id` is the provider's place id when one exists, otherwise a string
/// derived from the coordinates. `tips_count` is recomputed from `tips` on
/// every cache read; the value stored here is never authoritative.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Poi {
    pub id: String,
    pub name: String,
    pub address: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub photos: Vec<PoiPhoto>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub price: Option<i64>,
    pub hours: Option<String>,
    pub open_now: Option<bool>,
    pub phone: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub tips: Vec<PoiTip>,
    pub tips_count: usize,
    pub popularity: Option<f64>,
    /// Meters from the original query point, as reported by the provider.
    pub distance: Option<f64>,
    /// Provider-specific payload (full category list, location components,
    /// structured hours) kept verbatim for the UI layer.
    pub properties: serde_json::Value,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}
