use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Event, EventType, Platform};

static FREE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)free").expect("valid price regex"));

const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Map center as mapbox-style lng/lat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// Viewport rectangle: south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub sw_lng: f64,
    pub sw_lat: f64,
    pub ne_lng: f64,
    pub ne_lat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFilter {
    All,
    Free,
    Paid,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Active filter facets. Empty collections impose no constraint; every
/// active facet must hold for an event to pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    pub date_range: DateRange,
    pub categories: Vec<String>,
    pub event_types: Vec<EventType>,
    pub price: PriceFilter,
    pub sources: Vec<Platform>,
    /// Radius threshold in miles from the map center.
    pub distance: f64,
    /// Filter by viewport containment instead of the radius.
    pub use_map_bounds: bool,
    pub has_available_spots: bool,
    pub show_waitlist: bool,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            date_range: DateRange::default(),
            categories: Vec::new(),
            event_types: Vec::new(),
            price: PriceFilter::All,
            sources: Vec::new(),
            distance: 25.0,
            use_map_bounds: false,
            has_available_spots: false,
            show_waitlist: true,
        }
    }
}

/// Great-circle distance in miles between two lat/lng points (Haversine).
pub fn distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_MILES * c
}

/// Point-in-rectangle test, inclusive on all four edges.
pub fn in_bounds(lat: f64, lng: f64, bounds: &MapBounds) -> bool {
    lat >= bounds.sw_lat && lat <= bounds.ne_lat && lng >= bounds.sw_lng && lng <= bounds.ne_lng
}

/// Apply the active filter facets to an event list.
///
/// Pure and order-preserving. Malformed events are never an error: an event
/// whose coordinates fail to parse simply bypasses the geography clause.
pub fn filter_events(
    events: &[Event],
    criteria: &FilterCriteria,
    map_center: Option<LngLat>,
    map_bounds: Option<MapBounds>,
) -> Vec<Event> {
    events
        .iter()
        .filter(|event| event_matches(event, criteria, map_center, map_bounds))
        .cloned()
        .collect()
}

fn event_matches(
    event: &Event,
    criteria: &FilterCriteria,
    map_center: Option<LngLat>,
    map_bounds: Option<MapBounds>,
) -> bool {
    // Date range: strict comparisons against the bounds, so events exactly
    // on a bound pass.
    if criteria.date_range.start.is_some() || criteria.date_range.end.is_some() {
        let starts_at = match event.starts_at {
            Some(dt) => dt,
            None => return false,
        };
        if let Some(start) = criteria.date_range.start {
            if starts_at < start {
                return false;
            }
        }
        if let Some(end) = criteria.date_range.end {
            if starts_at > end {
                return false;
            }
        }
    }

    if !criteria.categories.is_empty() {
        match &event.category {
            Some(category) if criteria.categories.iter().any(|c| c == category) => {}
            _ => return false,
        }
    }

    if !criteria.event_types.is_empty() {
        match event.event_type {
            Some(event_type) if criteria.event_types.contains(&event_type) => {}
            _ => return false,
        }
    }

    // A missing price string fails the "free" test and therefore passes
    // "paid"; upstream behaves the same way.
    if criteria.price != PriceFilter::All {
        let is_free = event
            .price
            .as_deref()
            .map(|p| FREE_RE.is_match(p))
            .unwrap_or(false);
        match criteria.price {
            PriceFilter::Free if !is_free => return false,
            PriceFilter::Paid if is_free => return false,
            _ => {}
        }
    }

    if !criteria.sources.is_empty() {
        match event.source {
            Some(source) if criteria.sources.contains(&source) => {}
            _ => return false,
        }
    }

    // Geography applies only to physical events with parsable coordinates;
    // everything else bypasses the clause.
    if let Some(center) = map_center {
        if event.event_type == Some(EventType::Physical) {
            if let Some((lat, lng)) = event.coordinates() {
                match map_bounds {
                    Some(bounds) if criteria.use_map_bounds => {
                        if !in_bounds(lat, lng, &bounds) {
                            return false;
                        }
                    }
                    _ => {
                        if distance_miles(center.lat, center.lng, lat, lng) > criteria.distance {
                            return false;
                        }
                    }
                }
            }
        }
    }

    if criteria.has_available_spots && is_full(event) {
        return false;
    }

    // Hiding waitlisted events reuses the full-event test; wait_list_count
    // itself is never consulted. Kept bug-for-bug with upstream.
    if !criteria.show_waitlist && is_full(event) {
        return false;
    }

    true
}

fn is_full(event: &Event) -> bool {
    let total = event.rsvp_total.unwrap_or(0);
    let count = event.rsvp_count.unwrap_or(0);
    count >= total
}
