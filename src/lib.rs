//! Core of a map-centric event discovery app: the event filter engine, the
//! coordinate-bucketed POI geo-cache, and the place/geocoding clients they
//! sit in front of. Rendering, routing, and UI state live elsewhere.

pub mod config;
pub mod db;
pub mod feeds;
pub mod filter;
pub mod foursquare;
pub mod mapbox;
pub mod models;
pub mod poi;
pub mod utils;

pub use config::{AppConfig, ConfigStore};
pub use db::{CacheCell, Store, POI_TTL_DAYS};
pub use filter::{
    distance_miles, filter_events, in_bounds, DateRange, FilterCriteria, LngLat, MapBounds,
    PriceFilter,
};
pub use models::{Event, EventStatus, EventType, Platform, Poi, PoiPhoto, PoiTip};
pub use poi::{lookup_poi, PoiLookup};

#[cfg(test)]
mod tests {
    use super::*;

    // Seed a store, pull everything back, and run the filter over it the
    // way the map sidebar does.
    #[test]
    fn seeded_events_flow_through_the_filter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("radar.sqlite")).expect("open store");
        let events = store.list_events().expect("list");

        let center = LngLat {
            lng: -73.9857,
            lat: 40.7484,
        };
        let criteria = FilterCriteria {
            categories: vec!["Technology".to_string()],
            price: PriceFilter::Free,
            ..FilterCriteria::default()
        };
        let kept = filter_events(&events, &criteria, Some(center), None);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Rust NYC: Systems Programming Night");
    }
}
