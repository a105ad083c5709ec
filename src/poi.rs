use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::db::Store;
use crate::foursquare::{self, PlacesError};
use crate::models::Poi;

/// Result of a place lookup, with its provenance.
#[derive(Debug, Clone)]
pub struct PoiLookup {
    pub poi: Poi,
    /// True when the record came from the geo-cache rather than the
    /// provider.
    pub cached: bool,
}

/// Resolve the place at a clicked map location, cache first.
///
/// The cache is an optimization, never a gate: a failing cache read counts
/// as a miss and the provider is consulted; a failing cache write is logged
/// and the freshly fetched record is returned anyway.
pub async fn lookup_poi(
    store: &Store,
    config: &AppConfig,
    lat: f64,
    lng: f64,
    query: Option<&str>,
) -> Result<Option<PoiLookup>, PlacesError> {
    if !crate::utils::valid_lat_lng(lat, lng) {
        return Err(PlacesError::InvalidCoordinates(lat, lng));
    }

    match store.get_poi_by_location(lat, lng) {
        Ok(Some(poi)) => {
            debug!("poi cache hit: {} at {lat},{lng}", poi.name);
            return Ok(Some(PoiLookup { poi, cached: true }));
        }
        Ok(None) => {
            debug!("poi cache miss at {lat},{lng}");
        }
        Err(err) => {
            warn!("poi cache read failed, treating as miss: {err}");
        }
    }

    let api_key = config.foursquare_key().ok_or(PlacesError::MissingKey)?;
    let poi = match foursquare::search_place(lat, lng, query, &api_key).await? {
        Some(poi) => poi,
        None => return Ok(None),
    };

    if let Err(err) = store.upsert_poi(&poi) {
        warn!("failed to cache poi {}: {err}", poi.id);
    }

    Ok(Some(PoiLookup { poi, cached: false }))
}
