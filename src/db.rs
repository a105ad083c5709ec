use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Event, Poi};
use crate::utils;

/// Cached place records live this long before the expiry sweep may remove
/// them; every upsert restarts the clock.
pub const POI_TTL_DAYS: i64 = 7;

/// The ~11 m grid cell used as the fallback place identity.
///
/// Provider ids are unstable or absent in some lookup modes, so two lookups
/// whose coordinates round to the same four-decimal cell are treated as the
/// same place. All rounding goes through this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheCell {
    lat: f64,
    lng: f64,
}

impl CacheCell {
    pub fn from_coords(lat: f64, lng: f64) -> Self {
        Self {
            lat: utils::round4(lat),
            lng: utils::round4(lng),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for CacheCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lng)
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> rusqlite::Result<Self> {
        let path = utils::database_path();
        utils::ensure_parent(&path);
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        store.seed_if_empty()?;
        Ok(store)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                first_seen_utc TEXT NOT NULL,
                last_seen_utc TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS pois(
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                source TEXT NOT NULL,
                created_at_utc TEXT NOT NULL,
                updated_at_utc TEXT NOT NULL,
                expires_at_utc TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn seed_if_empty(&self) -> rusqlite::Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        for event in crate::feeds::sample::sample_events() {
            self.upsert_event(&event)?;
        }

        Ok(())
    }

    pub fn upsert_event(&self, event: &Event) -> rusqlite::Result<()> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(event).expect("event serialization");
        self.conn.execute(
            "INSERT INTO events (id, payload, first_seen_utc, last_seen_utc)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               last_seen_utc = excluded.last_seen_utc",
            params![event.id, payload, now],
        )?;
        Ok(())
    }

    pub fn get_event(&self, id: &str) -> rusqlite::Result<Event> {
        let payload: String = self.conn.query_row(
            "SELECT payload FROM events WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        decode_payload(&payload)
    }

    pub fn list_events(&self) -> rusqlite::Result<Vec<Event>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM events ORDER BY first_seen_utc, id")?;
        let rows = stmt.query_map([], |row| {
            let payload: String = row.get(0)?;
            decode_payload::<Event>(&payload)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Write or refresh a cached place. The expiry window restarts on every
    /// write, whether the record was fresh, stale, or absent.
    pub fn upsert_poi(&self, poi: &Poi) -> rusqlite::Result<()> {
        let now = Utc::now();
        let expires_at = now + Duration::days(POI_TTL_DAYS);
        let payload = serde_json::to_string(poi).expect("poi serialization");
        self.conn.execute(
            "INSERT INTO pois (id, payload, latitude, longitude, source,
                               created_at_utc, updated_at_utc, expires_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               latitude = excluded.latitude,
               longitude = excluded.longitude,
               source = excluded.source,
               updated_at_utc = excluded.updated_at_utc,
               expires_at_utc = excluded.expires_at_utc",
            params![
                poi.id,
                payload,
                poi.latitude,
                poi.longitude,
                poi.source,
                now.to_rfc3339(),
                expires_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Point lookup by place id. Expired records are invisible.
    pub fn get_poi(&self, id: &str) -> rusqlite::Result<Option<Poi>> {
        let now = Utc::now().to_rfc3339();
        let row = self
            .conn
            .query_row(
                "SELECT payload, created_at_utc FROM pois
                 WHERE id = ?1 AND expires_at_utc > ?2",
                params![id, now],
                |row| {
                    let payload: String = row.get(0)?;
                    let created_at: String = row.get(1)?;
                    Ok((payload, created_at))
                },
            )
            .optional()?;

        row.map(|(payload, created_at)| hydrate_poi(&payload, &created_at))
            .transpose()
    }

    /// Lookup by proximity: both coordinates are rounded to the 4-decimal
    /// cell and matched against the stored coordinates rounded the same way.
    pub fn get_poi_by_location(&self, lat: f64, lng: f64) -> rusqlite::Result<Option<Poi>> {
        let cell = CacheCell::from_coords(lat, lng);
        let now = Utc::now().to_rfc3339();
        let row = self
            .conn
            .query_row(
                "SELECT payload, created_at_utc FROM pois
                 WHERE ROUND(latitude, 4) = ?1 AND ROUND(longitude, 4) = ?2
                   AND expires_at_utc > ?3
                 LIMIT 1",
                params![cell.lat(), cell.lng(), now],
                |row| {
                    let payload: String = row.get(0)?;
                    let created_at: String = row.get(1)?;
                    Ok((payload, created_at))
                },
            )
            .optional()?;

        row.map(|(payload, created_at)| hydrate_poi(&payload, &created_at))
            .transpose()
    }

    /// Delete every record past its expiry and report how many went.
    /// Maintenance only: the lookup predicates already hide expired rows.
    pub fn sweep_expired_pois(&self) -> rusqlite::Result<usize> {
        let now = Utc::now().to_rfc3339();
        let removed = self
            .conn
            .execute("DELETE FROM pois WHERE expires_at_utc < ?1", params![now])?;
        if removed > 0 {
            tracing::debug!("swept {removed} expired cached places");
        }
        Ok(removed)
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(payload: &str) -> rusqlite::Result<T> {
    serde_json::from_str(payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

/// Decode a cached place row. `tips_count` is always recomputed from the
/// stored tips because the upstream summary counter drifts from the
/// retrievable list, and `fetched_at` reflects when the cache row was
/// created.
fn hydrate_poi(payload: &str, created_at: &str) -> rusqlite::Result<Poi> {
    let mut poi: Poi = decode_payload(payload)?;
    poi.tips_count = poi.tips.len();
    if let Ok(created) = DateTime::parse_from_rfc3339(created_at) {
        poi.fetched_at = created.with_timezone(&Utc);
    }
    Ok(poi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PoiPhoto, PoiTip};

    fn poi(id: &str, lat: f64, lng: f64) -> Poi {
        Poi {
            id: id.to_string(),
            name: "Blue Bottle Coffee".to_string(),
            address: "54 Mint St, San Francisco, CA".to_string(),
            category: "Coffee Shop".to_string(),
            latitude: lat,
            longitude: lng,
            photos: vec![PoiPhoto {
                id: "ph1".to_string(),
                prefix: "https://fastly.4sqi.net/img/general/".to_string(),
                suffix: "/123.jpg".to_string(),
                width: 1920,
                height: 1440,
                classifications: Vec::new(),
            }],
            image_url: Some(
                "https://fastly.4sqi.net/img/general/500x500/123.jpg".to_string(),
            ),
            rating: Some(8.9),
            price: Some(2),
            hours: Some("Open until 6:00 PM".to_string()),
            open_now: Some(true),
            phone: None,
            website: Some("https://bluebottlecoffee.com".to_string()),
            tips: vec![
                PoiTip {
                    text: "Great pour over".to_string(),
                    created_at: Some("2024-11-02T09:00:00Z".to_string()),
                },
                PoiTip {
                    text: "Long line at lunch".to_string(),
                    created_at: None,
                },
            ],
            tips_count: 99, // deliberately wrong; reads must recompute
            popularity: Some(0.97),
            distance: Some(12.0),
            properties: serde_json::json!({"locality": "San Francisco"}),
            source: "foursquare".to_string(),
            fetched_at: Utc::now(),
        }
    }

    fn backdate_expiry(store: &Store, id: &str, days: i64) {
        let past = (Utc::now() - Duration::days(days)).to_rfc3339();
        store
            .conn
            .execute(
                "UPDATE pois SET expires_at_utc = ?2 WHERE id = ?1",
                params![id, past],
            )
            .expect("backdate expiry");
    }

    #[test]
    fn poi_round_trip_recomputes_tips_count() {
        let store = Store::open_in_memory().expect("open store");
        let original = poi("fsq_abc", 37.7897, -122.4000);
        store.upsert_poi(&original).expect("upsert poi");

        let cached = store.get_poi("fsq_abc").expect("lookup").expect("hit");
        assert_eq!(cached.id, original.id);
        assert_eq!(cached.name, original.name);
        assert_eq!(cached.tips, original.tips);
        assert_eq!(cached.tips_count, 2);
    }

    #[test]
    fn location_lookup_buckets_beyond_fourth_decimal() {
        let store = Store::open_in_memory().expect("open store");
        store
            .upsert_poi(&poi("fsq_abc", 37.78971, -122.40003))
            .expect("upsert poi");

        // Differences beyond the 4th decimal land in the same ~11 m cell.
        let hit = store
            .get_poi_by_location(37.78969, -122.40001)
            .expect("lookup");
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().tips_count, 2);

        // A different cell misses.
        let miss = store.get_poi_by_location(37.7907, -122.4000).expect("lookup");
        assert!(miss.is_none());
    }

    #[test]
    fn expired_records_are_invisible_but_sweepable() {
        let store = Store::open_in_memory().expect("open store");
        store.upsert_poi(&poi("stale", 37.0, -122.0)).expect("upsert");
        store.upsert_poi(&poi("fresh", 38.0, -121.0)).expect("upsert");
        backdate_expiry(&store, "stale", 1);

        assert!(store.get_poi("stale").expect("lookup").is_none());
        assert!(store.get_poi_by_location(37.0, -122.0).expect("lookup").is_none());
        assert!(store.get_poi("fresh").expect("lookup").is_some());

        assert_eq!(store.sweep_expired_pois().expect("sweep"), 1);
        assert_eq!(store.sweep_expired_pois().expect("second sweep"), 0);
        assert!(store.get_poi("fresh").expect("lookup").is_some());
    }

    #[test]
    fn upsert_revives_expired_record_and_extends_expiry() {
        let store = Store::open_in_memory().expect("open store");
        store.upsert_poi(&poi("fsq_abc", 37.0, -122.0)).expect("upsert");
        backdate_expiry(&store, "fsq_abc", 3);
        assert!(store.get_poi("fsq_abc").expect("lookup").is_none());

        let mut refreshed = poi("fsq_abc", 37.0, -122.0);
        refreshed.name = "Blue Bottle (renovated)".to_string();
        store.upsert_poi(&refreshed).expect("refresh");

        let cached = store.get_poi("fsq_abc").expect("lookup").expect("hit");
        assert_eq!(cached.name, "Blue Bottle (renovated)");

        let count: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM pois", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn cache_cell_centralizes_rounding() {
        let cell = CacheCell::from_coords(40.712849, -74.006012);
        assert_eq!(cell.lat(), 40.7128);
        assert_eq!(cell.lng(), -74.0060);
        assert_eq!(cell.to_string(), "40.7128,-74.0060");
        assert_eq!(cell, CacheCell::from_coords(40.71281, -74.00604));
    }

    #[test]
    fn events_persist_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("radar.sqlite");

        {
            let store = Store::open(&path).expect("open store");
            let mut event = crate::feeds::sample::sample_events().remove(0);
            event.title = "Edited Title".to_string();
            store.upsert_event(&event).expect("upsert");
        }

        let store = Store::open(&path).expect("reopen store");
        let seeded = store.list_events().expect("list");
        assert!(!seeded.is_empty());
        let edited = seeded.iter().find(|e| e.title == "Edited Title");
        assert!(edited.is_some());
    }

    #[test]
    fn seeded_store_serves_sample_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("radar.sqlite")).expect("open store");
        let events = store.list_events().expect("list");
        assert_eq!(events.len(), crate::feeds::sample::sample_events().len());

        let first = &events[0];
        let fetched = store.get_event(&first.id).expect("get event");
        assert_eq!(fetched.title, first.title);
    }
}
