use chrono::{TimeZone, Utc};
use serde_json::json;

use super::{stable_event_id, EventFeed};
use crate::models::{Event, EventStatus, EventType, Platform};

/// Bundled events served until the platform crawlers land, and used to seed
/// an empty store.
pub struct SampleFeed;

impl EventFeed for SampleFeed {
    fn feed_id(&self) -> &'static str {
        "sample"
    }

    fn feed_name(&self) -> &'static str {
        "Bundled sample events"
    }

    fn fetch(&self) -> anyhow::Result<Vec<Event>> {
        Ok(sample_events())
    }
}

struct SampleSpec {
    title: &'static str,
    source: Platform,
    source_id: &'static str,
    category: &'static str,
    event_type: EventType,
    price: Option<&'static str>,
    venue: Option<(&'static str, &'static str, &'static str, &'static str)>, // name, address, lat, lng
    starts: (u32, u32, u32), // month, day, hour (UTC)
    rsvp: (Option<i64>, Option<i64>, Option<i64>), // total, count, waitlist
}

pub fn sample_events() -> Vec<Event> {
    let specs = [
        SampleSpec {
            title: "Rust NYC: Systems Programming Night",
            source: Platform::Meetup,
            source_id: "mtp-rust-nyc-288",
            category: "Technology",
            event_type: EventType::Physical,
            price: Some("Free"),
            venue: Some((
                "Industry City",
                "220 36th St, Brooklyn, NY",
                "40.6565",
                "-74.0093",
            )),
            starts: (10, 8, 23),
            rsvp: (Some(120), Some(87), Some(0)),
        },
        SampleSpec {
            title: "Brooklyn Jazz Collective Live",
            source: Platform::Eventbrite,
            source_id: "evb-bkjazz-5512",
            category: "Music & Arts",
            event_type: EventType::Physical,
            price: Some("$20"),
            venue: Some((
                "BRIC House",
                "647 Fulton St, Brooklyn, NY",
                "40.6869",
                "-73.9786",
            )),
            starts: (10, 14, 0),
            rsvp: (Some(200), Some(143), Some(0)),
        },
        SampleSpec {
            title: "Scaling Data Platforms: A Fireside Chat",
            source: Platform::Linkedin,
            source_id: "li-dataplat-091",
            category: "Professional Development",
            event_type: EventType::Virtual,
            price: Some("Free"),
            venue: None,
            starts: (10, 20, 17),
            rsvp: (None, None, None),
        },
        SampleSpec {
            title: "Founders & Funders Autumn Summit",
            source: Platform::Luma,
            source_id: "luma-ffsummit-26",
            category: "Professional Networking",
            event_type: EventType::Hybrid,
            price: Some("$149"),
            venue: Some((
                "Convene Midtown",
                "117 W 46th St, New York, NY",
                "40.7580",
                "-73.9818",
            )),
            starts: (11, 5, 14),
            rsvp: (Some(350), Some(350), Some(42)),
        },
        SampleSpec {
            title: "Sunrise Yoga in Central Park",
            source: Platform::Eventbrite,
            source_id: "evb-sunyoga-77",
            category: "Health & Wellness",
            event_type: EventType::Physical,
            price: Some("Free admission"),
            venue: Some((
                "Sheep Meadow",
                "Central Park, New York, NY",
                "40.7712",
                "-73.9762",
            )),
            starts: (9, 28, 11),
            rsvp: (Some(60), Some(24), Some(0)),
        },
        SampleSpec {
            title: "Taste of Queens Food Crawl",
            source: Platform::Meetup,
            source_id: "mtp-foodcrawl-412",
            category: "Food & Drink",
            event_type: EventType::Physical,
            price: None,
            venue: Some((
                "Queens Night Market",
                "47-01 111th St, Corona, NY",
                "40.7466",
                "-73.8522",
            )),
            starts: (10, 3, 22),
            rsvp: (Some(40), Some(40), Some(8)),
        },
    ];

    specs.into_iter().map(build_sample).collect()
}

fn build_sample(spec: SampleSpec) -> Event {
    let (month, day, hour) = spec.starts;
    let starts_at = Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).single();
    let (venue_name, venue_address, latitude, longitude) = match spec.venue {
        Some((name, address, lat, lng)) => (
            Some(name.to_string()),
            Some(address.to_string()),
            Some(lat.to_string()),
            Some(lng.to_string()),
        ),
        None => (None, None, None, None),
    };
    let (rsvp_total, rsvp_count, wait_list_count) = spec.rsvp;

    Event {
        id: stable_event_id(spec.source, spec.source_id, starts_at),
        title: spec.title.to_string(),
        description: None,
        venue_name,
        venue_address,
        latitude,
        longitude,
        city: Some("New York".to_string()),
        state: Some("NY".to_string()),
        country: Some("US".to_string()),
        starts_at,
        ends_at: starts_at.map(|dt| dt + chrono::Duration::hours(2)),
        organizer: None,
        category: Some(spec.category.to_string()),
        tags: Vec::new(),
        price: spec.price.map(str::to_string),
        ticket_url: None,
        event_url: None,
        image_url: None,
        event_type: Some(spec.event_type),
        status: Some(EventStatus::Active),
        rsvp_total,
        rsvp_count,
        wait_list_count,
        source: Some(spec.source),
        source_id: Some(spec.source_id.to_string()),
        raw_data: json!({"feed": "sample"}),
    }
}
