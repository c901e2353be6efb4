//! Cache records produced by the format parsers.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geocache {
    pub geocode: String,
    pub name: String,
    pub owner: Option<String>,
    pub cache_type: CacheType,
    pub size: CacheSize,
    /// x = longitude, y = latitude (WGS84)
    pub coords: Option<Point>,
    pub difficulty: Option<f32>,
    pub terrain: Option<f32>,
    pub hidden: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub hint: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub disabled: bool,
    pub inventory: Option<Vec<Trackable>>,
    /// Derived from `inventory` by `finalize_record`.
    #[serde(default)]
    pub inventory_items: usize,
    pub updated: Option<DateTime<Utc>>,
    pub detailed_update: Option<DateTime<Utc>>,
}

impl Geocache {
    pub fn new(geocode: impl Into<String>) -> Self {
        Geocache {
            geocode: geocode.into(),
            ..Default::default()
        }
    }
}

/// A trackable item (travel bug, geocoin) sitting in a cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trackable {
    /// Tracking reference, e.g. `TB1A2B3`.
    pub geocode: Option<String>,
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheType {
    Traditional,
    Multi,
    Mystery,
    Letterbox,
    Event,
    Mega,
    Giga,
    Cito,
    Earth,
    Virtual,
    Webcam,
    Wherigo,
    #[default]
    Unknown,
}

impl CacheType {
    /// Parse a Groundspeak type name ("Traditional Cache", "Multi-cache", ...).
    /// A GPX `Geocache|` prefix is accepted and stripped.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let name = name.strip_prefix("Geocache|").unwrap_or(name);
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "traditional cache" | "traditional" => CacheType::Traditional,
            "multi-cache" | "multi cache" | "multicache" | "multi" => CacheType::Multi,
            "unknown cache" | "mystery cache" | "mystery" | "puzzle" => CacheType::Mystery,
            "letterbox hybrid" | "letterbox" => CacheType::Letterbox,
            "event cache" | "event" => CacheType::Event,
            "mega-event cache" | "mega-event" => CacheType::Mega,
            "giga-event cache" | "giga-event" => CacheType::Giga,
            "cache in trash out event" | "cito" => CacheType::Cito,
            "earthcache" | "earth cache" => CacheType::Earth,
            "virtual cache" | "virtual" => CacheType::Virtual,
            "webcam cache" | "webcam" => CacheType::Webcam,
            "wherigo cache" | "wherigo" => CacheType::Wherigo,
            _ => CacheType::Unknown,
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CacheType::Traditional => "Traditional",
            CacheType::Multi => "Multi-cache",
            CacheType::Mystery => "Mystery",
            CacheType::Letterbox => "Letterbox",
            CacheType::Event => "Event",
            CacheType::Mega => "Mega-Event",
            CacheType::Giga => "Giga-Event",
            CacheType::Cito => "CITO",
            CacheType::Earth => "EarthCache",
            CacheType::Virtual => "Virtual",
            CacheType::Webcam => "Webcam",
            CacheType::Wherigo => "Wherigo",
            CacheType::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheSize {
    NotChosen,
    Micro,
    Small,
    Regular,
    Large,
    Virtual,
    Other,
    #[default]
    Unknown,
}

impl CacheSize {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "not chosen" | "not_chosen" => CacheSize::NotChosen,
            "micro" => CacheSize::Micro,
            "small" => CacheSize::Small,
            "regular" | "medium" => CacheSize::Regular,
            "large" => CacheSize::Large,
            "virtual" => CacheSize::Virtual,
            "other" => CacheSize::Other,
            _ => CacheSize::Unknown,
        }
    }

    /// Numeric container codes used by geocaching.com LOC exports.
    pub fn from_loc_code(code: u8) -> Self {
        match code {
            1 => CacheSize::NotChosen,
            2 => CacheSize::Micro,
            3 => CacheSize::Regular,
            4 => CacheSize::Large,
            5 => CacheSize::Virtual,
            6 => CacheSize::Other,
            8 => CacheSize::Small,
            _ => CacheSize::Unknown,
        }
    }
}
