use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quality {
    SD,
    HD,
    FHD,
    #[serde(rename = "4K")]
    UHD,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::SD, Quality::HD, Quality::FHD, Quality::UHD];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::SD => "SD",
            Quality::HD => "HD",
            Quality::FHD => "FHD",
            Quality::UHD => "4K",
        }
    }

    pub fn parse(s: &str) -> Option<Quality> {
        Quality::ALL.iter().copied().find(|q| q.as_str() == s)
    }

    pub fn description(self) -> &'static str {
        match self {
            Quality::SD => "Standard Definition (480p)",
            Quality::HD => "High Definition (720p)",
            Quality::FHD => "Full HD (1080p)",
            Quality::UHD => "4K Ultra HD (2160p)",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RentalDuration {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "1mo")]
    Month,
    #[serde(rename = "lifetime")]
    Lifetime,
}

impl RentalDuration {
    pub const ALL: [RentalDuration; 4] = [
        RentalDuration::Day,
        RentalDuration::Week,
        RentalDuration::Month,
        RentalDuration::Lifetime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RentalDuration::Day => "24h",
            RentalDuration::Week => "7d",
            RentalDuration::Month => "1mo",
            RentalDuration::Lifetime => "lifetime",
        }
    }

    pub fn parse(s: &str) -> Option<RentalDuration> {
        RentalDuration::ALL.iter().copied().find(|d| d.as_str() == s)
    }

    pub fn label(self) -> &'static str {
        match self {
            RentalDuration::Day => "24 Hours",
            RentalDuration::Week => "7 Days",
            RentalDuration::Month => "1 Month",
            RentalDuration::Lifetime => "Lifetime",
        }
    }

    pub fn purchase_type(self) -> PurchaseType {
        match self {
            RentalDuration::Lifetime => PurchaseType::Buy,
            _ => PurchaseType::Rent,
        }
    }

    /// Expiry of a grant bought at `from`, or `None` for lifetime purchases.
    ///
    /// A month is a calendar month, so a rental bought on Jan 31st runs out on
    /// the last day of February.
    pub fn expiry_from(self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RentalDuration::Day => Some(from + Duration::hours(24)),
            RentalDuration::Week => Some(from + Duration::days(7)),
            RentalDuration::Month => from.checked_add_months(Months::new(1)),
            RentalDuration::Lifetime => None,
        }
    }
}

impl fmt::Display for RentalDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseType {
    Rent,
    Buy,
}

/// Stored user record. The id is the sled key and not part of the value.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// What the session cookie carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionUser {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CastMember {
    pub name: String,
    pub character: String,
    pub profile_path: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f32,
    pub runtime: u32,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    pub director: Option<String>,
    pub trailer_key: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CartItem {
    pub id: u64,
    pub title: String,
    pub poster_path: String,
    #[serde(rename = "type")]
    pub kind: PurchaseType,
    pub price: u32,
    pub quality: Quality,
    pub duration: RentalDuration,
}

impl CartItem {
    pub fn key(&self) -> (u64, Quality, RentalDuration) {
        (self.id, self.quality, self.duration)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub id: u64,
    pub title: String,
    pub poster_path: String,
    #[serde(rename = "type")]
    pub kind: PurchaseType,
    pub purchase_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    pub quality: Quality,
    pub price: u32,
}

impl LibraryItem {
    pub fn key(&self) -> (u64, Quality, PurchaseType) {
        (self.id, self.quality, self.kind)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_date {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WatchlistItem {
    pub id: u64,
    pub title: String,
    pub poster_path: String,
    pub overview: String,
    pub release_date: String,
    pub vote_average: f32,
}

impl From<&Movie> for WatchlistItem {
    fn from(movie: &Movie) -> Self {
        WatchlistItem {
            id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_path.clone(),
            overview: movie.overview.clone(),
            release_date: movie.release_date.clone(),
            vote_average: movie.vote_average,
        }
    }
}

/// Account preferences from the settings page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub sms_notifications: bool,
    pub profile_visible: bool,
    pub share_watch_history: bool,
    pub download_quality: Quality,
}

impl Settings {
    pub const DOWNLOAD_QUALITIES: [Quality; 3] = [Quality::FHD, Quality::HD, Quality::SD];
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            email_notifications: true,
            push_notifications: false,
            sms_notifications: false,
            profile_visible: true,
            share_watch_history: false,
            download_quality: Quality::FHD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rental_expiry() {
        let t = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            RentalDuration::Day.expiry_from(t),
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(
            RentalDuration::Week.expiry_from(t),
            Some(Utc.with_ymd_and_hms(2024, 2, 7, 12, 0, 0).unwrap())
        );
        assert_eq!(
            RentalDuration::Month.expiry_from(t),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );
        assert_eq!(RentalDuration::Lifetime.expiry_from(t), None);
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&Quality::UHD).unwrap(), "\"4K\"");
        assert_eq!(serde_json::to_string(&RentalDuration::Month).unwrap(), "\"1mo\"");
        assert_eq!(serde_json::to_string(&PurchaseType::Rent).unwrap(), "\"rent\"");
        assert_eq!(Quality::parse("FHD"), Some(Quality::FHD));
        assert_eq!(RentalDuration::parse("forever"), None);
    }

    #[test]
    fn quality_order() {
        assert!(Quality::SD < Quality::HD);
        assert!(Quality::FHD < Quality::UHD);
    }
}
