use crate::model::{CartItem, LibraryItem, PurchaseType, Quality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct Library {
    items: Vec<LibraryItem>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed purchase of `item` at `now`.
    ///
    /// Buying a rental again with the same (id, quality) restarts its rental
    /// period; buying an owned title again changes nothing.
    pub fn add(&mut self, item: &CartItem, now: DateTime<Utc>) {
        let expiry_date = match item.kind {
            PurchaseType::Rent => item.duration.expiry_from(now),
            PurchaseType::Buy => None,
        };
        let key = (item.id, item.quality, item.kind);
        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
            if item.kind == PurchaseType::Rent {
                existing.purchase_date = now;
                existing.expiry_date = expiry_date;
            }
            return;
        }
        self.items.push(LibraryItem {
            id: item.id,
            title: item.title.clone(),
            poster_path: item.poster_path.clone(),
            kind: item.kind,
            purchase_date: now,
            expiry_date,
            quality: item.quality,
            price: item.price,
        });
    }

    pub fn remove(&mut self, id: u64, quality: Quality, kind: PurchaseType) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key() != (id, quality, kind));
        self.items.len() != before
    }

    pub fn contains(&self, id: u64) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn get(&self, id: u64) -> Option<&LibraryItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// The grant that decides what the player may do for `id`.
    ///
    /// Owned copies win over rentals, then higher quality wins. When every
    /// grant has run out the most recently expired rental is returned.
    pub fn best_access(&self, id: u64, now: DateTime<Utc>) -> Option<&LibraryItem> {
        let grants = self.items.iter().filter(|i| i.id == id);
        let active = grants
            .clone()
            .filter(|i| !i.is_expired(now))
            .max_by_key(|i| (i.kind == PurchaseType::Buy, i.quality));
        active.or_else(|| grants.max_by_key(|i| i.expiry_date))
    }

    pub fn rented(&self) -> impl Iterator<Item = &LibraryItem> {
        self.items.iter().filter(|i| i.kind == PurchaseType::Rent)
    }

    pub fn owned(&self) -> impl Iterator<Item = &LibraryItem> {
        self.items.iter().filter(|i| i.kind == PurchaseType::Buy)
    }

    pub fn items(&self) -> &[LibraryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RentalDuration;
    use crate::pricing::price;
    use chrono::{Duration, TimeZone};

    fn item(id: u64, quality: Quality, duration: RentalDuration) -> CartItem {
        CartItem {
            id,
            title: format!("Movie {}", id),
            poster_path: String::new(),
            kind: duration.purchase_type(),
            price: price(quality, duration),
            quality,
            duration,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn rental_gets_expiry() {
        let mut library = Library::new();
        library.add(&item(42, Quality::HD, RentalDuration::Week), t0());
        let entry = library.get(42).unwrap();
        assert_eq!(entry.kind, PurchaseType::Rent);
        assert_eq!(entry.price, 59);
        assert_eq!(entry.expiry_date, Some(t0() + Duration::days(7)));
    }

    #[test]
    fn purchase_never_expires() {
        let mut library = Library::new();
        library.add(&item(1, Quality::SD, RentalDuration::Lifetime), t0());
        let entry = library.get(1).unwrap();
        assert_eq!(entry.expiry_date, None);
        assert!(!entry.is_expired(t0() + Duration::days(365 * 50)));
    }

    #[test]
    fn renting_again_refreshes_expiry() {
        let mut library = Library::new();
        library.add(&item(3, Quality::HD, RentalDuration::Day), t0());
        let later = t0() + Duration::days(3);
        library.add(&item(3, Quality::HD, RentalDuration::Week), later);
        assert_eq!(library.len(), 1);
        let entry = library.get(3).unwrap();
        assert_eq!(entry.purchase_date, later);
        assert_eq!(entry.expiry_date, Some(later + Duration::days(7)));
    }

    #[test]
    fn buying_again_is_a_no_op() {
        let mut library = Library::new();
        library.add(&item(3, Quality::HD, RentalDuration::Lifetime), t0());
        library.add(
            &item(3, Quality::HD, RentalDuration::Lifetime),
            t0() + Duration::days(1),
        );
        assert_eq!(library.len(), 1);
        assert_eq!(library.get(3).unwrap().purchase_date, t0());
    }

    #[test]
    fn best_access_prefers_owned_then_quality() {
        let mut library = Library::new();
        library.add(&item(5, Quality::UHD, RentalDuration::Day), t0());
        library.add(&item(5, Quality::SD, RentalDuration::Lifetime), t0());
        library.add(&item(5, Quality::FHD, RentalDuration::Week), t0());
        let best = library.best_access(5, t0()).unwrap();
        assert_eq!((best.kind, best.quality), (PurchaseType::Buy, Quality::SD));
    }

    #[test]
    fn best_access_reports_latest_expired_rental() {
        let mut library = Library::new();
        library.add(&item(6, Quality::UHD, RentalDuration::Day), t0());
        library.add(&item(6, Quality::SD, RentalDuration::Week), t0());
        let now = t0() + Duration::days(2);
        let best = library.best_access(6, now).unwrap();
        assert_eq!(best.quality, Quality::SD);
        let now = t0() + Duration::days(8);
        let best = library.best_access(6, now).unwrap();
        assert!(best.is_expired(now));
        assert_eq!(best.quality, Quality::SD);
        assert!(library.best_access(7, now).is_none());
    }

    #[test]
    fn remove_and_filters() {
        let mut library = Library::new();
        library.add(&item(1, Quality::HD, RentalDuration::Day), t0());
        library.add(&item(1, Quality::HD, RentalDuration::Lifetime), t0());
        assert_eq!(library.rented().count(), 1);
        assert_eq!(library.owned().count(), 1);
        assert!(library.remove(1, Quality::HD, PurchaseType::Rent));
        assert_eq!(library.len(), 1);
        assert!(library.contains(1));
    }
}
