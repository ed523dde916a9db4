use crate::model::WatchlistItem;

#[derive(Debug, Default, Clone)]
pub struct Watchlist {
    items: Vec<WatchlistItem>,
}

impl Watchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: WatchlistItem) -> bool {
        if self.contains(item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    pub fn contains(&self, id: u64) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn items(&self) -> &[WatchlistItem] {
        &self.items
    }
}
