use crate::model::{CartItem, Quality, RentalDuration};

#[derive(Debug, Default, Clone)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if an item with the same (id, quality, duration) is
    /// already in the cart.
    pub fn add(&mut self, item: CartItem) -> bool {
        if self.items.iter().any(|i| i.key() == item.key()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, id: u64, quality: Quality, duration: RentalDuration) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key() != (id, quality, duration));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn total(&self) -> u32 {
        self.items.iter().map(|i| i.price).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
