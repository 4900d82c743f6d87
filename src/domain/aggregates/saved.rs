//! Client-side saved product lists: wishlist and comparison.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_COMPARE: usize = 4;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist { items: Vec<Uuid> }

impl Wishlist {
    pub fn items(&self) -> &[Uuid] { &self.items }
    pub fn contains(&self, id: Uuid) -> bool { self.items.contains(&id) }
    pub fn add(&mut self, id: Uuid) { if !self.contains(id) { self.items.push(id); } }
    pub fn remove(&mut self, id: Uuid) { self.items.retain(|i| *i != id); }
    pub fn toggle(&mut self, id: Uuid) { if self.contains(id) { self.remove(id) } else { self.add(id) } }
    pub fn clear(&mut self) { self.items.clear(); }
}

/// At most [`MAX_COMPARE`] products side by side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompareList { items: Vec<Uuid> }

impl CompareList {
    pub fn items(&self) -> &[Uuid] { &self.items }
    pub fn contains(&self, id: Uuid) -> bool { self.items.contains(&id) }

    /// Returns false when the list is full.
    pub fn add(&mut self, id: Uuid) -> bool {
        if self.contains(id) { return true; }
        if self.items.len() >= MAX_COMPARE { return false; }
        self.items.push(id);
        true
    }

    pub fn remove(&mut self, id: Uuid) { self.items.retain(|i| *i != id); }

    pub fn toggle(&mut self, id: Uuid) -> bool {
        if self.contains(id) { self.remove(id); return true; }
        self.add(id)
    }

    pub fn clear(&mut self) { self.items.clear(); }
}
