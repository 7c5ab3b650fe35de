use serde::{Deserialize, Serialize};

/// The full, sorted, deduplicated list of item names held by a basket.
pub type Collection = Vec<String>;

/// Case-folded form of an item name. Two names with the same key are the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

pub fn same_item(left: &str, right: &str) -> bool {
    ItemKey::new(left) == ItemKey::new(right)
}

pub fn position_of(items: &[String], name: &str) -> Option<usize> {
    let key = ItemKey::new(name);
    items.iter().position(|item| ItemKey::new(item) == key)
}

pub fn sorted_collection(items: &[String]) -> Collection {
    let mut sorted = items.to_vec();
    sorted.sort();
    sorted
}
