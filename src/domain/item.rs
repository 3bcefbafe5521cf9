use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptor for one stack of discrete items. Occupies one offer slot and
/// one container slot regardless of count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Stable item type identifier (e.g., "iron_sword")
    pub item_id: String,
    /// Display name
    pub name: String,
    /// Stack size
    pub count: u32,
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>, name: impl Into<String>, count: u32) -> Self {
        Self {
            item_id: item_id.into(),
            name: name.into(),
            count,
        }
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x {}", self.count, self.name)
    }
}

/// Textual summary of an item bundle for history and journal entries
pub fn describe_items(items: &[ItemStack]) -> String {
    if items.is_empty() {
        return "nothing".to_string();
    }
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
