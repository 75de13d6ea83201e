use crate::{ItemId, RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
}

impl Item {
    pub fn new(id: ItemId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { id, title: title.into(), description: description.into() }
    }
}

/// Ordered items. Position in the corpus is the row used by the feature and
/// similarity matrices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    items: Vec<Item>,
    rows: HashMap<ItemId, usize>,
}

impl Corpus {
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut rows = HashMap::with_capacity(items.len());
        for (row, item) in items.iter().enumerate() {
            if rows.insert(item.id, row).is_some() {
                return Err(RecommendError::DuplicateItem(item.id));
            }
        }
        Ok(Self { items, rows })
    }

    pub fn items(&self) -> &[Item] { &self.items }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn row_of(&self, id: ItemId) -> Option<usize> { self.rows.get(&id).copied() }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.row_of(id).map(|row| &self.items[row])
    }

    pub fn into_items(self) -> Vec<Item> { self.items }
}
