use constants::category::{CATEGORY_MAP, get_category_label};
use serde::{Deserialize, Serialize};

/// Maps a category id to its display color and label prefix.
pub trait CategoryStyle: Send + Sync {
    fn color(&self, category: &str) -> [f32; 3];
    fn label_prefix(&self, category: &str) -> String;

    fn label(&self, category: &str, contained_points: usize) -> String {
        format!("{} {}", self.label_prefix(category), contained_points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: String,
    pub label: String,
    pub color: [f32; 3],
}

/// Table-backed style. Unlisted ids fall back to the built-in categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryTable {
    entries: Vec<CategoryEntry>,
}

impl CategoryTable {
    pub fn new(entries: Vec<CategoryEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_entries())
    }

    fn find(&self, id: &str) -> Option<&CategoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

pub fn builtin_entries() -> Vec<CategoryEntry> {
    CATEGORY_MAP
        .iter()
        .map(|c| CategoryEntry {
            id: c.id.to_string(),
            label: c.label.to_string(),
            color: c.color,
        })
        .collect()
}

impl CategoryStyle for CategoryTable {
    fn color(&self, category: &str) -> [f32; 3] {
        self.find(category)
            .map(|entry| entry.color)
            .or_else(|| constants::category::get_category(category).map(|c| c.color))
            .unwrap_or(constants::render_settings::INACTIVE_COLOR)
    }

    fn label_prefix(&self, category: &str) -> String {
        self.find(category)
            .map(|entry| entry.label.clone())
            .unwrap_or_else(|| get_category_label(category))
    }
}
