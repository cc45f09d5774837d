//! User notification preferences and their merge semantics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{Category, Priority};

/// Per-category delivery settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPreference {
    pub enabled: bool,
    pub email: bool,
    pub min_priority: Priority,
}

impl CategoryPreference {
    /// Factory defaults for a category
    pub fn default_for(category: Category) -> Self {
        let (email, min_priority) = match category {
            Category::System => (true, Priority::Low),
            Category::Task => (true, Priority::Medium),
            Category::Livestock => (true, Priority::Medium),
            Category::Inventory => (false, Priority::High),
            Category::Order => (true, Priority::Medium),
            Category::Finance => (true, Priority::High),
        };

        Self {
            enabled: true,
            email,
            min_priority,
        }
    }
}

/// Global and per-category notification preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub enable_sound: bool,
    pub enable_email: bool,
    pub do_not_disturb: bool,
    pub categories: BTreeMap<Category, CategoryPreference>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enable_sound: true,
            enable_email: true,
            do_not_disturb: false,
            categories: default_categories(),
        }
    }
}

fn default_categories() -> BTreeMap<Category, CategoryPreference> {
    Category::ALL
        .iter()
        .map(|c| (*c, CategoryPreference::default_for(*c)))
        .collect()
}

impl NotificationPreferences {
    /// Settings for a category, falling back to defaults if absent
    pub fn category(&self, category: Category) -> CategoryPreference {
        self.categories
            .get(&category)
            .copied()
            .unwrap_or_else(|| CategoryPreference::default_for(category))
    }

    /// Apply a shallow, top-level merge.
    ///
    /// A supplied `categories` map replaces the current map as a whole.
    /// Categories missing from it are reset to their defaults.
    pub fn merge(&mut self, patch: PreferencesPatch) {
        if let Some(enable_sound) = patch.enable_sound {
            self.enable_sound = enable_sound;
        }

        if let Some(enable_email) = patch.enable_email {
            self.enable_email = enable_email;
        }

        if let Some(do_not_disturb) = patch.do_not_disturb {
            self.do_not_disturb = do_not_disturb;
        }

        if let Some(categories) = patch.categories {
            let mut merged = default_categories();
            merged.extend(categories);
            self.categories = merged;
        }
    }

    /// Fill in any category missing after deserialization
    pub(crate) fn normalize(mut self) -> Self {
        for category in Category::ALL {
            self.categories
                .entry(category)
                .or_insert_with(|| CategoryPreference::default_for(category));
        }
        self
    }
}

/// Partial preferences update; absent keys are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_sound: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_email: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_not_disturb: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeMap<Category, CategoryPreference>>,
}

impl PreferencesPatch {
    pub fn do_not_disturb(value: bool) -> Self {
        Self {
            do_not_disturb: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.enable_sound.is_none()
            && self.enable_email.is_none()
            && self.do_not_disturb.is_none()
            && self.categories.is_none()
    }
}
