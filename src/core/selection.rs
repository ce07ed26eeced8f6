use super::defaults::{DEFAULT_EMOTION, DEFAULT_PERSONA, DEFAULT_PHASE, DEFAULT_PROFILE};
use super::model::{Category, Configuration, Profiles};
use std::collections::BTreeMap;

/// The four keys that decide which fragments get assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub profile: String,
    pub persona: String,
    pub phase: String,
    pub emotion: String,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            phase: DEFAULT_PHASE.to_string(),
            emotion: DEFAULT_EMOTION.to_string(),
        }
    }
}

impl Selection {
    pub fn key(&self, category: Category) -> &str {
        match category {
            Category::Persona => &self.persona,
            Category::Phase => &self.phase,
            Category::Emotion => &self.emotion,
        }
    }

    pub fn set_key(&mut self, category: Category, key: String) {
        match category {
            Category::Persona => self.persona = key,
            Category::Phase => self.phase = key,
            Category::Emotion => self.emotion = key,
        }
    }

    /// Points every key that no longer resolves at its category default.
    ///
    /// Returns true if anything changed. Categories are expected to be
    /// non-empty; a key into an empty map is left untouched.
    pub fn repair(&mut self, config: &Configuration, profiles: &Profiles) -> bool {
        let mut changed = false;

        for category in Category::ALL {
            let map = config.category(category);
            if let Some(fallback) = fallback_key(map, self.key(category), default_key(category)) {
                log::info!(
                    "Selected {category} '{}' no longer exists, falling back to '{fallback}'",
                    self.key(category)
                );
                self.set_key(category, fallback);
                changed = true;
            }
        }

        if let Some(fallback) = fallback_key(profiles, &self.profile, DEFAULT_PROFILE) {
            log::info!("Selected profile '{}' no longer exists, falling back to '{fallback}'", self.profile);
            self.profile = fallback;
            changed = true;
        }

        changed
    }
}

fn default_key(category: Category) -> &'static str {
    match category {
        Category::Persona => DEFAULT_PERSONA,
        Category::Phase => DEFAULT_PHASE,
        Category::Emotion => DEFAULT_EMOTION,
    }
}

/// `None` when `current` resolves; otherwise the built-in default if present,
/// else the first key in order.
fn fallback_key<V>(map: &BTreeMap<String, V>, current: &str, preferred: &str) -> Option<String> {
    if map.contains_key(current) {
        return None;
    }
    if map.contains_key(preferred) {
        return Some(preferred.to_string());
    }
    map.keys().next().cloned()
}
