use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form health metrics attached to a profile. Groups and fields are
/// all optional; see `assembler::render_metrics` for the recognised ones.
pub type HealthSnapshot = Map<String, Value>;

pub type FragmentMap = BTreeMap<String, Fragment>;

pub type Profiles = BTreeMap<String, Profile>;

/// One editable block of instruction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub prompt: String,
    /// Category-specific fields (`wordLimit`, `days`, `keywords`, ...) kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Fragment {
    pub fn new(name: &str, description: Option<&str>, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            prompt: prompt.to_string(),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub personas: FragmentMap,
    pub phases: FragmentMap,
    pub emotions: FragmentMap,
    pub global_rules: Fragment,
}

impl Configuration {
    /// Top-level keys every imported document must carry.
    pub const SECTIONS: [&'static str; 4] = ["personas", "phases", "emotions", "globalRules"];

    pub fn category(&self, category: Category) -> &FragmentMap {
        match category {
            Category::Persona => &self.personas,
            Category::Phase => &self.phases,
            Category::Emotion => &self.emotions,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut FragmentMap {
        match category {
            Category::Persona => &mut self.personas,
            Category::Phase => &mut self.phases,
            Category::Emotion => &mut self.emotions,
        }
    }

    /// Names of categories that hold no fragments.
    pub fn empty_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.category(*c).is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Persona,
    Phase,
    Emotion,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Persona, Category::Phase, Category::Emotion];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "persona" | "personas" => Some(Category::Persona),
            "phase" | "phases" => Some(Category::Phase),
            "emotion" | "emotions" => Some(Category::Emotion),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Persona => "persona",
            Category::Phase => "phase",
            Category::Emotion => "emotion",
        };
        f.write_str(s)
    }
}

/// Addresses a single prompt inside a `Configuration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentRef {
    Keyed { category: Category, key: String },
    GlobalRules,
}

impl fmt::Display for FragmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentRef::Keyed { category, key } => write!(f, "{category} '{key}'"),
            FragmentRef::GlobalRules => f.write_str("global rules"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub persona: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_snapshot: Option<HealthSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub persona: String,
    pub phase: String,
    pub emotion: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default)]
    pub error: bool,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata: None,
            error: false,
        }
    }

    pub fn assistant(content: String, metadata: MessageMetadata) -> Self {
        Self {
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            metadata: Some(metadata),
            error: false,
        }
    }

    pub fn failure(content: String) -> Self {
        Self {
            role: Role::Assistant,
            content,
            timestamp: Utc::now(),
            metadata: None,
            error: true,
        }
    }
}

/// The single remote row mirroring local state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    pub prompt_config: Configuration,
    pub test_profiles: Profiles,
    pub updated_at: DateTime<Utc>,
}
