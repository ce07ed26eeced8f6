use super::defaults::{default_configuration, default_profiles};
use super::model::{Category, Configuration, Fragment, FragmentRef, Profile, Profiles};
use crate::error::WorkbenchError;
use serde_json::Value;
use std::sync::Arc;

/// An immutable view of one store version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub config: Arc<Configuration>,
    pub profiles: Arc<Profiles>,
}

/// What an import changed, for the caller to report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub personas: usize,
    pub phases: usize,
    pub emotions: usize,
    /// Top-level keys that were not part of the configuration and got dropped.
    pub ignored_keys: Vec<String>,
    /// Set by the session when the import forced a selection change.
    pub selection_repaired: bool,
}

/// Holds the current configuration and profiles.
///
/// Values are never mutated in place: the `set_*` operations return a new
/// value and `replace_*` installs it as the next version.
#[derive(Debug, Clone)]
pub struct FragmentStore {
    version: u64,
    config: Arc<Configuration>,
    profiles: Arc<Profiles>,
}

impl Default for FragmentStore {
    fn default() -> Self {
        Self::new(default_configuration(), default_profiles())
    }
}

impl FragmentStore {
    pub fn new(config: Configuration, profiles: Profiles) -> Self {
        Self {
            version: 0,
            config: Arc::new(config),
            profiles: Arc::new(profiles),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn configuration(&self) -> Arc<Configuration> {
        Arc::clone(&self.config)
    }

    pub fn profiles(&self) -> Arc<Profiles> {
        Arc::clone(&self.profiles)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            config: self.configuration(),
            profiles: self.profiles(),
        }
    }

    pub fn get_fragment(&self, category: Category, key: &str) -> Result<&Fragment, WorkbenchError> {
        self.config
            .category(category)
            .get(key)
            .ok_or_else(|| WorkbenchError::NotFound(format!("{category} '{key}'")))
    }

    pub fn global_rules(&self) -> &Fragment {
        &self.config.global_rules
    }

    pub fn fragment(&self, target: &FragmentRef) -> Result<&Fragment, WorkbenchError> {
        match target {
            FragmentRef::Keyed { category, key } => self.get_fragment(*category, key),
            FragmentRef::GlobalRules => Ok(self.global_rules()),
        }
    }

    pub fn profile(&self, key: &str) -> Result<&Profile, WorkbenchError> {
        self.profiles
            .get(key)
            .ok_or_else(|| WorkbenchError::NotFound(format!("profile '{key}'")))
    }

    /// Copy of the configuration with one prompt replaced.
    pub fn set_fragment_prompt(&self, target: &FragmentRef, prompt: &str) -> Result<Configuration, WorkbenchError> {
        let mut next = (*self.config).clone();
        let fragment = match target {
            FragmentRef::Keyed { category, key } => next
                .category_mut(*category)
                .get_mut(key)
                .ok_or_else(|| WorkbenchError::NotFound(format!("{category} '{key}'")))?,
            FragmentRef::GlobalRules => &mut next.global_rules,
        };
        fragment.prompt = prompt.to_string();
        Ok(next)
    }

    pub fn set_profile_context(&self, key: &str, context: &str) -> Result<Profiles, WorkbenchError> {
        let mut next = (*self.profiles).clone();
        next.get_mut(key)
            .ok_or_else(|| WorkbenchError::NotFound(format!("profile '{key}'")))?
            .context = context.to_string();
        Ok(next)
    }

    /// Parses `raw` as a health snapshot. Blank input clears it.
    pub fn set_profile_health_snapshot(&self, key: &str, raw: &str) -> Result<Profiles, WorkbenchError> {
        let snapshot = if raw.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Some(map),
                Ok(other) => {
                    return Err(WorkbenchError::InvalidPayload(format!(
                        "health data must be a JSON object, got {}",
                        json_kind(&other)
                    )));
                }
                Err(e) => return Err(WorkbenchError::InvalidPayload(e.to_string())),
            }
        };

        let mut next = (*self.profiles).clone();
        next.get_mut(key)
            .ok_or_else(|| WorkbenchError::NotFound(format!("profile '{key}'")))?
            .health_snapshot = snapshot;
        Ok(next)
    }

    pub fn replace_configuration(&mut self, config: Configuration) {
        self.config = Arc::new(config);
        self.version += 1;
    }

    pub fn replace_profiles(&mut self, profiles: Profiles) {
        self.profiles = Arc::new(profiles);
        self.version += 1;
    }

    pub fn replace_all(&mut self, config: Configuration, profiles: Profiles) {
        self.config = Arc::new(config);
        self.profiles = Arc::new(profiles);
        self.version += 1;
    }

    pub fn reset_to_defaults(&mut self) {
        self.replace_all(default_configuration(), default_profiles());
    }

    /// Replaces the whole configuration with the document in `raw`.
    pub fn import_configuration(&mut self, raw: &str) -> Result<ImportReport, WorkbenchError> {
        let (config, ignored_keys) = parse_configuration(raw)?;
        let report = ImportReport {
            personas: config.personas.len(),
            phases: config.phases.len(),
            emotions: config.emotions.len(),
            ignored_keys,
            selection_repaired: false,
        };
        self.replace_configuration(config);
        Ok(report)
    }

    pub fn export_configuration(&self) -> Result<String, WorkbenchError> {
        Ok(serde_json::to_string_pretty(&*self.config)?)
    }
}

/// Parses and validates a full configuration document.
///
/// Returns the configuration and the unrecognised top-level keys.
pub fn parse_configuration(raw: &str) -> Result<(Configuration, Vec<String>), WorkbenchError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| WorkbenchError::InvalidPayload(e.to_string()))?;
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(WorkbenchError::InvalidPayload(format!(
                "configuration must be a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };

    let missing: Vec<&str> = Configuration::SECTIONS
        .iter()
        .copied()
        .filter(|section| !map.contains_key(*section))
        .collect();
    if !missing.is_empty() {
        return Err(WorkbenchError::InvalidPayload(format!(
            "configuration is missing: {}",
            missing.join(", ")
        )));
    }

    let ignored_keys: Vec<String> = map
        .keys()
        .filter(|k| !Configuration::SECTIONS.contains(&k.as_str()))
        .cloned()
        .collect();
    for key in &ignored_keys {
        map.remove(key);
    }

    let config: Configuration =
        serde_json::from_value(Value::Object(map)).map_err(|e| WorkbenchError::InvalidPayload(e.to_string()))?;
    validate_configuration(&config)?;
    Ok((config, ignored_keys))
}

pub fn validate_configuration(config: &Configuration) -> Result<(), WorkbenchError> {
    let empty = config.empty_categories();
    if empty.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = empty.iter().map(|c| c.to_string()).collect();
    Err(WorkbenchError::InvalidPayload(format!(
        "configuration has no entries for: {}",
        names.join(", ")
    )))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn persona(key: &str) -> FragmentRef {
        FragmentRef::Keyed {
            category: Category::Persona,
            key: key.into(),
        }
    }

    #[test]
    fn get_fragment_missing_key() {
        let store = FragmentStore::default();
        let err = store.get_fragment(Category::Emotion, "rage").unwrap_err();
        assert!(matches!(err, WorkbenchError::NotFound(_)));
    }

    #[test]
    fn set_fragment_prompt_only_touches_target() {
        let store = FragmentStore::default();
        let next = store.set_fragment_prompt(&persona("Explorer"), "new explorer").unwrap();

        assert_eq!(next.personas["Explorer"].prompt, "new explorer");
        assert_eq!(next.personas["Explorer"].extra, store.configuration().personas["Explorer"].extra);
        assert_eq!(next.personas["Seeker"], store.configuration().personas["Seeker"]);
        assert_eq!(next.phases, store.configuration().phases);
        // Stored value untouched until replaced.
        assert_ne!(store.get_fragment(Category::Persona, "Explorer").unwrap().prompt, "new explorer");
    }

    #[test]
    fn set_global_rules_prompt() {
        let store = FragmentStore::default();
        let next = store.set_fragment_prompt(&FragmentRef::GlobalRules, "be kind").unwrap();
        assert_eq!(next.global_rules.prompt, "be kind");
    }

    #[test]
    fn replace_bumps_version_and_keeps_old_snapshot() {
        let mut store = FragmentStore::default();
        let before = store.snapshot();
        let next = store.set_fragment_prompt(&persona("Seeker"), "edited").unwrap();
        store.replace_configuration(next);

        assert_eq!(store.version(), before.version + 1);
        assert_ne!(before.config.personas["Seeker"].prompt, "edited");
        assert_eq!(store.configuration().personas["Seeker"].prompt, "edited");
    }

    #[test]
    fn set_profile_context_replaces_text() {
        let store = FragmentStore::default();
        let next = store.set_profile_context("priya", "New job").unwrap();
        assert_eq!(next["priya"].context, "New job");
        assert!(store.set_profile_context("nobody", "x").is_err());
    }

    #[test]
    fn malformed_health_snapshot_is_rejected() {
        let store = FragmentStore::default();
        let before = store.profile("rahul").unwrap().health_snapshot.clone();

        let err = store.set_profile_health_snapshot("rahul", r#"{"basics": }"#).unwrap_err();
        assert!(matches!(err, WorkbenchError::InvalidPayload(_)));
        assert_eq!(store.profile("rahul").unwrap().health_snapshot, before);
    }

    #[test]
    fn health_snapshot_must_be_object() {
        let store = FragmentStore::default();
        let err = store.set_profile_health_snapshot("rahul", "[1, 2]").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn health_snapshot_update_and_clear() {
        let store = FragmentStore::default();
        let next = store.set_profile_health_snapshot("priya", r#"{"vitals": {"hrv": 58}}"#).unwrap();
        assert_eq!(next["priya"].health_snapshot.as_ref().unwrap()["vitals"]["hrv"], json!(58));

        let cleared = store.set_profile_health_snapshot("rahul", "   ").unwrap();
        assert!(cleared["rahul"].health_snapshot.is_none());
    }

    #[test]
    fn export_import_round_trip() {
        let mut store = FragmentStore::default();
        let next = store.set_fragment_prompt(&persona("Tracker"), "numbers ✓").unwrap();
        store.replace_configuration(next);
        let original = store.configuration();

        let exported = store.export_configuration().unwrap();
        let mut other = FragmentStore::default();
        let report = other.import_configuration(&exported).unwrap();

        assert_eq!(*other.configuration(), *original);
        assert_eq!(report.personas, 3);
        assert!(report.ignored_keys.is_empty());
    }

    #[test]
    fn export_is_deterministic() {
        let store = FragmentStore::default();
        assert_eq!(store.export_configuration().unwrap(), store.export_configuration().unwrap());
    }

    #[test]
    fn import_rejects_bad_json() {
        let mut store = FragmentStore::default();
        let err = store.import_configuration("{ nope").unwrap_err();
        assert!(matches!(err, WorkbenchError::InvalidPayload(_)));
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn import_rejects_missing_sections() {
        let mut store = FragmentStore::default();
        let doc = json!({ "personas": { "A": { "name": "A", "prompt": "a" } } }).to_string();
        let err = store.import_configuration(&doc).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("phases") && msg.contains("emotions") && msg.contains("globalRules"));
        assert_eq!(*store.configuration(), default_configuration());
    }

    #[test]
    fn import_rejects_empty_category() {
        let mut store = FragmentStore::default();
        let doc = json!({
            "personas": { "A": { "name": "A", "prompt": "a" } },
            "phases": {},
            "emotions": { "calm": { "name": "Calm", "prompt": "c" } },
            "globalRules": { "prompt": "g" }
        })
        .to_string();
        assert!(store.import_configuration(&doc).is_err());
    }

    #[test]
    fn import_reports_ignored_keys() {
        let mut store = FragmentStore::default();
        let doc = json!({
            "personas": { "A": { "name": "A", "prompt": "a" } },
            "phases": { "P": { "name": "P", "prompt": "p" } },
            "emotions": { "calm": { "name": "Calm", "prompt": "c" } },
            "globalRules": { "prompt": "g" },
            "version": 3
        })
        .to_string();
        let report = store.import_configuration(&doc).unwrap();
        assert_eq!(report.ignored_keys, vec!["version".to_string()]);
        assert_eq!(store.configuration().global_rules.prompt, "g");
    }

    #[test]
    fn reset_restores_defaults() {
        let mut store = FragmentStore::default();
        let mut profiles = (*store.profiles()).clone();
        profiles.insert(
            "custom".into(),
            Profile {
                name: "Custom".into(),
                persona: "Seeker".into(),
                context: "c".into(),
                health_snapshot: None,
            },
        );
        store.replace_profiles(profiles);
        store.reset_to_defaults();
        assert!(store.profile("custom").is_err());
        assert_eq!(*store.configuration(), default_configuration());
    }
}
