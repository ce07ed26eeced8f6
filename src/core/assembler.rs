use super::model::{Category, Configuration, HealthSnapshot, Profile};
use crate::error::WorkbenchError;
use serde_json::Value;

pub const ASSISTANT_NAME: &str = "NextYou AI Buddy";
pub const NO_HEALTH_DATA: &str = "No health data on file.";
const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const MISSING: &str = "—";

/// One rendered metrics line: a label and `(field, prefix, suffix)` triples.
struct MetricGroup {
    label: &'static str,
    group: Option<&'static str>,
    fields: &'static [(&'static str, &'static str, &'static str)],
}

const GROUPS: [MetricGroup; 5] = [
    MetricGroup {
        label: "Basics",
        group: Some("basics"),
        fields: &[("age", "age ", ""), ("sex", "sex ", ""), ("heightCm", "height ", " cm"), ("weightKg", "weight ", " kg")],
    },
    MetricGroup {
        label: "Sleep",
        group: Some("sleep"),
        fields: &[("hours", "", " h"), ("quality", "quality ", "/10"), ("bedtime", "bed ", ""), ("wakeTime", "wake ", "")],
    },
    MetricGroup {
        label: "Energy & mood",
        group: Some("energyMood"),
        fields: &[("energy", "energy ", "/10"), ("mood", "mood ", "/10"), ("slump", "slump ", "")],
    },
    MetricGroup {
        label: "Wearable vitals",
        group: Some("vitals"),
        fields: &[("hrv", "HRV ", " ms"), ("restingHr", "resting HR ", " bpm"), ("spo2", "SpO2 ", "%")],
    },
    MetricGroup {
        label: "Scores",
        group: None,
        fields: &[("readiness", "readiness ", ""), ("stress", "stress ", ""), ("steps", "steps ", "")],
    },
];

/// Human label for an emotion key: `soft_hopefulness` -> `soft hopefulness`.
pub fn emotion_label(key: &str) -> String {
    key.replace(['_', '-'], " ")
}

/// Renders the present metric groups of a profile, one line per group.
///
/// A group is emitted only if at least one of its fields has a value; inside
/// an emitted line, missing fields show as a dash so the line layout is stable.
pub fn render_metrics(profile: &Profile) -> String {
    let Some(snapshot) = &profile.health_snapshot else {
        return NO_HEALTH_DATA.to_string();
    };

    let lines: Vec<String> = GROUPS
        .iter()
        .filter_map(|group| render_group(snapshot, group))
        .collect();

    if lines.is_empty() {
        NO_HEALTH_DATA.to_string()
    } else {
        lines.join("\n")
    }
}

fn render_group(snapshot: &HealthSnapshot, group: &MetricGroup) -> Option<String> {
    let source = match group.group {
        Some(name) => snapshot.get(name)?.as_object()?,
        None => snapshot,
    };

    let values: Vec<Option<String>> = group
        .fields
        .iter()
        .map(|(field, _, _)| source.get(*field).and_then(display_value))
        .collect();

    if values.iter().all(Option::is_none) {
        return None;
    }

    let parts: Vec<String> = group
        .fields
        .iter()
        .zip(values)
        .map(|((_, prefix, suffix), value)| match value {
            Some(v) => format!("{prefix}{v}{suffix}"),
            None => format!("{prefix}{MISSING}"),
        })
        .collect();

    Some(format!("{}: {}", group.label, parts.join(", ")))
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(String::from(if *b { "yes" } else { "no" })),
        other => Some(other.to_string()),
    }
}

/// Assembles the full system prompt for one selection.
pub fn build_system_prompt(
    config: &Configuration,
    profile: &Profile,
    persona_key: &str,
    phase_key: &str,
    emotion_key: &str,
) -> Result<String, WorkbenchError> {
    let persona = lookup(config, Category::Persona, persona_key)?;
    let phase = lookup(config, Category::Phase, phase_key)?;
    let emotion = lookup(config, Category::Emotion, emotion_key)?;
    let global = &config.global_rules.prompt;

    let metrics = render_metrics(profile);
    let label = emotion_label(emotion_key).to_uppercase();

    Ok(format!(
        "You are {ASSISTANT_NAME}.

USER: {name}
Context: {context}

Health data:
{metrics}

{SEPARATOR}
{persona}

{SEPARATOR}
{phase}

{SEPARATOR}
🎯 EMOTIONAL STATE: {label}
{SEPARATOR}

{emotion}

{SEPARATOR}
{global}

NOW respond using the settings above:",
        name = profile.name,
        context = profile.context,
    ))
}

fn lookup<'a>(config: &'a Configuration, category: Category, key: &str) -> Result<&'a str, WorkbenchError> {
    config
        .category(category)
        .get(key)
        .map(|f| f.prompt.as_str())
        .ok_or_else(|| WorkbenchError::NotFound(format!("{category} '{key}'")))
}
