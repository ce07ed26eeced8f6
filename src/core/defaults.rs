use super::model::{Configuration, Fragment, FragmentMap, HealthSnapshot, Profile, Profiles};
use serde_json::{json, Value};

pub const DEFAULT_PROFILE: &str = "aastha";
pub const DEFAULT_PERSONA: &str = "Seeker";
pub const DEFAULT_PHASE: &str = "Soothe";
pub const DEFAULT_EMOTION: &str = "soft_hopefulness";

pub const QUICK_TEST_MESSAGES: [&str; 5] = [
    "I'm feeling anxious",
    "I'm tired today",
    "What should I do?",
    "I did the breathing exercise!",
    "I feel lazy",
];

const SEEKER_PROMPT: &str = r#"SEEKER PERSONA - Low energy, overwhelmed:
• Use SMALLEST actions (30-60 seconds)
• Give 1 option only
• Heavy emotional validation first
• Response length: 20-30 words MAX"#;

const EXPLORER_PROMPT: &str = r#"EXPLORER PERSONA - Curious, playful:
• Frame as experiments
• Use playful language
• Can offer 2 options
• Response length: 25-35 words MAX"#;

const TRACKER_PROMPT: &str = r#"TRACKER PERSONA - Data-driven, optimization:
• Reference data and trends
• Use structured language
• Include metrics
• Response length: 30-40 words MAX"#;

const SOOTHE_PROMPT: &str =
    "PHASE: Soothe - Practice: 30-60 seconds ONLY. Never suggest over 1 minute. Extremely gentle tone.";

const STABILIZE_PROMPT: &str = "PHASE: Stabilize - Practice: 2-5 minutes. Reference 'rhythm' or 'consistency'. Gentle accountability tone.";

const STRENGTHEN_PROMPT: &str = "PHASE: Strengthen - Practice: 3-10 minutes. Use identity language like 'you're someone who...'. Resilience tone.";

const MAINTENANCE_PROMPT: &str =
    "PHASE: Maintenance - Practice: Flexible 2-5 minutes. Trust their judgment. Light check-in tone.";

const SOFT_HOPEFULNESS_PROMPT: &str = r#"SOFT HOPEFULNESS:
MUST use: 'we can try', 'tiny start', 'proud you're here'
Example: 'That sounds heavy. Want to try one breath together?'"#;

const GROUNDED_CALM_PROMPT: &str = r#"GROUNDED CALM:
MUST use: 'slow down', 'one breath', 'nothing urgent', 'let's pause'
Example: 'Let's pause. Can we take one breath right now?'"#;

const ATTENTIVE_EMPATHY_PROMPT: &str = r#"ATTENTIVE EMPATHY:
MUST use: 'that sounds hard', 'I hear you', 'you don't have to', 'I'm here'
Example: 'That sounds really hard. You don't have to fix it tonight.'"#;

const CLEAR_FOCUS_PROMPT: &str = r#"CLEAR FOCUS:
MUST use numbered steps (1), (2), (3) OR 'here's what to do:'
Example: 'Do this: (1) Sit down (2) Take 3 breaths (3) Notice how you feel.'
FORMAT REQUIRED: Structured with clear steps."#;

const GLOBAL_RULES_PROMPT: &str = r#"GLOBAL RULES:
• Be conversational like texting a friend
• Validate emotion FIRST
• Suggest ONE tiny action
• Never shame or guilt
• Use contractions and simple words"#;

pub fn default_configuration() -> Configuration {
    Configuration {
        personas: personas(),
        phases: phases(),
        emotions: emotions(),
        global_rules: Fragment::new("", None, GLOBAL_RULES_PROMPT),
    }
}

fn personas() -> FragmentMap {
    let mut map = FragmentMap::new();
    map.insert(
        "Seeker".into(),
        Fragment::new("Seeker", Some("Low energy, overwhelmed, needs smallest actions"), SEEKER_PROMPT)
            .with_extra("wordLimit", json!("20-30")),
    );
    map.insert(
        "Explorer".into(),
        Fragment::new("Explorer", Some("Mid-energy, curious, playful"), EXPLORER_PROMPT)
            .with_extra("wordLimit", json!("25-35")),
    );
    map.insert(
        "Tracker".into(),
        Fragment::new("Tracker", Some("Stable, data-driven, optimization focused"), TRACKER_PROMPT)
            .with_extra("wordLimit", json!("30-40")),
    );
    map
}

fn phases() -> FragmentMap {
    let phase = |name: &str, days: &str, prompt: &str, practice: &str| {
        Fragment::new(name, None, prompt)
            .with_extra("days", json!(days))
            .with_extra("practiceLength", json!(practice))
    };

    let mut map = FragmentMap::new();
    map.insert("Soothe".into(), phase("Soothe", "0-3", SOOTHE_PROMPT, "30-60 seconds"));
    map.insert("Stabilize".into(), phase("Stabilize", "3-6", STABILIZE_PROMPT, "2-5 minutes"));
    map.insert("Strengthen".into(), phase("Strengthen", "5-7", STRENGTHEN_PROMPT, "3-10 minutes"));
    map.insert(
        "Maintenance".into(),
        phase("Maintenance", "Post-reset", MAINTENANCE_PROMPT, "2-5 minutes flexible"),
    );
    map
}

fn emotions() -> FragmentMap {
    let emotion = |name: &str, description: &str, prompt: &str, keywords: &[&str]| {
        Fragment::new(name, Some(description), prompt).with_extra("keywords", json!(keywords))
    };

    let mut map = FragmentMap::new();
    map.insert(
        "soft_hopefulness".into(),
        emotion(
            "Soft Hopefulness",
            "Gentle encouragement after rough patch",
            SOFT_HOPEFULNESS_PROMPT,
            &["we can try", "tiny start", "proud you're here"],
        ),
    );
    map.insert(
        "grounded_calm".into(),
        emotion(
            "Grounded Calm",
            "Help anxious user downshift",
            GROUNDED_CALM_PROMPT,
            &["slow down", "one breath", "nothing urgent", "let's pause"],
        ),
    );
    map.insert(
        "attentive_empathy".into(),
        emotion(
            "Attentive Empathy",
            "Deep validation without rushing",
            ATTENTIVE_EMPATHY_PROMPT,
            &["that sounds hard", "I hear you", "you don't have to"],
        ),
    );
    map.insert(
        "clear_focus".into(),
        emotion(
            "Clear Focus",
            "Concrete step-by-step instructions",
            CLEAR_FOCUS_PROMPT,
            &["do this:", "here's what to do", "step 1", "first, then, next"],
        ),
    );
    map
}

pub fn default_profiles() -> Profiles {
    let mut map = Profiles::new();
    map.insert(
        "aastha".into(),
        Profile {
            name: "Aastha (Seeker)".into(),
            persona: "Seeker".into(),
            context: "Recovering from ACL surgery. Low energy, fragmented sleep, afternoon slump 2-5 PM."
                .into(),
            health_snapshot: snapshot(json!({
                "sleep": { "hours": 5.5, "quality": 4 },
                "energyMood": { "energy": 3, "mood": 5, "slump": "2-5 PM" }
            })),
        },
    );
    map.insert(
        "priya".into(),
        Profile {
            name: "Priya (Explorer)".into(),
            persona: "Explorer".into(),
            context: "Working professional, moderate energy, curious, experiences brain fog.".into(),
            health_snapshot: None,
        },
    );
    map.insert(
        "rahul".into(),
        Profile {
            name: "Rahul (Tracker)".into(),
            persona: "Tracker".into(),
            context: "Stable baseline, tracks HRV/sleep, exercises 4x/week, optimization-focused."
                .into(),
            health_snapshot: snapshot(json!({
                "basics": { "age": 34, "sex": "M", "heightCm": 178, "weightKg": 74 },
                "sleep": { "hours": 7.4, "quality": 8, "bedtime": "23:00", "wakeTime": "06:30" },
                "vitals": { "hrv": 62, "restingHr": 54, "spo2": 98 },
                "readiness": 82,
                "stress": 28,
                "steps": 11200
            })),
        },
    );
    map
}

fn snapshot(value: Value) -> Option<HealthSnapshot> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
