use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYNC_TABLE: &str = "prompt_configs";
pub const DEFAULT_SYNC_ROW_ID: &str = "nextyou-workbench";
pub const DEFAULT_DEBOUNCE_MS: u64 = 1500;
pub const DEFAULT_DATA_DIR: &str = ".workbench";

#[derive(Clone)]
pub struct CompletionSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct SyncSettings {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
    pub row_id: String,
    pub debounce: Duration,
}

#[derive(Clone)]
pub struct Settings {
    pub completion: CompletionSettings,
    /// `None` when the remote store URL or key is missing.
    pub sync: Option<SyncSettings>,
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_resolver(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable source. Blank values count as unset.
    pub fn from_resolver(env: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let completion = CompletionSettings {
            api_url: get("OPENAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: get("OPENAI_API_KEY"),
        };

        let debounce_ms = match get("SYNC_DEBOUNCE_MS") {
            Some(v) => v.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring invalid SYNC_DEBOUNCE_MS value '{v}'");
                DEFAULT_DEBOUNCE_MS
            }),
            None => DEFAULT_DEBOUNCE_MS,
        };

        let sync = match (get("SYNC_STORE_URL"), get("SYNC_STORE_KEY")) {
            (Some(base_url), Some(api_key)) => Some(SyncSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                table: get("SYNC_TABLE").unwrap_or_else(|| DEFAULT_SYNC_TABLE.to_string()),
                row_id: get("SYNC_ROW_ID").unwrap_or_else(|| DEFAULT_SYNC_ROW_ID.to_string()),
                debounce: Duration::from_millis(debounce_ms),
            }),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!("Remote sync needs both SYNC_STORE_URL and SYNC_STORE_KEY; sync disabled");
                None
            }
            (None, None) => None,
        };

        Self {
            completion,
            sync,
            data_dir: get("WORKBENCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}

// Keep credentials out of logs.
impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("row_id", &self.row_id)
            .field("debounce", &self.debounce)
            .finish()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("completion", &self.completion)
            .field("sync", &self.sync)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn defaults_without_env() {
        let settings = Settings::from_resolver(|_| None);
        assert_eq!(settings.completion.api_url, DEFAULT_API_URL);
        assert_eq!(settings.completion.model, DEFAULT_MODEL);
        assert!(settings.completion.api_key.is_none());
        assert!(settings.sync.is_none());
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn sync_enabled_with_url_and_key() {
        let settings = Settings::from_resolver(resolver(&[
            ("SYNC_STORE_URL", "https://store.example.com/"),
            ("SYNC_STORE_KEY", "anon"),
            ("SYNC_DEBOUNCE_MS", "250"),
        ]));
        let sync = settings.sync.unwrap();
        assert_eq!(sync.base_url, "https://store.example.com");
        assert_eq!(sync.table, DEFAULT_SYNC_TABLE);
        assert_eq!(sync.row_id, DEFAULT_SYNC_ROW_ID);
        assert_eq!(sync.debounce, Duration::from_millis(250));
    }

    #[test]
    fn sync_disabled_without_key() {
        let settings = Settings::from_resolver(resolver(&[("SYNC_STORE_URL", "https://store.example.com")]));
        assert!(settings.sync.is_none());
    }

    #[test]
    fn blank_values_are_unset() {
        let settings = Settings::from_resolver(resolver(&[("OPENAI_API_KEY", "  "), ("OPENAI_MODEL", "")]));
        assert!(settings.completion.api_key.is_none());
        assert_eq!(settings.completion.model, DEFAULT_MODEL);
    }

    #[test]
    fn invalid_debounce_uses_default() {
        let settings = Settings::from_resolver(resolver(&[
            ("SYNC_STORE_URL", "https://s"),
            ("SYNC_STORE_KEY", "k"),
            ("SYNC_DEBOUNCE_MS", "soon"),
        ]));
        assert_eq!(settings.sync.unwrap().debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
    }

    #[test]
    fn debug_redacts_credentials() {
        let settings = Settings::from_resolver(resolver(&[
            ("OPENAI_API_KEY", "sk-secret"),
            ("SYNC_STORE_URL", "https://s"),
            ("SYNC_STORE_KEY", "store-secret"),
        ]));
        let text = format!("{settings:?}");
        assert!(!text.contains("sk-secret"));
        assert!(!text.contains("store-secret"));
    }
}
