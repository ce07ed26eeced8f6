use crate::ai::client::CompletionClient;
use crate::config::Settings;
use crate::core::assembler;
use crate::core::defaults::{default_configuration, default_profiles};
use crate::core::model::{Category, Configuration, FragmentRef, Message, MessageMetadata, Profiles};
use crate::core::selection::Selection;
use crate::core::store::{validate_configuration, FragmentStore, ImportReport, Snapshot};
use crate::error::WorkbenchError;
use crate::persistence::local::{LocalStore, CONFIG_KEY, PROFILES_KEY};
use crate::sync::coordinator::{SyncCoordinator, SyncStatus};
use crate::sync::remote::RemoteStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What an open editor is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    Prompt(FragmentRef),
    ProfileContext(String),
    HealthSnapshot(String),
}

impl fmt::Display for EditTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditTarget::Prompt(target) => write!(f, "{target} prompt"),
            EditTarget::ProfileContext(key) => write!(f, "context of profile '{key}'"),
            EditTarget::HealthSnapshot(key) => write!(f, "health data of profile '{key}'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Draft {
    target: EditTarget,
    text: String,
}

#[derive(Debug, Default)]
struct SessionState {
    selection: Selection,
    transcript: Vec<Message>,
    /// Bumped on every clear so late replies can tell their conversation is gone.
    epoch: u64,
    draft: Option<Draft>,
}

impl SessionState {
    fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.epoch += 1;
    }
}

/// Releases the in-flight flag when a send finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One interactive workbench session: selection, transcript, edits and the
/// wiring between the store, local persistence, sync and the completion API.
pub struct Session {
    store: Mutex<FragmentStore>,
    local: LocalStore,
    sync: Option<Arc<SyncCoordinator>>,
    completion: Option<CompletionClient>,
    state: Mutex<SessionState>,
    busy: AtomicBool,
}

impl Session {
    pub fn new(
        store: FragmentStore,
        local: LocalStore,
        sync: Option<Arc<SyncCoordinator>>,
        completion: Option<CompletionClient>,
    ) -> Self {
        let mut state = SessionState::default();
        state.selection.repair(&store.configuration(), &store.profiles());

        Self {
            store: Mutex::new(store),
            local,
            sync,
            completion,
            state: Mutex::new(state),
            busy: AtomicBool::new(false),
        }
    }

    /// Builds a session from settings: defaults, then local state, then the
    /// remote record when sync is configured.
    pub async fn start(settings: &Settings) -> Self {
        let local = LocalStore::new(&settings.data_dir);
        let store = hydrate(&local);

        let sync = settings.sync.as_ref().map(|s| {
            log::info!("Remote sync enabled (table '{}', row '{}')", s.table, s.row_id);
            Arc::new(SyncCoordinator::new(RemoteStore::new(s), local.clone(), s.debounce))
        });

        let completion = CompletionClient::from_settings(&settings.completion);
        match &completion {
            Some(client) => log::info!("Completion API ready (model {})", client.model()),
            None => log::warn!("OPENAI_API_KEY is not set; messages will not be sent"),
        }

        let session = Self::new(store, local, sync, completion);

        if session.sync.is_some() {
            match session.pull_latest().await {
                Ok(at) => log::info!("Loaded remote configuration from {at}"),
                Err(WorkbenchError::NotFound(_)) => {
                    log::info!("No remote configuration yet; the first edit will create it")
                }
                Err(e) => log::warn!("Startup pull failed, continuing with local state: {e}"),
            }
        }

        session
    }

    pub fn selection(&self) -> Selection {
        lock(&self.state).selection.clone()
    }

    pub fn transcript(&self) -> Vec<Message> {
        lock(&self.state).transcript.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.store).snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn can_send(&self) -> bool {
        self.completion.is_some()
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync.as_ref().map(|s| s.status())
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.sync.as_ref().and_then(|s| s.last_synced_at())
    }

    // ---- selection -------------------------------------------------------

    pub fn set_persona(&self, key: &str) -> Result<(), WorkbenchError> {
        self.select(Category::Persona, key)
    }

    pub fn set_phase(&self, key: &str) -> Result<(), WorkbenchError> {
        self.select(Category::Phase, key)
    }

    pub fn set_emotion(&self, key: &str) -> Result<(), WorkbenchError> {
        self.select(Category::Emotion, key)
    }

    pub fn select(&self, category: Category, key: &str) -> Result<(), WorkbenchError> {
        {
            let store = lock(&self.store);
            store.get_fragment(category, key)?;
        }
        let mut state = lock(&self.state);
        state.selection.set_key(category, key.to_string());
        state.clear_transcript();
        Ok(())
    }

    pub fn set_profile(&self, key: &str) -> Result<(), WorkbenchError> {
        {
            let store = lock(&self.store);
            store.profile(key)?;
        }
        let mut state = lock(&self.state);
        state.selection.profile = key.to_string();
        state.clear_transcript();
        Ok(())
    }

    pub fn clear_transcript(&self) {
        lock(&self.state).clear_transcript();
    }

    // ---- chat ------------------------------------------------------------

    /// The system prompt the next send would use.
    pub fn preview_prompt(&self) -> Result<String, WorkbenchError> {
        self.build_prompt(&self.selection())
    }

    fn build_prompt(&self, selection: &Selection) -> Result<String, WorkbenchError> {
        let snapshot = self.snapshot();
        let profile = snapshot
            .profiles
            .get(&selection.profile)
            .ok_or_else(|| WorkbenchError::NotFound(format!("profile '{}'", selection.profile)))?;
        assembler::build_system_prompt(
            &snapshot.config,
            profile,
            &selection.persona,
            &selection.phase,
            &selection.emotion,
        )
    }

    /// Appends `text` as a user turn and the assistant's answer (or the
    /// failure) as the next one. Ignored while another send is in flight.
    pub async fn send_message(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Ignoring send while a request is in flight");
            return;
        }
        let _busy = BusyGuard(&self.busy);

        let (selection, conversation, epoch) = {
            let mut state = lock(&self.state);
            state.transcript.push(Message::user(text));
            (state.selection.clone(), state.transcript.clone(), state.epoch)
        };

        let Some(client) = &self.completion else {
            let err = WorkbenchError::MissingCredential("set OPENAI_API_KEY in your environment or .env file".into());
            self.push_reply(epoch, Message::failure(format!("❌ {err}")));
            return;
        };

        let reply = match self.build_prompt(&selection) {
            Ok(system_prompt) => client.complete(&system_prompt, &conversation).await,
            Err(e) => Err(e),
        };

        let message = match reply {
            Ok(content) => {
                let word_count = content.split_whitespace().count();
                Message::assistant(
                    content,
                    MessageMetadata {
                        persona: selection.persona,
                        phase: selection.phase,
                        emotion: selection.emotion,
                        word_count,
                    },
                )
            }
            Err(e) => {
                log::warn!("Send failed: {e}");
                Message::failure(format!("❌ Error: {e}"))
            }
        };
        self.push_reply(epoch, message);
    }

    fn push_reply(&self, epoch: u64, message: Message) {
        let mut state = lock(&self.state);
        if state.epoch != epoch {
            log::info!("Dropping reply for a conversation that was cleared");
            return;
        }
        state.transcript.push(message);
    }

    // ---- edit workflow ---------------------------------------------------

    /// Opens an editor on `target` and returns its current text.
    pub fn begin_edit(&self, target: EditTarget) -> Result<String, WorkbenchError> {
        let text = {
            let store = lock(&self.store);
            match &target {
                EditTarget::Prompt(fragment) => store.fragment(fragment)?.prompt.clone(),
                EditTarget::ProfileContext(key) => store.profile(key)?.context.clone(),
                EditTarget::HealthSnapshot(key) => match &store.profile(key)?.health_snapshot {
                    Some(snapshot) => serde_json::to_string_pretty(snapshot)?,
                    None => String::new(),
                },
            }
        };
        lock(&self.state).draft = Some(Draft {
            target,
            text: text.clone(),
        });
        Ok(text)
    }

    pub fn stage_draft(&self, text: &str) -> Result<(), WorkbenchError> {
        let mut state = lock(&self.state);
        let draft = state.draft.as_mut().ok_or(WorkbenchError::NoActiveEdit)?;
        draft.text = text.to_string();
        Ok(())
    }

    pub fn draft(&self) -> Option<(EditTarget, String)> {
        lock(&self.state)
            .draft
            .as_ref()
            .map(|d| (d.target.clone(), d.text.clone()))
    }

    /// Returns false if no editor was open.
    pub fn discard_edit(&self) -> bool {
        lock(&self.state).draft.take().is_some()
    }

    /// Applies the staged draft. On failure nothing changes and the draft
    /// stays open.
    pub fn commit_edit(&self) -> Result<(), WorkbenchError> {
        let draft = lock(&self.state).draft.clone().ok_or(WorkbenchError::NoActiveEdit)?;
        self.apply_edit(&draft.target, &draft.text)?;
        lock(&self.state).draft = None;
        Ok(())
    }

    pub fn apply_edit(&self, target: &EditTarget, text: &str) -> Result<(), WorkbenchError> {
        {
            let mut store = lock(&self.store);
            match target {
                EditTarget::Prompt(fragment) => {
                    let next = store.set_fragment_prompt(fragment, text)?;
                    store.replace_configuration(next);
                }
                EditTarget::ProfileContext(key) => {
                    let next = store.set_profile_context(key, text)?;
                    store.replace_profiles(next);
                }
                EditTarget::HealthSnapshot(key) => {
                    let next = store.set_profile_health_snapshot(key, text)?;
                    store.replace_profiles(next);
                }
            }
        }
        log::info!("Saved {target}");
        self.after_change(true);
        Ok(())
    }

    // ---- lifecycle -------------------------------------------------------

    pub fn import_configuration(&self, raw: &str) -> Result<ImportReport, WorkbenchError> {
        let report = lock(&self.store).import_configuration(raw)?;
        log::info!(
            "Imported configuration: {} personas, {} phases, {} emotions",
            report.personas,
            report.phases,
            report.emotions
        );
        if !report.ignored_keys.is_empty() {
            log::warn!("Import ignored unknown keys: {}", report.ignored_keys.join(", "));
        }
        let selection_repaired = self.after_change(true);
        Ok(ImportReport {
            selection_repaired,
            ..report
        })
    }

    pub fn export_configuration(&self) -> Result<String, WorkbenchError> {
        lock(&self.store).export_configuration()
    }

    pub fn reset_to_defaults(&self) {
        lock(&self.store).reset_to_defaults();
        lock(&self.state).draft = None;
        log::info!("Reset configuration and profiles to defaults");
        self.after_change(true);
    }

    pub async fn pull_latest(&self) -> Result<DateTime<Utc>, WorkbenchError> {
        let sync = self.sync.as_ref().ok_or(WorkbenchError::NotConfigured)?;
        let record = sync.pull_latest().await?;
        lock(&self.store).replace_all(record.prompt_config, record.test_profiles);
        self.after_change(false);
        Ok(record.updated_at)
    }

    pub async fn push_latest(&self) -> Result<DateTime<Utc>, WorkbenchError> {
        let sync = self.sync.as_ref().ok_or(WorkbenchError::NotConfigured)?;
        let snapshot = self.snapshot();
        sync.push_latest(&snapshot.config, &snapshot.profiles).await
    }

    /// Lets a scheduled push finish before shutdown.
    pub async fn flush(&self) {
        if let Some(sync) = &self.sync {
            sync.flush().await;
        }
    }

    /// Persists the current version, repairs the selection and, if `push`,
    /// schedules a remote push. Returns true if the selection had to move.
    fn after_change(&self, push: bool) -> bool {
        let snapshot = self.snapshot();
        self.local.save_local(CONFIG_KEY, &*snapshot.config);
        self.local.save_local(PROFILES_KEY, &*snapshot.profiles);

        let repaired = {
            let mut state = lock(&self.state);
            let repaired = state.selection.repair(&snapshot.config, &snapshot.profiles);
            if repaired {
                state.clear_transcript();
            }
            repaired
        };

        if push {
            if let Some(sync) = &self.sync {
                sync.schedule_push(snapshot.config, snapshot.profiles);
            }
        }
        repaired
    }
}

/// Loads the store from local entries, keeping defaults for anything missing
/// or unusable.
fn hydrate(local: &LocalStore) -> FragmentStore {
    let mut config: Configuration = local.load_local(CONFIG_KEY, default_configuration());
    if let Err(e) = validate_configuration(&config) {
        log::warn!("Ignoring stored configuration: {e}");
        config = default_configuration();
    }

    let mut profiles: Profiles = local.load_local(PROFILES_KEY, default_profiles());
    if profiles.is_empty() {
        log::warn!("Stored profiles are empty; using defaults");
        profiles = default_profiles();
    }

    FragmentStore::new(config, profiles)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
