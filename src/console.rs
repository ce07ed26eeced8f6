use crate::core::assembler::emotion_label;
use crate::core::defaults::QUICK_TEST_MESSAGES;
use crate::core::model::{Category, FragmentRef, Message, Role};
use crate::error::WorkbenchError;
use crate::session::{EditTarget, Session};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub const EXPORT_FILE_NAME: &str = "nextyou-prompt-config.json";

const HELP: &str = r#"Commands:
  <text>                         send a message
  /profile|/persona|/phase|/emotion <key>   switch selection (clears chat)
  /list                          show profiles and fragments
  /preview                       print the assembled system prompt
  /edit persona|phase|emotion <key>
  /edit global | /edit context <profile> | /edit health <profile>
                                 edit text; finish with a line '.', abort with '/cancel'
  /export [path]  /import <path>  /reset
  /pull  /push  /status
  /clear                         clear the conversation
  /quick [n]                     list or send a quick test message
  /help  /quit"#;

/// Parsed console input.
#[derive(Debug, PartialEq)]
pub enum Command {
    Send(String),
    Select(Category, String),
    Profile(String),
    List,
    Preview,
    Edit(EditTarget),
    Export(Option<String>),
    Import(String),
    Reset,
    Pull,
    Push,
    Status,
    Clear,
    Quick(Option<usize>),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let arg = |i: usize| args.get(i).map(|s| s.to_string());

    match (name, args.len()) {
        ("persona" | "phase" | "emotion", 1) => match Category::parse(name) {
            Some(category) => Command::Select(category, args[0].to_string()),
            None => Command::Unknown(line.to_string()),
        },
        ("profile", 1) => Command::Profile(args[0].to_string()),
        ("list", 0) => Command::List,
        ("preview", 0) => Command::Preview,
        ("edit", _) => parse_edit(&args).unwrap_or_else(|| Command::Unknown(line.to_string())),
        ("export", 0 | 1) => Command::Export(arg(0)),
        ("import", 1) => Command::Import(args[0].to_string()),
        ("reset", 0) => Command::Reset,
        ("pull", 0) => Command::Pull,
        ("push", 0) => Command::Push,
        ("status", 0) => Command::Status,
        ("clear", 0) => Command::Clear,
        ("quick", 0) => Command::Quick(None),
        ("quick", 1) => match args[0].parse() {
            Ok(n) => Command::Quick(Some(n)),
            Err(_) => Command::Unknown(line.to_string()),
        },
        ("help", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

fn parse_edit(args: &[&str]) -> Option<Command> {
    let target = match args {
        ["global"] => EditTarget::Prompt(FragmentRef::GlobalRules),
        ["context", key] => EditTarget::ProfileContext(key.to_string()),
        ["health", key] => EditTarget::HealthSnapshot(key.to_string()),
        [category, key] => EditTarget::Prompt(FragmentRef::Keyed {
            category: Category::parse(category)?,
            key: key.to_string(),
        }),
        _ => return None,
    };
    Some(Command::Edit(target))
}

pub struct Console {
    session: Session,
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub async fn run(mut self) -> Result<(), WorkbenchError> {
        println!("🧪 NEXTYOU PROMPT ENGINEERING WORKBENCH");
        if !self.session.can_send() {
            println!("⚠️  No completion API key configured; replies will be errors.");
        }
        self.print_header();
        println!("Type /help for commands.\n");

        while let Some(line) = self.lines.next_line().await? {
            match parse_command(&line) {
                Command::Quit => break,
                command => {
                    if let Err(e) = self.handle(command).await {
                        println!("❌ {e}");
                    }
                }
            }
        }

        if let Some(status) = self.session.sync_status() {
            println!("⏳ Finishing sync ({status})...");
        }
        self.session.flush().await;
        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Result<(), WorkbenchError> {
        match command {
            Command::Send(text) => self.send(&text).await,
            Command::Select(category, key) => {
                self.session.select(category, &key)?;
                self.print_header();
            }
            Command::Profile(key) => {
                self.session.set_profile(&key)?;
                self.print_header();
            }
            Command::List => self.print_list(),
            Command::Preview => println!("{}\n", self.session.preview_prompt()?),
            Command::Edit(target) => self.edit(target).await?,
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| EXPORT_FILE_NAME.to_string());
                tokio::fs::write(&path, self.session.export_configuration()?).await?;
                println!("💾 Exported configuration to {path}");
            }
            Command::Import(path) => self.import(Path::new(&path)).await?,
            Command::Reset => {
                if self.confirm("Reset all prompts and profiles to defaults? [y/N]").await? {
                    self.session.reset_to_defaults();
                    println!("🔄 Reset to defaults.");
                    self.print_header();
                }
            }
            Command::Pull => {
                let at = self.session.pull_latest().await?;
                println!("⬇️  Pulled remote configuration ({})", at.to_rfc3339());
                self.print_header();
            }
            Command::Push => {
                let at = self.session.push_latest().await?;
                println!("⬆️  Pushed configuration ({})", at.to_rfc3339());
            }
            Command::Status => self.print_status(),
            Command::Clear => {
                self.session.clear_transcript();
                println!("🧹 Conversation cleared.");
            }
            Command::Quick(None) => {
                for (i, msg) in QUICK_TEST_MESSAGES.iter().enumerate() {
                    println!("  {}. {msg}", i + 1);
                }
            }
            Command::Quick(Some(n)) => {
                let msg = n
                    .checked_sub(1)
                    .and_then(|i| QUICK_TEST_MESSAGES.get(i))
                    .ok_or_else(|| WorkbenchError::NotFound(format!("quick message {n}")))?;
                println!("> {msg}");
                self.send(msg).await;
            }
            Command::Help => println!("{HELP}"),
            Command::Unknown(line) => println!("❓ Unknown command: {line} (try /help)"),
            Command::Quit => {}
        }
        Ok(())
    }

    async fn send(&self, text: &str) {
        let before = self.session.transcript().len();
        self.session.send_message(text).await;
        for message in self.session.transcript().iter().skip(before) {
            if message.role == Role::Assistant {
                print_message(message);
            }
        }
    }

    async fn edit(&mut self, target: EditTarget) -> Result<(), WorkbenchError> {
        let current = self.session.begin_edit(target.clone())?;
        println!("✏️  Editing {target}. Current text:\n{current}\n---");
        println!("Enter the new text, then a line with a single '.' (or /cancel).");

        let mut buffer: Vec<String> = Vec::new();
        loop {
            let Some(line) = self.lines.next_line().await? else {
                self.session.discard_edit();
                return Ok(());
            };
            match line.trim_end() {
                "." => break,
                "/cancel" => {
                    self.session.discard_edit();
                    println!("↩️  Edit discarded.");
                    return Ok(());
                }
                _ => buffer.push(line),
            }
        }

        self.session.stage_draft(&buffer.join("\n"))?;
        if let Err(e) = self.session.commit_edit() {
            self.session.discard_edit();
            return Err(e);
        }
        println!("✅ Saved {target}.");
        Ok(())
    }

    async fn import(&self, path: &Path) -> Result<(), WorkbenchError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let report = self.session.import_configuration(&raw)?;
        println!(
            "📥 Imported {} personas, {} phases, {} emotions.",
            report.personas, report.phases, report.emotions
        );
        if !report.ignored_keys.is_empty() {
            println!("⚠️  Ignored unknown keys: {}", report.ignored_keys.join(", "));
        }
        if report.selection_repaired {
            println!("⚠️  The active selection was removed by the import; switched to defaults.");
            self.print_header();
        }
        Ok(())
    }

    async fn confirm(&mut self, question: &str) -> Result<bool, WorkbenchError> {
        println!("{question}");
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
    }

    fn print_header(&self) {
        let selection = self.session.selection();
        let snapshot = self.session.snapshot();
        let profile_name = snapshot
            .profiles
            .get(&selection.profile)
            .map(|p| p.name.as_str())
            .unwrap_or(selection.profile.as_str());
        println!(
            "👤 {profile_name} | 🎭 {} | 📅 {} | 💬 {}",
            selection.persona,
            selection.phase,
            emotion_label(&selection.emotion)
        );
    }

    fn print_list(&self) {
        let selection = self.session.selection();
        let snapshot = self.session.snapshot();
        let mark = |selected: bool| if selected { "●" } else { "○" };

        println!("Profiles:");
        for (key, profile) in snapshot.profiles.iter() {
            println!("  {} {key}: {} ({})", mark(*key == selection.profile), profile.name, profile.persona);
        }
        for category in Category::ALL {
            println!("{}s:", capitalize(&category.to_string()));
            for (key, fragment) in snapshot.config.category(category) {
                let selected = key == selection.key(category);
                match &fragment.description {
                    Some(description) => println!("  {} {key}: {description}", mark(selected)),
                    None => println!("  {} {key}", mark(selected)),
                }
            }
        }
    }

    fn print_status(&self) {
        let snapshot = self.session.snapshot();
        println!("Version: {}", snapshot.version);
        match self.session.sync_status() {
            Some(status) => {
                println!("Sync: {status}");
                if let Some(at) = self.session.last_synced_at() {
                    println!("Last sync: {}", at.to_rfc3339());
                }
            }
            None => println!("Sync: disabled"),
        }
    }
}

fn print_message(message: &Message) {
    println!("🤖 {}", message.content);
    if let Some(meta) = &message.metadata {
        println!(
            "   [{} · {} · {} · {} words]",
            meta.persona,
            meta.phase,
            emotion_label(&meta.emotion),
            meta.word_count
        );
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
