use std::{
    collections::HashSet,
    env, fmt, fs,
    path::PathBuf,
};

use serde::Deserialize;

use crate::{domain::ChatId, errors::Error, Result};

/// Required length of a Telegram bot token.
pub const TOKEN_LEN: usize = 46;

/// Inline configuration blob.
pub const CONFIG_ENV: &str = "APP_CONFIG";
/// Path to a configuration file (used when no CLI argument is given).
pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";

/// Validated relay configuration.
///
/// Built once at startup and never mutated. Disabled rules are `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub token: String,
    pub port: u16,
    pub resend: Option<ResendRule>,
    pub feedback: Option<FeedbackRule>,
}

/// User-facing command: text (with leading `/`) plus menu description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub text: String,
    pub description: String,
}

/// Forward the replied-to message from authorized chats to destinations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResendRule {
    pub trigger: CommandSpec,
    pub keywords: Vec<String>,
    pub from: HashSet<ChatId>,
    pub to: Vec<ChatId>,
}

/// Forward every private text/photo to destinations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackRule {
    pub to: Vec<ChatId>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("port", &self.port)
            .field("resend", &self.resend)
            .field("feedback", &self.feedback)
            .finish()
    }
}

// ── Raw (unvalidated) shape ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub token: Option<String>,
    pub port: Option<RawPort>,
    pub resend: RawResend,
    pub feedback: RawFeedback,
}

/// Port may be written as `8080` or `"8080"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPort {
    Number(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawResend {
    pub enabled: bool,
    pub command: RawCommand,
    pub keywords: Vec<String>,
    pub from: Vec<i64>,
    pub to: Vec<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCommand {
    pub text: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFeedback {
    pub enabled: bool,
    pub to: Vec<i64>,
}

// ── Validation ──────────────────────────────────────────────────────────────

/// One broken rule, addressed by dotted path (e.g. `resend.to`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every violation found in a raw config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("config validation failed: {}", display_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn display_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn has(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

/// Validate a raw config. Either the whole config is usable or every problem
/// is reported.
pub fn validate(raw: RawConfig) -> std::result::Result<Config, ValidationError> {
    let mut violations = Vec::new();
    let mut violate = |path: &'static str, message: String| {
        violations.push(Violation { path, message });
    };

    let token = raw.token.and_then(non_empty).unwrap_or_default();
    if token.is_empty() {
        violate("token", "is required".to_string());
    } else if token.chars().count() != TOKEN_LEN {
        violate(
            "token",
            format!(
                "must be exactly {TOKEN_LEN} characters (got {})",
                token.chars().count()
            ),
        );
    }

    let port = match raw.port {
        None => {
            violate("port", "is required".to_string());
            0
        }
        Some(p) => match parse_port(&p) {
            Some(port) => port,
            None => {
                violate("port", format!("must be a port number in 1-65535 (got {p:?})"));
                0
            }
        },
    };

    let resend = if raw.resend.enabled {
        let r = raw.resend;
        let text = r.command.text.and_then(non_empty);
        let description = r.command.description.and_then(non_empty);
        if text.is_none() {
            violate("resend.command.text", "is required when resend is enabled".to_string());
        }
        if description.is_none() {
            violate(
                "resend.command.description",
                "is required when resend is enabled".to_string(),
            );
        }
        if r.from.is_empty() {
            violate("resend.from", "is required when resend is enabled".to_string());
        }
        if r.to.is_empty() {
            violate("resend.to", "is required when resend is enabled".to_string());
        }

        match (text, description) {
            (Some(text), Some(description)) => Some(ResendRule {
                trigger: CommandSpec {
                    text: normalize_command(&text),
                    description,
                },
                keywords: r
                    .keywords
                    .into_iter()
                    .filter(|k| !k.trim().is_empty())
                    .collect(),
                from: r.from.into_iter().map(ChatId).collect(),
                to: dedup_ids(r.to),
            }),
            _ => None,
        }
    } else {
        None
    };

    let feedback = if raw.feedback.enabled {
        if raw.feedback.to.is_empty() {
            violate("feedback.to", "is required when feedback is enabled".to_string());
        }
        Some(FeedbackRule {
            to: dedup_ids(raw.feedback.to),
        })
    } else {
        None
    };

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    Ok(Config {
        token,
        port,
        resend,
        feedback,
    })
}

fn parse_port(p: &RawPort) -> Option<u16> {
    let n = match p {
        RawPort::Number(n) => *n,
        RawPort::Text(s) => s.trim().parse::<i64>().ok()?,
    };
    u16::try_from(n).ok().filter(|&port| port != 0)
}

fn normalize_command(text: &str) -> String {
    let text = text.trim();
    if text.starts_with('/') {
        text.to_string()
    } else {
        format!("/{text}")
    }
}

/// Sets preserve first-seen order so fan-out order follows the config file.
fn dedup_ids(ids: Vec<i64>) -> Vec<ChatId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(*id))
        .map(ChatId)
        .collect()
}

// ── Loading ─────────────────────────────────────────────────────────────────

/// Where the configuration blob comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Inline(String),
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            // The inline blob carries the token.
            Self::Inline(_) => f.write_str("Inline(..)"),
        }
    }
}

impl ConfigSource {
    /// Pick the first source present: CLI path argument, then the
    /// `APP_CONFIG_FILE` path, then the inline `APP_CONFIG` blob. Blank
    /// values count as absent.
    pub fn locate(
        arg: Option<PathBuf>,
        file_env: Option<String>,
        inline_env: Option<String>,
    ) -> Result<Self> {
        if let Some(path) = arg.filter(|p| !p.as_os_str().is_empty()) {
            return Ok(Self::File(path));
        }
        if let Some(path) = file_env.and_then(non_empty) {
            return Ok(Self::File(PathBuf::from(path)));
        }
        inline_env.and_then(non_empty).map(Self::Inline).ok_or_else(|| {
            Error::Config(format!(
                "no configuration: pass a file path, or set {CONFIG_FILE_ENV} or {CONFIG_ENV}"
            ))
        })
    }

    pub fn read(self) -> Result<String> {
        match self {
            Self::File(path) => fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("cannot read config file {}: {e}", path.display()))
            }),
            Self::Inline(blob) => Ok(blob),
        }
    }
}

impl Config {
    /// Parse and validate a configuration blob (TOML, or JSON when it starts
    /// with `{`).
    pub fn parse(blob: &str) -> Result<Self> {
        let raw: RawConfig = if blob.trim_start().starts_with('{') {
            serde_json::from_str(blob)?
        } else {
            toml::from_str(blob)?
        };
        Ok(validate(raw)?)
    }

    /// Load from (in order) the first CLI argument, `APP_CONFIG_FILE`, or the
    /// inline `APP_CONFIG` variable. A `.env` file fills in unset variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let source = ConfigSource::locate(
            env::args_os().nth(1).map(PathBuf::from),
            env_str(CONFIG_FILE_ENV),
            env_str(CONFIG_ENV),
        )?;
        Self::from_source(source)
    }

    pub fn from_source(source: ConfigSource) -> Result<Self> {
        if let ConfigSource::File(path) = &source {
            tracing::info!(path = %path.display(), "reading config file");
        }
        Self::parse(&source.read()?)
    }

    pub fn resend_enabled(&self) -> bool {
        self.resend.is_some()
    }

    pub fn feedback_enabled(&self) -> bool {
        self.feedback.is_some()
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
