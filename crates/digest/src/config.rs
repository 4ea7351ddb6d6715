//! Configuration for the digest run.
//!
//! Everything is read from environment variables once at startup and
//! validated up front, so a misconfigured run fails before any network call.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use lettre::message::Mailbox;
use regex::Regex;

use crate::error::{DigestError, DigestResult};
use crate::types::{InterestProfile, PreprintServer};

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default lookback window in days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 1;

/// Default cap on papers sent to the ranker.
pub const DEFAULT_MAX_PAPERS_FOR_AI: usize = 60;

/// SMTP connection settings.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// App password.
    pub password: String,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Generative-AI settings.
#[derive(Clone)]
pub struct AiSettings {
    pub api_key: String,
    pub model: String,
    pub fallback_model: Option<String>,
}

impl AiSettings {
    /// Models to try, in order.
    pub fn models(&self) -> Vec<String> {
        std::iter::once(self.model.clone())
            .chain(self.fallback_model.clone())
            .collect()
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("fallback_model", &self.fallback_model)
            .finish()
    }
}

/// Preprint feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub server: PreprintServer,
    /// Optional subject category filter (e.g. `immunology`).
    pub category: Option<String>,
    pub lookback_days: u32,
    /// Maximum number of fetched papers offered to the ranker.
    pub max_papers_for_ai: usize,
}

/// Email recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

/// Validated configuration for one digest run.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub interests: InterestProfile,
    pub feed: FeedSettings,
    pub ai: AiSettings,
    pub smtp: SmtpSettings,
    pub from_email: String,
    pub recipients: Recipients,
    /// Require a full selection (five, or every candidate when fewer).
    pub strict_selection: bool,
    /// JSON array of concept topics replacing the built-in catalogue.
    pub topics_file: Option<PathBuf>,
}

impl DigestConfig {
    /// Create configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `DIGEST_INTERESTS`: free-text interest profile
    /// - `GEMINI_API_KEY`: Gemini API key
    /// - `SMTP_HOST`, `SMTP_USER`, `SMTP_PASSWORD`: SMTP account
    /// - `EMAIL_TO`: comma/semicolon separated recipients
    ///
    /// # Optional Environment Variables
    /// - `GEMINI_MODEL` (default: gemini-2.5-flash)
    /// - `GEMINI_FALLBACK_MODEL` (default: gemini-2.5-flash-lite, empty disables)
    /// - `BIORXIV_SERVER` (default: biorxiv), `BIORXIV_CATEGORY`
    /// - `LOOKBACK_DAYS` (default: 1), `MAX_PAPERS_FOR_AI` (default: 60)
    /// - `DIGEST_STRICT_SELECTION` (default: false), `DIGEST_TOPICS_FILE`
    /// - `SMTP_PORT` (default: 587), `EMAIL_FROM` (default: SMTP_USER)
    /// - `EMAIL_CC`, `EMAIL_BCC`
    pub fn from_env() -> DigestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> DigestResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let interests = InterestProfile::new(vars.required("DIGEST_INTERESTS")?)
            .ok_or_else(|| missing("DIGEST_INTERESTS"))?;

        let server = match vars.optional("BIORXIV_SERVER") {
            Some(raw) => PreprintServer::parse(&raw).ok_or_else(|| {
                invalid("BIORXIV_SERVER", &raw, "expected 'biorxiv' or 'medrxiv'")
            })?,
            None => PreprintServer::Biorxiv,
        };

        let max_papers_for_ai =
            vars.parsed("MAX_PAPERS_FOR_AI", DEFAULT_MAX_PAPERS_FOR_AI)?;
        if max_papers_for_ai == 0 {
            return Err(invalid("MAX_PAPERS_FOR_AI", "0", "must be at least 1"));
        }

        let feed = FeedSettings {
            server,
            category: vars.optional("BIORXIV_CATEGORY"),
            lookback_days: vars.parsed("LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
            max_papers_for_ai,
        };

        let ai = AiSettings {
            api_key: vars.required("GEMINI_API_KEY")?,
            model: vars
                .optional("GEMINI_MODEL")
                .unwrap_or_else(|| ai::gemini::DEFAULT_MODEL.to_string()),
            fallback_model: match vars.raw("GEMINI_FALLBACK_MODEL") {
                Some(raw) if raw.trim().is_empty() => None,
                Some(raw) => Some(raw.trim().to_string()),
                None => Some(ai::gemini::DEFAULT_FALLBACK_MODEL.to_string()),
            },
        };

        let smtp = SmtpSettings {
            host: vars.required("SMTP_HOST")?,
            port: vars.parsed("SMTP_PORT", DEFAULT_SMTP_PORT)?,
            username: vars.required("SMTP_USER")?,
            password: vars.required("SMTP_PASSWORD")?,
        };

        let from_email = vars
            .optional("EMAIL_FROM")
            .unwrap_or_else(|| smtp.username.clone());
        validate_address("EMAIL_FROM", &from_email)?;

        let recipients = Recipients {
            to: vars.address_list("EMAIL_TO")?,
            cc: vars.address_list("EMAIL_CC")?,
            bcc: vars.address_list("EMAIL_BCC")?,
        };
        if recipients.to.is_empty() {
            return Err(DigestError::Config(
                "EMAIL_TO must contain at least one recipient".to_string(),
            ));
        }

        let strict_selection = match vars.optional("DIGEST_STRICT_SELECTION") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                invalid("DIGEST_STRICT_SELECTION", &raw, "expected true or false")
            })?,
            None => false,
        };

        Ok(Self {
            interests,
            feed,
            ai,
            smtp,
            from_email,
            recipients,
            strict_selection,
            topics_file: vars.optional("DIGEST_TOPICS_FILE").map(PathBuf::from),
        })
    }
}

/// Typed access over a variable lookup function.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Non-blank value, trimmed.
    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> DigestResult<String> {
        self.optional(key).ok_or_else(|| missing(key))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> DigestResult<T> {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid(key, &raw, "expected a non-negative integer")),
            None => Ok(default),
        }
    }

    fn address_list(&self, key: &str) -> DigestResult<Vec<String>> {
        let list = parse_recipients(&self.optional(key).unwrap_or_default());
        for address in &list {
            validate_address(key, address)?;
        }
        Ok(list)
    }
}

static RECIPIENT_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]+").expect("valid separator regex"));

/// Split a comma/semicolon separated recipient list.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    RECIPIENT_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_address(key: &str, address: &str) -> DigestResult<()> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| invalid(key, address, &e.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn missing(key: &str) -> DigestError {
    DigestError::Config(format!("{key} environment variable not set"))
}

fn invalid(key: &str, value: &str, reason: &str) -> DigestError {
    DigestError::Config(format!("{key}='{value}' is invalid: {reason}"))
}
