//! Configuration management for TreePass.
//!
//! This module handles loading and validating environment variables and application settings.

use crate::error::{TreePassError, Result};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Default lifetime of an issued passcode.
pub const DEFAULT_PASSCODE_TTL: Duration = Duration::from_secs(10 * 60);

/// Longest accepted passcode lifetime.
pub const MAX_PASSCODE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Configuration for the application, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// QQ id of the bot account itself
    pub bot_qq_id: u64,
    /// Group where prospective members are vetted
    pub audit_group_id: u64,
    /// Groups members are admitted to after passing audit
    pub main_group_ids: Vec<u64>,
    /// Accounts allowed to pass/deny pending users
    pub auditor_qq_ids: Vec<u64>,
    /// Accounts allowed to run every admin command
    pub admin_qq_ids: Vec<u64>,
    /// Questionnaire shown to new audit group members
    pub questionnaire_link: Option<String>,
    /// Path to the JSON snapshot file
    pub data_file: String,
    /// Base URL of the OneBot HTTP API
    pub onebot_api_url: String,
    /// URL of the OneBot forward WebSocket (event stream)
    pub onebot_ws_url: String,
    /// Access token shared with the OneBot implementation
    pub onebot_access_token: Option<String>,
    /// How long an issued passcode stays valid
    pub passcode_ttl: Duration,
    /// Prefix for admin commands
    pub command_prefix: char,
    /// Recall links posted by plain members
    pub link_blocker: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This will attempt to load a .env file if present using dotenv,
    /// then read required environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required environment variable is missing or invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use treepass::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load configuration");
    /// println!("Audit group: {}", config.audit_group_id);
    /// ```
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors - it's optional)
        dotenv::dotenv().ok();

        let bot_qq_id = parse_id("BOT_QQ_ID", &required("BOT_QQ_ID")?)?;
        let audit_group_id = parse_id("AUDIT_GROUP_ID", &required("AUDIT_GROUP_ID")?)?;
        let main_group_ids = parse_id_list("MAIN_GROUP_IDS", &required("MAIN_GROUP_IDS")?)?;
        if main_group_ids.is_empty() {
            return Err(TreePassError::Config(
                "MAIN_GROUP_IDS must list at least one group id".to_string(),
            ));
        }
        if main_group_ids.contains(&audit_group_id) {
            return Err(TreePassError::Config(format!(
                "AUDIT_GROUP_ID {} must not also be a main group",
                audit_group_id
            )));
        }

        let auditor_qq_ids = parse_id_list("AUDITOR_QQ_IDS", &env::var("AUDITOR_QQ_IDS").unwrap_or_default())?;
        let admin_qq_ids = parse_id_list("ADMIN_QQ_IDS", &env::var("ADMIN_QQ_IDS").unwrap_or_default())?;

        let questionnaire_link = match env::var("QUESTIONNAIRE_LINK") {
            Ok(link) if !link.trim().is_empty() => {
                Self::validate_http_url("QUESTIONNAIRE_LINK", link.trim())?;
                Some(link.trim().to_string())
            }
            _ => None,
        };

        let data_file = Self::get_data_file()?;

        let onebot_api_url = env::var("ONEBOT_API_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        Self::validate_http_url("ONEBOT_API_URL", &onebot_api_url)?;

        let onebot_ws_url = env::var("ONEBOT_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:3001".to_string());
        Self::validate_ws_url(&onebot_ws_url)?;

        let onebot_access_token = env::var("ONEBOT_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let passcode_ttl = match env::var("PASSCODE_TTL_SECS") {
            Ok(raw) => parse_passcode_ttl(&raw)?,
            Err(_) => DEFAULT_PASSCODE_TTL,
        };

        let command_prefix = Self::parse_prefix(&env::var("COMMAND_PREFIX").unwrap_or_else(|_| ".".to_string()))?;

        let link_blocker = env::var("LINK_BLOCKER")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);

        Ok(Self {
            bot_qq_id,
            audit_group_id,
            main_group_ids,
            auditor_qq_ids,
            admin_qq_ids,
            questionnaire_link,
            data_file,
            onebot_api_url,
            onebot_ws_url,
            onebot_access_token,
            passcode_ttl,
            command_prefix,
            link_blocker,
        })
    }

    pub fn is_audit_group(&self, group_id: u64) -> bool {
        self.audit_group_id == group_id
    }

    pub fn is_main_group(&self, group_id: u64) -> bool {
        self.main_group_ids.contains(&group_id)
    }

    pub fn is_auditor(&self, qq_id: u64) -> bool {
        self.auditor_qq_ids.contains(&qq_id)
    }

    pub fn is_bot_admin(&self, qq_id: u64) -> bool {
        self.admin_qq_ids.contains(&qq_id)
    }

    /// The bot itself plus every configured admin and auditor.
    ///
    /// These accounts are never treated as audit candidates.
    pub fn staff_ids(&self) -> HashSet<u64> {
        self.admin_qq_ids
            .iter()
            .chain(self.auditor_qq_ids.iter())
            .copied()
            .chain(std::iter::once(self.bot_qq_id))
            .collect()
    }

    /// Get the data file path from environment or use default.
    fn get_data_file() -> Result<String> {
        match env::var("DATA_FILE") {
            Ok(path) => Ok(path),
            Err(_) => {
                let mut path = env::current_dir()
                    .map_err(|e| TreePassError::Config(
                        format!("Failed to determine current directory: {}", e)
                    ))?;

                path.push("data");
                path.push("bot_data.json");

                path.into_os_string()
                    .into_string()
                    .map_err(|os_str| TreePassError::Config(
                        format!("Data file path contains invalid Unicode: {:?}", os_str)
                    ))
            }
        }
    }

    fn parse_prefix(raw: &str) -> Result<char> {
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_alphanumeric() => Ok(c),
            _ => Err(TreePassError::Config(format!(
                "COMMAND_PREFIX must be a single non-alphanumeric character, got: '{}'",
                raw
            ))),
        }
    }

    /// Validate an http(s) URL using proper URL parsing.
    fn validate_http_url(name: &str, url_str: &str) -> Result<()> {
        Self::validate_url(name, url_str, &["http", "https"])
    }

    fn validate_ws_url(url_str: &str) -> Result<()> {
        Self::validate_url("ONEBOT_WS_URL", url_str, &["ws", "wss"])
    }

    fn validate_url(name: &str, url_str: &str, schemes: &[&str]) -> Result<()> {
        use url::Url;

        let parsed_url = Url::parse(url_str)
            .map_err(|e| TreePassError::Config(
                format!("Invalid {} '{}': {}", name, url_str, e)
            ))?;

        if !schemes.contains(&parsed_url.scheme()) {
            return Err(TreePassError::Config(format!(
                "{} must use one of the schemes {:?}, got: '{}'",
                name,
                schemes,
                parsed_url.scheme()
            )));
        }

        if parsed_url.host_str().is_none() {
            return Err(TreePassError::Config(
                format!("{} must contain a valid host: '{}'", name, url_str)
            ));
        }

        Ok(())
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| TreePassError::Config(format!(
        "Missing {} environment variable. Set it in your environment or create a .env file.",
        name
    )))
}

fn parse_id(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| TreePassError::Config(format!("Invalid QQ id in {}: '{}'", name, raw)))
}

/// Parse `PASSCODE_TTL_SECS`: whole seconds, at least 1, at most
/// [`MAX_PASSCODE_TTL`].
fn parse_passcode_ttl(raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| TreePassError::Config(format!("Invalid PASSCODE_TTL_SECS: '{}'", raw)))?;
    if secs == 0 || secs > MAX_PASSCODE_TTL.as_secs() {
        return Err(TreePassError::Config(format!(
            "PASSCODE_TTL_SECS must be between 1 and {}, got: {}",
            MAX_PASSCODE_TTL.as_secs(),
            secs
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse a comma (or whitespace) separated list of QQ ids.
fn parse_id_list(name: &str, raw: &str) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if part.is_empty() {
            continue;
        }
        let id = parse_id(name, part)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
