use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::secret_store::Secret;
use crate::domain::chat::ChatId;
use crate::relay::RelaySettings;

const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 10;
const DEFAULT_UNSEEN_BATCH: usize = 5;
const DEFAULT_RECENT_BATCH: usize = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_ACCESS_PASSWORD: &str = "secret123";

/// On-disk configuration. Every field is optional so the environment can
/// fill in whatever the file leaves out.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    pub allowed_chats: Vec<String>,
    pub imap_server: Option<String>,
    pub imap_port: Option<u16>,
    pub user_email: Option<String>,
    pub mail_password: Option<String>,
    pub access_password: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub page_size: Option<u32>,
    pub unseen_batch: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cron_secret: Option<String>,
    pub db_path: Option<String>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("mail_relay"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("mail_relay.db");
    Ok(p)
}

/// Read the config file, writing a template first if there is none, then
/// apply environment overrides.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    let mut cfg = if path.exists() {
        let s = fs::read_to_string(&path)?;
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?
    } else {
        fs::write(&path, toml::to_string_pretty(&template_config())?)?;
        warn!(
            "Created template config at {}; edit it or use environment variables",
            path.display()
        );
        Config::default()
    };
    cfg.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Template written on first run. No chat is allowed and no token is set
/// until the user fills them in.
fn template_config() -> Config {
    Config {
        imap_server: Some("imap.gmail.com".to_string()),
        imap_port: Some(DEFAULT_IMAP_PORT),
        user_email: Some("you@example.com".to_string()),
        ..Config::default()
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid value for {key}: {raw:?} ({e})"))
}

/// Comma-separated chat ids; blanks dropped.
pub fn parse_chat_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Overwrite fields from `lookup` (normally the process environment).
    /// Empty values count as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_CHAT_ID") {
            self.allowed_chats = parse_chat_list(&v);
        }
        if let Some(v) = get("IMAP_SERVER") {
            self.imap_server = Some(v);
        }
        if let Some(v) = get("IMAP_PORT") {
            self.imap_port = Some(parse_var("IMAP_PORT", &v)?);
        }
        if let Some(v) = get("MAIL_USER") {
            self.user_email = Some(v);
        }
        if let Some(v) = get("MAIL_PASSWORD") {
            self.mail_password = Some(v);
        }
        if let Some(v) = get("BOT_PASSWORD") {
            self.access_password = Some(v);
        }
        if let Some(v) = get("POLL_INTERVAL") {
            self.poll_interval_secs = Some(parse_var("POLL_INTERVAL", &v)?);
        }
        if let Some(v) = get("HOST") {
            self.host = Some(v);
        }
        if let Some(v) = get("PORT") {
            self.port = Some(parse_var("PORT", &v)?);
        }
        if let Some(v) = get("CRON_SECRET") {
            self.cron_secret = Some(v);
        }
        if let Some(v) = get("DB_PATH") {
            self.db_path = Some(v);
        }
        Ok(())
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub allowed_chats: Vec<ChatId>,
    pub imap_server: String,
    pub imap_port: u16,
    pub user_email: String,
    pub mail_password: String,
    pub access_password: String,
    pub poll_interval: Duration,
    pub page_size: u32,
    pub unseen_batch: usize,
    pub timeout: Duration,
    pub listen_addr: String,
    pub cron_secret: Option<String>,
    pub db_path: PathBuf,
}

/// Config value first, keyring second.
fn secret_or<K>(value: &Option<String>, secret: Secret, keyring: &K) -> Result<Option<String>>
where
    K: Fn(Secret) -> Result<Option<String>>,
{
    match value {
        Some(v) => Ok(Some(v.clone())),
        None => keyring(secret),
    }
}

pub fn resolve_bot_token<K>(cfg: &Config, keyring: K) -> Result<String>
where
    K: Fn(Secret) -> Result<Option<String>>,
{
    secret_or(&cfg.bot_token, Secret::BotToken, &keyring)?.ok_or_else(|| {
        anyhow!("bot token not set (config, TELEGRAM_BOT_TOKEN or `set-secret --name bot-token`)")
    })
}

impl Settings {
    pub fn resolve<K>(cfg: &Config, keyring: K) -> Result<Self>
    where
        K: Fn(Secret) -> Result<Option<String>>,
    {
        let bot_token = resolve_bot_token(cfg, &keyring)?;
        let mail_password = secret_or(&cfg.mail_password, Secret::MailPassword, &keyring)?
            .ok_or_else(|| {
                anyhow!(
                    "mail password not set (config, MAIL_PASSWORD or `set-secret --name mail-password`)"
                )
            })?;
        let imap_server = cfg
            .imap_server
            .clone()
            .ok_or_else(|| anyhow!("imap_server not set in config"))?;
        let user_email = cfg
            .user_email
            .clone()
            .ok_or_else(|| anyhow!("user_email not set in config"))?;

        if cfg.allowed_chats.is_empty() {
            warn!("no allowed chats configured; every chat will be refused");
        }
        let access_password = match &cfg.access_password {
            Some(p) => p.clone(),
            None => {
                warn!("no access password configured; using the built-in default");
                DEFAULT_ACCESS_PASSWORD.to_string()
            }
        };

        let db_path = match &cfg.db_path {
            Some(p) => PathBuf::from(p),
            None => default_db_path()?,
        };

        Ok(Settings {
            bot_token,
            allowed_chats: cfg.allowed_chats.iter().map(|c| ChatId::from(c.as_str())).collect(),
            imap_server,
            imap_port: cfg.imap_port.unwrap_or(DEFAULT_IMAP_PORT),
            user_email,
            mail_password,
            access_password,
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS)),
            page_size: cfg.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            unseen_batch: cfg.unseen_batch.unwrap_or(DEFAULT_UNSEEN_BATCH).max(1),
            timeout: Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            listen_addr: format!(
                "{}:{}",
                cfg.host.as_deref().unwrap_or(DEFAULT_HOST),
                cfg.port.unwrap_or(DEFAULT_PORT)
            ),
            cron_secret: cfg.cron_secret.clone().filter(|s| !s.is_empty()),
            db_path,
        })
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            allowed_chats: self.allowed_chats.clone(),
            page_size: self.page_size,
            unseen_batch: self.unseen_batch,
            recent_batch: DEFAULT_RECENT_BATCH,
        }
    }
}
