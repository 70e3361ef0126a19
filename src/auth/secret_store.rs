use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mail_relay";

/// Credentials that may live in the OS keyring instead of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Secret {
    BotToken,
    MailPassword,
}

impl Secret {
    fn account(self) -> &'static str {
        match self {
            Secret::BotToken => "bot-token",
            Secret::MailPassword => "mail-password",
        }
    }
}

/// Save a secret into the OS keyring
pub fn save_secret(secret: Secret, value: &str) -> Result<()> {
    let entry = Entry::new(SERVICE, secret.account());
    entry?
        .set_password(value)
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Load a secret from the keyring; `None` when it was never stored
pub fn load_secret(secret: Secret) -> Result<Option<String>> {
    let entry = Entry::new(SERVICE, secret.account());
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}
