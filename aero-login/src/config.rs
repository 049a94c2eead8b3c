use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub account: AccountConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImapConfig {
    /// `host:port`, plain TCP
    pub address: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AccountConfig {
    pub user: String,
    pub password: Option<String>,
    /// Act as another identity (shared mailboxes, admin login)
    pub authorization_identity: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("authorization_identity", &self.authorization_identity)
            .finish()
    }
}

pub fn read_config<T: serde::de::DeserializeOwned>(config_file: PathBuf) -> Result<T> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_file.as_path())?;

    let mut config = String::new();
    file.read_to_string(&mut config)?;

    Ok(toml::from_str(&config)?)
}

fn default_connect_timeout() -> u64 {
    10
}
