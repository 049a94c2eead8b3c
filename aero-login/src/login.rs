use std::io::Write;

use anyhow::{bail, Result};

use aero_sasl::types::{CredentialProvider, Notifier};

use crate::config::AccountConfig;

/// Credentials from the configuration file. The password falls back to the
/// environment, then to a prompt, when the file has none.
pub struct ConfigAccount {
    config: AccountConfig,
}

impl ConfigAccount {
    pub fn new(mut config: AccountConfig, maybe_password: Option<String>) -> Self {
        if config.password.is_none() {
            config.password = maybe_password;
        }
        Self { config }
    }
}

impl CredentialProvider for ConfigAccount {
    fn username(&mut self) -> Result<String> {
        if self.config.user.is_empty() {
            bail!("No user configured for this account");
        }
        Ok(self.config.user.clone())
    }

    fn password(&mut self) -> Result<String> {
        if let Some(pwd) = &self.config.password {
            return Ok(pwd.clone());
        }

        let pwd = rpassword::prompt_password(format!("Password for {}: ", self.config.user))?;
        if pwd.is_empty() {
            bail!("Empty password");
        }
        self.config.password = Some(pwd.clone());
        Ok(pwd)
    }

    fn authorization_identity(&self) -> Option<String> {
        self.config.authorization_identity.clone()
    }
}

/// A one-line status on stderr
#[derive(Default)]
pub struct ConsoleNotifier {
    dirty: bool,
}

impl ConsoleNotifier {
    fn erase(&mut self) {
        if self.dirty {
            eprint!("\r\x1b[2K");
            self.dirty = false;
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn progress(&mut self, msg: &str) {
        self.erase();
        eprint!("{}", msg);
        let _ = std::io::stderr().flush();
        self.dirty = true;
    }

    fn error(&mut self, msg: &str) {
        self.erase();
        eprintln!("{}", msg);
    }

    fn clear(&mut self) {
        self.erase();
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(password: Option<&str>) -> AccountConfig {
        AccountConfig {
            user: "alice".to_string(),
            password: password.map(String::from),
            authorization_identity: None,
        }
    }

    #[test]
    fn test_password_precedence() {
        let mut acc = ConfigAccount::new(account(Some("from-file")), None);
        assert_eq!(acc.username().unwrap(), "alice");
        assert_eq!(acc.password().unwrap(), "from-file");

        let mut acc = ConfigAccount::new(account(Some("from-file")), Some("from-env".into()));
        assert_eq!(acc.password().unwrap(), "from-file");
        assert!(acc.authorization_identity().is_none());

        let mut acc = ConfigAccount::new(account(None), Some("from-env".into()));
        assert_eq!(acc.password().unwrap(), "from-env");
    }

    #[test]
    fn test_empty_user() {
        let mut cfg = account(Some("pwd"));
        cfg.user = String::new();
        assert!(ConfigAccount::new(cfg, None).username().is_err());
    }
}
