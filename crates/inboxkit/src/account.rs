//! Account file loading.
//!
//! The account file is JSON and never holds the password:
//!
//! ```json
//! {
//!   "host": "imap.fastmail.com",
//!   "username": "me@fastmail.com",
//!   "security": "tls",
//!   "archive": ["Archive"]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use inboxkit_imap::{Credentials, ProviderConfig, Security};
use serde::{Deserialize, Serialize};

/// Transport security as written in the account file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountSecurity {
    /// Implicit TLS.
    #[default]
    Tls,
    /// Plain TCP, for local test servers only.
    None,
}

impl From<AccountSecurity> for Security {
    fn from(security: AccountSecurity) -> Self {
        match security {
            AccountSecurity::Tls => Self::Implicit,
            AccountSecurity::None => Self::None,
        }
    }
}

/// One IMAP account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    /// Server hostname.
    pub host: String,
    /// Server port; defaults from `security`.
    #[serde(default)]
    pub port: Option<u16>,
    /// Transport security.
    #[serde(default)]
    pub security: AccountSecurity,
    /// Login name.
    pub username: String,
    /// Archive mailboxes to try, in order. Empty means the provider default.
    #[serde(default)]
    pub archive: Vec<String>,
    /// Per-command deadline in seconds.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl Account {
    /// Reads and validates an account file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading account file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing account file {}", path.display()))
    }

    /// Parses and validates account JSON.
    pub fn from_json(raw: &str) -> Result<Self> {
        let account: Self = serde_json::from_str(raw)?;
        if account.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if account.username.is_empty() {
            bail!("username must not be empty");
        }
        if account.command_timeout_secs == Some(0) {
            bail!("command_timeout_secs must be positive");
        }
        Ok(account)
    }

    /// Builds the engine configuration.
    #[must_use]
    pub fn provider_config(&self) -> ProviderConfig {
        let mut builder = ProviderConfig::builder(&self.host).security(self.security.into());
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(secs) = self.command_timeout_secs {
            builder = builder.command_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Pairs the username with a password supplied out of band.
    #[must_use]
    pub fn credentials(&self, password: &str) -> Credentials {
        Credentials::new(&self.username, password)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_account() {
        let account =
            Account::from_json(r#"{"host": "imap.example.com", "username": "me"}"#).unwrap();
        assert_eq!(account.security, AccountSecurity::Tls);
        assert!(account.archive.is_empty());

        let config = account.provider_config();
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
    }

    #[test]
    fn test_full_account() {
        let account = Account::from_json(
            r#"{
                "host": "localhost",
                "port": 1143,
                "security": "none",
                "username": "me",
                "archive": ["Archive", "Old"],
                "command_timeout_secs": 5
            }"#,
        )
        .unwrap();

        let config = account.provider_config();
        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(account.archive, vec!["Archive", "Old"]);
    }

    #[test]
    fn test_password_field_is_rejected() {
        let err = Account::from_json(r#"{"host": "h", "username": "u", "password": "x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_validation() {
        assert!(Account::from_json(r#"{"host": " ", "username": "u"}"#).is_err());
        assert!(Account::from_json(r#"{"host": "h", "username": ""}"#).is_err());
        assert!(
            Account::from_json(r#"{"host": "h", "username": "u", "command_timeout_secs": 0}"#)
                .is_err()
        );
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let account = Account::from_json(r#"{"host": "h", "username": "u"}"#).unwrap();
        let credentials = account.credentials("pw-123");
        assert!(!format!("{credentials:?}").contains("pw-123"));
    }
}
