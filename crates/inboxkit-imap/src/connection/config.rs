//! Connection configuration types.

use std::time::Duration;

/// Default deadline for a single command round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Default deadline for opening the socket and receiving the greeting.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Only for local testing.**
    None,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => 993,
        }
    }

    /// Returns true if the transport must be TLS.
    #[must_use]
    pub const fn requires_tls(self) -> bool {
        matches!(self, Self::Implicit)
    }
}

/// Where and how to reach a mail provider's IMAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Whether the server advertises IDLE. Carried for collaborators; the
    /// engine itself never issues IDLE.
    pub supports_idle: bool,
    /// Deadline for connecting and reading the greeting.
    pub connect_timeout: Duration,
    /// Deadline for each command round trip.
    pub command_timeout: Duration,
}

impl ProviderConfig {
    /// Creates a configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ProviderConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(host)
    }

    /// Gmail (`imap.gmail.com:993`).
    #[must_use]
    pub fn gmail() -> Self {
        Self::builder("imap.gmail.com").supports_idle(true).build()
    }

    /// Outlook / Microsoft 365 (`outlook.office365.com:993`).
    #[must_use]
    pub fn outlook() -> Self {
        Self::builder("outlook.office365.com")
            .supports_idle(true)
            .build()
    }

    /// iCloud Mail (`imap.mail.me.com:993`).
    #[must_use]
    pub fn icloud() -> Self {
        Self::builder("imap.mail.me.com").supports_idle(true).build()
    }

    /// Yahoo Mail (`imap.mail.yahoo.com:993`).
    #[must_use]
    pub fn yahoo() -> Self {
        Self::builder("imap.mail.yahoo.com").build()
    }

    /// Fastmail (`imap.fastmail.com:993`).
    #[must_use]
    pub fn fastmail() -> Self {
        Self::builder("imap.fastmail.com")
            .supports_idle(true)
            .build()
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug, Clone)]
pub struct ProviderConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    supports_idle: bool,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl ProviderConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            supports_idle: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Records whether the server supports IDLE.
    #[must_use]
    pub const fn supports_idle(mut self, supported: bool) -> Self {
        self.supports_idle = supported;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ProviderConfig {
        ProviderConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            supports_idle: self.supports_idle,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        }
    }
}

/// LOGIN credentials. The password is usually a provider app password.
///
/// `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &crate::command::REDACTED)
            .finish()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
        assert!(Security::Implicit.requires_tls());
        assert!(!Security::None.requires_tls());
    }

    #[test]
    fn test_config_new() {
        let config = ProviderConfig::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert!(!config.supports_idle);
        assert_eq!(config.command_timeout, Duration::from_secs(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = ProviderConfig::builder("localhost")
            .port(1143)
            .security(Security::None)
            .command_timeout(Duration::from_millis(200))
            .connect_timeout(Duration::from_secs(5))
            .supports_idle(true)
            .build();

        assert_eq!(config.port, 1143);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.command_timeout, Duration::from_millis(200));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.supports_idle);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = ProviderConfig::builder("localhost")
            .security(Security::None)
            .build();
        assert_eq!(config.port, 143);
    }

    #[test]
    fn test_presets() {
        assert_eq!(ProviderConfig::gmail().host, "imap.gmail.com");
        assert_eq!(ProviderConfig::outlook().host, "outlook.office365.com");
        assert_eq!(ProviderConfig::icloud().host, "imap.mail.me.com");
        assert_eq!(ProviderConfig::yahoo().host, "imap.mail.yahoo.com");
        assert_eq!(ProviderConfig::fastmail().port, 993);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("alice@example.com", "s3cret-app-pw");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("alice@example.com"));
        assert!(!rendered.contains("s3cret-app-pw"));
        assert_eq!(credentials.password(), "s3cret-app-pw");
    }
}
