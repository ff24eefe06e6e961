use crate::error::ConfigError;
use sip_auth::{DigestAuthenticator, DigestCredentials, DigestUser};
use sip_types::uri::SipUri;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_REGISTER_EXPIRES: Duration = Duration::from_secs(600);

/// Everything needed to connect and register an account
///
/// Changing any field requires a new [`Client::connect`](crate::Client::connect).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub display_name: Option<String>,
    /// Address of record, e.g. `sip:alice@example.org`
    pub uri: String,
    pub auth_username: String,
    pub password: String,
    /// Signaling server, must be a `wss://` url
    pub ws_server: String,
    pub ice_servers: Vec<IceServer>,
    /// Requested lifetime of the registration binding
    pub register_expires: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(
        uri: impl Into<String>,
        auth_username: impl Into<String>,
        password: impl Into<String>,
        ws_server: impl Into<String>,
    ) -> Self {
        Self {
            display_name: None,
            uri: uri.into(),
            auth_username: auth_username.into(),
            password: password.into(),
            ws_server: ws_server.into(),
            ice_servers: vec![],
            register_expires: DEFAULT_REGISTER_EXPIRES,
            user_agent: concat!("webphone/", env!("CARGO_PKG_VERSION")).into(),
        }
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.display_name = (!display_name.trim().is_empty()).then_some(display_name);
        self
    }

    pub fn ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn register_expires(mut self, expires: Duration) -> Self {
        self.register_expires = expires;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns if enough is configured to attempt a connection
    ///
    /// Does not validate the values, see [`ClientConfig::validate`].
    pub fn is_complete(&self) -> bool {
        [&self.ws_server, &self.uri, &self.password]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validated().map(|_| ())
    }

    pub(crate) fn validated(&self) -> Result<ValidConfig, ConfigError> {
        for (name, value) in [
            ("uri", &self.uri),
            ("auth username", &self.auth_username),
            ("password", &self.password),
            ("server", &self.ws_server),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }

        let aor: SipUri = self
            .uri
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidUri(self.uri.clone()))?;

        if aor.user.is_none() {
            return Err(ConfigError::InvalidUri(self.uri.clone()));
        }

        let server = Url::parse(self.ws_server.trim())
            .map_err(|_| ConfigError::InvalidServer(self.ws_server.clone()))?;

        if server.scheme() != "wss" {
            return Err(ConfigError::InsecureServer(self.ws_server.clone()));
        }

        if server.host_str().is_none() {
            return Err(ConfigError::InvalidServer(self.ws_server.clone()));
        }

        for ice_server in &self.ice_servers {
            IceServer::parse(&ice_server.url)?;
        }

        let expires = self.register_expires.as_secs();
        if expires == 0 || expires > u64::from(u32::MAX) {
            return Err(ConfigError::InvalidExpires(self.register_expires));
        }

        Ok(ValidConfig {
            config: self.clone(),
            aor,
            server,
        })
    }
}

/// A config that passed [`ClientConfig::validate`]
#[derive(Debug, Clone)]
pub(crate) struct ValidConfig {
    pub(crate) config: ClientConfig,
    pub(crate) aor: SipUri,
    pub(crate) server: Url,
}

impl ValidConfig {
    /// Authenticator answering challenges with the configured credentials
    pub(crate) fn authenticator(&self) -> DigestAuthenticator {
        DigestAuthenticator::new(DigestCredentials::with_default(DigestUser::new(
            self.config.auth_username.clone(),
            self.config.password.clone(),
        )))
    }

    pub(crate) fn register_expires_secs(&self) -> u32 {
        u32::try_from(self.config.register_expires.as_secs()).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceScheme {
    Stun,
    Stuns,
    Turn,
    Turns,
}

/// A STUN or TURN server used for ICE candidate gathering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub scheme: IceScheme,
    /// Full uri, e.g. `stun:stun.example.org:3478`
    pub url: String,
}

impl IceServer {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();

        let invalid = || ConfigError::InvalidIceServer(url.to_owned());

        let (scheme, rest) = url.split_once(':').ok_or_else(invalid)?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "stun" => IceScheme::Stun,
            "stuns" => IceScheme::Stuns,
            "turn" => IceScheme::Turn,
            "turns" => IceScheme::Turns,
            _ => return Err(invalid()),
        };

        // host must be present and there is no authority part (RFC 7064)
        if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            scheme,
            url: url.to_owned(),
        })
    }

    /// Parse a free text list, entries are separated by newlines or commas
    ///
    /// ```
    /// use webphone::IceServer;
    ///
    /// let servers = IceServer::parse_list("stun:stun.l.google.com:19302\n\n turn:turn.example.org, ").unwrap();
    ///
    /// assert_eq!(servers.len(), 2);
    /// ```
    pub fn parse_list(text: &str) -> Result<Vec<Self>, ConfigError> {
        text.split(['\n', ','])
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(IceServer::parse)
            .collect()
    }
}

impl fmt::Display for IceServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
