//! SIP URIs and name-addr values

use crate::header::HeaderParse;
use bytesstr::BytesStr;
use std::fmt;
use std::str::FromStr;

mod name_addr;
mod params;

pub use name_addr::NameAddr;
pub use params::{Param, Params};

/// URI scheme of a [`SipUri`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Sip,
    Sips,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => f.write_str("sip"),
            Scheme::Sips => f.write_str("sips"),
        }
    }
}

/// A `sip:` or `sips:` URI
///
/// ```
/// use webphone_sip_types::uri::SipUri;
///
/// let uri: SipUri = "sip:alice@example.org;transport=ws".parse().unwrap();
///
/// assert_eq!(uri.user.as_deref(), Some("alice"));
/// assert_eq!(uri.host, "example.org");
/// assert_eq!(uri.params.get_val("transport").unwrap(), "ws");
/// ```
#[derive(Debug, Clone)]
pub struct SipUri {
    pub scheme: Scheme,
    pub user: Option<BytesStr>,
    /// Host including an optional `:port`
    pub host: BytesStr,
    pub params: Params,
    /// Raw `?headers` part, without the `?`
    pub headers: Option<BytesStr>,
}

impl SipUri {
    pub fn new(scheme: Scheme, user: Option<BytesStr>, host: BytesStr) -> Self {
        Self {
            scheme,
            user,
            host,
            params: Params::new(),
            headers: None,
        }
    }

    /// Host without the port
    pub fn host_name(&self) -> &str {
        // IPv6 references keep their brackets
        if let Some(end) = self.host.find(']') {
            return &self.host[..=end];
        }

        match self.host.rsplit_once(':') {
            Some((host, _)) => host,
            None => &self.host,
        }
    }

    /// Copy of this URI with only scheme and host, e.g. the registrar URI of an address of record
    pub fn domain(&self) -> SipUri {
        SipUri::new(self.scheme, None, self.host.clone())
    }

    /// Compare user and host, as required for address of record comparison
    pub fn compare(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.user == other.user
            && self.host.eq_ignore_ascii_case(&other.host)
    }
}

impl FromStr for SipUri {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (scheme, rest) = match s.split_once(':') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("sip") => (Scheme::Sip, rest),
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("sips") => (Scheme::Sips, rest),
            _ => anyhow::bail!("{s:?} is not a sip or sips URI"),
        };

        let (rest, headers) = match rest.split_once('?') {
            Some((rest, headers)) => (rest, Some(BytesStr::from(headers.to_owned()))),
            None => (rest, None),
        };

        let (user, rest) = match rest.rsplit_once('@') {
            Some((userinfo, rest)) => {
                // password is never used and not kept
                let user = userinfo.split_once(':').map_or(userinfo, |(user, _)| user);

                if user.is_empty() {
                    anyhow::bail!("empty user part in {s:?}");
                }

                (Some(BytesStr::from(user.to_owned())), rest)
            }
            None => (None, rest),
        };

        let (host, params) = match rest.split_once(';') {
            Some((host, params)) => (host, Params::parse(params)?),
            None => (rest, Params::new()),
        };

        if host.is_empty() || host.contains(char::is_whitespace) {
            anyhow::bail!("invalid host in {s:?}");
        }

        Ok(SipUri {
            scheme,
            user,
            host: BytesStr::from(host.to_owned()),
            params,
            headers,
        })
    }
}

impl HeaderParse for SipUri {
    fn parse(value: &str) -> anyhow::Result<Self> {
        value.parse()
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;

        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }

        write!(f, "{}{}", self.host, self.params)?;

        if let Some(headers) = &self.headers {
            write!(f, "?{headers}")?;
        }

        Ok(())
    }
}
