use crate::header::HeaderParse;
use crate::parse::{parse_quoted, token, whitespace};
use anyhow::{bail, Context};
use bytesstr::BytesStr;
use std::fmt::{self, Write};

/// Param contained inside an authentication header
///
/// Always printed quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParam {
    pub name: BytesStr,
    pub value: BytesStr,
}

impl fmt::Display for AuthParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"{}="{}""#, self.name, self.value)
    }
}

/// `WWW-Authenticate` or `Proxy-Authenticate` value
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum AuthChallenge {
    Digest(DigestChallenge),
    Other { scheme: BytesStr, params: Vec<AuthParam> },
}

impl HeaderParse for AuthChallenge {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let (scheme, params) = parse_auth_params(value)?;

        if scheme.eq_ignore_ascii_case("Digest") {
            Ok(Self::Digest(DigestChallenge::from_auth_params(params)?))
        } else {
            Ok(Self::Other { scheme, params })
        }
    }
}

impl fmt::Display for AuthChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthChallenge::Digest(digest) => digest.fmt(f),
            AuthChallenge::Other { scheme, params } => print_other(f, scheme, params),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: BytesStr,
    pub domain: Option<BytesStr>,
    pub nonce: BytesStr,
    pub opaque: Option<BytesStr>,
    pub stale: bool,
    pub algorithm: Algorithm,
    pub qop: Vec<QopOption>,
    pub userhash: bool,
    /// Remaining fields
    pub other: Vec<AuthParam>,
}

impl DigestChallenge {
    fn from_auth_params(params: Vec<AuthParam>) -> anyhow::Result<Self> {
        let mut realm = None;
        let mut domain = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut stale = false;
        let mut algorithm = Algorithm::MD5;
        let mut qop = vec![];
        let mut userhash = false;
        let mut other = vec![];

        for param in params {
            match param.name.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(param.value),
                "domain" => domain = Some(param.value),
                "nonce" => nonce = Some(param.value),
                "opaque" => opaque = Some(param.value),
                "stale" => stale = param.value.eq_ignore_ascii_case("true"),
                "algorithm" => algorithm = Algorithm::from(param.value.as_str()),
                "qop" => qop.extend(
                    param
                        .value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(QopOption::from),
                ),
                "userhash" => userhash = param.value.eq_ignore_ascii_case("true"),
                _ => other.push(param),
            }
        }

        Ok(Self {
            realm: realm.context("Missing realm in authenticate header")?,
            domain,
            nonce: nonce.context("Missing nonce in authenticate header")?,
            opaque,
            stale,
            algorithm,
            qop,
            userhash,
            other,
        })
    }
}

impl fmt::Display for DigestChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"Digest realm="{}", nonce="{}""#, self.realm, self.nonce)?;

        if let Some(domain) = &self.domain {
            write!(f, r#", domain="{domain}""#)?;
        }

        if let Some(opaque) = &self.opaque {
            write!(f, r#", opaque="{opaque}""#)?;
        }

        if self.stale {
            f.write_str(", stale=true")?;
        }

        if self.algorithm != Algorithm::MD5 {
            write!(f, ", algorithm={}", self.algorithm)?;
        }

        let mut qop_iter = self.qop.iter();

        if let Some(first) = qop_iter.next() {
            write!(f, r#", qop="{first}"#)?;

            for qop_option in qop_iter {
                write!(f, ",{qop_option}")?;
            }

            f.write_char('"')?;
        }

        if self.userhash {
            f.write_str(", userhash=true")?;
        }

        for param in &self.other {
            write!(f, ", {param}")?;
        }

        Ok(())
    }
}

/// `Authorization` or `Proxy-Authorization` value
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum AuthResponse {
    Digest(DigestResponse),
    Other { scheme: BytesStr, params: Vec<AuthParam> },
}

impl HeaderParse for AuthResponse {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let (scheme, params) = parse_auth_params(value)?;

        if scheme.eq_ignore_ascii_case("Digest") {
            Ok(Self::Digest(DigestResponse::from_auth_params(params)?))
        } else {
            Ok(Self::Other { scheme, params })
        }
    }
}

impl fmt::Display for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthResponse::Digest(digest) => digest.fmt(f),
            AuthResponse::Other { scheme, params } => print_other(f, scheme, params),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DigestResponse {
    pub username: BytesStr,
    pub realm: BytesStr,
    pub nonce: BytesStr,
    pub uri: BytesStr,
    pub response: BytesStr,
    pub algorithm: Algorithm,
    pub opaque: Option<BytesStr>,
    pub qop_response: Option<QopResponse>,
    pub userhash: bool,
    /// Remaining fields
    pub other: Vec<AuthParam>,
}

impl DigestResponse {
    fn from_auth_params(params: Vec<AuthParam>) -> anyhow::Result<Self> {
        let mut username = None;
        let mut realm = None;
        let mut nonce = None;
        let mut uri = None;
        let mut response = None;
        let mut algorithm = Algorithm::MD5;
        let mut opaque = None;
        let mut qop = None;
        let mut cnonce = None;
        let mut nc = None;
        let mut userhash = false;
        let mut other = vec![];

        for param in params {
            match param.name.to_ascii_lowercase().as_str() {
                "username" => username = Some(param.value),
                "realm" => realm = Some(param.value),
                "nonce" => nonce = Some(param.value),
                "uri" => uri = Some(param.value),
                "response" => response = Some(param.value),
                "algorithm" => algorithm = Algorithm::from(param.value.as_str()),
                "opaque" => opaque = Some(param.value),
                "qop" => qop = Some(QopOption::from(param.value.as_str())),
                "cnonce" => cnonce = Some(param.value),
                "nc" => nc = Some(u32::from_str_radix(&param.value, 16)),
                "userhash" => userhash = param.value.eq_ignore_ascii_case("true"),
                _ => other.push(param),
            }
        }

        let qop_response = match qop {
            Some(qop) => Some(QopResponse {
                qop,
                cnonce: cnonce.context("Missing cnonce in authorization header")?,
                nc: nc
                    .context("Missing nc in authorization header")?
                    .context("Failed to parse nc value")?,
            }),
            None => None,
        };

        Ok(Self {
            username: username.context("Missing username in authorization header")?,
            realm: realm.context("Missing realm in authorization header")?,
            nonce: nonce.context("Missing nonce in authorization header")?,
            uri: uri.context("Missing uri in authorization header")?,
            response: response.context("Missing response in authorization header")?,
            algorithm,
            opaque,
            qop_response,
            userhash,
            other,
        })
    }
}

impl fmt::Display for DigestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            self.username, self.realm, self.nonce, self.uri, self.response
        )?;

        if self.algorithm != Algorithm::MD5 {
            write!(f, ", algorithm={}", self.algorithm)?;
        }

        if let Some(opaque) = &self.opaque {
            write!(f, r#", opaque="{opaque}""#)?;
        }

        if let Some(qop_response) = &self.qop_response {
            write!(
                f,
                r#", qop={}, cnonce="{}", nc={:08x}"#,
                qop_response.qop, qop_response.cnonce, qop_response.nc
            )?;
        }

        if self.userhash {
            f.write_str(", userhash=true")?;
        }

        for param in &self.other {
            write!(f, ", {param}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QopResponse {
    pub qop: QopOption,
    pub cnonce: BytesStr,
    pub nc: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QopOption {
    Auth,
    AuthInt,
    Other(BytesStr),
}

impl From<&str> for QopOption {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("auth") {
            Self::Auth
        } else if value.eq_ignore_ascii_case("auth-int") {
            Self::AuthInt
        } else {
            Self::Other(BytesStr::from(value.to_owned()))
        }
    }
}

impl fmt::Display for QopOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QopOption::Auth => f.write_str("auth"),
            QopOption::AuthInt => f.write_str("auth-int"),
            QopOption::Other(token) => f.write_str(token),
        }
    }
}

/// Digest hash algorithms (RFC 7616 Section 6.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Algorithm {
    MD5,
    MD5Sess,
    SHA256,
    SHA256Sess,
    SHA512256,
    SHA512256Sess,
    Other(BytesStr),
}

impl From<&str> for Algorithm {
    fn from(value: &str) -> Self {
        const KNOWN: [(&str, Algorithm); 6] = [
            ("MD5", Algorithm::MD5),
            ("MD5-sess", Algorithm::MD5Sess),
            ("SHA-256", Algorithm::SHA256),
            ("SHA-256-sess", Algorithm::SHA256Sess),
            ("SHA-512-256", Algorithm::SHA512256),
            ("SHA-512-256-sess", Algorithm::SHA512256Sess),
        ];

        KNOWN
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, algorithm)| algorithm)
            .unwrap_or_else(|| Algorithm::Other(BytesStr::from(value.to_owned())))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::MD5 => f.write_str("MD5"),
            Algorithm::MD5Sess => f.write_str("MD5-sess"),
            Algorithm::SHA256 => f.write_str("SHA-256"),
            Algorithm::SHA256Sess => f.write_str("SHA-256-sess"),
            Algorithm::SHA512256 => f.write_str("SHA-512-256"),
            Algorithm::SHA512256Sess => f.write_str("SHA-512-256-sess"),
            Algorithm::Other(other) => f.write_str(other),
        }
    }
}

fn print_other(f: &mut fmt::Formatter<'_>, scheme: &str, params: &[AuthParam]) -> fmt::Result {
    write!(f, "{scheme} ")?;

    for (idx, param) in params.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{param}")?;
    }

    Ok(())
}

/// Parse `<scheme> name=value, name="quoted value", ...`
fn parse_auth_params(i: &str) -> anyhow::Result<(BytesStr, Vec<AuthParam>)> {
    let i = i.trim_matches(whitespace);

    let (scheme, mut rest) = match i.split_once(whitespace) {
        Some((scheme, rest)) => (scheme, rest),
        None => (i, ""),
    };

    if scheme.is_empty() || !scheme.chars().all(token) {
        bail!("invalid auth scheme {scheme:?}");
    }

    let mut params = vec![];

    loop {
        rest = rest.trim_start_matches(|c: char| whitespace(c) || c == ',');

        if rest.is_empty() {
            break;
        }

        let name_end = rest.find(|c: char| !token(c)).unwrap_or(rest.len());
        let (name, after) = rest.split_at(name_end);

        if name.is_empty() {
            bail!("expected auth param name at {rest:?}");
        }

        let Some(after) = after.trim_start_matches(whitespace).strip_prefix('=') else {
            bail!("expected '=' after auth param {name:?}");
        };

        let after = after.trim_start_matches(whitespace);

        let (value, after) = if after.starts_with('"') {
            let (after, value) =
                parse_quoted(after).map_err(|_| anyhow::anyhow!("unterminated quoted value"))?;
            (value, after)
        } else {
            let end = after
                .find(|c: char| c == ',' || whitespace(c))
                .unwrap_or(after.len());
            after.split_at(end)
        };

        params.push(AuthParam {
            name: BytesStr::from(name.to_owned()),
            value: BytesStr::from(value.to_owned()),
        });

        rest = after;
    }

    Ok((BytesStr::from(scheme.to_owned()), params))
}
