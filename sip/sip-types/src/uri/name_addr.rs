use super::{Params, SipUri};
use crate::parse::{parse_quoted, whitespace};
use bytesstr::BytesStr;
use std::fmt;

/// A URI with an optional display name, as used in `From`, `To` and `Contact`
#[derive(Debug, Clone)]
pub struct NameAddr {
    pub name: Option<BytesStr>,
    pub uri: SipUri,
}

impl NameAddr {
    pub fn new<N>(name: N, uri: SipUri) -> Self
    where
        N: Into<BytesStr>,
    {
        Self {
            name: Some(name.into()),
            uri,
        }
    }

    pub fn uri(uri: SipUri) -> Self {
        Self { name: None, uri }
    }

    /// Parse a name-addr/addr-spec followed by header parameters
    ///
    /// Without angle brackets everything after the first `;` belongs to the header,
    /// not to the URI (RFC 3261 Section 20).
    pub fn parse_with_params(i: &str) -> anyhow::Result<(Self, Params)> {
        let i = i.trim_start_matches(whitespace);

        let (name, rest) = if i.starts_with('"') {
            let (rest, name) =
                parse_quoted(i).map_err(|_| anyhow::anyhow!("unterminated display name"))?;

            (Some(unescape(name)), rest.trim_start_matches(whitespace))
        } else if let Some(idx) = i.find('<') {
            let name = i[..idx].trim();
            let name = (!name.is_empty()).then(|| BytesStr::from(name.to_owned()));

            (name, &i[idx..])
        } else {
            let (uri, params) = match i.split_once(';') {
                Some((uri, params)) => (uri, Params::parse(params)?),
                None => (i, Params::new()),
            };

            return Ok((NameAddr::uri(uri.parse()?), params));
        };

        let Some(rest) = rest.strip_prefix('<') else {
            anyhow::bail!("expected <uri> after display name");
        };

        let Some((uri, rest)) = rest.split_once('>') else {
            anyhow::bail!("missing closing >");
        };

        Ok((NameAddr { name, uri: uri.parse()? }, Params::parse(rest)?))
    }
}

fn unescape(s: &str) -> BytesStr {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }

    BytesStr::from(out)
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            f.write_str("\"")?;
            for c in name.chars() {
                if matches!(c, '"' | '\\') {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("\" ")?;
        }

        write!(f, "<{}>", self.uri)
    }
}
