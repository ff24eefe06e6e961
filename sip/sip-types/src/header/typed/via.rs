use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use crate::uri::Params;
use anyhow::Context;
use bytesstr::BytesStr;
use std::fmt;

/// `Via` header value
#[derive(Debug, Clone)]
pub struct Via {
    /// Transport name, e.g. `WSS`
    pub transport: BytesStr,
    pub sent_by: BytesStr,
    pub params: Params,
}

impl Via {
    pub fn new<T, S, B>(transport: T, sent_by: S, branch: B) -> Self
    where
        T: Into<BytesStr>,
        S: Into<BytesStr>,
        B: Into<BytesStr>,
    {
        Self {
            transport: transport.into(),
            sent_by: sent_by.into(),
            params: Params::new().with(crate::uri::Param::value("branch", branch)),
        }
    }

    pub fn branch(&self) -> Option<&BytesStr> {
        self.params.get_val("branch")
    }
}

impl ConstNamed for Via {
    const NAME: Name = Name::VIA;
}

impl HeaderParse for Via {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let value = value.trim();

        let (protocol, rest) = value
            .split_once(char::is_whitespace)
            .context("missing sent-by")?;

        let mut protocol = protocol.split('/').map(str::trim);

        match (protocol.next(), protocol.next(), protocol.next()) {
            (Some(name), Some("2.0"), Some(transport)) if name.eq_ignore_ascii_case("SIP") => {
                let rest = rest.trim_start();

                let (sent_by, params) = match rest.split_once(';') {
                    Some((sent_by, params)) => (sent_by.trim(), Params::parse(params)?),
                    None => (rest.trim(), Params::new()),
                };

                if sent_by.is_empty() {
                    anyhow::bail!("empty sent-by");
                }

                Ok(Via {
                    transport: BytesStr::from(transport.to_owned()),
                    sent_by: BytesStr::from(sent_by.to_owned()),
                    params,
                })
            }
            _ => anyhow::bail!("invalid sent-protocol"),
        }
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}{}", self.transport, self.sent_by, self.params)
    }
}
