use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use crate::method::Method;
use anyhow::Context;
use std::fmt;

/// `CSeq` header, sequence number and method of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    pub cseq: u32,
    pub method: Method,
}

impl CSeq {
    pub const fn new(cseq: u32, method: Method) -> Self {
        Self { cseq, method }
    }
}

impl ConstNamed for CSeq {
    const NAME: Name = Name::CSEQ;
}

impl HeaderParse for CSeq {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let (cseq, method) = value
            .trim()
            .split_once(char::is_whitespace)
            .context("expected <number> <method>")?;

        let method = method.trim();

        if method.is_empty() {
            anyhow::bail!("missing method");
        }

        Ok(Self {
            cseq: cseq.parse().context("invalid sequence number")?,
            method: Method::from(method),
        })
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cseq, self.method)
    }
}
