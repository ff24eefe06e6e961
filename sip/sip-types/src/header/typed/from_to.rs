use crate::header::HeaderParse;
use crate::uri::{NameAddr, Params};
use bytesstr::BytesStr;
use std::fmt;

/// Type which represent the `From` and `To` header value
#[derive(Debug, Clone)]
pub struct FromTo {
    pub uri: NameAddr,
    pub tag: Option<BytesStr>,
    pub params: Params,
}

impl FromTo {
    pub fn new(uri: NameAddr, tag: Option<BytesStr>) -> Self {
        Self {
            uri,
            tag,
            params: Params::new(),
        }
    }
}

impl HeaderParse for FromTo {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let (uri, mut params) = NameAddr::parse_with_params(value)?;

        Ok(FromTo {
            uri,
            tag: params.take("tag"),
            params,
        })
    }
}

impl fmt::Display for FromTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={tag}")?;
        }
        write!(f, "{}", self.params)
    }
}
