use crate::header::HeaderParse;
use crate::uri::{NameAddr, Params};
use std::fmt;

/// Value of a `Route` or `Record-Route` header
#[derive(Debug, Clone)]
pub struct Routing {
    pub uri: NameAddr,
    pub params: Params,
}

impl HeaderParse for Routing {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let (uri, params) = NameAddr::parse_with_params(value)?;

        Ok(Self { uri, params })
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.uri, self.params)
    }
}
