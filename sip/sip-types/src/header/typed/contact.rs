use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use crate::uri::{NameAddr, Params};
use std::fmt;

/// `Contact` header value
#[derive(Debug, Clone)]
pub struct Contact {
    pub uri: NameAddr,
    pub params: Params,
}

impl Contact {
    pub fn new(uri: NameAddr) -> Self {
        Self {
            uri,
            params: Params::new(),
        }
    }

    /// Value of the `expires` parameter, if present and valid
    pub fn expires(&self) -> Option<u32> {
        self.params.get_val("expires")?.parse().ok()
    }
}

impl ConstNamed for Contact {
    const NAME: Name = Name::CONTACT;
}

impl HeaderParse for Contact {
    fn parse(value: &str) -> anyhow::Result<Self> {
        if value.trim() == "*" {
            anyhow::bail!("wildcard contact is not a contact address");
        }

        let (uri, params) = NameAddr::parse_with_params(value)?;

        Ok(Self { uri, params })
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.uri, self.params)
    }
}
