use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use bytesstr::BytesStr;
use std::fmt;

/// `Call-ID` header
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallID(pub BytesStr);

impl CallID {
    pub fn new<B: Into<BytesStr>>(id: B) -> Self {
        Self(id.into())
    }
}

impl ConstNamed for CallID {
    const NAME: Name = Name::CALL_ID;
}

impl HeaderParse for CallID {
    fn parse(value: &str) -> anyhow::Result<Self> {
        let value = value.trim();

        if value.is_empty() || value.contains(char::is_whitespace) {
            anyhow::bail!("invalid call-id {value:?}");
        }

        Ok(Self(BytesStr::from(value.to_owned())))
    }
}

impl fmt::Display for CallID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
