use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use bytesstr::BytesStr;
use std::fmt;

/// `Content-Type` header, the media type is kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType(pub BytesStr);

impl ContentType {
    pub fn sdp() -> Self {
        Self(BytesStr::from_static("application/sdp"))
    }

    /// Compare the media type, ignoring parameters and case
    pub fn is(&self, media_type: &str) -> bool {
        self.0
            .split(';')
            .next()
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(media_type))
    }
}

impl ConstNamed for ContentType {
    const NAME: Name = Name::CONTENT_TYPE;
}

impl HeaderParse for ContentType {
    fn parse(value: &str) -> anyhow::Result<Self> {
        Ok(Self(BytesStr::from(value.trim().to_owned())))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
