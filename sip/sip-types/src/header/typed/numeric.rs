use crate::header::name::Name;
use crate::header::{ConstNamed, HeaderParse};
use anyhow::Context;
use std::fmt;

macro_rules! numeric_header {
    ($(#[$meta:meta])* $ident:ident, $name:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $ident(pub u32);

        impl ConstNamed for $ident {
            const NAME: Name = $name;
        }

        impl HeaderParse for $ident {
            fn parse(value: &str) -> anyhow::Result<Self> {
                value
                    .trim()
                    .parse()
                    .map(Self)
                    .with_context(|| format!("invalid {} value {value:?}", $name))
            }
        }

        impl fmt::Display for $ident {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

numeric_header!(
    /// `Expires` header, in seconds
    Expires,
    Name::EXPIRES
);
numeric_header!(
    /// `Min-Expires` header, in seconds
    MinExpires,
    Name::MIN_EXPIRES
);
numeric_header!(MaxForwards, Name::MAX_FORWARDS);
numeric_header!(ContentLength, Name::CONTENT_LENGTH);

#[cfg(test)]
mod test {
    use super::*;
    use crate::Headers;

    #[test]
    fn parse_numeric() {
        let mut headers = Headers::new();
        headers.insert(Name::EXPIRES, " 3600");
        headers.insert(Name::MIN_EXPIRES, "abc");

        assert_eq!(headers.get_named::<Expires>().unwrap(), Expires(3600));
        assert!(headers.get_named::<MinExpires>().is_err());
    }
}
