use bytesstr::BytesStr;
use std::fmt;

/// Name of a SIP header, used as key inside [Headers].
///
/// Compares case-insensitively and treats compact forms (e.g. `v` for `Via`) as equal.
///
/// [Headers]: crate::Headers
#[derive(Debug, Clone)]
pub struct Name(Repr);

impl Name {
    /// Returns a Name for a header not known to this crate
    pub const fn unknown(name: BytesStr) -> Self {
        Self(Repr::Unknown(name))
    }

    fn matches(&self, other: &str) -> bool {
        if self.as_print_str().eq_ignore_ascii_case(other) {
            return true;
        }

        self.as_parse_strs()
            .is_some_and(|strs| strs.iter().any(|s| s.eq_ignore_ascii_case(other)))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.as_print_str()) || other.matches(self.as_print_str())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_print_str())
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::from_str_lookup(name.trim())
    }
}

macro_rules! header_names {
    ($($(#[$comments:meta])* $print:literal, $ident:ident, [$($parse:literal),+], $konst:ident;)+) => {
        #[derive(Debug, Clone)]
        enum Repr {
            $($ident,)+
            Unknown(BytesStr),
        }

        static NAMES: &[(&str, Name)] = &[
            $($( ($parse, Name::$konst), )*)*
        ];

        impl Name {
            $(
            $(#[$comments])*
            pub const $konst: Name = Name(Repr::$ident);
            )+

            fn from_str_lookup(name: &str) -> Name {
                for (parse, known) in NAMES {
                    if parse.eq_ignore_ascii_case(name) {
                        return known.clone();
                    }
                }

                Name::unknown(BytesStr::from(name.to_owned()))
            }

            pub fn as_print_str(&self) -> &str {
                match &self.0 {
                    $(Repr::$ident => $print,)*
                    Repr::Unknown(name) => name.as_ref(),
                }
            }

            const fn as_parse_strs(&self) -> Option<&[&str]> {
                match &self.0 {
                    $(
                    Repr::$ident => Some(&[$($parse),*]),
                    )+
                    Repr::Unknown(_) => None,
                }
            }
        }
    };
}

header_names! {
    /// [[RFC3261, Section 20.5](https://tools.ietf.org/html/rfc3261#section-20.5)]
    "Allow",                Allow,              ["allow"],                  ALLOW;

    /// [[RFC3261, Section 20.7](https://tools.ietf.org/html/rfc3261#section-20.7)]
    "Authorization",        Authorization,      ["authorization"],          AUTHORIZATION;

    /// [[RFC3261, Section 20.8](https://tools.ietf.org/html/rfc3261#section-20.8)]
    "Call-ID",              CallID,             ["call-id", "i"],           CALL_ID;

    /// [[RFC3261, Section 20.10](https://tools.ietf.org/html/rfc3261#section-20.10)]
    "Contact",              Contact,            ["contact", "m"],           CONTACT;

    /// [[RFC3261, Section 20.14](https://tools.ietf.org/html/rfc3261#section-20.14)]
    "Content-Length",       ContentLength,      ["content-length", "l"],    CONTENT_LENGTH;

    /// [[RFC3261, Section 20.15](https://tools.ietf.org/html/rfc3261#section-20.15)]
    "Content-Type",         ContentType,        ["content-type", "c"],      CONTENT_TYPE;

    /// [[RFC3261, Section 20.16](https://tools.ietf.org/html/rfc3261#section-20.16)]
    "CSeq",                 CSeq,               ["cseq"],                   CSEQ;

    /// [[RFC3261, Section 20.19](https://tools.ietf.org/html/rfc3261#section-20.19)]
    "Expires",              Expires,            ["expires"],                EXPIRES;

    /// [[RFC3261, Section 20.20](https://tools.ietf.org/html/rfc3261#section-20.20)]
    "From",                 From,               ["from", "f"],              FROM;

    /// [[RFC3261, Section 20.22](https://tools.ietf.org/html/rfc3261#section-20.22)]
    "Max-Forwards",         MaxForwards,        ["max-forwards"],           MAX_FORWARDS;

    /// [[RFC3261, Section 20.23](https://tools.ietf.org/html/rfc3261#section-20.23)]
    "Min-Expires",          MinExpires,         ["min-expires"],            MIN_EXPIRES;

    /// [[RFC3261, Section 20.27](https://tools.ietf.org/html/rfc3261#section-20.27)]
    "Proxy-Authenticate",   ProxyAuthenticate,  ["proxy-authenticate"],     PROXY_AUTHENTICATE;

    /// [[RFC3261, Section 20.28](https://tools.ietf.org/html/rfc3261#section-20.28)]
    "Proxy-Authorization",  ProxyAuthorization, ["proxy-authorization"],    PROXY_AUTHORIZATION;

    /// [[RFC3261, Section 20.30](https://tools.ietf.org/html/rfc3261#section-20.30)]
    "Record-Route",         RecordRoute,        ["record-route"],           RECORD_ROUTE;

    /// [[RFC3261, Section 20.34](https://tools.ietf.org/html/rfc3261#section-20.34)]
    "Route",                Route,              ["route"],                  ROUTE;

    /// [[RFC3261, Section 20.35](https://tools.ietf.org/html/rfc3261#section-20.35)]
    "Server",               Server,             ["server"],                 SERVER;

    /// [[RFC3261, Section 20.37](https://tools.ietf.org/html/rfc3261#section-20.37)]
    "Supported",            Supported,          ["supported", "k"],         SUPPORTED;

    /// [[RFC3261, Section 20.39](https://tools.ietf.org/html/rfc3261#section-20.39)]
    "To",                   To,                 ["to", "t"],                TO;

    /// [[RFC3261, Section 20.41](https://tools.ietf.org/html/rfc3261#section-20.41)]
    "User-Agent",           UserAgent,          ["user-agent"],             USER_AGENT;

    /// [[RFC3261, Section 20.42](https://tools.ietf.org/html/rfc3261#section-20.42)]
    "Via",                  Via,                ["via", "v"],               VIA;

    /// [[RFC3261, Section 20.44](https://tools.ietf.org/html/rfc3261#section-20.44)]
    "WWW-Authenticate",     WWWAuthenticate,    ["www-authenticate"],       WWW_AUTHENTICATE;
}
