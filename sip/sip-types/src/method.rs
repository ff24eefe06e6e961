use bytesstr::BytesStr;
use std::fmt;

/// A SIP request method
///
/// Well known methods are available as constants, everything else is kept as is:
///
/// ```
/// use webphone_sip_types::Method;
///
/// assert_eq!(Method::from("invite"), Method::INVITE);
/// assert_eq!(Method::from("PUBLISH").to_string(), "PUBLISH");
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Method(Repr);

macro_rules! methods {
    ($($print:literal, $ident:ident;)+) => {
        #[derive(Debug, Clone, Eq, PartialEq, Hash)]
        #[allow(clippy::upper_case_acronyms)]
        enum Repr {
            $($ident,)+
            Other(BytesStr),
        }

        impl Method {
            $(pub const $ident: Self = Self(Repr::$ident);)+

            fn from_str_repr(s: &str) -> Repr {
                $(
                if s.eq_ignore_ascii_case($print) {
                    return Repr::$ident;
                }
                )+

                Repr::Other(BytesStr::from(s.to_owned()))
            }
        }

        impl fmt::Display for Method {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.0 {
                    $(Repr::$ident => f.write_str($print),)+
                    Repr::Other(other) => f.write_str(other),
                }
            }
        }
    };
}

methods! {
    "INVITE",   INVITE;
    "ACK",      ACK;
    "CANCEL",   CANCEL;
    "BYE",      BYE;
    "REGISTER", REGISTER;
    "OPTIONS",  OPTIONS;
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        Self(Self::from_str_repr(s.trim()))
    }
}
