use std::fmt;
use std::str::FromStr;

type Repr = u16;

/// A SIP status code
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StatusCode(Repr);

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple("StatusCode");
        tuple.field(&self.0);
        if let Some(text) = self.text() {
            tuple.field(&text);
        }
        tuple.finish()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => write!(f, "{} {}", self.0, text),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Class of a [`StatusCode`]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CodeKind {
    /// 100..=199
    Provisional,
    /// 200..=299
    Success,
    /// 300..=399
    Redirection,
    /// 400..=499
    RequestFailure,
    /// 500..=599
    ServerFailure,
    /// 600..=699
    GlobalFailure,
    /// Anything outside of the defined classes
    Custom,
}

impl StatusCode {
    /// Returns the [`CodeKind`] of the code
    ///
    /// # Example
    ///
    /// ```
    /// use webphone_sip_types::{CodeKind, StatusCode};
    ///
    /// assert_eq!(StatusCode::from(180).kind(), CodeKind::Provisional);
    /// assert_eq!(StatusCode::OK.kind(), CodeKind::Success);
    /// ```
    #[inline]
    pub fn kind(self) -> CodeKind {
        match self.0 {
            100..=199 => CodeKind::Provisional,
            200..=299 => CodeKind::Success,
            300..=399 => CodeKind::Redirection,
            400..=499 => CodeKind::RequestFailure,
            500..=599 => CodeKind::ServerFailure,
            600..=699 => CodeKind::GlobalFailure,
            _ => CodeKind::Custom,
        }
    }

    /// Returns true for every final (non 1XX) status code
    pub fn is_final(self) -> bool {
        self.0 >= 200
    }

    pub fn into_u16(self) -> Repr {
        self.0
    }
}

impl FromStr for StatusCode {
    type Err = <Repr as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StatusCode(Repr::from_str(s)?))
    }
}

impl From<Repr> for StatusCode {
    fn from(r: Repr) -> StatusCode {
        StatusCode(r)
    }
}

macro_rules! codes {
    ($($(#[$comments:meta])* [$code:expr => $name:ident, $text:literal];)*) => {
        impl StatusCode {
            /// Returns the default reason phrase of a known code
            pub fn text(self) -> Option<&'static str> {
                match self.0 {
                    $($code => Some($text),)*
                    _ => None
                }
            }

            $(
            $(#[$comments])*
            pub const $name: StatusCode = StatusCode($code);
            )*
        }
    };
}

codes! {
    // ==== PROVISIONAL 1XX ====

    /// [[RFC3261, Section 21.1.1](https://tools.ietf.org/html/rfc3261#section-21.1.1)]
    [100 => TRYING, "Trying"];

    /// [[RFC3261, Section 21.1.2](https://tools.ietf.org/html/rfc3261#section-21.1.2)]
    [180 => RINGING, "Ringing"];

    /// [[RFC3261, Section 21.1.3](https://tools.ietf.org/html/rfc3261#section-21.1.3)]
    [181 => CALL_IS_BEING_FORWARDED, "Call Is Being Forwarded"];

    /// [[RFC3261, Section 21.1.4](https://tools.ietf.org/html/rfc3261#section-21.1.4)]
    [182 => QUEUED, "Queued"];

    /// [[RFC3261, Section 21.1.5](https://tools.ietf.org/html/rfc3261#section-21.1.5)]
    [183 => SESSION_PROGRESS, "Session Progress"];

    // ==== SUCCESS 2XX ====

    /// [[RFC3261, Section 21.2.1](https://tools.ietf.org/html/rfc3261#section-21.2.1)]
    [200 => OK, "OK"];

    // ==== REQUEST FAILURE 4XX ====

    /// [[RFC3261, Section 21.4.1](https://tools.ietf.org/html/rfc3261#section-21.4.1)]
    [400 => BAD_REQUEST, "Bad Request"];

    /// [[RFC3261, Section 21.4.2](https://tools.ietf.org/html/rfc3261#section-21.4.2)]
    [401 => UNAUTHORIZED, "Unauthorized"];

    /// [[RFC3261, Section 21.4.4](https://tools.ietf.org/html/rfc3261#section-21.4.4)]
    [403 => FORBIDDEN, "Forbidden"];

    /// [[RFC3261, Section 21.4.5](https://tools.ietf.org/html/rfc3261#section-21.4.5)]
    [404 => NOT_FOUND, "Not Found"];

    /// [[RFC3261, Section 21.4.6](https://tools.ietf.org/html/rfc3261#section-21.4.6)]
    [405 => METHOD_NOT_ALLOWED, "Method Not Allowed"];

    /// [[RFC3261, Section 21.4.8](https://tools.ietf.org/html/rfc3261#section-21.4.8)]
    [407 => PROXY_AUTHENTICATION_REQUIRED, "Proxy Authentication Required"];

    /// [[RFC3261, Section 21.4.9](https://tools.ietf.org/html/rfc3261#section-21.4.9)]
    [408 => REQUEST_TIMEOUT, "Request Timeout"];

    /// [[RFC3261, Section 21.4.17](https://tools.ietf.org/html/rfc3261#section-21.4.17)]
    [423 => INTERVAL_TOO_BRIEF, "Interval Too Brief"];

    /// [[RFC3261, Section 21.4.18](https://tools.ietf.org/html/rfc3261#section-21.4.18)]
    [480 => TEMPORARILY_UNAVAILABLE, "Temporarily Unavailable"];

    /// [[RFC3261, Section 21.4.19](https://tools.ietf.org/html/rfc3261#section-21.4.19)]
    [481 => CALL_OR_TRANSACTION_DOES_NOT_EXIST, "Call/Transaction Does Not Exist"];

    /// [[RFC3261, Section 21.4.24](https://tools.ietf.org/html/rfc3261#section-21.4.24)]
    [486 => BUSY_HERE, "Busy Here"];

    /// [[RFC3261, Section 21.4.25](https://tools.ietf.org/html/rfc3261#section-21.4.25)]
    [487 => REQUEST_TERMINATED, "Request Terminated"];

    /// [[RFC3261, Section 21.4.26](https://tools.ietf.org/html/rfc3261#section-21.4.26)]
    [488 => NOT_ACCEPTABLE_HERE, "Not Acceptable Here"];

    // ==== SERVER FAILURE 5XX ====

    /// [[RFC3261, Section 21.5.1](https://tools.ietf.org/html/rfc3261#section-21.5.1)]
    [500 => SERVER_INTERNAL_ERROR, "Server Internal Error"];

    /// [[RFC3261, Section 21.5.4](https://tools.ietf.org/html/rfc3261#section-21.5.4)]
    [503 => SERVICE_UNAVAILABLE, "Service Unavailable"];

    // ==== GLOBAL FAILURE 6XX ====

    /// [[RFC3261, Section 21.6.1](https://tools.ietf.org/html/rfc3261#section-21.6.1)]
    [600 => BUSY_EVERYWHERE, "Busy Everywhere"];

    /// [[RFC3261, Section 21.6.2](https://tools.ietf.org/html/rfc3261#section-21.6.2)]
    [603 => DECLINE, "Decline"];
}
