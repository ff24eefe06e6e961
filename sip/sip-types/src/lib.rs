//! SIP message types used by the webphone user agent
//!
//! Covers the subset of RFC 3261 a WebSocket user agent needs: request/response
//! parsing and printing, the headers required to run registrations and INVITE
//! sessions, SIP URIs and digest authentication headers.

pub mod code;
pub mod header;
pub mod method;
pub mod msg;
mod parse;
pub mod uri;

pub use code::{CodeKind, StatusCode};
pub use header::name::Name;
pub use header::{ConstNamed, HeaderError, HeaderParse, Headers};
pub use method::Method;
pub use msg::{Message, MessageParseError, Request, RequestLine, Response, StatusLine};
