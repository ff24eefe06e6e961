//! Typed header values

mod auth;
mod call_id;
mod contact;
mod content_type;
mod cseq;
mod from_to;
mod numeric;
mod routing;
mod via;

pub use auth::{
    AuthChallenge, AuthParam, AuthResponse, Algorithm, DigestChallenge, DigestResponse,
    QopOption, QopResponse,
};
pub use call_id::CallID;
pub use contact::Contact;
pub use content_type::ContentType;
pub use cseq::CSeq;
pub use from_to::FromTo;
pub use numeric::{ContentLength, Expires, MaxForwards, MinExpires};
pub use routing::Routing;
pub use via::Via;
