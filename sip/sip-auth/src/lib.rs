//! Client side SIP authentication

use sip_types::Headers;
use sip_types::msg::{Request, RequestLine, Response, StatusLine};
use std::error::Error;
use std::fmt::Debug;

mod digest;

pub use digest::{DigestAuthenticator, DigestCredentials, DigestError, DigestUser};

/// SIP request authenticator
pub trait ClientAuthenticator {
    type Error: Error + Debug;

    /// Add the authorization headers for all realms answered so far
    ///
    /// Does nothing before a rejection response was handled.
    fn authorize_request(&mut self, request: &mut Headers);

    /// Handle a 401 / 407 response
    ///
    /// Returns an error when the challenge cannot be answered and no more requests should be sent.
    fn handle_rejection(
        &mut self,
        rejected_request: RequestParts<'_>,
        reject_response: ResponseParts<'_>,
    ) -> Result<(), Self::Error>;
}

/// Information about the request that has to be authenticated
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'s> {
    pub line: &'s RequestLine,
    pub headers: &'s Headers,
    pub body: &'s [u8],
}

impl<'s> From<&'s Request> for RequestParts<'s> {
    fn from(request: &'s Request) -> Self {
        Self {
            line: &request.line,
            headers: &request.headers,
            body: request.body.as_bytes(),
        }
    }
}

/// Information about the response that rejected the request
#[derive(Debug, Clone, Copy)]
pub struct ResponseParts<'s> {
    pub line: &'s StatusLine,
    pub headers: &'s Headers,
    pub body: &'s [u8],
}

impl<'s> From<&'s Response> for ResponseParts<'s> {
    fn from(response: &'s Response) -> Self {
        Self {
            line: &response.line,
            headers: &response.headers,
            body: response.body.as_bytes(),
        }
    }
}
