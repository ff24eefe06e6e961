use crate::config::ValidConfig;
use crate::dialog::{Identity, random_sequence_number, random_string};
use crate::error::AuthError;
use sip_auth::{ClientAuthenticator, DigestAuthenticator, RequestParts, ResponseParts};
use sip_types::header::typed::{CallID, Contact, Expires, FromTo, MinExpires};
use sip_types::uri::{NameAddr, SipUri};
use sip_types::{CodeKind, Method, Name, Request, Response, StatusCode};
use std::time::Duration;
use tokio::time::Instant;

/// Time to wait for a final response (SIP timer F)
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(32);

/// Delay between attempts to restore a failed refresh
const RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub(crate) enum RegisterOutcome {
    Registered,
    Send(Request),
    /// Initial registration failed for good
    Failed(AuthError),
    Nothing,
}

#[derive(Debug)]
pub(crate) enum TimerAction {
    Send(Request),
    /// Binding expired before it could be refreshed
    Lapsed,
    Failed(AuthError),
}

struct Pending {
    cseq: u32,
    timeout: Instant,
    request: Request,
    initial: bool,
}

/// Keeps a binding with the registrar alive
///
/// Sans-IO: produces REGISTER requests and consumes their responses, the
/// caller drives it with [`Registrar::poll_timer`] at [`Registrar::deadline`].
pub(crate) struct Registrar {
    registrar: SipUri,
    contact: SipUri,

    from: FromTo,
    to: FromTo,
    call_id: CallID,
    cseq: u32,

    /// Requested lifetime in seconds, may be raised by a 423
    expires: u32,

    authenticator: DigestAuthenticator,
    challenged: bool,

    pending: Option<Pending>,
    has_registered: bool,
    registered: bool,
    bound_until: Option<Instant>,
    refresh_at: Option<Instant>,
}

impl Registrar {
    pub(crate) fn new(identity: &Identity, config: &ValidConfig) -> Self {
        Self {
            registrar: identity.aor().domain(),
            contact: identity.contact().uri.uri.clone(),
            from: FromTo::new(identity.name_addr(), Some(random_string())),
            to: FromTo::new(NameAddr::uri(identity.aor().clone()), None),
            call_id: CallID::new(random_string()),
            cseq: random_sequence_number(),
            expires: config.register_expires_secs(),
            authenticator: config.authenticator(),
            challenged: false,
            pending: None,
            has_registered: false,
            registered: false,
            bound_until: None,
            refresh_at: None,
        }
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn create_register(&mut self, identity: &Identity, now: Instant) -> Request {
        let request = self.build(identity, self.expires);

        self.pending = Some(Pending {
            cseq: self.cseq,
            timeout: now + TRANSACTION_TIMEOUT,
            request: request.clone(),
            initial: !self.has_registered,
        });
        self.refresh_at = None;

        request
    }

    /// Remove the binding, no response is expected
    pub(crate) fn create_unregister(&mut self, identity: &Identity) -> Request {
        let request = self.build(identity, 0);

        self.pending = None;
        self.registered = false;
        self.bound_until = None;
        self.refresh_at = None;

        request
    }

    fn build(&mut self, identity: &Identity, expires: u32) -> Request {
        self.cseq += 1;

        let mut request = identity.create_request(
            Method::REGISTER,
            self.registrar.clone(),
            &self.from,
            &self.to,
            &self.call_id,
            self.cseq,
        );

        request.headers.insert_named(&Expires(expires));
        self.authenticator.authorize_request(&mut request.headers);

        request
    }

    pub(crate) fn receive_response(
        &mut self,
        identity: &Identity,
        response: &Response,
        now: Instant,
    ) -> RegisterOutcome {
        match (response.call_id(), response.cseq()) {
            (Ok(call_id), Ok(cseq))
                if call_id == self.call_id
                    && cseq.method == Method::REGISTER
                    && self.pending.as_ref().is_some_and(|p| p.cseq == cseq.cseq) => {}
            _ => return RegisterOutcome::Nothing,
        }

        let code = response.code();

        if code.kind() == CodeKind::Provisional {
            return RegisterOutcome::Nothing;
        }

        let Some(pending) = self.pending.take() else {
            return RegisterOutcome::Nothing;
        };

        match code {
            _ if code.kind() == CodeKind::Success => {
                let granted = self.granted_expiry(response).max(1);

                log::debug!("registered for {granted}s");

                self.challenged = false;
                self.has_registered = true;
                self.registered = true;
                self.bound_until = Some(now + Duration::from_secs(granted.into()));
                self.refresh_at = Some(now + refresh_interval(granted));

                RegisterOutcome::Registered
            }
            StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                if self.challenged {
                    return self.fail(pending, AuthError::ChallengedTwice, now);
                }

                self.challenged = true;

                if let Err(e) = self.authenticator.handle_rejection(
                    RequestParts::from(&pending.request),
                    ResponseParts::from(response),
                ) {
                    return self.fail(pending, AuthError::Digest(e), now);
                }

                RegisterOutcome::Send(self.create_register(identity, now))
            }
            StatusCode::INTERVAL_TOO_BRIEF => {
                match response.headers.get_named::<MinExpires>() {
                    Ok(MinExpires(min)) if min > self.expires => {
                        log::debug!("registrar requires an expiry of at least {min}s");
                        self.expires = min;
                        RegisterOutcome::Send(self.create_register(identity, now))
                    }
                    _ => self.fail(pending, AuthError::Rejected(code), now),
                }
            }
            _ => self.fail(pending, AuthError::Rejected(code), now),
        }
    }

    fn granted_expiry(&self, response: &Response) -> u32 {
        let contact_expires = response
            .headers
            .get_list::<Contact>(Name::CONTACT)
            .ok()
            .and_then(|contacts| {
                contacts
                    .into_iter()
                    .find(|contact| contact.uri.uri.compare(&self.contact))
                    .and_then(|contact| contact.expires())
            });

        contact_expires
            .or_else(|| response.headers.get_named::<Expires>().ok().map(|e| e.0))
            .unwrap_or(self.expires)
    }

    fn fail(&mut self, pending: Pending, error: AuthError, now: Instant) -> RegisterOutcome {
        self.challenged = false;

        if pending.initial {
            self.authenticator.reset();
            return RegisterOutcome::Failed(error);
        }

        log::warn!("failed to refresh registration, {error}");

        self.authenticator.reset();
        self.refresh_at = Some(now + RETRY_INTERVAL);

        RegisterOutcome::Nothing
    }

    /// The next instant [`Registrar::poll_timer`] has to be called at
    pub(crate) fn deadline(&self) -> Option<Instant> {
        [
            self.pending.as_ref().map(|p| p.timeout),
            self.refresh_at,
            self.bound_until.filter(|_| self.registered),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Handle expired timers, must be called until it returns `None`
    pub(crate) fn poll_timer(&mut self, identity: &Identity, now: Instant) -> Option<TimerAction> {
        if self.pending.as_ref().is_some_and(|p| p.timeout <= now) {
            let pending = self.pending.take()?;

            if pending.initial {
                self.challenged = false;
                return Some(TimerAction::Failed(AuthError::Timeout));
            }

            log::warn!("REGISTER refresh timed out");
            self.challenged = false;
            self.refresh_at = Some(now + RETRY_INTERVAL);
        }

        if self.registered && self.bound_until.is_some_and(|until| until <= now) {
            log::warn!("registration lapsed");

            self.registered = false;
            self.bound_until = None;

            return Some(TimerAction::Lapsed);
        }

        if self.pending.is_none() && self.refresh_at.is_some_and(|at| at <= now) {
            return Some(TimerAction::Send(self.create_register(identity, now)));
        }

        None
    }
}

fn refresh_interval(expires: u32) -> Duration {
    let secs = expires.saturating_sub(10).max(expires / 2).max(1);
    Duration::from_secs(secs.into())
}
