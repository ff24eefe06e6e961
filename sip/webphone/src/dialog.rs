use crate::config::ValidConfig;
use crate::error::ConfigError;
use bytesstr::BytesStr;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sip_types::header::typed::{CSeq, CallID, Contact, FromTo, MaxForwards, Routing, Via};
use sip_types::uri::{NameAddr, Param, Scheme, SipUri};
use sip_types::{HeaderError, Method, Name, Request, Response, StatusCode};

pub(crate) const ALLOW: &str = "INVITE, ACK, CANCEL, BYE, OPTIONS";

pub(crate) fn random_string() -> BytesStr {
    rng()
        .sample_iter(Alphanumeric)
        .take(24)
        .map(char::from)
        .collect::<String>()
        .into()
}

pub(crate) fn random_sequence_number() -> u32 {
    rng().random_range(1..(u32::MAX >> 1))
}

fn branch() -> String {
    format!("z9hG4bK{}", random_string())
}

/// Local identity used in every message of a connection
pub(crate) struct Identity {
    aor: SipUri,
    display_name: Option<String>,
    contact: Contact,
    via_host: BytesStr,
    user_agent: String,
}

impl Identity {
    pub(crate) fn new(config: &ValidConfig) -> Self {
        // browsers cannot be reached directly, so contact and via are made up (RFC 7118 Section 5)
        let via_host: BytesStr = format!("{}.invalid", random_string().to_lowercase()).into();

        let mut contact_uri = SipUri::new(Scheme::Sip, Some(random_string()), via_host.clone());
        contact_uri.params.push(Param::value("transport", "ws"));

        Self {
            aor: config.aor.clone(),
            display_name: config.config.display_name.clone(),
            contact: Contact::new(NameAddr::uri(contact_uri)),
            via_host,
            user_agent: config.config.user_agent.clone(),
        }
    }

    pub(crate) fn aor(&self) -> &SipUri {
        &self.aor
    }

    pub(crate) fn contact(&self) -> &Contact {
        &self.contact
    }

    /// The local address as used in `From`/`To`
    pub(crate) fn name_addr(&self) -> NameAddr {
        match &self.display_name {
            Some(name) => NameAddr::new(name.clone(), self.aor.clone()),
            None => NameAddr::uri(self.aor.clone()),
        }
    }

    /// Resolve what the user dialed into a request uri
    ///
    /// Anything that is not a sip uri is treated as user part on the domain of
    /// the address of record.
    pub(crate) fn call_target(&self, target: &str) -> Result<SipUri, ConfigError> {
        let target = target.trim();
        let invalid = || ConfigError::InvalidTarget(target.to_owned());

        let lower = target.to_ascii_lowercase();
        if lower.starts_with("sip:") || lower.starts_with("sips:") {
            return target.parse().map_err(|_| invalid());
        }

        let is_number = target
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '(' | ')' | ' '));

        let user: String = if is_number {
            target
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect()
        } else {
            target.to_owned()
        };

        if user.is_empty() || user.contains(|c: char| c.is_whitespace() || "<>;\"".contains(c)) {
            return Err(invalid());
        }

        if user.contains('@') {
            return format!("{}:{user}", self.aor.scheme)
                .parse()
                .map_err(|_| invalid());
        }

        Ok(SipUri::new(
            self.aor.scheme,
            Some(user.into()),
            self.aor.host.clone(),
        ))
    }

    /// A `Via` with a new branch, for every new client transaction
    pub(crate) fn via(&self) -> Via {
        Via::new("WSS", self.via_host.clone(), branch())
    }

    pub(crate) fn create_request(
        &self,
        method: Method,
        uri: SipUri,
        from: &FromTo,
        to: &FromTo,
        call_id: &CallID,
        cseq: u32,
    ) -> Request {
        let mut request = Request::new(method.clone(), uri);

        let headers = &mut request.headers;
        headers.insert_named(&self.via());
        headers.insert_named(&MaxForwards(70));
        headers.insert_type(Name::FROM, from);
        headers.insert_type(Name::TO, to);
        headers.insert_named(call_id);
        headers.insert_named(&CSeq::new(cseq, method.clone()));

        if method == Method::INVITE || method == Method::REGISTER {
            headers.insert_named(&self.contact);
        }

        if method != Method::ACK {
            headers.insert(Name::ALLOW, ALLOW);
        }

        headers.insert(Name::USER_AGENT, self.user_agent.clone());

        request
    }

    /// Create a response to `request`, adding `to_tag` if its To has none
    pub(crate) fn create_response(
        &self,
        request: &Request,
        code: StatusCode,
        to_tag: Option<&BytesStr>,
    ) -> Response {
        let mut response = Response::new(code);

        let headers = &mut response.headers;
        request.headers.clone_into(headers, Name::VIA);
        request.headers.clone_into(headers, Name::FROM);

        match (request.headers.get::<FromTo>(Name::TO), to_tag) {
            (Ok(mut to), Some(tag)) if to.tag.is_none() && code != StatusCode::TRYING => {
                to.tag = Some(tag.clone());
                headers.insert_type(Name::TO, &to);
            }
            _ => request.headers.clone_into(headers, Name::TO),
        }

        request.headers.clone_into(headers, Name::CALL_ID);
        request.headers.clone_into(headers, Name::CSEQ);

        if request.line.method == Method::INVITE && code.kind() == sip_types::CodeKind::Success {
            headers.insert_named(&self.contact);
        }

        headers.insert(Name::SERVER, self.user_agent.clone());

        response
    }
}

/// Build a CANCEL for a pending INVITE (RFC 3261 Section 9.1)
pub(crate) fn create_cancel(invite: &Request) -> Result<Request, HeaderError> {
    let cseq = invite.cseq()?;

    let mut cancel = Request::new(Method::CANCEL, invite.line.uri.clone());
    copy_top_via(invite, &mut cancel);
    invite.headers.clone_into(&mut cancel.headers, Name::MAX_FORWARDS);
    invite.headers.clone_into(&mut cancel.headers, Name::FROM);
    invite.headers.clone_into(&mut cancel.headers, Name::TO);
    invite.headers.clone_into(&mut cancel.headers, Name::CALL_ID);
    cancel
        .headers
        .insert_named(&CSeq::new(cseq.cseq, Method::CANCEL));
    invite.headers.clone_into(&mut cancel.headers, Name::ROUTE);

    Ok(cancel)
}

/// Build the ACK to a non-2xx final response, part of the INVITE transaction (RFC 3261 Section 17.1.1.3)
pub(crate) fn create_error_ack(invite: &Request, response: &Response) -> Result<Request, HeaderError> {
    let cseq = invite.cseq()?;

    let mut ack = Request::new(Method::ACK, invite.line.uri.clone());
    copy_top_via(invite, &mut ack);
    invite.headers.clone_into(&mut ack.headers, Name::MAX_FORWARDS);
    invite.headers.clone_into(&mut ack.headers, Name::FROM);
    response.headers.clone_into(&mut ack.headers, Name::TO);
    invite.headers.clone_into(&mut ack.headers, Name::CALL_ID);
    ack.headers.insert_named(&CSeq::new(cseq.cseq, Method::ACK));
    invite.headers.clone_into(&mut ack.headers, Name::ROUTE);

    Ok(ack)
}

fn copy_top_via(src: &Request, dst: &mut Request) {
    if let Some(via) = src.headers.get_raw(&Name::VIA) {
        dst.headers.insert(Name::VIA, via.clone());
    }
}

/// Signaling state of an established (or early) INVITE dialog
#[derive(Debug, Clone)]
pub(crate) struct Dialog {
    call_id: CallID,
    local: FromTo,
    remote: FromTo,
    remote_target: SipUri,
    route_set: Vec<Routing>,
    local_cseq: u32,
}

impl Dialog {
    /// Dialog created by a 2xx response to our INVITE
    pub(crate) fn from_uac(invite: &Request, response: &Response) -> Result<Self, HeaderError> {
        let contact: Contact = response.headers.get_named()?;
        let mut route_set: Vec<Routing> = response.headers.get_list(Name::RECORD_ROUTE)?;
        route_set.reverse();

        Ok(Self {
            call_id: invite.call_id()?,
            local: invite.headers.get(Name::FROM)?,
            remote: response.headers.get(Name::TO)?,
            remote_target: contact.uri.uri,
            route_set,
            local_cseq: invite.cseq()?.cseq,
        })
    }

    /// Dialog created by accepting a received INVITE
    pub(crate) fn from_uas(invite: &Request, local_tag: BytesStr) -> Result<Self, HeaderError> {
        let contact: Contact = invite.headers.get_named()?;
        let mut local: FromTo = invite.headers.get(Name::TO)?;
        local.tag = Some(local_tag);

        Ok(Self {
            call_id: invite.call_id()?,
            local,
            remote: invite.headers.get(Name::FROM)?,
            remote_target: contact.uri.uri,
            route_set: invite.headers.get_list(Name::RECORD_ROUTE)?,
            local_cseq: random_sequence_number(),
        })
    }

    pub(crate) fn call_id(&self) -> &CallID {
        &self.call_id
    }

    pub(crate) fn local_cseq(&self) -> u32 {
        self.local_cseq
    }

    /// Returns if `request` was sent inside this dialog
    pub(crate) fn matches(&self, request: &Request) -> bool {
        let Ok(call_id) = request.call_id() else {
            return false;
        };

        let (Ok(from), Ok(to)) = (
            request.headers.get::<FromTo>(Name::FROM),
            request.headers.get::<FromTo>(Name::TO),
        ) else {
            return false;
        };

        call_id == self.call_id && from.tag == self.remote.tag && to.tag == self.local.tag
    }

    pub(crate) fn create_request(&mut self, identity: &Identity, method: Method) -> Request {
        self.local_cseq += 1;
        let cseq = self.local_cseq;

        self.build(identity, method, cseq)
    }

    /// ACK to a 2xx response, which reuses the CSeq number of the INVITE
    pub(crate) fn create_ack(&self, identity: &Identity, invite_cseq: u32) -> Request {
        self.build(identity, Method::ACK, invite_cseq)
    }

    fn build(&self, identity: &Identity, method: Method, cseq: u32) -> Request {
        let mut request = identity.create_request(
            method,
            self.remote_target.clone(),
            &self.local,
            &self.remote,
            &self.call_id,
            cseq,
        );

        for route in &self.route_set {
            request.headers.insert_type(Name::ROUTE, route);
        }

        request
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ClientConfig;
    use sip_types::Message;

    fn identity() -> Identity {
        let config = ClientConfig::new(
            "sip:alice@example.org",
            "alice",
            "secret",
            "wss://sip.example.org",
        )
        .display_name("Alice")
        .validated()
        .unwrap();

        Identity::new(&config)
    }

    fn parse_request(text: &str) -> Request {
        match Message::parse(text).unwrap() {
            Message::Request(request) => request,
            Message::Response(_) => panic!("expected request"),
        }
    }

    const INVITE: &str = "INVITE sip:alice@example.org SIP/2.0\r\n\
        Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bKabc\r\n\
        Record-Route: <sip:p1.example.org;lr>\r\n\
        From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
        To: <sip:alice@example.org>\r\n\
        Call-ID: call-1\r\n\
        CSeq: 7 INVITE\r\n\
        Contact: <sip:bob@10.0.0.2;transport=ws>\r\n\
        Content-Length: 0\r\n\
        \r\n";

    #[test]
    fn phone_number_target() {
        let identity = identity();

        let uri = identity.call_target("+1 (555) 123-4567").unwrap();
        assert_eq!(uri.to_string(), "sip:+15551234567@example.org");

        let uri = identity.call_target("sip:bob@other.org").unwrap();
        assert_eq!(uri.to_string(), "sip:bob@other.org");

        let uri = identity.call_target("carol").unwrap();
        assert_eq!(uri.to_string(), "sip:carol@example.org");

        assert!(matches!(
            identity.call_target(""),
            Err(ConfigError::InvalidTarget(_))
        ));
        assert!(matches!(
            identity.call_target("not a <target>"),
            Err(ConfigError::InvalidTarget(_))
        ));
    }

    #[test]
    fn request_headers() {
        let identity = identity();

        let from = FromTo::new(identity.name_addr(), Some("tag1".into()));
        let to = FromTo::new(NameAddr::uri(identity.aor().clone()), None);
        let request = identity.create_request(
            Method::REGISTER,
            identity.aor().domain(),
            &from,
            &to,
            &CallID::new("abc"),
            1,
        );

        let text = request.to_string();
        assert!(text.starts_with("REGISTER sip:example.org SIP/2.0\r\n"));

        let via: Via = request.headers.get_named().unwrap();
        assert_eq!(via.transport, "WSS");
        assert!(via.branch().unwrap().starts_with("z9hG4bK"));
        assert!(via.sent_by.ends_with(".invalid"));

        let contact: Contact = request.headers.get_named().unwrap();
        assert_eq!(contact.uri.uri.params.get_val("transport").unwrap(), "ws");

        let max_forwards: MaxForwards = request.headers.get_named().unwrap();
        assert_eq!(max_forwards.0, 70);
    }

    #[test]
    fn response_adds_to_tag() {
        let identity = identity();
        let invite = parse_request(INVITE);
        let tag = BytesStr::from_static("localtag");

        let ringing = identity.create_response(&invite, StatusCode::RINGING, Some(&tag));
        let to: FromTo = ringing.headers.get(Name::TO).unwrap();
        assert_eq!(to.tag.unwrap(), "localtag");
        assert!(!ringing.headers.contains(&Name::CONTACT));

        let trying = identity.create_response(&invite, StatusCode::TRYING, Some(&tag));
        let to: FromTo = trying.headers.get(Name::TO).unwrap();
        assert!(to.tag.is_none());

        let ok = identity.create_response(&invite, StatusCode::OK, Some(&tag));
        assert!(ok.headers.contains(&Name::CONTACT));
        assert_eq!(ok.cseq().unwrap(), CSeq::new(7, Method::INVITE));
    }

    #[test]
    fn uas_dialog() {
        let identity = identity();
        let invite = parse_request(INVITE);

        let mut dialog = Dialog::from_uas(&invite, "localtag".into()).unwrap();

        let bye = parse_request(
            "BYE sip:alice@example.org SIP/2.0\r\n\
            Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bKdef\r\n\
            From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
            To: <sip:alice@example.org>;tag=localtag\r\n\
            Call-ID: call-1\r\n\
            CSeq: 8 BYE\r\n\
            \r\n",
        );
        assert!(dialog.matches(&bye));
        assert!(!dialog.matches(&invite));

        let own_bye = dialog.create_request(&identity, Method::BYE);
        assert_eq!(own_bye.line.uri.to_string(), "sip:bob@10.0.0.2;transport=ws");
        assert_eq!(
            own_bye.headers.get_raw(&Name::ROUTE).unwrap().as_str(),
            "<sip:p1.example.org;lr>"
        );

        let from: FromTo = own_bye.headers.get(Name::FROM).unwrap();
        assert_eq!(from.tag.unwrap(), "localtag");
        let to: FromTo = own_bye.headers.get(Name::TO).unwrap();
        assert_eq!(to.tag.unwrap(), "bobtag");
    }

    #[test]
    fn cancel_matches_invite() {
        let invite = parse_request(INVITE);

        let cancel = create_cancel(&invite).unwrap();
        assert_eq!(cancel.line.uri.to_string(), "sip:alice@example.org");
        assert_eq!(cancel.cseq().unwrap(), CSeq::new(7, Method::CANCEL));
        assert_eq!(
            cancel.headers.get_raw(&Name::VIA),
            invite.headers.get_raw(&Name::VIA)
        );
    }
}
