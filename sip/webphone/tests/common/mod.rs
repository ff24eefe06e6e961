use async_trait::async_trait;
use sip_types::header::typed::FromTo;
use sip_types::{Message, Method, Name, Request, Response, StatusCode};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tokio::sync::mpsc;
use url::Url;
use webphone::transport::{Connection, Connector, TransportEvent};
use webphone::{
    CallEvent, CallState, Client, ClientConfig, ConnectionStatus, Event, Events, IceServer,
    MediaBackend, MediaError, MediaFactory, SdpType, SessionDescription, TransportError,
};

pub(crate) const SDP: &str = "v=0\r\n\
    o=- 20518 0 IN IP4 203.0.113.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=rtpmap:111 opus/48000/2\r\n";

pub(crate) const CHALLENGE: &str =
    "WWW-Authenticate: Digest realm=\"example.org\", nonce=\"n1\", qop=\"auth\", algorithm=MD5\r\n";

pub(crate) fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub(crate) fn config() -> ClientConfig {
    ClientConfig::new(
        "sip:alice@example.org",
        "alice",
        "secret",
        "wss://sip.example.org/ws",
    )
    .display_name("Alice")
}

/// Server side of a fake websocket connection
pub(crate) struct Server {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl Server {
    pub(crate) async fn recv(&mut self) -> Message {
        let frame = self
            .from_client
            .recv()
            .await
            .expect("client closed the connection");

        Message::parse(&frame).expect("client sent malformed message")
    }

    pub(crate) async fn recv_request(&mut self) -> Request {
        match self.recv().await {
            Message::Request(request) => request,
            Message::Response(response) => panic!("expected request, got {}", response.code()),
        }
    }

    pub(crate) async fn recv_response(&mut self) -> Response {
        match self.recv().await {
            Message::Response(response) => response,
            Message::Request(request) => {
                panic!("expected response, got {}", request.line.method)
            }
        }
    }

    /// Returns if the client has sent nothing that was not received yet
    pub(crate) fn is_idle(&mut self) -> bool {
        self.from_client.try_recv().is_err()
    }

    pub(crate) fn send(&self, message: impl ToString) {
        self.to_client
            .send(TransportEvent::Frame(message.to_string()))
            .expect("client dropped the connection");
    }

    pub(crate) fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed);
    }

    pub(crate) fn respond(&self, request: &Request, code: u16, extra: &str, body: &str) {
        self.send(response_to(request, code, extra, body));
    }

    /// Answer the registration, optionally after challenging it first
    pub(crate) async fn accept_register(&mut self, challenge: bool) -> Request {
        let mut register = self.recv_request().await;
        assert_eq!(register.line.method, Method::REGISTER);

        if challenge {
            self.respond(&register, 401, CHALLENGE, "");

            register = self.recv_request().await;
            assert_eq!(register.line.method, Method::REGISTER);
            assert!(register.headers.contains(&Name::AUTHORIZATION));
        }

        self.respond(&register, 200, "Expires: 600\r\n", "");
        register
    }
}

/// Build a response to `request` like a SIP proxy would
pub(crate) fn response_to(request: &Request, code: u16, extra: &str, body: &str) -> String {
    let mut response = Response::new(StatusCode::from(code));

    request.headers.clone_into(&mut response.headers, Name::VIA);
    request.headers.clone_into(&mut response.headers, Name::FROM);

    let mut to: FromTo = request.headers.get(Name::TO).unwrap();
    if to.tag.is_none() && code > 100 {
        to.tag = Some("remotetag".into());
    }
    response.headers.insert_type(Name::TO, &to);

    request.headers.clone_into(&mut response.headers, Name::CALL_ID);
    request.headers.clone_into(&mut response.headers, Name::CSEQ);

    for line in extra.split("\r\n").filter(|line| !line.is_empty()) {
        let (name, value) = line.split_once(':').unwrap();
        response.headers.insert(Name::from(name), value.trim().to_owned());
    }

    if !body.is_empty() {
        response.headers.insert(Name::CONTENT_TYPE, "application/sdp");
        response.body = body.to_owned().into();
    }

    response.to_string()
}

/// Hands out the server side of every connection the client opens
pub(crate) struct FakeConnector {
    servers: mpsc::UnboundedSender<Server>,
    refuse: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _: &Url) -> Result<Connection, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();

        let _ = self.servers.send(Server {
            from_client,
            to_client,
        });

        Ok(Connection { outbound, inbound })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    Grant,
    Deny,
    /// Never completes, like an unanswered permission prompt
    Hang,
}

#[derive(Default)]
pub(crate) struct MediaLog {
    pub(crate) created: AtomicUsize,
    pub(crate) released: AtomicUsize,
    pub(crate) remote_descriptions: AtomicUsize,
    pub(crate) muted: AtomicBool,
}

impl MediaLog {
    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeMedia {
    log: Arc<MediaLog>,
    acquire: Acquire,
    muted: bool,
}

impl MediaBackend for FakeMedia {
    async fn acquire_local_media(&mut self) -> Result<(), MediaError> {
        match self.acquire {
            Acquire::Grant => Ok(()),
            Acquire::Deny => Err(MediaError::AccessDenied),
            Acquire::Hang => std::future::pending().await,
        }
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError> {
        Ok(SessionDescription::parse(SDP)?)
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, MediaError> {
        Ok(SessionDescription::parse(SDP)?)
    }

    async fn apply_remote_description(
        &mut self,
        _: SdpType,
        sdp: SessionDescription,
    ) -> Result<(), MediaError> {
        if !sdp.as_str().contains("opus") {
            return Err(MediaError::Negotiation("no common codec".into()));
        }

        self.log.remote_descriptions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.log.muted.store(muted, Ordering::SeqCst);
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn release(&mut self) {
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeMediaFactory {
    log: Arc<MediaLog>,
    acquire: Acquire,
}

impl MediaFactory for FakeMediaFactory {
    type Backend = FakeMedia;

    fn create(&self, _: &[IceServer]) -> FakeMedia {
        self.log.created.fetch_add(1, Ordering::SeqCst);

        FakeMedia {
            log: self.log.clone(),
            acquire: self.acquire,
            muted: false,
        }
    }
}

pub(crate) struct Harness {
    pub(crate) client: Client,
    pub(crate) events: Events,
    pub(crate) servers: mpsc::UnboundedReceiver<Server>,
    pub(crate) media: Arc<MediaLog>,
    pub(crate) refuse: Arc<AtomicBool>,
}

impl Harness {
    pub(crate) fn new(acquire: Acquire) -> Self {
        init_logging();

        let media = Arc::new(MediaLog::default());
        let refuse = Arc::new(AtomicBool::new(false));
        let (servers_tx, servers) = mpsc::unbounded_channel();

        let (client, events) = Client::with_connector(
            FakeMediaFactory {
                log: media.clone(),
                acquire,
            },
            FakeConnector {
                servers: servers_tx,
                refuse: refuse.clone(),
            },
        );

        Self {
            client,
            events,
            servers,
            media,
            refuse,
        }
    }

    /// Connect and complete the registration
    pub(crate) async fn registered(acquire: Acquire) -> (Self, Server) {
        let mut harness = Self::new(acquire);

        harness.client.connect(config()).await.unwrap();
        let mut server = harness.servers.recv().await.unwrap();
        server.accept_register(false).await;

        harness.expect_status(ConnectionStatus::Connecting).await;
        harness.expect_status(ConnectionStatus::Connected).await;
        harness.expect_status(ConnectionStatus::Registered).await;

        (harness, server)
    }

    pub(crate) async fn next_event(&mut self) -> Event {
        self.events.recv().await.expect("client stopped")
    }

    pub(crate) async fn expect_status(&mut self, status: ConnectionStatus) {
        assert_eq!(self.next_event().await, Event::Connection(status));
    }

    pub(crate) async fn expect_call(&mut self, state: CallState) -> CallEvent {
        match self.next_event().await {
            Event::Call(event) => {
                assert_eq!(event.state, state, "unexpected call state {event:?}");
                assert_eq!(event.session.is_some(), state != CallState::Idle);
                event
            }
            event => panic!("expected call state {state:?}, got {event:?}"),
        }
    }

    pub(crate) fn no_events(&mut self) -> bool {
        self.events.try_recv().is_err()
    }
}

/// An INVITE as a proxy would forward it to the client
pub(crate) fn incoming_invite(body: &str) -> String {
    let content_type = if body.is_empty() {
        ""
    } else {
        "Content-Type: application/sdp\r\n"
    };

    format!(
        "INVITE sip:alice@example.org SIP/2.0\r\n\
        Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bKinvite1\r\n\
        Max-Forwards: 69\r\n\
        From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
        To: <sip:alice@example.org>\r\n\
        Call-ID: incoming-1\r\n\
        CSeq: 10 INVITE\r\n\
        Contact: <sip:bob@198.51.100.7;transport=ws>\r\n\
        {content_type}\
        Content-Length: {}\r\n\
        \r\n\
        {body}",
        body.len()
    )
}

/// An in-dialog request from the caller of [`incoming_invite`]
pub(crate) fn incoming_in_dialog(method: &str, cseq: u32, local_tag: &str) -> String {
    format!(
        "{method} sip:alice@example.org SIP/2.0\r\n\
        Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bK{method}{cseq}\r\n\
        Max-Forwards: 69\r\n\
        From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
        To: <sip:alice@example.org>;tag={local_tag}\r\n\
        Call-ID: incoming-1\r\n\
        CSeq: {cseq} {method}\r\n\
        Content-Length: 0\r\n\
        \r\n"
    )
}

pub(crate) fn to_tag(response: &Response) -> String {
    let to: FromTo = response.headers.get(Name::TO).unwrap();
    to.tag.expect("response without to tag").to_string()
}
