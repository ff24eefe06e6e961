use crate::call::{CallSession, CallStatus, EndReason};
use crate::config::{ClientConfig, ValidConfig};
use crate::dialog::{
    ALLOW, Dialog, Identity, create_cancel, create_error_ack, random_sequence_number,
    random_string,
};
use crate::error::{AuthError, Error, Result};
use crate::event::{CallEvent, ConnectionStatus, Event, Events};
use crate::media::{MediaBackend, MediaError, MediaFactory, MediaSlot};
use crate::registration::{RegisterOutcome, Registrar, TimerAction};
use crate::sdp::{SdpType, SessionDescription};
use crate::transport::{Connector, Transport, WsConnector};
use bytesstr::BytesStr;
use sip_auth::{ClientAuthenticator, DigestAuthenticator, RequestParts, ResponseParts};
use sip_types::header::typed::{CSeq, CallID, ContentType, FromTo};
use sip_types::uri::NameAddr;
use sip_types::{CodeKind, Message, Method, Name, Request, Response, StatusCode};
use std::collections::VecDeque;
use std::fmt;
use std::future::{Future, pending};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::Instrument;

/// Time to wait for any response to an INVITE (SIP timer B)
const INVITE_TIMEOUT: Duration = Duration::from_secs(32);

/// How long responses to abandoned INVITEs are still handled
const LINGER: Duration = Duration::from_secs(32);

/// Handle to a softphone
///
/// All operations are serialized through a background task spawned on creation.
/// Dropping the handle disconnects and stops that task.
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl Client {
    /// Create a client using real websockets
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F: MediaFactory>(media: F) -> (Self, Events) {
        Self::with_connector(media, WsConnector::default())
    }

    /// Create a client which opens its connections using `connector`
    pub fn with_connector<F, C>(media: F, connector: C) -> (Self, Events)
    where
        F: MediaFactory,
        C: Connector,
    {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let actor = Actor {
            factory: media,
            connector: Arc::new(connector),
            commands: commands_rx,
            pending: VecDeque::new(),
            outputs: Outputs { events, status },
            out: Outbox {
                transport: Transport::new(),
                failed: false,
            },
            conn: None,
            call: None,
            lingering: vec![],
        };

        let span = tracing::info_span!("webphone", aor = tracing::field::Empty);
        tokio::spawn(actor.run().instrument(span));

        (
            Self {
                commands,
                status: status_rx,
            },
            events_rx,
        )
    }

    /// Connect to the configured server and register
    ///
    /// Tears down any previous connection and call first, unless `config` is
    /// invalid in which case nothing is touched. Returns once the websocket is
    /// open, the registration result is reported as [`ConnectionStatus`] event.
    pub async fn connect(&self, config: ClientConfig) -> Result<()> {
        let config = config.validated()?;

        self.request(|reply| Command::Connect(Box::new(config), reply))
            .await
    }

    /// End any call, remove the registration and close the connection
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Call `target`, a phone number, user name or sip uri
    ///
    /// Returns the new session as soon as it exists, the progress of the call
    /// is reported as [`CallEvent`]s.
    pub async fn call(&self, target: impl Into<String>) -> Result<CallSession> {
        let target = target.into();
        self.request(|reply| Command::Call(target, reply)).await
    }

    /// Answer the incoming call
    pub async fn answer(&self) -> Result<()> {
        self.request(Command::Answer).await
    }

    /// Hang up, cancel or decline the current call
    pub async fn hangup(&self) -> Result<()> {
        self.request(Command::Hangup).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| Command::SetMuted(muted, reply)).await
    }

    /// Mute state reported by the media of the current call
    pub async fn is_muted(&self) -> Result<bool> {
        self.request(Command::IsMuted).await
    }

    pub fn is_registered(&self) -> bool {
        self.status() == ConnectionStatus::Registered
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();

        self.commands
            .send(command(reply))
            .map_err(|_| Error::Shutdown)?;

        response.await.map_err(|_| Error::Shutdown)?
    }
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    Connect(Box<ValidConfig>, Reply<()>),
    Disconnect(Reply<()>),
    Call(String, Reply<CallSession>),
    Answer(Reply<()>),
    Hangup(Reply<()>),
    SetMuted(bool, Reply<()>),
    IsMuted(Reply<bool>),
}

impl Command {
    /// Commands which abort a running media operation, each of them ends the call
    fn interrupts_media(&self) -> bool {
        matches!(
            self,
            Command::Connect(..) | Command::Disconnect(..) | Command::Hangup(..)
        )
    }
}

fn reply<T>(reply: Reply<T>, result: Result<T>) {
    // caller is not interested in the result anymore
    let _ = reply.send(result);
}

struct Outputs {
    events: mpsc::UnboundedSender<Event>,
    status: watch::Sender<ConnectionStatus>,
}

impl Outputs {
    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }

            log::debug!("connection {current:?} -> {status:?}");
            *current = status;
            true
        });

        if changed {
            let _ = self.events.send(Event::Connection(status));
        }
    }

    fn call_event(&self, session: Option<&CallSession>) {
        let _ = self.events.send(Event::Call(CallEvent::new(session)));
    }

    /// Release the media of `call`, move it into its terminal state and report that
    fn finish<B: MediaBackend>(&self, mut call: Call<B>, status: CallStatus, reason: EndReason) {
        call.media.release();

        log::info!("call {} {status:?}, {reason}", call.session.id);

        if call.session.terminate(status, reason) {
            self.call_event(Some(&call.session));
        }

        self.call_event(None);
    }
}

struct Outbox {
    transport: Transport,
    /// Set when a send failed, the connection is handled as lost
    failed: bool,
}

impl Outbox {
    fn send<M: fmt::Display>(&mut self, message: &M) {
        if let Err(e) = self.transport.send(message.to_string()) {
            log::warn!("failed to send message, {e}");
            self.failed = true;
        }
    }
}

/// State of one connection
struct Conn {
    config: ValidConfig,
    identity: Identity,
    registrar: Registrar,
}

struct Call<B: MediaBackend> {
    session: CallSession,
    media: MediaSlot<B>,
    leg: Leg,
}

impl<B: MediaBackend> Call<B> {
    fn call_id(&self) -> Option<CallID> {
        match &self.leg {
            Leg::Preparing => None,
            Leg::Outgoing(leg) => leg.invite.call_id().ok(),
            Leg::Incoming(leg) => leg.invite.call_id().ok(),
            Leg::Established(leg) => Some(leg.dialog.call_id().clone()),
        }
    }
}

enum Leg {
    /// Outgoing call acquiring media, no INVITE sent
    Preparing,
    Outgoing(Outgoing),
    Incoming(Incoming),
    Established(Established),
}

struct Outgoing {
    invite: Request,
    /// Cleared by the first provisional response
    timeout: Option<Instant>,
    authenticator: DigestAuthenticator,
    challenged: bool,
}

struct Incoming {
    invite: Request,
    dialog: Dialog,
    local_tag: BytesStr,
    offer: Option<SessionDescription>,
}

struct Established {
    dialog: Dialog,
    /// ACK to re-send on retransmitted 2xx responses
    ack: Option<Request>,
    /// Our 200 OK carried the offer, the answer comes with the ACK
    awaiting_answer: bool,
}

/// An INVITE of a call that is already gone
struct Lingering {
    invite: Request,
    until: Instant,
}

fn prune_lingering(lingering: &mut Vec<Lingering>, now: Instant) {
    lingering.retain(|lingering| lingering.until > now);
}

fn is_response_to(response: &Response, request: &Request) -> bool {
    match (
        response.call_id(),
        response.cseq(),
        request.call_id(),
        request.cseq(),
    ) {
        (Ok(call_id), Ok(cseq), Ok(request_call_id), Ok(request_cseq)) => {
            call_id == request_call_id && cseq == request_cseq
        }
        _ => false,
    }
}

fn media_failure(error: &MediaError) -> (StatusCode, EndReason) {
    match error {
        MediaError::Negotiation(_) => (StatusCode::NOT_ACCEPTABLE_HERE, EndReason::Negotiation),
        MediaError::AccessDenied | MediaError::Unavailable(_) => {
            (StatusCode::SERVER_INTERNAL_ERROR, EndReason::MediaAccess)
        }
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

enum Wake {
    Command(Command),
    Frame(Option<String>),
    Timer,
}

struct Actor<F: MediaFactory> {
    factory: F,
    connector: Arc<dyn Connector>,

    commands: mpsc::UnboundedReceiver<Command>,
    /// Commands received while a media operation was running
    pending: VecDeque<Command>,

    outputs: Outputs,
    out: Outbox,

    conn: Option<Conn>,
    call: Option<Call<F::Backend>>,
    lingering: Vec<Lingering>,
}

impl<F: MediaFactory> Actor<F> {
    async fn run(mut self) {
        loop {
            if std::mem::take(&mut self.out.failed) && self.conn.is_some() {
                self.transport_lost();
            }

            let command = match self.pending.pop_front() {
                Some(command) => command,
                None => {
                    let deadline = self.deadline();

                    let wake = tokio::select! {
                        command = self.commands.recv() => match command {
                            Some(command) => Wake::Command(command),
                            None => break,
                        },
                        frame = self.out.transport.recv() => Wake::Frame(frame),
                        _ = sleep_until_some(deadline) => Wake::Timer,
                    };

                    match wake {
                        Wake::Command(command) => command,
                        Wake::Frame(frame) => {
                            self.frame(frame).await;
                            continue;
                        }
                        Wake::Timer => {
                            self.timers();
                            continue;
                        }
                    }
                }
            };

            self.command(command).await;
        }

        log::debug!("client handle dropped, shutting down");
        self.teardown();
    }

    /// Run a media operation, returns `None` if a command interrupted it
    ///
    /// Commands arriving meanwhile are queued in order.
    async fn drive<T>(&mut self, operation: impl Future<Output = T>) -> Option<T> {
        let mut operation = pin!(operation);

        if self.pending.iter().any(Command::interrupts_media) {
            return None;
        }

        loop {
            let command = tokio::select! {
                biased;
                output = &mut operation => return Some(output),
                command = self.commands.recv() => command,
            };

            let command = command?;
            let interrupts = command.interrupts_media();
            self.pending.push_back(command);

            if interrupts {
                log::debug!("media operation interrupted");
                return None;
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        let registrar = self
            .conn
            .as_ref()
            .and_then(|conn| conn.registrar.deadline());

        let invite = self.call.as_ref().and_then(|call| match &call.leg {
            Leg::Outgoing(leg) => leg.timeout,
            _ => None,
        });

        registrar.into_iter().chain(invite).min()
    }

    async fn command(&mut self, command: Command) {
        match command {
            Command::Connect(config, tx) => self.connect(*config, tx).await,
            Command::Disconnect(tx) => {
                self.teardown();
                reply(tx, Ok(()));
            }
            Command::Call(target, tx) => self.call(target, tx).await,
            Command::Answer(tx) => self.answer(tx).await,
            Command::Hangup(tx) => {
                let result = match self.call.take() {
                    Some(call) => {
                        self.end(call, CallStatus::Ended, EndReason::LocalHangup);
                        Ok(())
                    }
                    None => Err(Error::NoActiveSession),
                };

                reply(tx, result);
            }
            Command::SetMuted(muted, tx) => {
                let result = match &mut self.call {
                    Some(call) => {
                        call.media.backend().set_muted(muted);
                        Ok(())
                    }
                    None => Err(Error::NoActiveSession),
                };

                reply(tx, result);
            }
            Command::IsMuted(tx) => {
                let result = match &mut self.call {
                    Some(call) => Ok(call.media.backend().is_muted()),
                    None => Err(Error::NoActiveSession),
                };

                reply(tx, result);
            }
        }
    }

    async fn connect(&mut self, config: ValidConfig, tx: Reply<()>) {
        self.teardown();

        tracing::Span::current().record("aor", config.config.uri.as_str());
        self.outputs.set_status(ConnectionStatus::Connecting);

        if let Err(e) = self
            .out
            .transport
            .open(&*self.connector, &config.server)
            .await
        {
            log::warn!("failed to connect to {}, {e}", config.server);
            self.outputs.set_status(ConnectionStatus::Error);
            return reply(tx, Err(e.into()));
        }

        self.outputs.set_status(ConnectionStatus::Connected);

        let identity = Identity::new(&config);
        let mut registrar = Registrar::new(&identity, &config);
        let register = registrar.create_register(&identity, Instant::now());

        self.conn = Some(Conn {
            config,
            identity,
            registrar,
        });

        reply(tx, Ok(()));
        self.out.send(&register);
    }

    /// End any call and connection, always ends in [`ConnectionStatus::Disconnected`]
    fn teardown(&mut self) {
        if let Some(call) = self.call.take() {
            self.end(call, CallStatus::Ended, EndReason::Disconnected);
        }

        if let Some(mut conn) = self.conn.take() {
            if conn.registrar.is_registered() {
                let unregister = conn.registrar.create_unregister(&conn.identity);
                self.out.send(&unregister);
            }
        }

        self.lingering.clear();
        self.out.transport.close();
        self.out.failed = false;
        self.outputs.set_status(ConnectionStatus::Disconnected);
    }

    fn transport_lost(&mut self) {
        if let Some(call) = self.call.take() {
            self.outputs
                .finish(call, CallStatus::Failed, EndReason::TransportLost);
        }

        self.conn = None;
        self.lingering.clear();
        self.out.transport.close();
        self.outputs.set_status(ConnectionStatus::Error);
    }

    fn registration_failed(&mut self, error: AuthError) {
        log::warn!("registration failed, {error}");

        if let Some(call) = self.call.take() {
            self.outputs
                .finish(call, CallStatus::Failed, EndReason::Disconnected);
        }

        self.conn = None;
        self.lingering.clear();
        self.out.transport.close();
        self.outputs.set_status(ConnectionStatus::Error);
    }

    fn timers(&mut self) {
        let now = Instant::now();
        let mut failure = None;

        prune_lingering(&mut self.lingering, now);

        if let Some(conn) = &mut self.conn {
            while let Some(action) = conn.registrar.poll_timer(&conn.identity, now) {
                match action {
                    TimerAction::Send(request) => self.out.send(&request),
                    TimerAction::Lapsed => self.outputs.set_status(ConnectionStatus::Connected),
                    TimerAction::Failed(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        if let Some(error) = failure {
            self.registration_failed(error);
        }

        let invite_expired = self.call.as_ref().is_some_and(|call| {
            matches!(&call.leg, Leg::Outgoing(leg) if leg.timeout.is_some_and(|timeout| timeout <= now))
        });

        if let Some(call) = self.call.take_if(|_| invite_expired) {
            log::warn!("no response to INVITE");

            if let Leg::Outgoing(leg) = &call.leg {
                self.lingering.push(Lingering {
                    invite: leg.invite.clone(),
                    until: now + LINGER,
                });
            }

            self.outputs
                .finish(call, CallStatus::Failed, EndReason::Timeout);
        }
    }

    /// Send whatever ends `call` on the signaling level and finish it
    fn end(&mut self, mut call: Call<F::Backend>, status: CallStatus, mut reason: EndReason) {
        if let Some(conn) = &self.conn {
            match &mut call.leg {
                Leg::Preparing => {}
                Leg::Outgoing(leg) => {
                    match create_cancel(&leg.invite) {
                        Ok(cancel) => self.out.send(&cancel),
                        Err(e) => log::warn!("failed to create CANCEL, {e}"),
                    }

                    self.lingering.push(Lingering {
                        invite: leg.invite.clone(),
                        until: Instant::now() + LINGER,
                    });
                }
                Leg::Incoming(leg) => {
                    let decline = conn.identity.create_response(
                        &leg.invite,
                        StatusCode::DECLINE,
                        Some(&leg.local_tag),
                    );
                    self.out.send(&decline);

                    if reason == EndReason::LocalHangup {
                        reason = EndReason::Declined;
                    }
                }
                Leg::Established(leg) => {
                    let bye = leg.dialog.create_request(&conn.identity, Method::BYE);
                    self.out.send(&bye);
                }
            }
        }

        self.outputs.finish(call, status, reason);
    }

    async fn call(&mut self, target: String, tx: Reply<CallSession>) {
        let Some(conn) = &self.conn else {
            return reply(tx, Err(Error::NotRegistered));
        };

        if self.outputs.status() != ConnectionStatus::Registered {
            return reply(tx, Err(Error::NotRegistered));
        }

        if self.call.is_some() {
            return reply(tx, Err(Error::Busy));
        }

        let uri = match conn.identity.call_target(&target) {
            Ok(uri) => uri,
            Err(e) => return reply(tx, Err(e.into())),
        };

        let session = CallSession::outgoing(target.trim().to_owned());
        let backend = self.factory.create(&conn.config.config.ice_servers);
        let authenticator = conn.config.authenticator();

        log::info!("calling {uri}");

        self.outputs.call_event(Some(&session));
        reply(tx, Ok(session.clone()));

        let mut call = Call {
            session,
            media: MediaSlot::new(backend),
            leg: Leg::Preparing,
        };

        let Some(offer) = self.create_offer(call.media.backend()).await else {
            self.call = Some(call);
            return;
        };

        let offer = match offer {
            Ok(offer) => offer,
            Err(e) => {
                log::warn!("failed to create offer, {e}");
                let (_, reason) = media_failure(&e);
                return self.outputs.finish(call, CallStatus::Failed, reason);
            }
        };

        let Some(conn) = &self.conn else {
            return self
                .outputs
                .finish(call, CallStatus::Failed, EndReason::Disconnected);
        };

        let identity = &conn.identity;
        let from = FromTo::new(identity.name_addr(), Some(random_string()));
        let to = FromTo::new(NameAddr::uri(uri.clone()), None);

        let mut invite = identity.create_request(
            Method::INVITE,
            uri,
            &from,
            &to,
            &CallID::new(random_string()),
            random_sequence_number(),
        );
        invite.headers.insert_named(&ContentType::sdp());
        invite.body = offer.as_str().to_owned().into();

        self.out.send(&invite);

        call.leg = Leg::Outgoing(Outgoing {
            invite,
            timeout: Some(Instant::now() + INVITE_TIMEOUT),
            authenticator,
            challenged: false,
        });
        self.call = Some(call);
    }

    async fn create_offer(
        &mut self,
        backend: &mut F::Backend,
    ) -> Option<Result<SessionDescription, MediaError>> {
        if let Err(e) = self.drive(backend.acquire_local_media()).await? {
            return Some(Err(e));
        }

        self.drive(backend.create_offer()).await
    }

    /// Apply the remote `offer` and create the answer, or create an offer if there is none
    async fn create_answer(
        &mut self,
        backend: &mut F::Backend,
        offer: Option<SessionDescription>,
    ) -> Option<Result<SessionDescription, MediaError>> {
        if let Err(e) = self.drive(backend.acquire_local_media()).await? {
            return Some(Err(e));
        }

        let Some(offer) = offer else {
            return self.drive(backend.create_offer()).await;
        };

        if let Err(e) = self
            .drive(backend.apply_remote_description(SdpType::Offer, offer))
            .await?
        {
            return Some(Err(e));
        }

        self.drive(backend.create_answer()).await
    }

    async fn answer(&mut self, tx: Reply<()>) {
        let Some(mut call) = self.call.take() else {
            return reply(tx, Err(Error::NoActiveSession));
        };

        let offer = match &call.leg {
            Leg::Incoming(leg) if call.session.status == CallStatus::Ringing => {
                Some(leg.offer.clone())
            }
            _ => None,
        };

        let Some(offer) = offer else {
            self.call = Some(call);
            return reply(tx, Err(Error::NotAnswerable));
        };

        reply(tx, Ok(()));

        let awaiting_answer = offer.is_none();

        let Some(result) = self.create_answer(call.media.backend(), offer).await else {
            self.call = Some(call);
            return;
        };

        let (Some(conn), Leg::Incoming(leg)) = (&self.conn, &call.leg) else {
            return self
                .outputs
                .finish(call, CallStatus::Failed, EndReason::Disconnected);
        };

        let sdp = match result {
            Ok(sdp) => sdp,
            Err(e) => {
                log::warn!("failed to answer call, {e}");

                let (code, reason) = media_failure(&e);
                let response = conn
                    .identity
                    .create_response(&leg.invite, code, Some(&leg.local_tag));
                self.out.send(&response);

                return self.outputs.finish(call, CallStatus::Failed, reason);
            }
        };

        let mut ok = conn
            .identity
            .create_response(&leg.invite, StatusCode::OK, Some(&leg.local_tag));
        ok.headers.insert(Name::ALLOW, ALLOW);
        ok.headers.insert_named(&ContentType::sdp());
        ok.body = sdp.as_str().to_owned().into();

        self.out.send(&ok);

        call.leg = Leg::Established(Established {
            dialog: leg.dialog.clone(),
            ack: None,
            awaiting_answer,
        });

        if call.session.transition(CallStatus::Answered) {
            self.outputs.call_event(Some(&call.session));
        }

        self.call = Some(call);
    }

    async fn frame(&mut self, frame: Option<String>) {
        let Some(frame) = frame else {
            return self.transport_lost();
        };

        match Message::parse(&frame) {
            Ok(Message::Request(request)) => {
                log::debug!("received {} request", request.line.method);
                self.request(request).await;
            }
            Ok(Message::Response(response)) => {
                log::debug!("received {} response", response.code());
                self.response(response).await;
            }
            Err(e) => log::warn!("discarding malformed message, {e}"),
        }
    }

    async fn response(&mut self, response: Response) {
        let method = match response.cseq() {
            Ok(cseq) => cseq.method,
            Err(e) => {
                log::warn!("discarding response, {e}");
                return;
            }
        };

        if method == Method::REGISTER {
            self.register_response(response);
        } else if method == Method::INVITE {
            self.invite_response(response).await;
        } else {
            log::debug!("ignoring {} response to {method}", response.code());
        }
    }

    fn register_response(&mut self, response: Response) {
        let Some(conn) = &mut self.conn else {
            return;
        };

        match conn
            .registrar
            .receive_response(&conn.identity, &response, Instant::now())
        {
            RegisterOutcome::Registered => self.outputs.set_status(ConnectionStatus::Registered),
            RegisterOutcome::Send(request) => self.out.send(&request),
            RegisterOutcome::Failed(e) => self.registration_failed(e),
            RegisterOutcome::Nothing => {}
        }
    }

    async fn invite_response(&mut self, response: Response) {
        let for_call = self.call.as_ref().is_some_and(|call| match &call.leg {
            Leg::Outgoing(leg) => is_response_to(&response, &leg.invite),
            _ => false,
        });

        if let Some(call) = self.call.take_if(|_| for_call) {
            return self.outgoing_response(call, response).await;
        }

        if let Some(Leg::Established(leg)) = self.call.as_ref().map(|call| &call.leg) {
            let retransmitted = response.code().kind() == CodeKind::Success
                && response
                    .call_id()
                    .is_ok_and(|call_id| &call_id == leg.dialog.call_id());

            if retransmitted {
                if let Some(ack) = &leg.ack {
                    self.out.send(ack);
                }
                return;
            }
        }

        prune_lingering(&mut self.lingering, Instant::now());

        let Some(position) = self
            .lingering
            .iter()
            .position(|lingering| is_response_to(&response, &lingering.invite))
        else {
            log::debug!("ignoring {} response to unknown INVITE", response.code());
            return;
        };

        if response.code().kind() == CodeKind::Provisional {
            return;
        }

        let Some(conn) = &self.conn else {
            return;
        };

        let lingering = self.lingering.remove(position);

        if response.code().kind() != CodeKind::Success {
            match create_error_ack(&lingering.invite, &response) {
                Ok(ack) => self.out.send(&ack),
                Err(e) => log::warn!("failed to create ACK, {e}"),
            }
            return;
        }

        log::debug!("call accepted after it ended, terminating");

        match Dialog::from_uac(&lingering.invite, &response) {
            Ok(mut dialog) => {
                let ack = dialog.create_ack(&conn.identity, dialog.local_cseq());
                self.out.send(&ack);

                let bye = dialog.create_request(&conn.identity, Method::BYE);
                self.out.send(&bye);
            }
            Err(e) => log::warn!("failed to create dialog from late response, {e}"),
        }
    }

    async fn outgoing_response(&mut self, mut call: Call<F::Backend>, response: Response) {
        let (Some(conn), Leg::Outgoing(leg)) = (&self.conn, &mut call.leg) else {
            self.call = Some(call);
            return;
        };

        let code = response.code();

        match code.kind() {
            CodeKind::Provisional => {
                leg.timeout = None;

                if code != StatusCode::TRYING
                    && call.session.status == CallStatus::Connecting
                    && call.session.transition(CallStatus::Ringing)
                {
                    self.outputs.call_event(Some(&call.session));
                }

                self.call = Some(call);
            }
            CodeKind::Success => self.outgoing_accepted(call, response).await,
            _ => {
                match create_error_ack(&leg.invite, &response) {
                    Ok(ack) => self.out.send(&ack),
                    Err(e) => log::warn!("failed to create ACK, {e}"),
                }

                let challenged = code == StatusCode::UNAUTHORIZED
                    || code == StatusCode::PROXY_AUTHENTICATION_REQUIRED;

                if challenged && !leg.challenged {
                    leg.challenged = true;

                    match leg.authenticator.handle_rejection(
                        RequestParts::from(&leg.invite),
                        ResponseParts::from(&response),
                    ) {
                        Ok(()) => {
                            let mut invite = leg.invite.clone();
                            let cseq = leg.invite.cseq().map_or(1, |cseq| cseq.cseq + 1);

                            invite.headers.remove(&Name::VIA);
                            invite
                                .headers
                                .insert_front(Name::VIA, conn.identity.via().to_string());
                            invite
                                .headers
                                .replace_named(&CSeq::new(cseq, Method::INVITE));
                            invite.headers.remove(&Name::AUTHORIZATION);
                            invite.headers.remove(&Name::PROXY_AUTHORIZATION);
                            leg.authenticator.authorize_request(&mut invite.headers);

                            self.out.send(&invite);

                            leg.invite = invite;
                            leg.timeout = Some(Instant::now() + INVITE_TIMEOUT);
                            self.call = Some(call);
                            return;
                        }
                        Err(e) => log::warn!("cannot authenticate INVITE, {e}"),
                    }
                }

                let reason = EndReason::Rejected {
                    code: code.into_u16(),
                    reason: response.line.reason_phrase().to_owned(),
                };

                self.outputs.finish(call, CallStatus::Failed, reason);
            }
        }
    }

    async fn outgoing_accepted(&mut self, mut call: Call<F::Backend>, response: Response) {
        let (Some(conn), Leg::Outgoing(leg)) = (&self.conn, &call.leg) else {
            self.call = Some(call);
            return;
        };

        let dialog = match Dialog::from_uac(&leg.invite, &response) {
            Ok(dialog) => dialog,
            Err(e) => {
                log::warn!("invalid 2xx response to INVITE, {e}");
                return self
                    .outputs
                    .finish(call, CallStatus::Failed, EndReason::Negotiation);
            }
        };

        let ack = dialog.create_ack(&conn.identity, dialog.local_cseq());
        self.out.send(&ack);

        call.leg = Leg::Established(Established {
            dialog,
            ack: Some(ack),
            awaiting_answer: false,
        });

        let answer = match SessionDescription::parse(&response.body) {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("invalid answer, {e}");
                return self.end(call, CallStatus::Failed, EndReason::Negotiation);
            }
        };

        let result = self
            .drive(
                call.media
                    .backend()
                    .apply_remote_description(SdpType::Answer, answer),
            )
            .await;

        match result {
            Some(Ok(())) => {
                if call.session.transition(CallStatus::Answered) {
                    self.outputs.call_event(Some(&call.session));
                }

                self.call = Some(call);
            }
            Some(Err(e)) => {
                log::warn!("failed to apply answer, {e}");
                let (_, reason) = media_failure(&e);
                self.end(call, CallStatus::Failed, reason);
            }
            None => self.call = Some(call),
        }
    }

    async fn request(&mut self, request: Request) {
        let method = request.line.method.clone();

        if method == Method::INVITE {
            self.invite(request);
        } else if method == Method::ACK {
            self.ack(request).await;
        } else if method == Method::CANCEL {
            self.cancel(request);
        } else if method == Method::BYE {
            self.bye(request);
        } else {
            let Some(conn) = &self.conn else {
                return;
            };

            let code = if method == Method::OPTIONS {
                StatusCode::OK
            } else {
                StatusCode::METHOD_NOT_ALLOWED
            };

            let mut response = conn.identity.create_response(&request, code, None);
            response.headers.insert(Name::ALLOW, ALLOW);
            self.out.send(&response);
        }
    }

    fn invite(&mut self, invite: Request) {
        let Some(conn) = &self.conn else {
            return;
        };

        let call_id = match invite.call_id() {
            Ok(call_id) => call_id,
            Err(e) => {
                log::warn!("discarding INVITE, {e}");
                return;
            }
        };

        let decline = |code: StatusCode| {
            conn.identity
                .create_response(&invite, code, Some(&random_string()))
        };

        if let Some(call) = &self.call {
            if call.call_id().as_ref() == Some(&call_id) {
                if let Leg::Established(_) = call.leg {
                    // session modification is not supported, the current session stays as is
                    self.out.send(&decline(StatusCode::NOT_ACCEPTABLE_HERE));
                }
                return;
            }

            return self.out.send(&decline(StatusCode::BUSY_HERE));
        }

        if self.outputs.status() != ConnectionStatus::Registered {
            return self
                .out
                .send(&decline(StatusCode::TEMPORARILY_UNAVAILABLE));
        }

        let offer = if invite.body.trim().is_empty() {
            None
        } else {
            match SessionDescription::parse(&invite.body) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    log::warn!("rejecting INVITE with invalid offer, {e}");
                    return self.out.send(&decline(StatusCode::NOT_ACCEPTABLE_HERE));
                }
            }
        };

        let local_tag = random_string();

        let dialog = match Dialog::from_uas(&invite, local_tag.clone()) {
            Ok(dialog) => dialog,
            Err(e) => {
                log::warn!("rejecting malformed INVITE, {e}");
                return self.out.send(&decline(StatusCode::BAD_REQUEST));
            }
        };

        let remote_identity = match invite.headers.get::<FromTo>(Name::FROM) {
            Ok(from) => match from.uri.name {
                Some(name) => format!("{name} <{}>", from.uri.uri),
                None => from.uri.uri.to_string(),
            },
            Err(_) => String::from("unknown"),
        };

        log::info!("incoming call from {remote_identity}");

        let trying = conn
            .identity
            .create_response(&invite, StatusCode::TRYING, None);
        let ringing = conn
            .identity
            .create_response(&invite, StatusCode::RINGING, Some(&local_tag));
        self.out.send(&trying);
        self.out.send(&ringing);

        let session = CallSession::incoming(remote_identity);
        let backend = self.factory.create(&conn.config.config.ice_servers);

        self.outputs.call_event(Some(&session));

        self.call = Some(Call {
            session,
            media: MediaSlot::new(backend),
            leg: Leg::Incoming(Incoming {
                invite,
                dialog,
                local_tag,
                offer,
            }),
        });
    }

    async fn ack(&mut self, ack: Request) {
        let Some(mut call) = self.call.take() else {
            return;
        };

        let Leg::Established(leg) = &mut call.leg else {
            self.call = Some(call);
            return;
        };

        if !leg.awaiting_answer || !leg.dialog.matches(&ack) {
            self.call = Some(call);
            return;
        }

        leg.awaiting_answer = false;

        let result = match SessionDescription::parse(&ack.body) {
            Ok(answer) => {
                self.drive(
                    call.media
                        .backend()
                        .apply_remote_description(SdpType::Answer, answer),
                )
                .await
            }
            Err(e) => Some(Err(MediaError::from(e))),
        };

        match result {
            Some(Err(e)) => {
                log::warn!("failed to apply answer from ACK, {e}");
                let (_, reason) = media_failure(&e);
                self.end(call, CallStatus::Failed, reason);
            }
            Some(Ok(())) | None => self.call = Some(call),
        }
    }

    fn cancel(&mut self, cancel: Request) {
        let Some(conn) = &self.conn else {
            return;
        };

        let cancels_call = self.call.as_ref().is_some_and(|call| match &call.leg {
            Leg::Incoming(leg) => {
                matches!(
                    (cancel.call_id(), cancel.cseq(), leg.invite.call_id(), leg.invite.cseq()),
                    (Ok(a), Ok(x), Ok(b), Ok(y)) if a == b && x.cseq == y.cseq
                )
            }
            _ => false,
        });

        if !cancels_call {
            let known = self.call.as_ref().and_then(|call| call.call_id()).is_some_and(|id| {
                cancel.call_id().is_ok_and(|call_id| call_id == id)
            });

            // a CANCEL after the final response has no effect
            let code = if known {
                StatusCode::OK
            } else {
                StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST
            };

            return self
                .out
                .send(&conn.identity.create_response(&cancel, code, None));
        }

        let Some(call) = self.call.take() else {
            return;
        };

        let ok = conn.identity.create_response(&cancel, StatusCode::OK, None);
        self.out.send(&ok);

        if let Leg::Incoming(leg) = &call.leg {
            let terminated = conn.identity.create_response(
                &leg.invite,
                StatusCode::REQUEST_TERMINATED,
                Some(&leg.local_tag),
            );
            self.out.send(&terminated);
        }

        self.outputs
            .finish(call, CallStatus::Failed, EndReason::Canceled);
    }

    fn bye(&mut self, bye: Request) {
        let Some(conn) = &self.conn else {
            return;
        };

        let in_dialog = self.call.as_ref().is_some_and(|call| match &call.leg {
            Leg::Established(leg) => leg.dialog.matches(&bye),
            _ => false,
        });

        if !in_dialog {
            let response = conn.identity.create_response(
                &bye,
                StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST,
                None,
            );
            return self.out.send(&response);
        }

        let ok = conn.identity.create_response(&bye, StatusCode::OK, None);
        self.out.send(&ok);

        if let Some(call) = self.call.take() {
            self.outputs
                .finish(call, CallStatus::Ended, EndReason::RemoteHangup);
        }
    }
}
