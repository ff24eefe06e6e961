use common::{
    Acquire, Harness, SDP, Server, config, incoming_in_dialog, incoming_invite, response_to,
    to_tag,
};
use sip_types::header::typed::{CSeq, Expires};
use sip_types::{Method, Name, Request, StatusCode};
use std::sync::atomic::Ordering;
use webphone::{
    CallState, CallStatus, ClientConfig, ConnectionStatus, Direction, EndReason, Error,
};

mod common;

const CONTACT: &str = "Contact: <sip:bob@198.51.100.7;transport=ws>\r\n";

fn cseq(request: &Request) -> CSeq {
    request.cseq().unwrap()
}

/// Place a call to bob and let the remote side accept it
async fn outgoing_answered(harness: &mut Harness, server: &mut Server) -> Request {
    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let invite = server.recv_request().await;
    assert_eq!(invite.line.method, Method::INVITE);

    server.respond(&invite, 180, CONTACT, "");
    harness.expect_call(CallState::Ringing).await;

    server.respond(&invite, 200, CONTACT, SDP);

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);
    assert_eq!(cseq(&ack), CSeq::new(cseq(&invite).cseq, Method::ACK));

    harness.expect_call(CallState::Answered).await;
    invite
}

/// Receive an incoming call without answering it, returns the local tag
async fn incoming_ringing(harness: &mut Harness, server: &mut Server, body: &str) -> String {
    server.send(incoming_invite(body));

    let trying = server.recv_response().await;
    assert_eq!(trying.code(), StatusCode::TRYING);

    let ringing = server.recv_response().await;
    assert_eq!(ringing.code(), StatusCode::RINGING);

    let event = harness.expect_call(CallState::Incoming).await;
    let session = event.session.unwrap();
    assert_eq!(session.direction, Direction::Incoming);
    assert!(session.remote_identity.contains("sip:bob@example.org"));

    to_tag(&ringing)
}

#[tokio::test]
async fn outgoing_call_hangup() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    let session = harness.client.call("bob").await.unwrap();
    assert_eq!(session.direction, Direction::Outgoing);
    assert_eq!(session.status, CallStatus::Connecting);
    assert_eq!(session.remote_identity, "bob");

    let event = harness.expect_call(CallState::Calling).await;
    assert_eq!(event.session.unwrap().id, session.id);

    let invite = server.recv_request().await;
    assert_eq!(invite.line.method, Method::INVITE);
    assert_eq!(invite.line.uri.to_string(), "sip:bob@example.org");
    assert!(invite.headers.contains(&Name::CONTACT));
    assert!(invite.body.contains("opus"));
    assert_eq!(
        &**invite.headers.get_raw(&Name::CONTENT_TYPE).unwrap(),
        "application/sdp"
    );

    server.respond(&invite, 100, "", "");
    server.respond(&invite, 180, CONTACT, "");
    harness.expect_call(CallState::Ringing).await;

    server.respond(&invite, 200, CONTACT, SDP);

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);

    let event = harness.expect_call(CallState::Answered).await;
    let answered = event.session.unwrap();
    assert!(answered.start_time.is_some());
    assert!(answered.end_time.is_none());
    assert_eq!(harness.media.remote_descriptions.load(Ordering::SeqCst), 1);

    harness.client.hangup().await.unwrap();

    let bye = server.recv_request().await;
    assert_eq!(bye.line.method, Method::BYE);
    assert!(
        bye.line
            .uri
            .to_string()
            .starts_with("sip:bob@198.51.100.7")
    );
    assert!(cseq(&bye).cseq > cseq(&invite).cseq);

    let event = harness.expect_call(CallState::Ended).await;
    let ended = event.session.unwrap();
    assert_eq!(ended.end_reason, Some(EndReason::LocalHangup));
    assert!(ended.end_time.is_some());

    harness.expect_call(CallState::Idle).await;

    assert_eq!(harness.media.created(), 1);
    assert_eq!(harness.media.released(), 1);
    assert!(harness.no_events());
}

#[tokio::test]
async fn outgoing_call_rejected() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    harness.client.call("+1 (555) 123-4567").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let invite = server.recv_request().await;
    assert_eq!(invite.line.uri.to_string(), "sip:+15551234567@example.org");

    server.respond(&invite, 486, "", "");

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);
    assert_eq!(ack.line.uri.to_string(), invite.line.uri.to_string());
    assert_eq!(cseq(&ack).cseq, cseq(&invite).cseq);

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::Rejected {
            code: 486,
            reason: "Busy Here".into()
        })
    );

    harness.expect_call(CallState::Idle).await;
    assert_eq!(harness.media.released(), 1);
}

#[tokio::test]
async fn outgoing_call_authenticated() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let invite = server.recv_request().await;
    server.respond(
        &invite,
        407,
        "Proxy-Authenticate: Digest realm=\"example.org\", nonce=\"n3\", qop=\"auth\"\r\n",
        "",
    );

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);

    let retry = server.recv_request().await;
    assert_eq!(retry.line.method, Method::INVITE);
    assert_eq!(cseq(&retry).cseq, cseq(&invite).cseq + 1);
    assert_eq!(retry.call_id().unwrap(), invite.call_id().unwrap());
    assert!(retry.headers.contains(&Name::PROXY_AUTHORIZATION));
    assert_ne!(
        retry.headers.get_raw(&Name::VIA),
        invite.headers.get_raw(&Name::VIA)
    );

    server.respond(&retry, 200, CONTACT, SDP);
    assert_eq!(server.recv_request().await.line.method, Method::ACK);

    harness.expect_call(CallState::Answered).await;
}

#[tokio::test]
async fn outgoing_call_canceled() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let invite = server.recv_request().await;
    server.respond(&invite, 180, CONTACT, "");
    harness.expect_call(CallState::Ringing).await;

    harness.client.hangup().await.unwrap();

    let cancel = server.recv_request().await;
    assert_eq!(cancel.line.method, Method::CANCEL);
    assert_eq!(cancel.line.uri.to_string(), invite.line.uri.to_string());
    assert_eq!(cseq(&cancel), CSeq::new(cseq(&invite).cseq, Method::CANCEL));
    assert_eq!(
        cancel.headers.get_raw(&Name::VIA),
        invite.headers.get_raw(&Name::VIA)
    );

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::LocalHangup)
    );
    harness.expect_call(CallState::Idle).await;

    server.respond(&cancel, 200, "", "");
    server.respond(&invite, 487, "", "");

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);
    assert_eq!(cseq(&ack).cseq, cseq(&invite).cseq);

    assert!(harness.no_events());
}

#[tokio::test]
async fn accepted_after_cancel_is_terminated() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let invite = server.recv_request().await;
    harness.client.hangup().await.unwrap();

    assert_eq!(server.recv_request().await.line.method, Method::CANCEL);
    harness.expect_call(CallState::Ended).await;
    harness.expect_call(CallState::Idle).await;

    server.respond(&invite, 200, CONTACT, SDP);

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);

    let bye = server.recv_request().await;
    assert_eq!(bye.line.method, Method::BYE);
    assert_eq!(bye.call_id().unwrap(), invite.call_id().unwrap());

    assert!(harness.no_events());
}

#[tokio::test(start_paused = true)]
async fn unanswered_invite_times_out() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;
    server.recv_request().await;

    let start = tokio::time::Instant::now();

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(event.session.unwrap().end_reason, Some(EndReason::Timeout));
    assert!(start.elapsed() >= std::time::Duration::from_secs(32));

    harness.expect_call(CallState::Idle).await;
    assert_eq!(harness.media.released(), 1);
    assert!(harness.client.is_registered());
}

#[tokio::test]
async fn hangup_while_acquiring_media() {
    let (mut harness, mut server) = Harness::registered(Acquire::Hang).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    harness.client.hangup().await.unwrap();

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::LocalHangup)
    );
    harness.expect_call(CallState::Idle).await;

    assert_eq!(harness.media.released(), 1);
    assert!(server.is_idle(), "no INVITE may be sent");
}

#[tokio::test]
async fn invalid_connect_keeps_call() {
    let (mut harness, mut server) = Harness::registered(Acquire::Hang).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let insecure = ClientConfig {
        ws_server: "ws://sip.example.org/ws".into(),
        ..config()
    };
    assert!(matches!(
        harness.client.connect(insecure).await,
        Err(Error::Configuration(_))
    ));

    assert!(harness.no_events());
    assert!(harness.client.is_registered());
    assert_eq!(harness.media.released(), 0);

    harness.client.hangup().await.unwrap();

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::LocalHangup)
    );
    harness.expect_call(CallState::Idle).await;

    assert_eq!(harness.media.released(), 1);
    assert!(server.is_idle());
}

#[tokio::test]
async fn media_access_denied() {
    let (mut harness, mut server) = Harness::registered(Acquire::Deny).await;

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::MediaAccess)
    );
    harness.expect_call(CallState::Idle).await;

    assert_eq!(harness.media.released(), 1);
    assert!(server.is_idle());
}

#[tokio::test]
async fn call_guards() {
    let mut harness = Harness::new(Acquire::Grant);

    assert!(matches!(
        harness.client.call("bob").await,
        Err(Error::NotRegistered)
    ));
    assert!(matches!(
        harness.client.answer().await,
        Err(Error::NoActiveSession)
    ));
    assert!(matches!(
        harness.client.hangup().await,
        Err(Error::NoActiveSession)
    ));
    assert!(matches!(
        harness.client.set_muted(true).await,
        Err(Error::NoActiveSession)
    ));
    assert!(matches!(
        harness.client.is_muted().await,
        Err(Error::NoActiveSession)
    ));
    assert!(harness.no_events());

    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    assert!(matches!(
        harness.client.call("  ").await,
        Err(Error::Configuration(_))
    ));

    harness.client.call("bob").await.unwrap();
    harness.expect_call(CallState::Calling).await;

    assert!(matches!(harness.client.call("carol").await, Err(Error::Busy)));
    assert!(matches!(
        harness.client.answer().await,
        Err(Error::NotAnswerable)
    ));

    server.recv_request().await;
    assert_eq!(harness.media.created(), 1);
    assert!(harness.no_events());
}

#[tokio::test]
async fn mute_reaches_media() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;
    outgoing_answered(&mut harness, &mut server).await;

    assert!(!harness.client.is_muted().await.unwrap());

    harness.client.set_muted(true).await.unwrap();
    assert!(harness.media.muted.load(Ordering::SeqCst));
    assert!(harness.client.is_muted().await.unwrap());

    harness.client.set_muted(false).await.unwrap();
    assert!(!harness.media.muted.load(Ordering::SeqCst));
    assert!(!harness.client.is_muted().await.unwrap());

    assert!(harness.no_events());
}

#[tokio::test]
async fn incoming_call_remote_hangup() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    let local_tag = incoming_ringing(&mut harness, &mut server, SDP).await;

    harness.client.answer().await.unwrap();

    let ok = server.recv_response().await;
    assert_eq!(ok.code(), StatusCode::OK);
    assert_eq!(to_tag(&ok), local_tag);
    assert!(ok.body.contains("opus"));
    assert!(ok.headers.contains(&Name::CONTACT));

    let event = harness.expect_call(CallState::Answered).await;
    assert!(event.session.unwrap().start_time.is_some());
    assert_eq!(harness.media.remote_descriptions.load(Ordering::SeqCst), 1);

    server.send(incoming_in_dialog("ACK", 10, &local_tag));
    server.send(incoming_in_dialog("BYE", 11, &local_tag));

    let ok = server.recv_response().await;
    assert_eq!(ok.code(), StatusCode::OK);
    assert_eq!(ok.cseq().unwrap().method, Method::BYE);

    let event = harness.expect_call(CallState::Ended).await;
    let ended = event.session.unwrap();
    assert_eq!(ended.end_reason, Some(EndReason::RemoteHangup));
    assert!(ended.end_time.is_some());

    harness.expect_call(CallState::Idle).await;
    assert_eq!(harness.media.released(), 1);
    assert!(server.is_idle(), "remote hangup needs no BYE");
}

#[tokio::test]
async fn incoming_call_declined() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    let local_tag = incoming_ringing(&mut harness, &mut server, SDP).await;

    harness.client.hangup().await.unwrap();

    let decline = server.recv_response().await;
    assert_eq!(decline.code(), StatusCode::DECLINE);
    assert_eq!(to_tag(&decline), local_tag);

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(event.session.unwrap().end_reason, Some(EndReason::Declined));
    harness.expect_call(CallState::Idle).await;
    assert_eq!(harness.media.released(), 1);
}

#[tokio::test]
async fn hangup_while_answering() {
    let (mut harness, mut server) = Harness::registered(Acquire::Hang).await;

    let local_tag = incoming_ringing(&mut harness, &mut server, SDP).await;

    harness.client.answer().await.unwrap();
    harness.client.hangup().await.unwrap();

    let decline = server.recv_response().await;
    assert_eq!(decline.code(), StatusCode::DECLINE);
    assert_eq!(to_tag(&decline), local_tag);

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(event.session.unwrap().end_reason, Some(EndReason::Declined));
    harness.expect_call(CallState::Idle).await;

    assert_eq!(harness.media.released(), 1);
    assert!(server.is_idle(), "no answer may be sent");
    assert!(harness.no_events());
}

#[tokio::test]
async fn incoming_call_canceled() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    incoming_ringing(&mut harness, &mut server, SDP).await;

    server.send(
        "CANCEL sip:alice@example.org SIP/2.0\r\n\
        Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bKinvite1\r\n\
        Max-Forwards: 69\r\n\
        From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
        To: <sip:alice@example.org>\r\n\
        Call-ID: incoming-1\r\n\
        CSeq: 10 CANCEL\r\n\
        Content-Length: 0\r\n\
        \r\n",
    );

    let ok = server.recv_response().await;
    assert_eq!(ok.code(), StatusCode::OK);
    assert_eq!(ok.cseq().unwrap().method, Method::CANCEL);

    let terminated = server.recv_response().await;
    assert_eq!(terminated.code(), StatusCode::REQUEST_TERMINATED);
    assert_eq!(terminated.cseq().unwrap().method, Method::INVITE);

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(event.session.unwrap().end_reason, Some(EndReason::Canceled));
    harness.expect_call(CallState::Idle).await;

    assert!(matches!(
        harness.client.answer().await,
        Err(Error::NoActiveSession)
    ));
}

#[tokio::test]
async fn incoming_call_without_offer() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    let local_tag = incoming_ringing(&mut harness, &mut server, "").await;

    harness.client.answer().await.unwrap();

    let ok = server.recv_response().await;
    assert_eq!(ok.code(), StatusCode::OK);
    assert!(ok.body.contains("opus"), "200 OK must carry the offer");
    harness.expect_call(CallState::Answered).await;

    server.send(format!(
        "ACK sip:alice@example.org SIP/2.0\r\n\
        Via: SIP/2.0/WSS proxy.example.org;branch=z9hG4bKack1\r\n\
        Max-Forwards: 69\r\n\
        From: \"Bob\" <sip:bob@example.org>;tag=bobtag\r\n\
        To: <sip:alice@example.org>;tag={local_tag}\r\n\
        Call-ID: incoming-1\r\n\
        CSeq: 10 ACK\r\n\
        Content-Type: application/sdp\r\n\
        Content-Length: {}\r\n\
        \r\n\
        {SDP}",
        SDP.len()
    ));

    // answered in order, so the ACK has been handled once this arrives
    server.send(incoming_in_dialog("OPTIONS", 11, &local_tag));
    assert_eq!(server.recv_response().await.code(), StatusCode::OK);

    assert_eq!(harness.media.remote_descriptions.load(Ordering::SeqCst), 1);
    assert!(harness.no_events());
}

#[tokio::test]
async fn incoming_answer_without_media() {
    let (mut harness, mut server) = Harness::registered(Acquire::Deny).await;

    incoming_ringing(&mut harness, &mut server, SDP).await;

    harness.client.answer().await.unwrap();

    let error = server.recv_response().await;
    assert_eq!(error.code(), StatusCode::SERVER_INTERNAL_ERROR);

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::MediaAccess)
    );
    harness.expect_call(CallState::Idle).await;
    assert_eq!(harness.media.released(), 1);
}

#[tokio::test]
async fn incoming_rejections() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;

    server.send(incoming_invite("v=0\r\ngarbage\r\n"));
    assert_eq!(
        server.recv_response().await.code(),
        StatusCode::NOT_ACCEPTABLE_HERE
    );

    server.send(incoming_in_dialog("BYE", 11, "unknown"));
    assert_eq!(
        server.recv_response().await.code(),
        StatusCode::CALL_OR_TRANSACTION_DOES_NOT_EXIST
    );

    server.send(incoming_in_dialog("INFO", 11, "unknown"));
    let not_allowed = server.recv_response().await;
    assert_eq!(not_allowed.code(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(not_allowed.headers.contains(&Name::ALLOW));

    // busy with an outgoing call
    harness.client.call("carol").await.unwrap();
    harness.expect_call(CallState::Calling).await;
    server.recv_request().await;

    server.send(incoming_invite(SDP));
    assert_eq!(server.recv_response().await.code(), StatusCode::BUSY_HERE);

    assert!(harness.no_events());
}

#[tokio::test]
async fn incoming_while_unregistered() {
    let mut harness = Harness::new(Acquire::Grant);

    harness.client.connect(config()).await.unwrap();
    let mut server = harness.servers.recv().await.unwrap();
    let register = server.recv_request().await;
    assert_eq!(register.line.method, Method::REGISTER);

    server.send(incoming_invite(SDP));
    assert_eq!(
        server.recv_response().await.code(),
        StatusCode::TEMPORARILY_UNAVAILABLE
    );

    harness.expect_status(ConnectionStatus::Connecting).await;
    harness.expect_status(ConnectionStatus::Connected).await;
    assert!(harness.no_events());
}

#[tokio::test]
async fn disconnect_ends_call() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;
    outgoing_answered(&mut harness, &mut server).await;

    harness.client.disconnect().await.unwrap();

    assert_eq!(server.recv_request().await.line.method, Method::BYE);
    assert_eq!(server.recv_request().await.line.method, Method::REGISTER);

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::Disconnected)
    );
    harness.expect_call(CallState::Idle).await;
    harness.expect_status(ConnectionStatus::Disconnected).await;

    assert_eq!(harness.media.released(), 1);
}

#[tokio::test]
async fn reconnect_ends_call() {
    let (mut harness, mut old) = Harness::registered(Acquire::Grant).await;
    outgoing_answered(&mut harness, &mut old).await;

    harness.client.connect(config()).await.unwrap();

    assert_eq!(old.recv_request().await.line.method, Method::BYE);

    let unregister = old.recv_request().await;
    assert_eq!(unregister.line.method, Method::REGISTER);
    let expires: Expires = unregister.headers.get_named().unwrap();
    assert_eq!(expires.0, 0);

    let event = harness.expect_call(CallState::Ended).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::Disconnected)
    );
    harness.expect_call(CallState::Idle).await;
    harness.expect_status(ConnectionStatus::Disconnected).await;
    harness.expect_status(ConnectionStatus::Connecting).await;
    harness.expect_status(ConnectionStatus::Connected).await;

    assert_eq!(harness.media.released(), 1);

    let mut server = harness.servers.recv().await.unwrap();
    assert_eq!(server.recv_request().await.line.method, Method::REGISTER);
}

#[tokio::test]
async fn transport_loss_fails_call() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;
    outgoing_answered(&mut harness, &mut server).await;

    server.close();

    let event = harness.expect_call(CallState::Failed).await;
    assert_eq!(
        event.session.unwrap().end_reason,
        Some(EndReason::TransportLost)
    );
    harness.expect_call(CallState::Idle).await;
    harness.expect_status(ConnectionStatus::Error).await;

    assert_eq!(harness.media.released(), 1);
}

#[tokio::test]
async fn retransmitted_ok_is_acknowledged() {
    let (mut harness, mut server) = Harness::registered(Acquire::Grant).await;
    let invite = outgoing_answered(&mut harness, &mut server).await;

    server.send(response_to(&invite, 200, CONTACT, SDP));

    let ack = server.recv_request().await;
    assert_eq!(ack.line.method, Method::ACK);
    assert_eq!(cseq(&ack).cseq, cseq(&invite).cseq);
    assert!(harness.no_events());
}
