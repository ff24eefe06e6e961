use webphone::{IceServer, MediaBackend, MediaError, MediaFactory, SdpType, SessionDescription};

const SDP: &str = "v=0\r\n\
    o=- 1 0 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    t=0 0\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 0\r\n\
    c=IN IP4 0.0.0.0\r\n\
    a=rtpmap:0 PCMU/8000\r\n";

/// Negotiates a fixed PCMU session and never sends or plays any audio
pub struct Silent {
    muted: bool,
}

impl MediaBackend for Silent {
    async fn acquire_local_media(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError> {
        Ok(SessionDescription::parse(SDP)?)
    }

    async fn create_answer(&mut self) -> Result<SessionDescription, MediaError> {
        Ok(SessionDescription::parse(SDP)?)
    }

    async fn apply_remote_description(
        &mut self,
        kind: SdpType,
        sdp: SessionDescription,
    ) -> Result<(), MediaError> {
        println!("remote {kind:?}:\n{sdp}");
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn release(&mut self) {}
}

pub struct SilentFactory;

impl MediaFactory for SilentFactory {
    type Backend = Silent;

    fn create(&self, _: &[IceServer]) -> Silent {
        Silent { muted: false }
    }
}
