use bytesstr::BytesStr;
use sdp_types::{MediaType, ParseSessionDescriptionError};
use std::fmt;
use std::str::FromStr;

/// Which side of the offer/answer exchange a description belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description, parsed once to validate it and then kept as text
///
/// The media backend owns the actual negotiation, this type only ensures that
/// whatever crosses the signaling boundary is an SDP carrying audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SdpError {
    #[error("session description is empty")]
    Empty,
    #[error(transparent)]
    Parse(#[from] ParseSessionDescriptionError),
    #[error("no audio media section")]
    NoAudio,
}

impl SessionDescription {
    pub fn parse(text: &str) -> Result<Self, SdpError> {
        if text.trim().is_empty() {
            return Err(SdpError::Empty);
        }

        let parsed = sdp_types::SessionDescription::parse(&BytesStr::from(text))?;

        let audio = parsed
            .media_descriptions
            .iter()
            .any(|desc| desc.media.media_type == MediaType::Audio);

        if !audio {
            return Err(SdpError::NoAudio);
        }

        Ok(Self {
            text: text.to_owned(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for SessionDescription {
    type Err = SdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
