//! SIP requests and responses, as carried in WebSocket text frames

use crate::code::StatusCode;
use crate::header::name::Name;
use crate::header::typed::{CSeq, CallID, ContentLength};
use crate::header::{HeaderError, Headers};
use crate::method::Method;
use crate::parse::{token, whitespace};
use crate::uri::SipUri;
use bytesstr::BytesStr;
use nom::bytes::complete::{tag, take_while1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{map_res, rest};
use nom::sequence::{preceded, separated_pair, tuple};
use nom::IResult;
use std::fmt;

const VERSION: &str = "SIP/2.0";

#[derive(Debug, thiserror::Error)]
pub enum MessageParseError {
    #[error("message is empty")]
    Empty,
    #[error("invalid start line {0:?}")]
    StartLine(String),
    #[error("invalid request uri: {0}")]
    RequestUri(anyhow::Error),
    #[error("malformed header line {0:?}")]
    HeaderLine(String),
    #[error("missing empty line between headers and body")]
    Truncated,
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("content-length {expected} does not match body length {actual}")]
    ContentLength { expected: u32, actual: usize },
}

/// `<method> <uri> SIP/2.0`
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub uri: SipUri,
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {VERSION}", self.method, self.uri)
    }
}

/// `SIP/2.0 <code> <reason>`
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub code: StatusCode,
    pub reason: Option<BytesStr>,
}

impl StatusLine {
    /// Reason phrase sent by the peer, or the default text of the code
    pub fn reason_phrase(&self) -> &str {
        match &self.reason {
            Some(reason) => reason.as_str(),
            None => self.code.text().unwrap_or_default(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{VERSION} {} {}",
            self.code.into_u16(),
            self.reason_phrase()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub line: RequestLine,
    pub headers: Headers,
    pub body: BytesStr,
}

impl Request {
    pub fn new(method: Method, uri: SipUri) -> Self {
        Self {
            line: RequestLine { method, uri },
            headers: Headers::new(),
            body: BytesStr::from_static(""),
        }
    }

    pub fn method(&self) -> &Method {
        &self.line.method
    }

    pub fn call_id(&self) -> Result<CallID, HeaderError> {
        self.headers.get_named()
    }

    pub fn cseq(&self) -> Result<CSeq, HeaderError> {
        self.headers.get_named()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.line)?;
        print_tail(f, &self.headers, &self.body)
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub line: StatusLine,
    pub headers: Headers,
    pub body: BytesStr,
}

impl Response {
    pub fn new(code: StatusCode) -> Self {
        Self {
            line: StatusLine { code, reason: None },
            headers: Headers::new(),
            body: BytesStr::from_static(""),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.line.code
    }

    pub fn call_id(&self) -> Result<CallID, HeaderError> {
        self.headers.get_named()
    }

    pub fn cseq(&self) -> Result<CSeq, HeaderError> {
        self.headers.get_named()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.line)?;
        print_tail(f, &self.headers, &self.body)
    }
}

/// Prints headers and body, `Content-Length` is always derived from the body
fn print_tail(f: &mut fmt::Formatter<'_>, headers: &Headers, body: &str) -> fmt::Result {
    for (name, value) in headers.iter() {
        if *name != Name::CONTENT_LENGTH {
            write!(f, "{name}: {value}\r\n")?;
        }
    }

    write!(f, "Content-Length: {}\r\n\r\n{body}", body.len())
}

/// A parsed SIP message
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

enum StartLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl Message {
    pub fn parse(text: &str) -> Result<Self, MessageParseError> {
        // Tolerate keep-alive CRLFs in front of the message
        let text = text.trim_start_matches(['\r', '\n']);

        if text.is_empty() {
            return Err(MessageParseError::Empty);
        }

        let (head, body) = match text.split_once("\r\n\r\n") {
            Some(split) => split,
            None => text.split_once("\n\n").ok_or(MessageParseError::Truncated)?,
        };

        let mut lines = head.lines();
        let start = lines.next().ok_or(MessageParseError::Empty)?;
        let start = parse_start_line(start)?;

        let mut headers = Headers::new();
        let mut current: Option<(Name, String)> = None;

        for line in lines {
            if line.starts_with(whitespace) {
                // folded continuation of the previous header
                let Some((_, value)) = &mut current else {
                    return Err(MessageParseError::HeaderLine(line.to_owned()));
                };

                value.push(' ');
                value.push_str(line.trim());
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.insert(name, value);
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(MessageParseError::HeaderLine(line.to_owned()));
            };

            let name = name.trim_end_matches(whitespace);

            if name.is_empty() || !name.chars().all(token) {
                return Err(MessageParseError::HeaderLine(line.to_owned()));
            }

            current = Some((Name::from(name), value.trim().to_owned()));
        }

        if let Some((name, value)) = current {
            headers.insert(name, value);
        }

        let body = match headers.get_named::<ContentLength>() {
            Ok(ContentLength(len)) => {
                let len_usize = len as usize;

                match body.get(..len_usize) {
                    Some(body) => body,
                    None => {
                        return Err(MessageParseError::ContentLength {
                            expected: len,
                            actual: body.len(),
                        });
                    }
                }
            }
            Err(e) if e.is_missing() => body,
            Err(e) => return Err(e.into()),
        };

        let body = BytesStr::from(body.to_owned());

        Ok(match start {
            StartLine::Request(line) => Message::Request(Request {
                line,
                headers,
                body,
            }),
            StartLine::Response(line) => Message::Response(Response {
                line,
                headers,
                body,
            }),
        })
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(request) => &request.headers,
            Message::Response(response) => &response.headers,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Request(request) => request.fmt(f),
            Message::Response(response) => response.fmt(f),
        }
    }
}

fn parse_start_line(line: &str) -> Result<StartLine, MessageParseError> {
    let line = line.trim_end();

    if let Ok((_, (code, reason))) = status_line(line) {
        let reason = reason.trim();

        return Ok(StartLine::Response(StatusLine {
            code,
            reason: (!reason.is_empty()).then(|| BytesStr::from(reason.to_owned())),
        }));
    }

    match request_line(line) {
        Ok((_, (method, (uri, _)))) => Ok(StartLine::Request(RequestLine {
            method: Method::from(method),
            uri: uri.parse().map_err(MessageParseError::RequestUri)?,
        })),
        Err(_) => Err(MessageParseError::StartLine(line.to_owned())),
    }
}

fn status_line(i: &str) -> IResult<&str, (StatusCode, &str)> {
    preceded(
        tuple((tag(VERSION), char(' '))),
        separated_pair(
            map_res(take_while_m_n(3, 3, |c: char| c.is_ascii_digit()), str::parse::<StatusCode>),
            take_while_m_n(0, 1, |c: char| c == ' '),
            rest,
        ),
    )(i)
}

fn request_line(i: &str) -> IResult<&str, (&str, (&str, &str))> {
    separated_pair(
        take_while1(token),
        char(' '),
        separated_pair(take_while1(|c: char| c != ' '), char(' '), tag(VERSION)),
    )(i)
}
