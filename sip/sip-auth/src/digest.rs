use crate::{ClientAuthenticator, RequestParts, ResponseParts};
use bytesstr::BytesStr;
use sha2::Digest;
use sip_types::header::HeaderError;
use sip_types::header::typed::{
    Algorithm, AuthChallenge, DigestChallenge, DigestResponse, QopOption, QopResponse,
};
use sip_types::{Headers, Name};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("failed to authenticate realms: {0:?}")]
    FailedToAuthenticate(Vec<BytesStr>),
    #[error("encountered unsupported algorithm {0}")]
    UnsupportedAlgorithm(BytesStr),
    #[error("missing credentials for realm {0}")]
    MissingCredentials(BytesStr),
    #[error("unsupported qop")]
    UnsupportedQop,
    #[error("rejection did not contain a digest challenge")]
    NoChallenge,
    #[error(transparent)]
    Header(HeaderError),
}

/// Credentials mapped to their realm
///
/// The default credentials answer challenges of realms without an explicit entry.
#[derive(Default, Clone)]
pub struct DigestCredentials {
    default: Option<DigestUser>,
    map: HashMap<String, DigestUser>,
}

impl DigestCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials answering every realm
    pub fn with_default(credentials: DigestUser) -> Self {
        Self {
            default: Some(credentials),
            map: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, credentials: DigestUser) {
        self.default = Some(credentials)
    }

    pub fn add_for_realm<R>(&mut self, realm: R, credentials: DigestUser)
    where
        R: Into<String>,
    {
        self.map.insert(realm.into(), credentials);
    }

    pub fn get_for_realm(&self, realm: &str) -> Option<&DigestUser> {
        self.map.get(realm).or(self.default.as_ref())
    }
}

#[derive(Clone)]
pub struct DigestUser {
    user: String,
    password: Vec<u8>,
}

impl DigestUser {
    pub fn new<U, P>(user: U, password: P) -> Self
    where
        U: Into<String>,
        P: Into<Vec<u8>>,
    {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Solves Digest challenges of 401 / 407 responses and authorizes subsequent requests
///
/// Answered challenges are cached per realm and reused on later requests
/// with an incremented nonce count.
pub struct DigestAuthenticator {
    pub credentials: DigestCredentials,
    responses: Vec<ResponseEntry>,
    cnonce: fn() -> String,

    /// Respond with qop `auth` when a challenge does not contain a qop field (RFC8760 Section 2.6). Is false by default
    pub enforce_qop: bool,
    /// Reject challenges with MD5 algorithm. Is false by default
    pub reject_md5: bool,
}

/// A cached authorization for a single realm
struct ResponseEntry {
    header: DigestResponse,
    is_proxy: bool,

    /// Number of requests the response has been sent in
    use_count: u32,

    /// Hashes needed to recalculate the response for qop, `None` without qop
    qop: Option<QopEntry>,
}

struct QopEntry {
    ha1: String,
    ha2: String,
    hash: HashFn,
}

type HashFn = fn(&[u8]) -> String;

impl ClientAuthenticator for DigestAuthenticator {
    type Error = DigestError;

    fn authorize_request(&mut self, request_headers: &mut Headers) {
        for entry in &mut self.responses {
            if entry.use_count > 0 {
                // a reused qop response needs its nonce-count incremented and hash recalculated
                if let (Some(qop_response), Some(qop_entry)) =
                    (&mut entry.header.qop_response, &entry.qop)
                {
                    qop_response.nc += 1;

                    entry.header.response = (qop_entry.hash)(
                        format!(
                            "{}:{}:{:08x}:{}:{}:{}",
                            qop_entry.ha1,
                            entry.header.nonce,
                            qop_response.nc,
                            qop_response.cnonce,
                            qop_response.qop,
                            qop_entry.ha2
                        )
                        .as_bytes(),
                    )
                    .into();
                }
            }

            entry.use_count += 1;

            let name = if entry.is_proxy {
                Name::PROXY_AUTHORIZATION
            } else {
                Name::AUTHORIZATION
            };

            request_headers.insert_type(name, &entry.header);
        }
    }

    fn handle_rejection(
        &mut self,
        rejected_request: RequestParts<'_>,
        reject_response: ResponseParts<'_>,
    ) -> Result<(), DigestError> {
        let mut challenges = read_challenges(false, reject_response.headers)?;
        challenges.extend(read_challenges(true, reject_response.headers)?);

        if challenges.is_empty() {
            return Err(DigestError::NoChallenge);
        }

        let mut failed_realms = vec![];
        let mut answered_realms: Vec<BytesStr> = vec![];

        // each realm is only answered once per request, using the first supported challenge (RFC8760 Section 2.4)
        for (is_proxy, challenge) in challenges {
            if answered_realms.contains(&challenge.realm) {
                continue;
            }

            let realm = challenge.realm.clone();

            match self.handle_challenge(rejected_request, challenge) {
                Ok((header, qop)) => {
                    failed_realms.retain(|failed| *failed != realm);
                    self.responses.retain(|entry| entry.header.realm != realm);
                    self.responses.push(ResponseEntry {
                        header,
                        is_proxy,
                        use_count: 0,
                        qop,
                    });
                    answered_realms.push(realm);
                }
                Err(e) => {
                    log::warn!("failed to handle challenge for realm {realm}, {e}");

                    if !failed_realms.contains(&realm) {
                        failed_realms.push(realm);
                    }
                }
            }
        }

        if !failed_realms.is_empty() {
            return Err(DigestError::FailedToAuthenticate(failed_realms));
        }

        Ok(())
    }
}

fn read_challenges(
    is_proxy: bool,
    headers: &Headers,
) -> Result<Vec<(bool, DigestChallenge)>, DigestError> {
    let name = if is_proxy {
        Name::PROXY_AUTHENTICATE
    } else {
        Name::WWW_AUTHENTICATE
    };

    let challenges = headers
        .get_all::<AuthChallenge>(name)
        .map_err(DigestError::Header)?;

    Ok(challenges
        .into_iter()
        .filter_map(|challenge| match challenge {
            AuthChallenge::Digest(digest) => Some((is_proxy, digest)),
            AuthChallenge::Other { scheme, .. } => {
                log::debug!("ignoring {scheme} challenge");
                None
            }
        })
        .collect())
}

impl DigestAuthenticator {
    pub fn new(credentials: DigestCredentials) -> Self {
        Self {
            credentials,
            responses: vec![],
            cnonce: random_cnonce,
            enforce_qop: false,
            reject_md5: false,
        }
    }

    /// Forget all cached responses, e.g. after the credentials changed
    pub fn reset(&mut self) {
        self.responses.clear();
    }

    fn handle_challenge(
        &mut self,
        request_parts: RequestParts<'_>,
        challenge: DigestChallenge,
    ) -> Result<(DigestResponse, Option<QopEntry>), DigestError> {
        // A challenge repeating the nonce that was already answered means the credentials were rejected.
        // A new nonce is answered even without stale=true, some servers rotate nonces that way.
        let already_answered = self.responses.iter().any(|entry| {
            entry.header.realm == challenge.realm && entry.header.nonce == challenge.nonce
        });

        if already_answered {
            return Err(DigestError::FailedToAuthenticate(vec![challenge.realm]));
        }

        let (hash, is_session): (HashFn, bool) = match &challenge.algorithm {
            Algorithm::MD5 | Algorithm::MD5Sess if self.reject_md5 => {
                return Err(DigestError::UnsupportedAlgorithm(BytesStr::from_static(
                    "MD5",
                )));
            }
            Algorithm::MD5 => (hash_md5, false),
            Algorithm::MD5Sess => (hash_md5, true),
            Algorithm::SHA256 => (hash_sha256, false),
            Algorithm::SHA256Sess => (hash_sha256, true),
            Algorithm::SHA512256 => (hash_sha512_trunc256, false),
            Algorithm::SHA512256Sess => (hash_sha512_trunc256, true),
            Algorithm::Other(other) => {
                return Err(DigestError::UnsupportedAlgorithm(other.clone()));
            }
        };

        self.digest_respond(challenge, request_parts, is_session, hash)
    }

    fn digest_respond(
        &mut self,
        mut challenge: DigestChallenge,
        request_parts: RequestParts<'_>,
        is_session: bool,
        hash: HashFn,
    ) -> Result<(DigestResponse, Option<QopEntry>), DigestError> {
        let digest_user = self
            .credentials
            .get_for_realm(&challenge.realm)
            .ok_or_else(|| DigestError::MissingCredentials(challenge.realm.clone()))?
            .clone();

        let cnonce = BytesStr::from((self.cnonce)());

        let mut ha1 = hash(
            [
                format!("{}:{}:", digest_user.user, challenge.realm).as_bytes(),
                &digest_user.password,
            ]
            .concat()
            .as_slice(),
        );

        if is_session {
            ha1 = hash(format!("{}:{}:{}", ha1, challenge.nonce, cnonce).as_bytes());
        }

        let method = &request_parts.line.method;
        let uri = request_parts.line.uri.to_string();

        if challenge.qop.is_empty() && self.enforce_qop {
            challenge.qop.push(QopOption::Auth)
        }

        let (response, qop_response, qop_entry) = if challenge.qop.is_empty() {
            let ha2 = hash(format!("{method}:{uri}").as_bytes());

            (
                hash(format!("{}:{}:{}", ha1, challenge.nonce, ha2).as_bytes()),
                None,
                None,
            )
        } else {
            // prefer auth-int, it also protects the body
            let (qop, ha2) = if challenge.qop.contains(&QopOption::AuthInt) {
                let body_hash = hash(request_parts.body);
                (
                    QopOption::AuthInt,
                    hash(format!("{method}:{uri}:{body_hash}").as_bytes()),
                )
            } else if challenge.qop.contains(&QopOption::Auth) {
                (QopOption::Auth, hash(format!("{method}:{uri}").as_bytes()))
            } else {
                return Err(DigestError::UnsupportedQop);
            };

            let nc = 1;

            let response = hash(
                format!(
                    "{}:{}:{:08x}:{}:{}:{}",
                    ha1, challenge.nonce, nc, cnonce, qop, ha2
                )
                .as_bytes(),
            );

            (
                response,
                Some(QopResponse { qop, cnonce, nc }),
                Some(QopEntry { ha1, ha2, hash }),
            )
        };

        let username = if challenge.userhash {
            // RFC7616 Section 3.4.4
            hash(format!("{}:{}", digest_user.user, challenge.realm).as_bytes()).into()
        } else {
            digest_user.user.into()
        };

        let header = DigestResponse {
            username,
            realm: challenge.realm,
            nonce: challenge.nonce,
            uri: uri.into(),
            response: response.into(),
            algorithm: challenge.algorithm,
            opaque: challenge.opaque,
            qop_response,
            userhash: challenge.userhash,
            other: vec![],
        };

        Ok((header, qop_entry))
    }
}

fn random_cnonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn hash_md5(i: &[u8]) -> String {
    format!("{:x}", md5::compute(i))
}

fn hash_sha256(i: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(i);
    format!("{:x}", hasher.finalize())
}

fn hash_sha512_trunc256(i: &[u8]) -> String {
    let mut hasher = sha2::Sha512_256::new();
    hasher.update(i);
    format!("{:x}", hasher.finalize())
}
