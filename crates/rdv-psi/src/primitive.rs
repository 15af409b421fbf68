//! The DH-PSI primitive over ristretto255.
//!
//! Elements hash to the group with a domain-separated hash-to-point; the
//! server raises them to its secret scalar, the client blinds with its
//! own scalar and unblinds the response with the inverse. Setup elements
//! are stored sorted, which both hides insertion order and makes
//! membership checks a binary search.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rdv_types::{PsiParams, PsiStructure};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Domain separator for hashing elements to the group.
const HASH_DOMAIN: &[u8] = b"rendezvous-psi-v1";

/// Raw-list encodings keep the full 32-byte point.
const FULL_POINT_LEN: usize = 32;
/// Bucketed encodings never truncate below this.
const MIN_PREFIX_LEN: usize = 8;

/// PSI primitive errors.
#[derive(Debug, Error)]
pub enum PsiError {
    /// A serialized scalar was not canonical.
    #[error("invalid server key encoding")]
    InvalidKey,

    /// A serialized group element failed to decompress.
    #[error("invalid group element in message")]
    InvalidPoint,

    /// The client request exceeds the setup's element cap.
    #[error("too many client elements: {count} > {max}")]
    TooManyElements {
        /// Elements in the request.
        count: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A message failed to (de)serialize.
    #[error("codec error: {0}")]
    Codec(String),
}

/// The server's secret scalar.
pub struct ServerKey(Scalar);

impl ServerKey {
    /// Generate a random key.
    pub fn generate() -> Self {
        Self(Scalar::random(&mut rand::rngs::OsRng))
    }

    /// Canonical 32-byte encoding. This is what gets sealed to the owner.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Parse a canonical encoding.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, PsiError> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .map(Self)
            .ok_or(PsiError::InvalidKey)
    }
}

/// Public setup message: the server set raised to the server key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetupMessage {
    /// Parameters the setup was built with.
    pub params: PsiParams,
    /// Encoding length of each element (32 for raw, shorter for bucketed).
    pub prefix_len: u8,
    /// Sorted element encodings.
    pub elements: Vec<Vec<u8>>,
}

impl SetupMessage {
    /// Serialize for storage or the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PsiError> {
        bincode::serialize(self).map_err(|e| PsiError::Codec(e.to_string()))
    }

    /// Parse from storage or the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PsiError> {
        bincode::deserialize(bytes).map_err(|e| PsiError::Codec(e.to_string()))
    }

    fn contains(&self, encoded: &[u8; 32]) -> bool {
        let needle = &encoded[..self.prefix_len as usize];
        self.elements
            .binary_search_by(|e| e.as_slice().cmp(needle))
            .is_ok()
    }
}

/// A client's blinded request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Blinded elements, order significant.
    pub blinded: Vec<[u8; 32]>,
}

impl ClientRequest {
    /// Serialize for the queue.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PsiError> {
        bincode::serialize(self).map_err(|e| PsiError::Codec(e.to_string()))
    }

    /// Parse from the queue.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PsiError> {
        bincode::deserialize(bytes).map_err(|e| PsiError::Codec(e.to_string()))
    }
}

/// The owner's evaluation of a client request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerResponse {
    /// Blinded elements raised to the server key; order matches the
    /// request.
    pub evaluated: Vec<[u8; 32]>,
}

impl ServerResponse {
    /// Serialize for posting.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PsiError> {
        bincode::serialize(self).map_err(|e| PsiError::Codec(e.to_string()))
    }

    /// Parse a posted response.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PsiError> {
        bincode::deserialize(bytes).map_err(|e| PsiError::Codec(e.to_string()))
    }
}

/// Client-side state held between request and finish.
pub struct ClientSession {
    blind: Scalar,
    element_count: usize,
}

fn hash_to_group(element: &[u8]) -> RistrettoPoint {
    let mut hasher = Sha512::new();
    hasher.update(HASH_DOMAIN);
    hasher.update(element);
    RistrettoPoint::from_hash(hasher)
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, PsiError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(PsiError::InvalidPoint)
}

/// Encoding length for a bucketed setup: enough bits that the expected
/// number of spurious prefix collisions stays under the configured rate.
fn bucketed_prefix_len(server_elements: usize, params: &PsiParams) -> usize {
    let comparisons = (server_elements.max(1) as f64) * f64::from(params.max_client_elements.max(1));
    let bits = (comparisons / params.false_positive_rate.max(f64::MIN_POSITIVE)).log2().ceil();
    let bytes = ((bits / 8.0).ceil() as usize).max(MIN_PREFIX_LEN);
    bytes.min(FULL_POINT_LEN)
}

/// Server-side setup: encode every element under the server key.
pub fn server_setup(
    key: &ServerKey,
    elements: &[impl AsRef<[u8]>],
    params: PsiParams,
) -> SetupMessage {
    let prefix_len = match params.structure {
        PsiStructure::RawList => FULL_POINT_LEN,
        PsiStructure::Bucketed => bucketed_prefix_len(elements.len(), &params),
    };
    let mut encoded: Vec<Vec<u8>> = elements
        .iter()
        .map(|element| {
            let point = hash_to_group(element.as_ref()) * key.0;
            point.compress().to_bytes()[..prefix_len].to_vec()
        })
        .collect();
    // Sorted storage leaks nothing about insertion order.
    encoded.sort();
    encoded.dedup();
    SetupMessage {
        params,
        prefix_len: prefix_len as u8,
        elements: encoded,
    }
}

/// Client-side request: blind every element with a fresh scalar.
pub fn client_request(elements: &[impl AsRef<[u8]>]) -> (ClientSession, ClientRequest) {
    let blind = Scalar::random(&mut rand::rngs::OsRng);
    let blinded = elements
        .iter()
        .map(|element| (hash_to_group(element.as_ref()) * blind).compress().to_bytes())
        .collect();
    (
        ClientSession {
            blind,
            element_count: elements.len(),
        },
        ClientRequest { blinded },
    )
}

/// Owner-side processing: raise each blinded element to the server key.
pub fn process_request(
    key: &ServerKey,
    request: &ClientRequest,
    max_client_elements: u32,
) -> Result<ServerResponse, PsiError> {
    if request.blinded.len() > max_client_elements as usize {
        return Err(PsiError::TooManyElements {
            count: request.blinded.len(),
            max: max_client_elements as usize,
        });
    }
    let evaluated = request
        .blinded
        .iter()
        .map(|bytes| Ok((decompress(bytes)? * key.0).compress().to_bytes()))
        .collect::<Result<Vec<_>, PsiError>>()?;
    Ok(ServerResponse { evaluated })
}

/// Client-side finish: unblind the response and intersect against the
/// setup. Returns the indices of matched elements in the client's
/// original order.
pub fn client_intersect(
    session: &ClientSession,
    response: &ServerResponse,
    setup: &SetupMessage,
) -> Result<Vec<usize>, PsiError> {
    if response.evaluated.len() != session.element_count {
        return Err(PsiError::Codec(
            "response length does not match request".to_string(),
        ));
    }
    let unblind = session.blind.invert();
    let mut matched = Vec::new();
    for (i, bytes) in response.evaluated.iter().enumerate() {
        let unblinded = (decompress(bytes)? * unblind).compress().to_bytes();
        if setup.contains(&unblinded) {
            matched.push(i);
        }
    }
    Ok(matched)
}
