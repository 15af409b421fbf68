//! Attestation adapter.
//!
//! The external timestamp-attestation gateway is out of scope; this
//! in-process stand-in signs (hash, timestamp, sequence) with a local
//! Ed25519 witness key, satisfying the attest/verify contract for
//! single-instance deployments and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rdv_crypto::{verify_signature, SigningKeyPair};
use rdv_types::{
    AdapterError, AttestationProvider, AttestationSignatures, TimeSource, TimestampAttestation,
    TokenProof, WitnessSignature,
};
use std::sync::Arc;

/// In-process attestation provider with a single local witness.
pub struct LocalAttestor {
    witness_id: String,
    keypair: SigningKeyPair,
    time: Arc<dyn TimeSource>,
    sequence: Mutex<u64>,
}

impl LocalAttestor {
    /// Create an attestor with a fresh witness key.
    pub fn new(witness_id: impl Into<String>, time: Arc<dyn TimeSource>) -> Self {
        Self {
            witness_id: witness_id.into(),
            keypair: SigningKeyPair::generate(),
            time,
            sequence: Mutex::new(0),
        }
    }

    fn signed_payload(attestation_hash: &[u8; 32], timestamp_secs: u64, sequence: u64) -> Vec<u8> {
        let mut payload = Vec::with_capacity(32 + 8 + 8);
        payload.extend_from_slice(attestation_hash);
        payload.extend_from_slice(&timestamp_secs.to_be_bytes());
        payload.extend_from_slice(&sequence.to_be_bytes());
        payload
    }
}

#[async_trait]
impl AttestationProvider for LocalAttestor {
    async fn attest(
        &self,
        hash: &[u8; 32],
        _proof: Option<&TokenProof>,
    ) -> Result<TimestampAttestation, AdapterError> {
        let timestamp_secs = self.time.now().as_secs();
        let sequence = {
            let mut seq = self.sequence.lock();
            *seq += 1;
            *seq
        };
        let signature = self
            .keypair
            .sign(&Self::signed_payload(hash, timestamp_secs, sequence));
        Ok(TimestampAttestation {
            hashed: *hash,
            timestamp_secs,
            network: "local".to_string(),
            sequence,
            signatures: AttestationSignatures::Witnesses(vec![WitnessSignature {
                witness_id: self.witness_id.clone(),
                signature: signature.to_vec(),
            }]),
        })
    }

    async fn verify(
        &self,
        attestation: &TimestampAttestation,
        hash: &[u8; 32],
    ) -> Result<bool, AdapterError> {
        if &attestation.hashed != hash {
            return Ok(false);
        }
        let AttestationSignatures::Witnesses(witnesses) = &attestation.signatures else {
            return Ok(false);
        };
        let payload =
            Self::signed_payload(hash, attestation.timestamp_secs, attestation.sequence);
        Ok(witnesses.iter().any(|w| {
            w.witness_id == self.witness_id
                && verify_signature(&self.keypair.public_key(), &payload, &w.signature).is_ok()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdv_types::SystemTimeSource;

    #[tokio::test]
    async fn test_attest_verify_roundtrip() {
        let attestor = LocalAttestor::new("witness-1", Arc::new(SystemTimeSource));
        let hash = [0x42; 32];

        let attestation = attestor.attest(&hash, None).await.unwrap();
        assert!(attestor.verify(&attestation, &hash).await.unwrap());
        // Wrong hash fails.
        assert!(!attestor.verify(&attestation, &[0x43; 32]).await.unwrap());
    }

    #[tokio::test]
    async fn test_sequence_increments() {
        let attestor = LocalAttestor::new("witness-1", Arc::new(SystemTimeSource));
        let first = attestor.attest(&[1; 32], None).await.unwrap();
        let second = attestor.attest(&[2; 32], None).await.unwrap();
        assert!(second.sequence > first.sequence);
    }
}
