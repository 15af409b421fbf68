//! The owner-held-key PSI pipeline, end to end, over a thousand-token
//! pool.

#[cfg(test)]
mod tests {
    use crate::support::Harness;
    use rdv_crypto::{open, sign_request, AgreementKeyPair, SigningKeyPair};
    use rdv_psi::{
        client_intersect, client_request, process_request, ClientRequest, PsiService, ServerKey,
        ServerResponse, SetupMessage,
    };
    use rdv_submission::SubmitRequest;
    use rdv_types::{MatchToken, Nullifier, PsiParams, TimeSource};
    use std::sync::Arc;

    const HOUR_MS: u64 = 60 * 60 * 1_000;

    #[tokio::test]
    async fn test_scenario_owner_held_psi_over_thousand_tokens() {
        let harness = Harness::new();
        let owner_agreement = AgreementKeyPair::generate();
        let owner_signing = SigningKeyPair::generate();

        let pool = harness
            .pools
            .create(harness.pool_request(
                owner_agreement.public_key(),
                owner_signing.public_key(),
                None,
                HOUR_MS,
            ))
            .unwrap();

        // A thousand tokens across many nullifiers.
        for chunk in 0..100u32 {
            let mut nullifier_bytes = [0u8; 32];
            nullifier_bytes[..4].copy_from_slice(&chunk.to_be_bytes());
            let tokens: Vec<MatchToken> = (0..10u32)
                .map(|i| {
                    let mut bytes = [0u8; 32];
                    bytes[..4].copy_from_slice(&chunk.to_be_bytes());
                    bytes[4..8].copy_from_slice(&i.to_be_bytes());
                    MatchToken::from_bytes(bytes)
                })
                .collect();
            harness
                .submissions
                .submit(SubmitRequest {
                    pool_id: pool.id,
                    tokens,
                    commits: None,
                    nullifier: Nullifier::from_bytes(nullifier_bytes),
                    reveal_data: vec![],
                    issuance_proof: None,
                })
                .unwrap();
        }

        harness.time.advance(HOUR_MS);
        let service = PsiService::new(harness.store.clone(), harness.time.clone());

        // 1. Owner creates the setup; server key sealed to the owner.
        let setup = service
            .create_setup(&pool.id, &owner_agreement.public_key(), PsiParams::default())
            .unwrap();

        // 2. A client queues a blinded request. One element is a token
        //    known to be in the pool, one is not.
        let mut present = [0u8; 32];
        present[..4].copy_from_slice(&7u32.to_be_bytes());
        present[4..8].copy_from_slice(&3u32.to_be_bytes());
        let absent = [0xEE; 32];
        let client_set: Vec<Vec<u8>> = vec![present.to_vec(), absent.to_vec()];
        let (session, request) = client_request(&client_set);
        let request_id = service
            .submit_request(&pool.id, request.to_bytes().unwrap(), Some(b"auth-token"))
            .unwrap();

        // The queued request stores only blinded group elements, never
        // the client's plaintext inputs.
        let stored = harness.store.psi_request(&request_id).unwrap().unwrap();
        let stored_request = ClientRequest::from_bytes(&stored.request).unwrap();
        for blinded in &stored_request.blinded {
            assert_ne!(blinded.as_slice(), present.as_slice());
            assert_ne!(blinded.as_slice(), absent.as_slice());
        }

        // 3. Owner polls under a signed envelope and processes locally.
        let poll = sign_request(&owner_signing, "psi_poll", pool.id, harness.time.now());
        let pending = service.pending_requests(&poll).unwrap();
        assert_eq!(pending.len(), 1);

        let key_bytes: [u8; 32] = open(&owner_agreement, &setup.sealed_server_key)
            .unwrap()
            .try_into()
            .unwrap();
        let server_key = ServerKey::from_bytes(key_bytes).unwrap();
        let parsed = ClientRequest::from_bytes(&pending[0].request).unwrap();
        let response = process_request(&server_key, &parsed, 1_024).unwrap();

        // 4. Owner posts the response batch.
        let respond = sign_request(&owner_signing, "psi_respond", pool.id, harness.time.now());
        let outcomes = service
            .submit_responses(&respond, vec![(request_id, response.to_bytes().unwrap())])
            .unwrap();
        assert!(outcomes[0].error.is_none());

        // 5. Client polls and computes the intersection locally.
        let record = service.poll_response(&request_id).unwrap().unwrap();
        let setup_message = SetupMessage::from_bytes(&record.setup_message).unwrap();
        let posted = ServerResponse::from_bytes(&record.response).unwrap();
        let matched = client_intersect(&session, &posted, &setup_message).unwrap();
        assert_eq!(matched, vec![0]); // only the present token

        // Expired responses are gone.
        harness.time.advance(2 * HOUR_MS);
        assert!(matches!(
            service.poll_response(&request_id),
            Err(rdv_types::RendezvousError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn test_psi_requires_closed_pool_and_setup() {
        let harness = Harness::new();
        let owner = AgreementKeyPair::generate();
        let pool = harness
            .pools
            .create(harness.pool_request(
                owner.public_key(),
                SigningKeyPair::generate().public_key(),
                None,
                HOUR_MS,
            ))
            .unwrap();
        let service = PsiService::new(Arc::clone(&harness.store), harness.time.clone());

        // Open pool: setup refused.
        assert!(service
            .create_setup(&pool.id, &owner.public_key(), PsiParams::default())
            .is_err());

        // Closed pool but no setup: requests refused.
        harness.time.advance(HOUR_MS);
        let (_, request) = client_request(&[vec![1u8; 32]]);
        assert!(service
            .submit_request(&pool.id, request.to_bytes().unwrap(), None)
            .is_err());
    }
}
