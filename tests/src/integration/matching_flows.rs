//! End-to-end matching scenarios: mutual, unilateral, triangle, large
//! pool, and commit–reveal.

#[cfg(test)]
mod tests {
    use crate::support::Harness;
    use rdv_crypto::{commit, derive_match_token, derive_nullifier, AgreementKeyPair};
    use rdv_match::discover_matches;
    use rdv_submission::SubmitRequest;
    use rdv_types::{MatchToken, SigningPublicKey};

    const HOUR_MS: u64 = 60 * 60 * 1_000;

    fn submit_selections(
        harness: &Harness,
        pool_id: rdv_types::PoolId,
        me: &AgreementKeyPair,
        selected: &[&AgreementKeyPair],
    ) {
        let tokens: Vec<MatchToken> = selected
            .iter()
            .map(|peer| derive_match_token(me, &peer.public_key(), &pool_id))
            .collect();
        harness
            .submissions
            .submit(SubmitRequest {
                pool_id,
                tokens,
                commits: None,
                nullifier: derive_nullifier(me, &pool_id),
                reveal_data: vec![],
                issuance_proof: None,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_scenario_mutual_two_party_match() {
        let harness = Harness::new();
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let charlie = AgreementKeyPair::generate();

        let pool = harness
            .pools
            .create(harness.pool_request(
                alice.public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                None,
                HOUR_MS,
            ))
            .unwrap();

        submit_selections(&harness, pool.id, &alice, &[&bob]);
        submit_selections(&harness, pool.id, &bob, &[&alice]);

        // Close at T+1h, then detect.
        harness.time.advance(HOUR_MS);
        let result = harness.detector.detect(&pool.id).await.unwrap();

        let shared = derive_match_token(&alice, &bob.public_key(), &pool.id);
        assert_eq!(result.matched_tokens, vec![shared]);

        // Alice discovers Bob; a Charlie-only candidate list finds nothing.
        let found = discover_matches(&alice, &pool.id, &[bob.public_key()], &result.matched_tokens);
        assert_eq!(found, vec![bob.public_key()]);
        let found = discover_matches(
            &alice,
            &pool.id,
            &[charlie.public_key()],
            &result.matched_tokens,
        );
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_unilateral_selection_stays_hidden() {
        let harness = Harness::new();
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        let pool = harness
            .pools
            .create(harness.pool_request(
                alice.public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                None,
                HOUR_MS,
            ))
            .unwrap();

        // Alice selects Bob; Bob never submits.
        submit_selections(&harness, pool.id, &alice, &[&bob]);

        harness.time.advance(HOUR_MS);
        let result = harness.detector.detect(&pool.id).await.unwrap();

        assert!(result.matched_tokens.is_empty());
        assert!(discover_matches(&alice, &pool.id, &[bob.public_key()], &result.matched_tokens)
            .is_empty());
        // Decoys inflate the submission count past the single real token.
        assert!(result.total_submissions > 1);
    }

    #[tokio::test]
    async fn test_scenario_polyamorous_triangle() {
        let harness = Harness::new();
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let charlie = AgreementKeyPair::generate();

        let pool = harness
            .pools
            .create(harness.pool_request(
                alice.public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                None,
                HOUR_MS,
            ))
            .unwrap();

        submit_selections(&harness, pool.id, &alice, &[&bob, &charlie]);
        submit_selections(&harness, pool.id, &bob, &[&alice, &charlie]);
        submit_selections(&harness, pool.id, &charlie, &[&alice, &bob]);

        harness.time.advance(HOUR_MS);
        let result = harness.detector.detect(&pool.id).await.unwrap();

        assert_eq!(result.matched_tokens.len(), 3);
        assert_eq!(result.unique_nullifiers, 3);

        // Everyone discovers the other two.
        for (me, others) in [
            (&alice, [&bob, &charlie]),
            (&bob, [&alice, &charlie]),
            (&charlie, [&alice, &bob]),
        ] {
            let candidates = [others[0].public_key(), others[1].public_key()];
            let found = discover_matches(me, &pool.id, &candidates, &result.matched_tokens);
            assert_eq!(found.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_scenario_large_pool_mixed_outcomes() {
        let harness = Harness::new();
        let people: Vec<AgreementKeyPair> =
            (0..10).map(|_| AgreementKeyPair::generate()).collect();

        let pool = harness
            .pools
            .create(harness.pool_request(
                people[0].public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                None,
                HOUR_MS,
            ))
            .unwrap();

        // Mutual pairs 0↔1 and 2↔3; unilateral 4→5 and 5→6.
        submit_selections(&harness, pool.id, &people[0], &[&people[1]]);
        submit_selections(&harness, pool.id, &people[1], &[&people[0]]);
        submit_selections(&harness, pool.id, &people[2], &[&people[3]]);
        submit_selections(&harness, pool.id, &people[3], &[&people[2]]);
        submit_selections(&harness, pool.id, &people[4], &[&people[5]]);
        submit_selections(&harness, pool.id, &people[5], &[&people[6]]);

        harness.time.advance(HOUR_MS);
        let result = harness.detector.detect(&pool.id).await.unwrap();

        assert_eq!(result.matched_tokens.len(), 2);
        assert_eq!(result.unique_nullifiers, 6);

        // The unilateral chain finds nothing.
        assert!(discover_matches(
            &people[4],
            &pool.id,
            &[people[5].public_key()],
            &result.matched_tokens
        )
        .is_empty());
    }

    #[tokio::test]
    async fn test_scenario_commit_reveal_lifecycle() {
        let harness = Harness::new();
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        let half_hour = HOUR_MS / 2;

        let pool = harness
            .pools
            .create(harness.pool_request(
                alice.public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                Some(half_hour),
                HOUR_MS,
            ))
            .unwrap();

        // T: Alice commits to her selection of Bob; Bob submits too so the
        // match can form.
        let alice_token = derive_match_token(&alice, &bob.public_key(), &pool.id);
        let bob_token = derive_match_token(&bob, &alice.public_key(), &pool.id);
        harness
            .submissions
            .submit(SubmitRequest {
                pool_id: pool.id,
                tokens: vec![alice_token],
                commits: Some(vec![commit(&alice_token)]),
                nullifier: derive_nullifier(&alice, &pool.id),
                reveal_data: vec![],
                issuance_proof: None,
            })
            .unwrap();
        harness
            .submissions
            .submit(SubmitRequest {
                pool_id: pool.id,
                tokens: vec![bob_token],
                commits: Some(vec![commit(&bob_token)]),
                nullifier: derive_nullifier(&bob, &pool.id),
                reveal_data: vec![],
                issuance_proof: None,
            })
            .unwrap();

        // T+45m: both reveal the same tokens.
        harness.time.advance(45 * 60 * 1_000);
        harness
            .submissions
            .reveal(&pool.id, &[alice_token], &derive_nullifier(&alice, &pool.id))
            .unwrap();
        harness
            .submissions
            .reveal(&pool.id, &[bob_token], &derive_nullifier(&bob, &pool.id))
            .unwrap();

        // T+1h: close and detect. The reveal handler auto-revealed the
        // decoys, so everything under both nullifiers is revealed.
        harness.time.advance(15 * 60 * 1_000);
        let result = harness.detector.detect(&pool.id).await.unwrap();
        assert_eq!(result.matched_tokens, vec![alice_token]);
        assert_eq!(result.total_submissions, result.revealed_count);
    }

    #[tokio::test]
    async fn test_detection_is_idempotent_across_calls() {
        let harness = Harness::new();
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        let pool = harness
            .pools
            .create(harness.pool_request(
                alice.public_key(),
                SigningPublicKey::from_bytes([1; 32]),
                None,
                HOUR_MS,
            ))
            .unwrap();
        submit_selections(&harness, pool.id, &alice, &[&bob]);
        submit_selections(&harness, pool.id, &bob, &[&alice]);

        harness.time.advance(HOUR_MS);
        let first = harness.detector.detect(&pool.id).await.unwrap();
        let second = harness.detector.detect(&pool.id).await.unwrap();
        assert_eq!(first.detected_at, second.detected_at);
        assert_eq!(first.content_hash, second.content_hash);
    }
}
