//! Federated scenarios: CRDT sync between two instances, anonymous join,
//! and anonymous token relay feeding the remote submission manager.

#[cfg(test)]
mod tests {
    use rdv_crypto::{derive_match_token, derive_nullifier, AgreementKeyPair, SigningKeyPair};
    use rdv_federation::{memory_pair, FederationConfig, JoinPayload};
    use rdv_pools::CreatePoolRequest;
    use rdv_types::{Gate, SystemTimeSource, TimeSource, TokenAuthority};
    use rendezvous_node::adapters::StaticTokenAuthority;
    use rendezvous_node::RendezvousNode;
    use std::sync::Arc;
    use std::time::Duration;

    const HOUR_MS: u64 = 60 * 60 * 1_000;

    struct Instance {
        node: Arc<RendezvousNode>,
        federation: Arc<rdv_federation::FederationManager>,
    }

    fn make_instance(name: &str, authority: Arc<dyn TokenAuthority>) -> Instance {
        let node = Arc::new(RendezvousNode::in_memory_for_testing());
        let federation = node.enable_federation(
            name.to_string(),
            format!("{name}.example:7000"),
            AgreementKeyPair::generate(),
            authority,
            FederationConfig::for_testing(),
        );
        Instance { node, federation }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    fn open_pool(node: &RendezvousNode, creator: &AgreementKeyPair) -> rdv_types::Pool {
        node.create_pool(CreatePoolRequest {
            name: "federated pool".to_string(),
            description: None,
            creator_key: creator.public_key(),
            creator_signing_key: SigningKeyPair::generate().public_key(),
            commit_deadline: None,
            reveal_deadline: SystemTimeSource.now().plus_millis(HOUR_MS),
            gate: Some(Gate::Open),
            max_preferences: None,
            ephemeral: false,
            requires_invite: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_scenario_federated_join_with_anonymous_token() {
        let authority: Arc<dyn TokenAuthority> =
            Arc::new(StaticTokenAuthority::new("local", Arc::new(SystemTimeSource)));
        let a = make_instance("instance-a", authority.clone());
        let b = make_instance("instance-b", authority);

        let (ta, tb) = memory_pair();
        a.federation.attach_peer(Arc::new(ta));
        b.federation.attach_peer(Arc::new(tb));
        settle().await;

        // B owns a pool; the announcement replicates to A.
        let owner = AgreementKeyPair::generate();
        let pool = open_pool(&b.node, &owner);
        settle().await;
        assert!(a.federation.document().pool(&pool.id).is_some());

        // A participant on A joins anonymously: fresh token, sealed
        // payload, no sender instance id on the wire.
        let participant = AgreementKeyPair::generate();
        let accepted = a
            .federation
            .request_join(
                pool.id,
                participant.public_key(),
                JoinPayload {
                    display_name: "alice".to_string(),
                    bio: Some("from instance A".to_string()),
                    issuance_proof: None,
                },
            )
            .await
            .unwrap();
        assert!(accepted);

        // B registered the participant with the decrypted profile.
        let registered = b
            .node
            .participant(&pool.id, &participant.public_key())
            .unwrap();
        assert_eq!(registered.display_name, "alice");
        assert_eq!(registered.bio.as_deref(), Some("from instance A"));

        a.federation.shutdown();
        b.federation.shutdown();
    }

    #[tokio::test]
    async fn test_scenario_cross_instance_relay_creates_match() {
        let authority: Arc<dyn TokenAuthority> =
            Arc::new(StaticTokenAuthority::new("local", Arc::new(SystemTimeSource)));
        let a = make_instance("instance-a", authority.clone());
        let b = make_instance("instance-b", authority);

        let (ta, tb) = memory_pair();
        a.federation.attach_peer(Arc::new(ta));
        b.federation.attach_peer(Arc::new(tb));
        settle().await;

        let owner = AgreementKeyPair::generate();
        let pool = open_pool(&b.node, &owner);
        settle().await;

        // Bob submits locally on B; Alice relays from A.
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();
        b.node
            .submit(rdv_submission::SubmitRequest {
                pool_id: pool.id,
                tokens: vec![derive_match_token(&bob, &alice.public_key(), &pool.id)],
                commits: None,
                nullifier: derive_nullifier(&bob, &pool.id),
                reveal_data: vec![],
                issuance_proof: None,
            })
            .unwrap();

        a.federation
            .relay_tokens(
                pool.id,
                vec![derive_match_token(&alice, &bob.public_key(), &pool.id)],
                derive_nullifier(&alice, &pool.id),
            )
            .unwrap();
        settle().await;

        // Both sides of the mutual selection now sit in B's store.
        let stats = b.node.match_stats(&pool.id).unwrap();
        assert_eq!(stats.unique_nullifiers, 2);

        a.federation.shutdown();
        b.federation.shutdown();
    }
}
