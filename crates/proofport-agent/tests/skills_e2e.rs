mod common;

use common::{address_of, fixture, user_key, user_signature, SCOPE};
use proofport_agent::cache::ProofCache;
use proofport_agent::error::AgentError;
use proofport_agent::rate_limit::RateLimiter;
use proofport_agent::skills::{GenerateProofRequest, PublicInputs, StatusPhase};
use proofport_agent::store::KeyValueStore;
use proofport_primitives::circuits::{BASE_MAINNET, BASE_SEPOLIA, CircuitId};

fn direct_request() -> GenerateProofRequest {
    let key = user_key();
    GenerateProofRequest::Direct {
        circuit_id: "coinbase_attestation".to_string(),
        address: format!("{:#x}", address_of(&key)),
        signature: user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        scope: SCOPE.to_string(),
        country_list: None,
        is_included: None,
    }
}

#[tokio::test]
async fn signing_session_runs_end_to_end_and_consumes_the_record() {
    let fx = fixture();
    let opened = fx
        .handler
        .request_signing("coinbase_attestation", SCOPE, None, None)
        .await
        .unwrap();
    assert!(opened
        .signing_url
        .starts_with("https://agent.example/sign/"));

    let status = fx.handler.check_status(&opened.request_id).await.unwrap();
    assert_eq!(status.phase, StatusPhase::Signing);
    assert!(status.verifier_address.is_none());

    let key = user_key();
    fx.handler
        .sessions()
        .mark_signed(
            &opened.request_id,
            format!("{:#x}", address_of(&key)),
            user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        )
        .await
        .unwrap();

    // payment disabled, so a signed session is immediately ready
    let status = fx.handler.check_status(&opened.request_id).await.unwrap();
    assert_eq!(status.phase, StatusPhase::Ready);
    assert!(status.verifier_address.is_some());

    let response = fx
        .handler
        .generate_proof(GenerateProofRequest::Session {
            request_id: opened.request_id.clone(),
        })
        .await
        .unwrap();
    assert!(!response.cached);
    assert_eq!(response.result.proof, "deadbeef");
    assert!(!response.result.public_inputs.is_empty());
    assert!(response.result.nullifier.starts_with("0x"));
    assert_eq!(response.result.proof_id.len(), 32);

    // the result is durably retrievable by proof id
    let stored = fx
        .store
        .get(&format!("proof:{}", response.result.proof_id))
        .await
        .unwrap();
    assert!(stored.is_some());

    // the record was consumed, so a repeat call cannot prove twice
    let repeat = fx
        .handler
        .generate_proof(GenerateProofRequest::Session {
            request_id: opened.request_id,
        })
        .await
        .unwrap_err();
    assert!(matches!(repeat, AgentError::NotFoundOrExpired(_)));
}

#[tokio::test]
async fn premature_generate_fails_but_keeps_the_session_alive() {
    let fx = fixture();
    let opened = fx
        .handler
        .request_signing("coinbase_attestation", SCOPE, None, None)
        .await
        .unwrap();
    let err = fx
        .handler
        .generate_proof(GenerateProofRequest::Session {
            request_id: opened.request_id.clone(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));

    // the rejected call must not consume the record: the signing URL stays
    // usable and the session can still complete normally
    let status = fx.handler.check_status(&opened.request_id).await.unwrap();
    assert_eq!(status.phase, StatusPhase::Signing);

    let key = user_key();
    fx.handler
        .sessions()
        .mark_signed(
            &opened.request_id,
            format!("{:#x}", address_of(&key)),
            user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        )
        .await
        .unwrap();
    let response = fx
        .handler
        .generate_proof(GenerateProofRequest::Session {
            request_id: opened.request_id,
        })
        .await
        .unwrap();
    assert!(!response.cached);
}

#[tokio::test]
async fn generate_with_payment_owed_fails_but_keeps_the_session_alive() {
    let fx = fixture();
    let paid = proofport_agent::skills::SkillHandler::new(
        fx.store.clone(),
        600,
        fx.prover.clone(),
        std::sync::Arc::new(common::FixtureAttestations::new()),
        std::sync::Arc::new(proofport_agent::payment::X402PaymentProvider::new(
            true,
            "https://pay.example".to_string(),
            "0.50".to_string(),
            "USDC".to_string(),
            "base-sepolia".to_string(),
            "0x1111111111111111111111111111111111111111".to_string(),
        )),
        fx.verifier.clone(),
        vec![address_of(&common::attester_key())],
        BASE_SEPOLIA,
        Some("https://agent.example".to_string()),
    );

    let opened = paid
        .request_signing("coinbase_attestation", SCOPE, None, None)
        .await
        .unwrap();
    let key = user_key();
    paid.sessions()
        .mark_signed(
            &opened.request_id,
            format!("{:#x}", address_of(&key)),
            user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        )
        .await
        .unwrap();

    let err = paid
        .generate_proof(GenerateProofRequest::Session {
            request_id: opened.request_id.clone(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
    // the unpaid session survives and can still be paid for
    assert!(paid
        .sessions()
        .get(&opened.request_id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn direct_mode_proves_without_a_session() {
    let fx = fixture();
    let response = fx.handler.generate_proof(direct_request()).await.unwrap();
    assert!(!response.cached);
    assert_eq!(*fx.prover.calls.lock().await, 1);
}

#[tokio::test]
async fn direct_mode_trims_the_scope_before_deriving() {
    let fx = fixture();
    let key = user_key();
    // the wallet signed the trimmed scope; the request arrives padded
    let padded = GenerateProofRequest::Direct {
        circuit_id: "coinbase_attestation".to_string(),
        address: format!("{:#x}", address_of(&key)),
        signature: user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        scope: format!("  {SCOPE}  "),
        country_list: None,
        is_included: None,
    };
    let response = fx.handler.generate_proof(padded).await.unwrap();

    let exact = fx.handler.generate_proof(direct_request()).await.unwrap();
    assert_eq!(response.result.nullifier, exact.result.nullifier);
    assert_eq!(response.result.signal_hash, exact.result.signal_hash);
}

#[tokio::test]
async fn direct_mode_rejects_a_signature_from_another_wallet() {
    let fx = fixture();
    let key = user_key();
    let request = GenerateProofRequest::Direct {
        circuit_id: "coinbase_attestation".to_string(),
        // signature below is bound to the user key, not this address
        address: "0x00000000000000000000000000000000000000aa".to_string(),
        signature: user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        scope: SCOPE.to_string(),
        country_list: None,
        is_included: None,
    };
    let err = fx.handler.generate_proof(request).await.unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
}

#[tokio::test]
async fn cache_returns_the_same_proof_without_reproving() {
    let fx = fixture();
    let cached = common::bare_handler(&fx)
        .with_cache(ProofCache::new(fx.store.clone(), 300));

    let first = cached.generate_proof(direct_request()).await.unwrap();
    assert!(!first.cached);
    let second = cached.generate_proof(direct_request()).await.unwrap();
    assert!(second.cached);
    assert_eq!(first.result.proof_id, second.result.proof_id);
    assert_eq!(*fx.prover.calls.lock().await, 1);
}

#[tokio::test]
async fn rate_limit_rejects_past_the_window_cap() {
    let fx = fixture();
    let limited = common::bare_handler(&fx)
        .with_rate_limiter(RateLimiter::new(fx.store.clone(), 1, 60));

    limited.generate_proof(direct_request()).await.unwrap();
    let err = limited.generate_proof(direct_request()).await.unwrap_err();
    match err {
        AgentError::RateLimited { retry_after_secs } => assert!(retry_after_secs > 0),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn verify_proof_chunks_hex_public_inputs() {
    let fx = fixture();
    // 40 bytes of public inputs: one full word and one padded word
    let hex_inputs = format!("0x{}{}", "11".repeat(32), "22".repeat(8));
    let outcome = fx
        .handler
        .verify_proof(
            "coinbase_attestation",
            "0xdeadbeef",
            PublicInputs::Hex(hex_inputs),
            Some(BASE_SEPOLIA),
        )
        .await
        .unwrap();
    assert!(outcome.valid);
    assert_eq!(*fx.verifier.last_word_count.lock().await, Some(2));
}

#[tokio::test]
async fn verify_proof_without_a_deployment_is_typed() {
    let fx = fixture();
    let err = fx
        .handler
        .verify_proof(
            "coinbase_attestation",
            "0xdeadbeef",
            PublicInputs::Chunks(vec!["0x01".to_string()]),
            Some(BASE_MAINNET),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::NoVerifierDeployed { .. }));
}

#[tokio::test]
async fn flow_machine_drives_a_signed_session_to_completed() {
    let fx = fixture();
    let manager = proofport_agent::flow::ProofFlowManager::new(
        fx.store.clone(),
        proofport_agent::session::SigningSessionStore::new(fx.store.clone(), 600),
        std::sync::Arc::new(proofport_agent::payment::X402PaymentProvider::disabled()),
        fx.handler.clone(),
        Some("https://agent.example".to_string()),
    );

    let flow = manager
        .create_flow(CircuitId::CoinbaseAttestation, SCOPE.to_string(), None, None)
        .await
        .unwrap();
    assert_eq!(flow.phase, proofport_agent::flow::FlowPhase::Signing);

    // still pending: advancing changes nothing
    let advanced = manager.advance_flow(&flow.flow_id).await.unwrap();
    assert_eq!(advanced.phase, proofport_agent::flow::FlowPhase::Signing);

    let key = user_key();
    fx.handler
        .sessions()
        .mark_signed(
            &flow.request_id,
            format!("{:#x}", address_of(&key)),
            user_signature(&key, CircuitId::CoinbaseAttestation, SCOPE),
        )
        .await
        .unwrap();

    let done = manager.advance_flow(&flow.flow_id).await.unwrap();
    assert_eq!(done.phase, proofport_agent::flow::FlowPhase::Completed);
    let result = done.proof_result.unwrap();
    assert_eq!(result.proof, "deadbeef");

    // generation consumed the record
    assert!(fx
        .handler
        .sessions()
        .get(&flow.request_id)
        .await
        .unwrap()
        .is_none());

    let looked_up = manager
        .get_flow_by_request_id(&flow.request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(looked_up.phase, proofport_agent::flow::FlowPhase::Completed);
}

#[tokio::test]
async fn supported_circuits_list_deployments_per_chain() {
    let fx = fixture();
    let sepolia = fx.handler.get_supported_circuits(Some(BASE_SEPOLIA));
    assert_eq!(sepolia.circuits.len(), 2);
    assert!(sepolia.circuits.iter().all(|c| c.verifier_address.is_some()));

    let mainnet = fx.handler.get_supported_circuits(Some(BASE_MAINNET));
    assert!(mainnet.circuits.iter().all(|c| c.verifier_address.is_none()));
}
