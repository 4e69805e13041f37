use std::sync::Arc;

use color_eyre::Result;
use proofport_agent::cache::ProofCache;
use proofport_agent::config::{AgentConfig, ProverConfig};
use proofport_agent::eas::EasClient;
use proofport_agent::payment::X402PaymentProvider;
use proofport_agent::prover::{CliProver, EnclaveProver, ProverBackend};
use proofport_agent::rate_limit::RateLimiter;
use proofport_agent::skills::SkillHandler;
use proofport_agent::store::MemoryStore;
use proofport_agent::verifier::HonkVerifierClient;
use proofport_primitives::circuits::DEFAULT_SIGNER_ALLOWLIST;
use tracing_subscriber::EnvFilter;
use url::Url;

/// This is an example agent wiring using the in-memory store:
/// 1. Read the agent config and set up tracing
/// 2. Build the prover backend, attestation source and verifier client
/// 3. Assemble the skill handler with optional cache/rate limiting
/// 4. Open a signing session and print the circuit manifest
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = AgentConfig::from_file("crates/proofport-agent/examples/agent-config.json")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(config.log_level()?)
        .init();

    let store = MemoryStore::new();
    let prover: Arc<dyn ProverBackend> = match &config.prover {
        ProverConfig::Local { binary_path } => Arc::new(CliProver::new(binary_path.into())),
        ProverConfig::Enclave { endpoint } => {
            Arc::new(EnclaveProver::new(Url::parse(endpoint)?))
        }
    };
    let attestations = Arc::new(EasClient::new(
        config.eas_graphql_endpoint()?,
        config.rpc_url()?,
    ));
    let verifier = Arc::new(HonkVerifierClient::new(config.rpc_url()?));
    let payment = Arc::new(match &config.payment {
        Some(p) => X402PaymentProvider::new(
            p.enabled,
            p.base_url.clone(),
            p.amount.clone(),
            p.currency.clone(),
            p.network.clone(),
            p.pay_to.clone(),
        ),
        None => X402PaymentProvider::disabled(),
    });
    let allowlist = if config.signer_allowlist.is_empty() {
        DEFAULT_SIGNER_ALLOWLIST.clone()
    } else {
        config.signer_allowlist.clone()
    };

    let mut handler = SkillHandler::new(
        store.clone(),
        config.signing_ttl_seconds,
        prover,
        attestations,
        payment,
        verifier,
        allowlist,
        config.chain_id,
        config.signing_base_url.clone(),
    );
    if let Some(rl) = &config.rate_limit {
        handler = handler
            .with_rate_limiter(RateLimiter::new(store.clone(), rl.max_requests, rl.window_seconds));
    }
    if let Some(cache) = &config.cache {
        handler = handler.with_cache(ProofCache::new(store.clone(), cache.ttl_seconds));
    }

    let circuits = handler.get_supported_circuits(None);
    println!("{}", serde_json::to_string_pretty(&circuits)?);

    let opened = handler
        .request_signing("coinbase_attestation", "myapp.com", None, None)
        .await?;
    println!(
        "signing session {} open until {}, sign at {}",
        opened.request_id, opened.expires_at, opened.signing_url
    );
    Ok(())
}
