mod support;

use pretty_assertions::assert_eq;

use hdr_ai::model::{Chunk, ConversationTurn};
use hdr_ai::orchestrator::ProviderOrchestrator;
use hdr_core::config::{AiSettings, ProviderName};
use hdr_core::error::ErrorKind;

use support::{rate_limited, unreachable, ScriptedProvider};

fn settings(provider: ProviderName, fallback_enabled: bool) -> AiSettings {
    AiSettings {
        provider,
        fallback_enabled,
        ..AiSettings::default()
    }
}

fn context() -> Vec<Chunk> {
    vec![Chunk::new("guide.txt", 0, "restart the router", 0, 3)]
}

#[test]
fn rate_limited_primary_fails_over_to_available_secondary() {
    let (gemini, gemini_log) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.failing(rate_limited()).boxed(),
        ollama.boxed(),
    )
    .expect("orchestrator");

    let answer = orch
        .generate_grounded_answer("wifi?", &context(), &[ConversationTurn::user("hi")])
        .expect("fallback answer");
    assert_eq!(answer, "local (grounded)");
    assert_eq!(gemini_log.generations(), 1);
    assert_eq!(ollama_log.probes(), 1);
    assert_eq!(ollama_log.generations(), 1);
}

#[test]
fn both_failing_surfaces_the_primary_error() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.failing(rate_limited()).boxed(),
        ollama.failing(unreachable()).boxed(),
    )
    .expect("orchestrator");

    let err = orch
        .generate_grounded_answer("wifi?", &context(), &[])
        .expect_err("both fail");
    assert_eq!(err.kind, ErrorKind::RateLimited);
    assert_eq!(err.code, "AI_GEMINI_RATE_LIMITED");
    assert_eq!(ollama_log.generations(), 1);
}

#[test]
fn disabled_fallback_never_touches_the_secondary() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, false),
        gemini.failing(rate_limited()).boxed(),
        ollama.boxed(),
    )
    .expect("orchestrator");

    let err = orch.generate_general_answer("hello", &[]).expect_err("no fallback");
    assert!(err.is_rate_limited());
    let err = orch.embed("text").expect_err("no fallback");
    assert!(err.is_rate_limited());

    assert_eq!(ollama_log.generations(), 0);
    assert_eq!(ollama_log.embeds(), 0);
    assert_eq!(ollama_log.probes(), 0);
}

#[test]
fn unavailable_secondary_is_not_called_for_generation() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.failing(rate_limited()).boxed(),
        ollama.unavailable().boxed(),
    )
    .expect("orchestrator");

    let err = orch.generate_general_answer("hello", &[]).expect_err("secondary down");
    assert!(err.is_rate_limited());
    assert_eq!(ollama_log.probes(), 1);
    assert_eq!(ollama_log.generations(), 0);
}

#[test]
fn embedding_failover_skips_the_liveness_probe() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.failing(rate_limited()).boxed(),
        ollama.unavailable().with_embedder(|_| vec![9.0]).boxed(),
    )
    .expect("orchestrator");

    assert_eq!(orch.embed("x").expect("embed"), vec![9.0]);
    assert_eq!(orch.embed_batch(&["a", "b"]).expect("batch"), vec![vec![9.0], vec![9.0]]);
    assert_eq!(ollama_log.probes(), 0);
    assert_eq!(ollama_log.embeds(), 3);
}

#[test]
fn embeddings_prefer_remote_even_when_local_is_primary() {
    let (gemini, gemini_log) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Ollama, true),
        gemini.with_embedder(|_| vec![1.0, 2.0]).boxed(),
        ollama.boxed(),
    )
    .expect("orchestrator");

    assert_eq!(orch.primary(), ProviderName::Ollama);
    assert_eq!(orch.embedding_provider(), ProviderName::Gemini);
    assert_eq!(orch.embed("x").expect("embed"), vec![1.0, 2.0]);
    assert_eq!(gemini_log.embeds(), 1);
    assert_eq!(ollama_log.embeds(), 0);

    assert_eq!(orch.generate_general_answer("q", &[]).expect("answer"), "local (general)");
    assert_eq!(gemini_log.generations(), 0);
}

#[test]
fn missing_configured_primary_switches_to_the_other_provider() {
    let (ollama, ollama_log) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, false),
        None,
        ollama.boxed(),
    )
    .expect("orchestrator");

    assert_eq!(orch.primary(), ProviderName::Ollama);
    assert!(orch.provider_config(ProviderName::Ollama).primary);
    assert_eq!(orch.generate_general_answer("q", &[]).expect("answer"), "local (general)");
    assert_eq!(ollama_log.generations(), 1);
}

#[test]
fn no_secondary_surfaces_the_primary_error_directly() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.failing(unreachable()).boxed(),
        None,
    )
    .expect("orchestrator");

    let err = orch.generate_general_answer("q", &[]).expect_err("fails");
    assert_eq!(err.kind, ErrorKind::ProviderUnavailable);
    assert_eq!(err.http_status(), 503);
}

#[test]
fn status_reports_routing() {
    let (gemini, _) = ScriptedProvider::new(ProviderName::Gemini, "remote");
    let (ollama, _) = ScriptedProvider::new(ProviderName::Ollama, "local");
    let orch = ProviderOrchestrator::with_providers(
        settings(ProviderName::Gemini, true),
        gemini.boxed(),
        ollama.unavailable().boxed(),
    )
    .expect("orchestrator");

    let status = orch.status();
    assert_eq!(status.active_provider, ProviderName::Gemini);
    assert_eq!(status.embedding_provider, ProviderName::Gemini);
    assert!(status.providers[0].available);
    assert!(!status.providers[1].available);
    assert!(status.installed_models.is_empty());
    assert_eq!(
        status.message,
        "Using Gemini as primary. Fallback to Ollama is enabled but Ollama is not available."
    );
}
