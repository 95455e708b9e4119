//! End-to-end resolution scenarios through the orchestrator
//!
//! Real registry adapter, scripted oracle; covers the headline scenarios plus
//! the escalation boundary, failure containment and cache behavior.

mod helpers;

use helpers::{
    acme_twins, engine, fixture_registry, BrokenRetriever, ScriptedOracle, TableRetriever,
};
use orgmatch_engine::config::EngineConfig;
use orgmatch_engine::registry::InMemoryRegistry;
use orgmatch_engine::resolution::tier1::Normalizer;
use orgmatch_engine::resolution::types::{
    Candidate, MatchOutcome, MatchType, Query, QueryContext, ResolutionState, TraceEventKind,
    REASON_NONE_CLEARED, REASON_NO_CANDIDATES,
};
use std::sync::Arc;

fn matched(outcome: &MatchOutcome) -> (&str, f64, MatchType) {
    match outcome {
        MatchOutcome::Matched {
            candidate,
            confidence,
            match_type,
        } => (candidate.id.as_str(), *confidence, *match_type),
        other => panic!("expected a match, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exact_name_matches_without_oracle() {
    let oracle = Arc::new(ScriptedOracle::new());
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        oracle.clone(),
    );

    let resolution = engine.resolve(&Query::new("Johnson & Johnson")).await;

    let (id, confidence, match_type) = matched(&resolution.outcome);
    assert_eq!(id, "jnj");
    assert_eq!(match_type, MatchType::Exact);
    assert!(confidence >= 0.95);
    assert_eq!(oracle.judge_calls(), 0);
    assert!(resolution.trace.is_none());
}

#[tokio::test]
async fn test_abbreviation_rescued_by_oracle() {
    let oracle = Arc::new(
        ScriptedOracle::new().with_judgment("Johnson & Johnson", 0.9, "abbreviation"),
    );
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        oracle.clone(),
    );

    let config = EngineConfig::default();
    let resolution = engine.resolve(&Query::new("J&J").with_debug()).await;

    let (id, confidence, match_type) = matched(&resolution.outcome);
    assert_eq!(id, "jnj");
    assert_eq!(match_type, MatchType::Abbreviation);
    assert_eq!(oracle.judge_calls(), 1);

    // The fuzzy score alone sits in the uncertain band; the oracle's 0.9
    // is blended in at the configured weight
    let trace = resolution.trace.unwrap();
    let fuzzy = trace
        .events
        .iter()
        .find_map(|e| match &e.kind {
            TraceEventKind::Scored {
                candidate_id,
                breakdown,
            } if candidate_id == "jnj" => Some(breakdown.fuzzy_confidence()),
            _ => None,
        })
        .unwrap();
    assert!(
        fuzzy > config.uncertain_band_low && fuzzy < config.uncertain_band_high,
        "fuzzy {} outside the band",
        fuzzy
    );
    let w = config.fuzzy_blend_weight;
    assert!((confidence - (w * fuzzy + (1.0 - w) * 0.9)).abs() < 1e-9);
}

#[tokio::test]
async fn test_unknown_name_yields_no_candidates() {
    let oracle = Arc::new(ScriptedOracle::new());
    let (engine, cache) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        oracle.clone(),
    );

    let resolution = engine.resolve(&Query::new("XyzNoSuchCompany123")).await;

    assert_eq!(resolution.outcome, MatchOutcome::no_match(REASON_NO_CANDIDATES));
    assert_eq!(oracle.judge_calls(), 0);
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_near_tie_broken_by_oracle_choice() {
    let retriever = TableRetriever::new().answer("acme", acme_twins());
    let oracle = Arc::new(ScriptedOracle::new().with_choice(1, 0.8));
    let (engine, _) = engine(EngineConfig::default(), Arc::new(retriever), oracle.clone());

    let resolution = engine.resolve(&Query::new("Acme")).await;

    let (id, _, match_type) = matched(&resolution.outcome);
    assert_eq!(id, "acme-2");
    assert_eq!(match_type, MatchType::Exact);
    assert_eq!(oracle.choose_calls(), 1);
}

#[tokio::test]
async fn test_near_tie_broken_by_context_without_oracle() {
    let retriever = TableRetriever::new().answer("acme", acme_twins());
    let oracle = Arc::new(ScriptedOracle::new().with_choice(0, 0.8));
    let (engine, _) = engine(EngineConfig::default(), Arc::new(retriever), oracle.clone());

    let query = Query::new("Acme").with_context(QueryContext {
        region: Some("emea".to_string()),
        ..Default::default()
    });
    let resolution = engine.resolve(&query).await;

    assert_eq!(matched(&resolution.outcome).0, "acme-2");
    assert_eq!(oracle.choose_calls(), 0);
}

#[tokio::test]
async fn test_unresolved_tie_lists_potential_matches() {
    let retriever = TableRetriever::new().answer("acme", acme_twins());
    let oracle = Arc::new(ScriptedOracle::failing());
    let (engine, cache) = engine(EngineConfig::default(), Arc::new(retriever), oracle);

    let resolution = engine.resolve(&Query::new("Acme")).await;

    match resolution.outcome {
        MatchOutcome::PotentialMatches { candidates } => {
            let ids: Vec<&str> = candidates.iter().map(|p| p.candidate.id.as_str()).collect();
            assert_eq!(ids, vec!["acme-1", "acme-2"]);
        }
        other => panic!("expected potential matches, got {:?}", other),
    }
    assert_eq!(cache.stats().await.entries, 0);
}

#[tokio::test]
async fn test_score_at_band_high_is_not_escalated() {
    // An identical name scores exactly 1.0; with the band's upper edge at
    // 1.0 the boundary itself must be accepted without the oracle.
    let config = EngineConfig {
        uncertain_band_high: 1.0,
        ..EngineConfig::default()
    };
    let oracle = Arc::new(ScriptedOracle::new());
    let (engine, _) = engine(config, Arc::new(fixture_registry()), oracle.clone());

    let resolution = engine.resolve(&Query::new("Initech")).await;

    assert_eq!(matched(&resolution.outcome).0, "initech");
    assert_eq!(oracle.judge_calls(), 0);
}

#[tokio::test]
async fn test_oracle_outage_is_contained() {
    let oracle = Arc::new(ScriptedOracle::failing());
    let (engine, cache) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        oracle.clone(),
    );

    // Fallback confidence 0.5 blended with a weak fuzzy score stays below
    // the match threshold.
    let resolution = engine.resolve(&Query::new("J&J").with_debug()).await;

    assert_eq!(resolution.outcome, MatchOutcome::no_match(REASON_NONE_CLEARED));
    assert_eq!(oracle.judge_calls(), 1);
    assert_eq!(engine.escalator().usage().failures, 1);
    assert_eq!(cache.stats().await.entries, 0);

    let trace = resolution.trace.unwrap();
    assert!(trace.events.iter().any(|e| matches!(
        e.kind,
        TraceEventKind::OracleCall { fallback: true, .. }
    )));
}

#[tokio::test]
async fn test_retrieval_outage_degrades_to_no_candidates() {
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(BrokenRetriever),
        Arc::new(ScriptedOracle::new()),
    );

    let resolution = engine.resolve(&Query::new("Globex")).await;
    assert_eq!(resolution.outcome, MatchOutcome::no_match(REASON_NO_CANDIDATES));
}

#[tokio::test]
async fn test_expansion_variant_surfaces_candidate() {
    // Only the legal-suffix variant reaches the retriever's index
    let retriever = Arc::new(
        TableRetriever::new()
            .answer("initech inc", vec![Candidate::new("it-1", "Initech Systems")]),
    );
    let (engine, _) = engine(
        EngineConfig::default(),
        retriever.clone(),
        Arc::new(ScriptedOracle::failing()),
    );

    let resolution = engine.resolve(&Query::new("Initech").with_debug()).await;

    let (id, _, match_type) = matched(&resolution.outcome);
    assert_eq!(id, "it-1");
    assert_eq!(match_type, MatchType::Variation);
    assert!(retriever.searches() >= 2);

    let trace = resolution.trace.unwrap();
    assert!(trace.events.iter().any(|e| matches!(
        e.kind,
        TraceEventKind::StateEntered {
            state: ResolutionState::ExpandAndRetry
        }
    )));
}

#[tokio::test]
async fn test_cache_hit_is_idempotent() {
    let (engine, cache) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::new()),
    );
    let query = Query::new("Johnson & Johnson").with_debug();

    let first = engine.resolve(&query).await;
    let second = engine.resolve(&query).await;

    assert_eq!(first.outcome, second.outcome);
    let trace = second.trace.unwrap();
    assert!(trace.events.iter().any(|e| matches!(
        e.kind,
        TraceEventKind::StateEntered {
            state: ResolutionState::CacheHit
        }
    )));

    let key = Normalizer::default().normalize("Johnson & Johnson");
    let entry = cache.lookup(&key, None).await.unwrap();
    assert_eq!(entry.entity_id, "jnj");
    assert_eq!(entry.match_count, 2);
    assert_eq!(cache.stats().await.entries, 1);
}

#[tokio::test]
async fn test_skip_cache_forces_full_resolution() {
    let oracle = Arc::new(
        ScriptedOracle::new().with_judgment("Johnson & Johnson", 0.9, "abbreviation"),
    );
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        oracle.clone(),
    );

    engine.resolve(&Query::new("J&J")).await;
    engine.resolve(&Query::new("J&J")).await;
    assert_eq!(oracle.judge_calls(), 1);

    engine.resolve(&Query::new("J&J").bypass_cache()).await;
    assert_eq!(oracle.judge_calls(), 2);
}

#[tokio::test]
async fn test_low_confidence_match_never_cached() {
    // The match threshold is lowered so the fallback-blended J&J match is
    // accepted, but it stays under the cache floor.
    let config = EngineConfig {
        match_threshold: 0.3,
        ..EngineConfig::default()
    };
    let (engine, cache) = engine(
        config,
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::failing()),
    );

    let resolution = engine.resolve(&Query::new("J&J")).await;

    let (id, confidence, _) = matched(&resolution.outcome);
    assert_eq!(id, "jnj");
    assert!(confidence < 0.5);
    let stats = cache.stats().await;
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.rejected_writes, 1);
}

#[tokio::test]
async fn test_context_partitions_cache() {
    let (engine, cache) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::new()),
    );
    let hinted = Query::new("Initech").with_context(QueryContext {
        industry: Some("Technology".to_string()),
        ..Default::default()
    });

    engine.resolve(&Query::new("Initech")).await;
    engine.resolve(&hinted).await;

    assert_eq!(cache.stats().await.entries, 2);
}

#[tokio::test]
async fn test_context_hint_spelled_differently_still_matches() {
    let registry = InMemoryRegistry::new(vec![
        Candidate::new("acme", "Acme Corporation").with_region("United States"),
    ]);
    let oracle = Arc::new(ScriptedOracle::new());
    let (engine, _) = engine(EngineConfig::default(), Arc::new(registry), oracle.clone());

    let plain = engine.resolve(&Query::new("Acme Corporation")).await;
    let hinted = engine
        .resolve(&Query::new("Acme Corporation").with_context(QueryContext {
            region: Some("US".to_string()),
            industry: Some("Aerospace".to_string()),
            ..Default::default()
        }))
        .await;

    for resolution in [plain, hinted] {
        let (id, confidence, match_type) = matched(&resolution.outcome);
        assert_eq!(id, "acme");
        assert_eq!(match_type, MatchType::Exact);
        assert!((confidence - 1.0).abs() < 1e-9);
    }
    assert_eq!(oracle.judge_calls(), 0);
}

#[tokio::test]
async fn test_empty_query_is_no_match() {
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::new()),
    );

    for raw in ["", "   ", "!!!"] {
        let resolution = engine.resolve(&Query::new(raw)).await;
        assert!(
            matches!(resolution.outcome, MatchOutcome::NoMatch { .. }),
            "{:?} should not match",
            raw
        );
    }
}

#[tokio::test]
async fn test_known_query_counts_as_exact() {
    let (engine, _) = engine(
        EngineConfig::default(),
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::new()),
    );

    let resolution = engine.resolve(&Query::new("Initech Software")).await;
    let (id, _, match_type) = matched(&resolution.outcome);
    assert_eq!(id, "initech");
    assert_eq!(match_type, MatchType::Exact);
}

#[test]
fn test_invalid_weights_rejected_at_construction() {
    let mut config = EngineConfig::default();
    config.scoring_weights.insert("first_token".to_string(), 0.9);

    let result = orgmatch_engine::resolution::ResolutionOrchestrator::new(
        config,
        Arc::new(fixture_registry()),
        Arc::new(ScriptedOracle::new()),
        Arc::new(orgmatch_engine::resolution::cache::ExactMatchCache::in_memory(0.5)),
    );
    assert!(matches!(result, Err(orgmatch_common::Error::Config(_))));
}
