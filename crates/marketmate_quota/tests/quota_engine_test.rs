//! Tests for the quota engine.

use chrono::TimeDelta;
use marketmate_error::{MarketmateErrorKind, QuotaErrorKind};
use marketmate_quota::{
    AssignedTierResolver, Clock, CounterKey, CounterStore, InMemoryCounterStore, LimitDimension,
    ManualClock, Principal, QuotaEngine, StaticTierResolver, Tier, TierCatalog, UnresolvedTier,
};
use std::sync::Arc;
use strum::IntoEnumIterator;

fn engine_with(clock: Arc<ManualClock>, store: Arc<InMemoryCounterStore>) -> QuotaEngine {
    QuotaEngine::builder(TierCatalog::bundled().unwrap())
        .clock(clock)
        .store(store)
        .build()
}

#[tokio::test]
async fn test_fixed_cost_denies_after_exactly_ceiling() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryCounterStore::new());
    let engine = engine_with(clock, store.clone());
    let catalog = TierCatalog::bundled().unwrap();
    let alice = Principal::new("alice");

    for dimension in [LimitDimension::RequestsPerMinute, LimitDimension::RequestsPerDay] {
        let ceiling = catalog.ceiling(Tier::Free, dimension);
        for _ in 0..ceiling {
            assert!(engine.try_charge(&alice, dimension, 1).await.unwrap());
            let count = store
                .get(&CounterKey::new(alice.clone(), dimension))
                .await
                .unwrap()
                .unwrap()
                .count;
            assert!(count <= ceiling);
        }
        assert!(!engine.try_charge(&alice, dimension, 1).await.unwrap());

        let count = store
            .get(&CounterKey::new(alice.clone(), dimension))
            .await
            .unwrap()
            .unwrap()
            .count;
        assert_eq!(count, ceiling);
    }
}

#[tokio::test]
async fn test_window_resets_after_duration() {
    let clock = Arc::new(ManualClock::default());
    let engine = engine_with(clock.clone(), Arc::new(InMemoryCounterStore::new()));
    let alice = Principal::new("alice");
    let rpm = LimitDimension::RequestsPerMinute;

    for _ in 0..3 {
        assert!(engine.try_charge(&alice, rpm, 1).await.unwrap());
    }
    assert!(!engine.try_charge(&alice, rpm, 1).await.unwrap());

    // Exactly one window later is still inside the window.
    clock.advance(TimeDelta::seconds(60));
    assert!(!engine.try_charge(&alice, rpm, 1).await.unwrap());

    clock.advance(TimeDelta::seconds(1));
    assert!(engine.try_charge(&alice, rpm, 1).await.unwrap());
    let usage = engine.usage(&alice, rpm).await.unwrap();
    assert_eq!(usage.count, 1);
    assert_eq!(usage.remaining, 2);
}

#[tokio::test]
async fn test_day_window_outlives_minute_window() {
    let clock = Arc::new(ManualClock::default());
    let engine = QuotaEngine::builder(TierCatalog::bundled().unwrap())
        .clock(clock.clone())
        .resolver(Arc::new(StaticTierResolver::new(Tier::Free)))
        .build();
    let alice = Principal::new("alice");

    assert!(engine.record_usage(&alice, LimitDimension::TokensPerDay, 999_999).await.unwrap());
    clock.advance(TimeDelta::hours(2));
    assert!(engine.try_charge(&alice, LimitDimension::TokensPerDay, 0).await.unwrap());
    assert!(!engine.record_usage(&alice, LimitDimension::TokensPerDay, 2).await.unwrap());
    assert!(!engine.try_charge(&alice, LimitDimension::TokensPerDay, 0).await.unwrap());

    clock.advance(TimeDelta::days(1));
    assert!(engine.try_charge(&alice, LimitDimension::TokensPerDay, 0).await.unwrap());
}

#[tokio::test]
async fn test_boundary_burst_is_permitted() {
    let clock = Arc::new(ManualClock::default());
    let engine = engine_with(clock.clone(), Arc::new(InMemoryCounterStore::new()));
    let alice = Principal::new("alice");
    let rpm = LimitDimension::RequestsPerMinute;

    for _ in 0..3 {
        assert!(engine.try_charge(&alice, rpm, 1).await.unwrap());
    }
    clock.advance(TimeDelta::seconds(61));
    for _ in 0..3 {
        assert!(engine.try_charge(&alice, rpm, 1).await.unwrap());
    }
}

#[tokio::test]
async fn test_principals_and_dimensions_are_isolated() {
    let engine = QuotaEngine::builder(TierCatalog::bundled().unwrap()).build();
    let alice = Principal::new("alice");
    let bob = Principal::new("bob");

    for _ in 0..3 {
        assert!(engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await.unwrap());
    }
    assert!(!engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await.unwrap());
    assert!(engine.try_charge(&bob, LimitDimension::RequestsPerMinute, 1).await.unwrap());
    assert!(engine.try_charge(&alice, LimitDimension::RequestsPerDay, 1).await.unwrap());
}

#[tokio::test]
async fn test_tier_selects_ceiling() {
    let resolver = AssignedTierResolver::new()
        .assign("free-user", Tier::Free)
        .assign("paid-user", Tier::Tier1);
    let engine = QuotaEngine::builder(TierCatalog::bundled().unwrap())
        .resolver(Arc::new(resolver))
        .build();

    let paid = Principal::new("paid-user");
    for _ in 0..500 {
        assert!(engine.try_charge(&paid, LimitDimension::RequestsPerMinute, 1).await.unwrap());
    }
    assert!(!engine.try_charge(&paid, LimitDimension::RequestsPerMinute, 1).await.unwrap());

    let usage = engine
        .usage(&Principal::new("free-user"), LimitDimension::TokensPerMinute)
        .await
        .unwrap();
    assert_eq!(usage.ceiling, 40_000);
}

#[tokio::test]
async fn test_unresolved_principal_falls_back() {
    let engine = QuotaEngine::builder(TierCatalog::bundled().unwrap())
        .resolver(Arc::new(AssignedTierResolver::new()))
        .unresolved(UnresolvedTier::Fallback(Tier::Tier2))
        .build();

    let tier = engine.resolve_tier(&Principal::new("stranger")).await.unwrap();
    assert_eq!(tier, Tier::Tier2);
}

#[tokio::test]
async fn test_unresolved_principal_fails_closed() {
    let store = Arc::new(InMemoryCounterStore::new());
    let engine = QuotaEngine::builder(TierCatalog::bundled().unwrap())
        .resolver(Arc::new(AssignedTierResolver::new()))
        .unresolved(UnresolvedTier::Deny)
        .store(store.clone())
        .build();

    let err = engine
        .try_charge(&Principal::new("stranger"), LimitDimension::RequestsPerMinute, 1)
        .await
        .unwrap_err();

    match err.kind() {
        MarketmateErrorKind::Quota(e) => {
            assert_eq!(e.kind(), &QuotaErrorKind::UnknownPrincipal("stranger".to_string()));
        }
        other => panic!("Expected quota error, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_usage_of_unseen_principal_is_fresh() {
    let clock = Arc::new(ManualClock::default());
    let engine = engine_with(clock.clone(), Arc::new(InMemoryCounterStore::new()));

    for dimension in LimitDimension::iter() {
        let usage = engine.usage(&Principal::new("new"), dimension).await.unwrap();
        assert_eq!(usage.count, 0);
        assert_eq!(usage.remaining, usage.ceiling);
        assert!(usage.resets_at > clock.now());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_charges_admit_exactly_ceiling() {
    let engine = Arc::new(QuotaEngine::builder(TierCatalog::bundled().unwrap()).build());
    let principal = Principal::new("busy");
    let ceiling = engine
        .catalog()
        .ceiling(Tier::Free, LimitDimension::RequestsPerDay);

    let tasks: Vec<_> = (0..ceiling * 5)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let principal = principal.clone();
            tokio::spawn(async move {
                engine
                    .try_charge(&principal, LimitDimension::RequestsPerDay, 1)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let admitted = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|admitted| *admitted)
        .count() as u64;

    assert_eq!(admitted, ceiling);
    let usage = engine
        .usage(&principal, LimitDimension::RequestsPerDay)
        .await
        .unwrap();
    assert_eq!(usage.count, ceiling);
}
