//! Tests for the offline admission simulator.

use marketmate::{
    CallOutcome, LimitDimension, Principal, QuotaConfig, SimulationOptions, Tier, simulate,
};

fn options(tier: Tier, requests: u64, tokens: u64, interval_secs: u32) -> SimulationOptions {
    SimulationOptions {
        principal: Principal::new("simulated-user"),
        tier,
        requests,
        tokens,
        interval_secs,
    }
}

#[tokio::test]
async fn test_free_tier_burst_trips_rpm() {
    let config = QuotaConfig::bundled().unwrap();
    let report = simulate(&config, &options(Tier::Free, 5, 100, 0))
        .await
        .unwrap();

    assert_eq!(report.admitted(), 3);
    assert_eq!(
        report.denied_by().get(&LimitDimension::RequestsPerMinute),
        Some(&2)
    );
    match &report.calls[3].outcome {
        CallOutcome::Denied {
            dimension, message, ..
        } => {
            assert_eq!(*dimension, LimitDimension::RequestsPerMinute);
            assert_eq!(message, "Rate limit exceeded for RPM. Please try again later.");
        }
        other => panic!("Expected denial, got {:?}", other),
    }

    let rpm = &report.usage[&LimitDimension::RequestsPerMinute];
    assert_eq!(rpm.count, 3);
    assert_eq!(report.usage[&LimitDimension::TokensPerDay].count, 300);
}

#[tokio::test]
async fn test_spacing_calls_past_the_window_avoids_denial() {
    let config = QuotaConfig::bundled().unwrap();
    let report = simulate(&config, &options(Tier::Free, 6, 100, 21))
        .await
        .unwrap();

    assert_eq!(report.admitted(), 6);
    assert_eq!(report.calls[5].elapsed_secs, 105);
}

#[tokio::test]
async fn test_oversized_call_overruns_then_denies_tokens() {
    let config = QuotaConfig::bundled().unwrap();
    let report = simulate(&config, &options(Tier::Free, 2, 41_000, 0))
        .await
        .unwrap();

    assert_eq!(
        report.calls[0].outcome,
        CallOutcome::Admitted {
            overrun: vec![LimitDimension::TokensPerMinute]
        }
    );
    assert!(matches!(
        report.calls[1].outcome,
        CallOutcome::Denied {
            dimension: LimitDimension::TokensPerMinute,
            ..
        }
    ));
}

#[tokio::test]
async fn test_higher_tier_admits_the_same_burst() {
    let config = QuotaConfig::bundled().unwrap();
    let report = simulate(&config, &options(Tier::Tier1, 50, 1_000, 0))
        .await
        .unwrap();

    assert_eq!(report.admitted(), 50);
    assert!(report.denied_by().is_empty());
}

#[tokio::test]
async fn test_report_serializes_outcomes() {
    let config = QuotaConfig::bundled().unwrap();
    let report = simulate(&config, &options(Tier::Free, 4, 10, 0))
        .await
        .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["tier"], "free");
    assert_eq!(value["principal"], "simulated-user");
    assert_eq!(value["calls"][0]["outcome"], "admitted");
    assert_eq!(value["calls"][3]["outcome"], "denied");
    assert_eq!(value["calls"][3]["dimension"], "rpm");
    assert_eq!(value["usage"]["tpm"]["count"], 30);
}

#[tokio::test]
async fn test_invalid_config_is_reported() {
    let mut config = QuotaConfig::bundled().unwrap();
    config.tiers.remove("tier_3");

    assert!(simulate(&config, &options(Tier::Free, 1, 1, 0)).await.is_err());
}
