//! Tests for configuration loading and catalog validation.

use marketmate_quota::{
    LimitDimension, Principal, QuotaConfig, Tier, TierCatalog, UnresolvedTier,
};
use std::io::Write;
use strum::IntoEnumIterator;
use tempfile::NamedTempFile;

const FULL_TIERS: &str = r#"
[tiers.free]
rpm = 10
rpd = 100
tpm = 1_000
tpd = 10_000

[tiers.tier_1]
rpm = 20
rpd = 200
tpm = 2_000
tpd = 20_000

[tiers.tier_2]
rpm = 30
rpd = 300
tpm = 3_000
tpd = 30_000

[tiers.tier_3]
rpm = 40
rpd = 400
tpm = 4_000
tpd = 40_000
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_bundled_matches_shipped_ceilings() {
    let config = QuotaConfig::bundled().unwrap();
    let catalog = config.catalog().unwrap();

    let expected = [
        (Tier::Free, [3, 200, 40_000, 1_000_000]),
        (Tier::Tier1, [500, 10_000, 200_000, 5_000_000]),
        (Tier::Tier2, [5_000, 100_000, 2_000_000, 50_000_000]),
        (Tier::Tier3, [50_000, 1_000_000, 20_000_000, 500_000_000]),
    ];
    for (tier, ceilings) in expected {
        for (dimension, ceiling) in LimitDimension::iter().zip(ceilings) {
            assert_eq!(catalog.ceiling(tier, dimension), ceiling, "{} {}", tier, dimension);
        }
    }
    assert_eq!(catalog, TierCatalog::bundled().unwrap());
    assert_eq!(config.resolution.unresolved, UnresolvedTier::Fallback(Tier::Free));
    assert_eq!(config.windows.minute_secs, 60);
    assert_eq!(config.windows.day_secs, 86_400);
}

#[test]
fn test_from_file_reads_all_sections() {
    let file = write_config(&format!(
        "[windows]\nminute_secs = 30\nday_secs = 3600\n\n[resolution]\nunresolved = \"tier_1\"\n{}",
        FULL_TIERS
    ));

    let config = QuotaConfig::from_file(file.path()).unwrap();
    assert_eq!(
        config.resolution.unresolved,
        UnresolvedTier::Fallback(Tier::Tier1)
    );

    let catalog = config.catalog().unwrap();
    assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::RequestsPerMinute), 10);
    assert_eq!(catalog.ceiling(Tier::Tier3, LimitDimension::TokensPerDay), 40_000);
    assert_eq!(catalog.window(LimitDimension::RequestsPerMinute).num_seconds(), 30);
    assert_eq!(catalog.window(LimitDimension::TokensPerDay).num_seconds(), 3600);
}

#[test]
fn test_windows_and_resolution_default_when_absent() {
    let file = write_config(FULL_TIERS);
    let config = QuotaConfig::from_file(file.path()).unwrap();

    assert_eq!(config.windows.minute_secs, 60);
    assert_eq!(config.resolution.unresolved, UnresolvedTier::default());
    assert!(config.catalog().is_ok());
}

#[test]
fn test_missing_dimension_fails_at_startup() {
    let partial = FULL_TIERS.replace("tpd = 30_000\n", "");
    let file = write_config(&partial);
    let config = QuotaConfig::from_file(file.path()).unwrap();

    let msg = config.catalog().unwrap_err().to_string();
    assert!(msg.contains("tier_2"), "{}", msg);
    assert!(msg.contains("tpd"), "{}", msg);
}

#[test]
fn test_missing_tier_section_fails_at_startup() {
    let file = write_config("[tiers.free]\nrpm = 1\nrpd = 1\ntpm = 1\ntpd = 1\n");
    let config = QuotaConfig::from_file(file.path()).unwrap();

    let msg = config.catalog().unwrap_err().to_string();
    assert!(msg.contains("Missing [tiers."), "{}", msg);
}

#[test]
fn test_unknown_tier_rejected() {
    let file = write_config(&format!("{}\n[tiers.platinum]\nrpm = 1\n", FULL_TIERS));
    let config = QuotaConfig::from_file(file.path()).unwrap();

    let msg = config.catalog().unwrap_err().to_string();
    assert!(msg.contains("platinum"), "{}", msg);
}

#[test]
fn test_tier_alias_keys_rejected() {
    // `Free` parses as the same tier as `free`; accepting both would make the
    // effective ceiling depend on map iteration order.
    let file = write_config(&format!("{}\n[tiers.Free]\nrpm = 99\n", FULL_TIERS));
    let config = QuotaConfig::from_file(file.path()).unwrap();

    for _ in 0..10 {
        let msg = config.catalog().unwrap_err().to_string();
        assert!(msg.contains("Unknown tier 'Free'"), "{}", msg);
    }
}

#[test]
fn test_partial_override_merges_over_bundled() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("home.toml");
    let local = dir.path().join("local.toml");
    std::fs::write(&home, "[tiers.free]\nrpm = 10\n\n[tiers.tier_1]\ntpd = 7\n").unwrap();
    std::fs::write(&local, "[tiers.free]\nrpm = 20\n").unwrap();

    let config = QuotaConfig::layered([&home, &local]).unwrap();
    let catalog = config.catalog().unwrap();

    // Last file wins for the key both set; untouched keys keep bundled values.
    assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::RequestsPerMinute), 20);
    assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::RequestsPerDay), 200);
    assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::TokensPerMinute), 40_000);
    assert_eq!(catalog.ceiling(Tier::Free, LimitDimension::TokensPerDay), 1_000_000);
    assert_eq!(catalog.ceiling(Tier::Tier1, LimitDimension::TokensPerDay), 7);
    assert_eq!(catalog.ceiling(Tier::Tier1, LimitDimension::RequestsPerMinute), 500);
}

#[test]
fn test_layered_skips_missing_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let absent = dir.path().join("absent.toml");

    let config = QuotaConfig::layered([absent]).unwrap();
    assert_eq!(config, QuotaConfig::bundled().unwrap());
}

#[test]
fn test_layered_override_can_change_windows_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("marketmate.toml");
    std::fs::write(
        &local,
        "[windows]\nminute_secs = 30\n\n[resolution]\nunresolved = \"deny\"\n",
    )
    .unwrap();

    let config = QuotaConfig::layered([&local]).unwrap();
    assert_eq!(config.windows.minute_secs, 30);
    assert_eq!(config.windows.day_secs, 86_400);
    assert_eq!(config.resolution.unresolved, UnresolvedTier::Deny);
    assert!(config.catalog().is_ok());
}

#[test]
fn test_zero_window_rejected() {
    let file = write_config(&format!("[windows]\nminute_secs = 0\n{}", FULL_TIERS));
    let config = QuotaConfig::from_file(file.path()).unwrap();

    assert!(config.catalog().is_err());
}

#[test]
fn test_invalid_unresolved_policy_rejected() {
    let file = write_config(&format!(
        "[resolution]\nunresolved = \"gold\"\n{}",
        FULL_TIERS
    ));

    assert!(QuotaConfig::from_file(file.path()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(QuotaConfig::from_file(dir.path().join("absent.toml")).is_err());
}

#[tokio::test]
async fn test_engine_builder_applies_deny_policy() {
    let file = write_config(&format!(
        "[resolution]\nunresolved = \"deny\"\n{}",
        FULL_TIERS
    ));
    let config = QuotaConfig::from_file(file.path()).unwrap();
    assert_eq!(config.resolution.unresolved, UnresolvedTier::Deny);

    // The default resolver places everyone, so deny never triggers here.
    let engine = config.engine_builder().unwrap().build();
    let alice = Principal::new("alice");
    for _ in 0..10 {
        assert!(engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await.unwrap());
    }
    assert!(!engine.try_charge(&alice, LimitDimension::RequestsPerMinute, 1).await.unwrap());
}
