use mb_core::config::Config;
use mb_harness::quota::{QuotaStatus, UsageLedger};
use std::sync::Arc;

fn ledger_with_limit(key: &str, limit: f64) -> UsageLedger {
    let mut cfg = Config::default();
    cfg.quota.insert(key.to_string(), limit);
    UsageLedger::from_config(&cfg)
}

#[test]
fn usage_at_limit_is_exceeded() {
    let ledger = ledger_with_limit("gemini-pro", 10.0);
    ledger.record_usage("gemini-pro", 10.0);
    assert_eq!(ledger.check_quota("gemini-pro"), QuotaStatus::Exceeded);
}

#[test]
fn usage_below_limit_is_within() {
    let ledger = ledger_with_limit("gemini-pro", 10.0);
    ledger.record_usage("gemini-pro", 9.0);
    assert_eq!(ledger.check_quota("gemini-pro"), QuotaStatus::Within);
}

#[test]
fn unconfigured_key_is_always_within() {
    let ledger = ledger_with_limit("gemini-pro", 10.0);
    ledger.record_usage("gemini-flash", 1_000_000.0);
    assert_eq!(ledger.check_quota("gemini-flash"), QuotaStatus::Within);
    assert_eq!(ledger.check_quota("never-seen"), QuotaStatus::Within);
}

#[test]
fn zero_limit_is_exceeded_immediately() {
    let ledger = ledger_with_limit("disabled", 0.0);
    assert!(ledger.check_quota("disabled").is_exceeded());
}

#[test]
fn check_quota_does_not_mutate() {
    let ledger = ledger_with_limit("k", 5.0);
    ledger.record_usage("k", 2.0);
    let before = ledger.get_status();
    ledger.check_quota("k");
    ledger.check_quota("other");
    assert_eq!(ledger.get_status(), before);
}

#[test]
fn concurrent_usage_is_not_lost() {
    let ledger = Arc::new(UsageLedger::default());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    ledger.record_usage("shared", 1.0);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(ledger.usage("shared"), 4000.0);
}

#[test]
fn daily_briefing_returns_full_map() {
    let ledger = ledger_with_limit("a", 1.0);
    ledger.record_usage("a", 1.0);
    ledger.record_usage("b", 3.0);
    let briefing = ledger.daily_briefing();
    assert_eq!(briefing.len(), 2);
    assert_eq!(briefing["b"], 3.0);
}
