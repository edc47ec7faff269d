use mb_telemetry::logging;

#[test]
fn init_logging_human() {
    // Should not panic; second call is a safe no-op.
    logging::init_logging("test-service", "debug");
    logging::init_logging("test-service", "info");

    tracing::info!(key = "value", "human-readable log line");
}

#[test]
fn init_logging_json() {
    // The global subscriber is already set by whichever test ran first,
    // so this silently no-ops.
    logging::init_logging_json("test-service-json", "info");

    tracing::info!(key = "value", "json log line");
}

#[test]
fn init_for_format_accepts_both_formats() {
    logging::init_for_format("fmt-test", "warn", "json");
    logging::init_for_format("fmt-test", "warn", "pretty");
}

#[test]
fn bogus_default_level_does_not_panic() {
    logging::init_logging("bogus-level", "not a [valid filter");
}
