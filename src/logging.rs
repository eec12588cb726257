//! Thin `tracing` init helper for test binaries, mirroring the teacher's
//! `core/src/logging/logging_api.rs` shim style (small wrapper functions
//! around `tracing`/`tracing-subscriber`, not a bespoke logging stack).
//!
//! The crate itself never installs a global subscriber — that is always
//! the embedding application's call — it only emits events.

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
