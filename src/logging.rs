//! Tracing setup for the sidecar. Logs go to stderr; stdout carries the
//! JSON-lines protocol and must stay clean.
//!
//! Filter priority: `RECORDBOOKD_LOG`, then `RUST_LOG`, then `warn`.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RECORDBOOKD_LOG";

pub fn init() {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .without_time()
        .compact();

    // try_init: a subscriber set by an embedding harness wins.
    let _ = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(fmt_layer)
        .try_init();
}

fn build_env_filter() -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new("warn")
}
