//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL controls the filter, either a level ("debug") or full
//!   directives ("info,pipeline=debug,llm=info,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Events use three targets: `pipeline` (stage sequencing, assembly), `llm`
//! (provider calls) and `quizforge_backend` (startup, config, data loading).

use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,pipeline=debug,quizforge_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
