//! Diagnostic tracing for zup.
//!
//! The heal loop, the shell executor and the advisor each open a span
//! (`heal`, `execute`, `suggest_fix`) recording the command, its mode and
//! the model. Exit codes, search path lookups and poll attempts are logged at
//! `debug`; advisor failures and fix-limit hits at `warn`. None of this is
//! part of the run's user-facing output, which `io::console` prints to stdout
//! regardless of `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn";

/// Install the stderr subscriber, filtered by `RUST_LOG`.
///
/// To follow every attempt and fix of a failing step:
/// ```bash
/// RUST_LOG=zup::heal=debug,zup::io::process=debug zup run
/// ```
pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(filter_from(directives.as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// `RUST_LOG` directives, or `warn` when they are unset or unparsable.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_filter_defaults_to_warn() {
        assert_eq!(filter_from(None).to_string(), "warn");
        assert_eq!(filter_from(Some("  ")).to_string(), "warn");
    }

    #[test]
    fn module_directives_are_kept() {
        assert_eq!(
            filter_from(Some("zup::heal=debug")).to_string(),
            "zup::heal=debug"
        );
    }
}
