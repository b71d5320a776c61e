//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Safe to call multiple
/// times; subsequent calls are no-ops.
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .try_init();
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        init("info");
        init("info");
    }

    #[test]
    fn test_scoped_debug_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter("debug"))
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(org_id = "org-1", "scoped subscriber");
        });
    }
}
