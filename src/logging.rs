use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// `verbosity` maps 0/1/2+ to info/debug/trace for this crate; `RUST_LOG`
/// takes precedence when set.
pub fn init(verbosity: u8) {
    INIT_ONCE.call_once(|| {
        let level = match verbosity {
            0 => "treepatch=info",
            1 => "treepatch=debug",
            _ => "treepatch=trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_idempotent() {
        init(0);
        init(2);
    }
}
