//! Log output for the host process.

use dynmorph_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered at the configured level.
///
/// `RUST_LOG` takes precedence over `log_level` when set. Returns `false`
/// if a global subscriber was already installed, so calling this more than
/// once is harmless.
pub fn init_logging(config: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(level = %config.log_level, "Logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = GeneralConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }

    #[test]
    fn bogus_level_falls_back() {
        let config = GeneralConfig {
            log_level: "not a level [".to_string(),
            ..GeneralConfig::default()
        };
        // Must not panic whether or not another test installed a subscriber.
        init_logging(&config);
    }
}
