use std::sync::Once;

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Initializes the global logger once.
///
/// Honours `RUST_LOG` when set, otherwise logs at [`DEFAULT_FILTER`]. Subsequent calls are ignored.
pub fn init_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
            .init();

        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_defaults_to_info() {
        init_logging();
        init_logging();

        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(log::max_level(), log::LevelFilter::Info);
        }
        assert!(INIT.is_completed());
    }
}
