//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is unset.
///
/// An explicit level wins over `--verbose`.
pub fn log_directive(verbose: bool, log_level: Option<&str>) -> String {
    match log_level {
        Some(level) => level.to_string(),
        None if verbose => "debug".to_string(),
        None => "info".to_string(),
    }
}

/// Install the global subscriber, writing to stderr so stdout stays readable.
pub fn init_tracing(verbose: bool, log_level: Option<&str>, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_directive(verbose, log_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_beats_verbose() {
        assert_eq!(log_directive(true, Some("warn")), "warn");
        assert_eq!(log_directive(true, None), "debug");
        assert_eq!(log_directive(false, None), "info");
    }
}
