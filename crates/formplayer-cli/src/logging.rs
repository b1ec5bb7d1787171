//! Log output for the command line, always on stderr so prompts and
//! results on stdout stay clean.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins when set; otherwise `-v` raises the level from `warn`.
pub fn env_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

pub fn init(verbosity: u8) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .finish();
    // a subscriber installed by an embedding program takes precedence
    let _ = tracing::subscriber::set_global_default(subscriber);
}
