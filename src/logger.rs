use crate::model::config::LoggingConfig;
use env_logger::{Builder, Target, WriteStyle};
use log::{Level, LevelFilter};
use std::env;
use std::io::Write;

/// Install the process logger. `verbose` forces debug output; otherwise the
/// configured level applies, and `RUST_LOG` overrides both.
///
/// Logs go to stderr so generated SQL on stdout can be piped.
pub fn setup_logger(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        logging.level.parse().unwrap_or(LevelFilter::Info)
    };

    let mut builder = Builder::new();
    builder.filter(None, level);
    builder.target(Target::Stderr);
    builder.write_style(if logging.colored { WriteStyle::Auto } else { WriteStyle::Never });

    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        match record.level() {
            Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args()),
        }
    });

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    }

    // A second call (e.g. from tests) keeps the first logger
    let _ = builder.try_init();
}
