//! Logger setup.
//!
//! `log` facade with the `env_logger` backend. `RUST_LOG`, when set, wins;
//! otherwise `-q` means errors only, the default is info, `-v` is debug and
//! `-vv` is trace. Verbose levels add a timestamp and the module path.

use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Install the global logger. Later calls are ignored.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    let from_env = std::env::var_os("RUST_LOG").is_some();

    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    if verbose > 0 {
        builder.format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.args()
            )
        });
    } else {
        builder.format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(buf, "{style}{:<5}{style:#} {}", record.level(), record.args())
        });
    }

    if builder.try_init().is_ok() {
        log::debug!(
            "Logging initialized ({})",
            if from_env {
                "RUST_LOG".to_string()
            } else {
                format!("{:?}", level_for(verbose, quiet))
            }
        );
    }
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}
