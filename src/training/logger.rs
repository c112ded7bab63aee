use std::path::Path;

use tracing_core::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{filter::filter_fn, registry, Layer};

/// If a global tracing subscriber is not already configured, write the experiment log to
/// `file_path` and report panics there too.
///
/// Records from the `log` crate are forwarded to the file.
pub fn install_file_logger(file_path: &str) {
    let path = Path::new(file_path);
    let Some(file_name) = path.file_name() else {
        log::warn!("Not logging to '{file_path}', it does not name a file");
        return;
    };
    let writer = tracing_appender::rolling::never(
        path.parent().unwrap_or_else(|| Path::new(".")),
        file_name,
    );
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(LevelFilter::INFO)
        .with_filter(filter_fn(|metadata| {
            // Only records emitted by this crate.
            metadata
                .module_path()
                .map_or(true, |path| path.starts_with(env!("CARGO_CRATE_NAME")))
        }));

    if registry().with(layer).try_init().is_ok() {
        log_panics(file_path);
    }
}

fn log_panics(file_path: &str) {
    let previous = std::panic::take_hook();
    let file_path = file_path.to_owned();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("Training aborted: {info}");
        eprintln!("Training aborted, the experiment log is at '{file_path}'");
        previous(info);
    }));
}
