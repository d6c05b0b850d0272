#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `lifter` command-line entry point.

mod cli;
mod commands;
mod error_fmt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    // A second install (tests) is harmless; only the first hook wins.
    let _ = color_eyre::install();

    let code = match try_main(&cli) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn try_main(cli: &Cli) -> eyre::Result<()> {
    // Console logging first so config errors are visible; the file layer needs
    // the config, so it is attached once that has loaded.
    let cfg_text = std::fs::read_to_string(&cli.config).ok();
    let logging = cfg_text
        .as_deref()
        .and_then(|t| lifter_config::load_toml(t).ok())
        .map(|c| c.logging)
        .unwrap_or_default();
    init_tracing(cli.json, &cli.log_level, &logging);

    let cfg = commands::load_config(&cli.config, cli.rates.as_deref())?;
    let state = commands::state_path(&cfg, cli.state.as_deref());
    tracing::debug!(config = %cli.config.display(), state = %state.display(), "config loaded");

    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc(Arc::clone(&stop));

    commands::run(&cli.cmd, &cfg, &state, stop, cli.json)
}

/// Ctrl-C raises the stop flag; the running burst releases and records.
fn install_ctrlc(stop: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
    }
}

fn init_tracing(json: bool, level: &str, logging: &lifter_config::Logging) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Console logs go to stderr so stdout stays the command's output.
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let file_layer = logging.file.as_deref().and_then(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path.file_name()?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let filter = EnvFilter::new(logging.level.as_deref().unwrap_or("info"));
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();
}
