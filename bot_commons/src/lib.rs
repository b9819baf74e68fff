//! Shared plumbing for the bot: logging/runtime bootstrap and
//! message-sending helpers that would otherwise be boilerplate.

use std::future::Future;

pub mod useful_methods;

/// Initialize logging and run the `closure` in a fresh async runtime.
/// Logging defaults to level `info` unless overridden by the `RUST_LOG`
/// environment variable. Uses [pretty_env_logger][] internally.
///
/// [pretty_env_logger]: https://docs.rs/pretty_env_logger
pub fn start_everything(closure: impl Future<Output = ()>) {
    let log_level = std::env::var_os("RUST_LOG")
        .unwrap_or_else(|| std::ffi::OsString::from("info"))
        .into_string()
        .unwrap_or_else(|_| String::from("info"));

    // systemd's journal stamps lines itself; don't double up on timestamps.
    let running_as_systemd_service = std::env::var_os("JOURNAL_STREAM").is_some();

    let mut builder = match running_as_systemd_service {
        true => pretty_env_logger::formatted_builder(),
        false => pretty_env_logger::formatted_timed_builder(),
    };

    builder.parse_filters(&log_level);

    if builder.try_init().is_err() {
        log::error!("Tried to init logger twice!");
    }

    log::info!("hi");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(closure);
}
