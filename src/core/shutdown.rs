//! OS termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves on the first of SIGINT, SIGTERM or
//! SIGQUIT (Ctrl-C elsewhere). The orchestrator races it against sequence
//! completion and stops the sequence when it fires, killing the active process.

/// Waits for a termination signal.
///
/// Returns `Err` if a handler cannot be registered.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
