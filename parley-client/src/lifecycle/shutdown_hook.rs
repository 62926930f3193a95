use crate::lifecycle::lifecycle_controller::LifecycleController;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

impl LifecycleController {
    /// Runs `leave()` when the process is asked to terminate. The departure
    /// announcement may still be lost if the timeout expires first.
    pub fn install_shutdown_hook(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            termination_signal().await;
            info!("Termination requested, leaving the room");

            let timeout = controller.config().shutdown_timeout;
            if tokio::time::timeout(timeout, controller.leave()).await.is_err() {
                warn!("Leave did not finish within {:?}", timeout);
            }
        })
    }
}

/// Ctrl-C, or SIGTERM on unix.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
