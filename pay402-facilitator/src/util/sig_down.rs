//! Graceful shutdown on SIGINT/SIGTERM.

use tokio_util::sync::CancellationToken;

/// Watches termination signals and exposes a cancellation token.
#[derive(Debug)]
pub struct SigDown {
    token: CancellationToken,
}

impl SigDown {
    /// Installs the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an error when the SIGTERM handler cannot be registered.
    pub fn try_new() -> std::io::Result<Self> {
        let token = CancellationToken::new();

        let ctrl_c_token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c_token.cancel();
            }
        });

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            let sigterm_token = token.clone();
            tokio::spawn(async move {
                if sigterm.recv().await.is_some() {
                    sigterm_token.cancel();
                }
            });
        }

        Ok(Self { token })
    }

    /// Returns the token cancelled on the first termination signal.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}
