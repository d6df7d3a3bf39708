//! Cooperative cancellation for capture sessions
//!
//! The decode loop polls the token between frames only; a read that has
//! started always finishes or times out on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Cancel this token on the first Ctrl-C.
    ///
    /// Runs a current-thread tokio runtime on a helper thread that only
    /// waits for the signal; the capture loop itself stays synchronous.
    pub fn cancel_on_ctrl_c(&self) -> std::io::Result<thread::JoinHandle<()>> {
        let token = self.clone();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("ctrl-c-watch".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            info!("interrupt received, stopping after current frame");
                            token.cancel();
                        }
                        Err(e) => warn!(error = %e, "could not listen for ctrl-c"),
                    }
                });
            })
    }
}
