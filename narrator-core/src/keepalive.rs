//! Keeps background audio and the media session alive during narration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::ports::{KeepAliveBackend, MediaAction};

pub struct KeepAliveSignal {
    backend: Arc<dyn KeepAliveBackend>,
    active: AtomicBool,
    actions_tx: mpsc::UnboundedSender<MediaAction>,
    actions_rx: Mutex<Option<mpsc::UnboundedReceiver<MediaAction>>>,
    handlers_registered: AtomicBool,
}

impl KeepAliveSignal {
    pub fn new(backend: Arc<dyn KeepAliveBackend>) -> Self {
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            active: AtomicBool::new(false),
            actions_tx,
            actions_rx: Mutex::new(Some(actions_rx)),
            handlers_registered: AtomicBool::new(false),
        }
    }

    /// Begin the signal and register media handlers. No-op when already running.
    pub fn start(&self) -> Result<()> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.handlers_registered.swap(true, Ordering::SeqCst) {
            self.backend.register_media_handlers(self.actions_tx.clone());
        }

        if let Err(e) = self.backend.start_signal() {
            self.active.store(false, Ordering::SeqCst);
            return Err(e);
        }

        log::debug!("Keep-alive signal started");
        Ok(())
    }

    /// Tear the signal down. No-op when not running.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.backend.stop_signal();
            log::debug!("Keep-alive signal stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Take the receiver of media actions. Only the first call gets it.
    pub fn take_actions(&self) -> Option<mpsc::UnboundedReceiver<MediaAction>> {
        self.actions_rx.lock().ok().and_then(|mut rx| rx.take())
    }
}
