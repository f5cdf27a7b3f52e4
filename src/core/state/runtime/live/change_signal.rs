use tokio::sync::watch;

/// Per-kind wake-up for dashboard readers.
///
/// Only the latest index revision is kept, so any number of mutations
/// between two reads collapse into one wake-up.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    rx: watch::Receiver<u64>,
}

impl ChangeSignal {
    pub(crate) fn new(rx: watch::Receiver<u64>) -> Self {
        Self { rx }
    }

    /// A signal that never fires again.
    pub(crate) fn closed() -> Self {
        let (_, rx) = watch::channel(0);
        Self { rx }
    }

    /// Waits for the next change. Returns `false` once the store has
    /// stopped and no further changes will come.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Consumes a pending change without waiting.
    pub fn take_pending(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => {
                self.rx.borrow_and_update();
                true
            }
            _ => false,
        }
    }

    /// Revision of the most recent change that was posted.
    pub fn revision(&self) -> u64 {
        *self.rx.borrow()
    }
}
