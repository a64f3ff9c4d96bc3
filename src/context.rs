use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::EventLog;
use crate::ledger::Ledger;
use crate::models::Progress;

/// State shared by the components of one batch run.
///
/// The run loop is the only writer of the ledger and progress; everyone else
/// reads snapshots.
#[derive(Clone)]
pub struct RunContext {
    pub ledger: Arc<dyn Ledger>,
    pub events: Arc<EventLog>,
    pub cancel: CancellationToken,
    progress: Arc<watch::Sender<Progress>>,
}

impl RunContext {
    pub fn new(ledger: Arc<dyn Ledger>, events: Arc<EventLog>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            ledger,
            events,
            cancel: CancellationToken::new(),
            progress: Arc::new(progress),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request cancellation; takes effect at the next item boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn report(&self, progress: Progress) {
        self.progress.send_replace(progress);
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }
}
