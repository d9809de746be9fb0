use tokio::sync::watch;

/// Owner side of a cooperative cancellation signal.
///
/// Cancellation is sticky: once [CancelHandle::cancel] has been called, every listener, including
/// listeners created afterwards, observes the cancelled state. Dropping the handle without calling
/// `cancel` does not cancel anything.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            sender: watch::channel(false).0,
        }
    }

    pub fn cancel(&self) {
        // `send_replace` never fails, even with no listeners, so late listeners still see the flag.
        if !self.sender.send_replace(true) {
            log::trace!("Cancellation signalled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelListener {
    receiver: watch::Receiver<bool>,
}

impl CancelListener {
    /// Point in time check. Work that is about to publish results should check this at each
    /// suspension point and stop if it returns true.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Fail with [CancelledError] if cancellation has been signalled.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError::default())
        } else {
            Ok(())
        }
    }

    /// Wait until cancellation is signalled. It is safe to race this with another future so that
    /// the other work is abandoned on cancellation.
    ///
    /// If the owning [CancelHandle] is dropped without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct CancelledError {
    msg: String,
}

impl Default for CancelledError {
    fn default() -> Self {
        Self {
            msg: "Operation cancelled".to_string(),
        }
    }
}
