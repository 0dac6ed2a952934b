//! In-memory [Notifier] doubles for tests.

use std::sync::{Arc, Mutex};

use crate::{Error, Notifier};

/// An email captured by [RecordingNotifier].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentEmail {
    pub(crate) to_address: String,
    pub(crate) subject: String,
    pub(crate) body: String,
}

/// A [Notifier] that records every email instead of sending it.
pub(crate) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl RecordingNotifier {
    /// Record emails into `sent`, which the test keeps a handle to.
    pub(crate) fn new(sent: Arc<Mutex<Vec<SentEmail>>>) -> Self {
        Self { sent }
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<(), Error> {
        self.sent
            .lock()
            .expect("Could not acquire notifier lock")
            .push(SentEmail {
                to_address: to_address.to_owned(),
                subject: subject.to_owned(),
                body: body.to_owned(),
            });

        Ok(())
    }
}

/// A [Notifier] whose dispatch always fails.
pub(crate) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _to_address: &str, _subject: &str, _body: &str) -> Result<(), Error> {
        Err(Error::EmailSendFailed("smtp relay unavailable".to_owned()))
    }
}
