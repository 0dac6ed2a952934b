//! Outbound email dispatch.
//!
//! The [Notifier] trait is the seam between the auth flows and the actual
//! mail transport, so tests can swap in an in-memory double. The real
//! implementation, [SmtpNotifier], sends over SMTP with TLS.

use lettre::{
    Message, SmtpTransport, Transport,
    message::Mailbox,
    transport::smtp::authentication::Credentials,
};

use crate::Error;

/// Sends an email to a single recipient.
///
/// Implementations should be cheap to call from request handlers; the
/// caller treats failures as [Error::EmailSendFailed] and does not retry.
pub trait Notifier: Send + Sync {
    /// Send an email.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmailSendFailed] if the message could not be built
    /// or dispatched.
    fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<(), Error>;
}

/// A [Notifier] that dispatches mail over an authenticated SMTP relay.
pub struct SmtpNotifier {
    sender: Mailbox,
    transport: SmtpTransport,
}

impl SmtpNotifier {
    /// Create a notifier that relays through `host` with the given
    /// credentials, sending from `sender`.
    ///
    /// # Errors
    ///
    /// Returns [Error::EmailSendFailed] if `sender` is not a valid
    /// mailbox or the relay configuration is invalid.
    pub fn new(host: &str, username: &str, password: &str, sender: &str) -> Result<Self, Error> {
        let sender = sender
            .parse()
            .map_err(|error| Error::EmailSendFailed(format!("invalid sender address: {error}")))?;

        let transport = SmtpTransport::relay(host)
            .map_err(|error| Error::EmailSendFailed(error.to_string()))?
            .credentials(Credentials::new(username.to_owned(), password.to_owned()))
            .build();

        Ok(Self { sender, transport })
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, to_address: &str, subject: &str, body: &str) -> Result<(), Error> {
        let to = to_address
            .parse()
            .map_err(|error| Error::EmailSendFailed(format!("invalid recipient: {error}")))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .body(body.to_owned())
            .map_err(|error| Error::EmailSendFailed(error.to_string()))?;

        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|error| Error::EmailSendFailed(error.to_string()))
    }
}
