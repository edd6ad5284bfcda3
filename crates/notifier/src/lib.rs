//! Notification dispatcher.
//!
//! A pure consumer of order and payment events: it never writes rows and
//! never republishes. Delivery is best-effort — per-channel failures are
//! logged and swallowed, and the broker message is always acknowledged.

pub mod dispatcher;
pub mod senders;

pub use dispatcher::{
    NOTIFICATIONS_ORDERS_QUEUE, NOTIFICATIONS_PAYMENTS_QUEUE, NotificationDispatcher,
    subscribe_notifications,
};
pub use senders::{
    Contact, ContactSource, EmailSender, InMemoryContactSource, LoggingEmailSender,
    LoggingSmsSender, RecordingEmailSender, RecordingSmsSender, SendError, SmsSender,
};
