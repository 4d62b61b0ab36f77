pub mod identity;
pub mod pii;
pub mod notification;
pub mod dispatcher;

pub use identity::Principal;
pub use pii::Masked;
pub use notification::{EmailMessage, LogNotifier, Notifier, NotifyError};
pub use dispatcher::{DispatchPolicy, DispatchStats, NotificationDispatcher, NotificationQueue};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}
