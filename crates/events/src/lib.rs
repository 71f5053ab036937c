//! Notification delivery for medication status changes.
//!
//! - [`NotificationFanout`]: turns one change event into push, in-app and
//!   email notifications for every subscribed user.
//! - [`delivery`]: external delivery channels (Expo push, SMTP email).

pub mod delivery;
pub mod fanout;

pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::push::{ExpoPushSender, PushBatchResult, PushConfig, PushMessage, PushSender};
pub use fanout::{FailedRecord, FanoutError, FanoutReport, NotificationFanout};
