//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod alert_repo;
pub mod notification_repo;
pub mod product_repo;
pub mod push_token_repo;
pub mod status_history_repo;
pub mod sync_run_repo;
pub mod user_repo;

pub use alert_repo::AlertRepo;
pub use notification_repo::NotificationRepo;
pub use product_repo::ProductRepo;
pub use push_token_repo::PushTokenRepo;
pub use status_history_repo::StatusHistoryRepo;
pub use sync_run_repo::SyncRunRepo;
pub use user_repo::UserRepo;
