//! Domain model structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the input DTOs its repository accepts.

pub mod alert;
pub mod notification;
pub mod product;
pub mod push_token;
pub mod status_history;
pub mod sync_run;
pub mod user;
