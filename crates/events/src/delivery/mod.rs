//! External delivery channels for status notifications.

pub mod email;
pub mod push;
