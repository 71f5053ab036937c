//! Domain types and pure logic for the medication availability sync.
//!
//! No database, network or async code lives here: parsers, the status
//! classification rule, reconciliation, change ordering and alert matching
//! are plain functions over owned data so they can be unit tested directly.

pub mod alerts;
pub mod availability;
pub mod change_detection;
pub mod channels;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod types;
