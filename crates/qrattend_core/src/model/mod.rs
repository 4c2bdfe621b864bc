//! Domain model for users, roles and attendance records.
//!
//! # Invariants
//! - Users and attendance records are identified by positive integer ids
//!   assigned by the store.
//! - An attendance record is never mutated after creation.

pub mod attendance;
pub mod page;
pub mod user;
