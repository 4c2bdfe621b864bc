//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own business rules (daily uniqueness, last-admin protection).
//!
//! # Invariants
//! - Services never bypass repository persistence contracts.
//! - Services stay storage-agnostic; they are generic over repository traits.

pub mod attendance_service;
pub mod qr_service;
pub mod user_service;
