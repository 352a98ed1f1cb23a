//! Domain layer - pure business rules, no I/O.

pub mod foundation;
pub mod payment;
