//! Park Payments - payment settlement core for the park management backend.
//!
//! Takes payments and donations from creation through a card or wallet
//! provider to a settled outcome, and keeps local records consistent with
//! what the provider reports:
//!
//! - dual-currency amounts fixed at creation from a cached exchange rate
//! - one status graph for payments and donations, written only by
//!   compare-and-swap
//! - synchronous processing, webhook reconciliation and a sweep for
//!   records stuck in PROCESSING
//! - enrollment outcome cascade, audit trail and user notifications

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
