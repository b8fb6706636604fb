//! Integration tests for claimrace-bot.
//!
//! These tests drive the whole stack through the observer socket:
//! - Request validation and the single error event
//! - Handshake events, scheduling and the claim race
//! - Exhaustion reporting

pub mod common;
