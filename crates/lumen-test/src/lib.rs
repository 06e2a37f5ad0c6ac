//! Test harnesses for the Lumen device agent.
//!
//! Provides `TestChannel`, an in-process mock device channel, plus CLI
//! regression tests for the `lumen` binary.

#[cfg(test)]
pub mod cli;
pub mod channel;

pub use channel::{DevicePeer, TestChannel, TestError};
