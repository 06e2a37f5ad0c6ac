//! Lumen device agent library.
//!
//! Exposes the wire protocol, device session, and transport driver.
//! The main entry point is the `lumen` binary.

pub mod channel;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
