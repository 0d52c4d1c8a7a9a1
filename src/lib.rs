//! # EnOcean Gateway Library
//!
//! Talk to an EnOcean 4 click (TCM 310) gateway over its ESP3 serial link.
//!
//! This library provides the ESP3 framing engine: a byte accumulator fed from
//! the UART receive path, a packet parser that validates the header and
//! payload checksums and dispatches decoded packets, and the matching
//! encoder for outbound packets.

pub mod capture;
pub mod config;
pub mod error;
pub mod esp3;
pub mod serial;
