//! # Kernel Console Logging
//!
//! A [`log::Log`] backend that writes every record to the system console, one
//! line per record:
//!
//! ```text
//! [DEBUG] vm: fault: 0x00400000
//! ```
//!
//! The console itself is a [`ConsoleSink`]: anything that can accept bytes.
//! The kernel binds it to its `putch` routine; tests bind it to a buffer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kernel_console::{ConsoleLogger, ConsoleSink};
//! use log::{LevelFilter, info};
//!
//! struct Putch;
//! impl ConsoleSink for Putch {
//!     fn write_bytes(&self, _bytes: &[u8]) { /* hand off to the UART */ }
//! }
//!
//! static CONSOLE: Putch = Putch;
//!
//! ConsoleLogger::new(&CONSOLE, LevelFilter::Debug).init().ok();
//! info!("VM subsystem ready");
//! ```
//!
//! Logging is best-effort: formatting errors are dropped, and nothing is
//! allocated.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod logger;

pub use logger::{ConsoleLogger, ConsoleSink};
