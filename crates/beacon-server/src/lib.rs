//! # beacon-server
//!
//! HTTP host for beacon detection.
//!
//! This library provides the API handlers, scan orchestration and state
//! management used by the `beacon-server` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod scanner;
pub mod state;
