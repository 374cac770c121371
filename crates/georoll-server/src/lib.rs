//! # georoll-server
//!
//! HTTP server library for the georoll GPS class check-in system.
//!
//! This library provides the API handlers, state management, logging setup
//! and the background sweep that closes sessions at the end of their window.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
pub mod sweep;
