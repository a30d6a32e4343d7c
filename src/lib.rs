//! Labflow allocation client
//!
//! Date-window rules, status badges and a typed HTTP client for the
//! laboratory request allocation workflow.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod view;

pub use auth::{Role, SessionProvider};
pub use client::{AllocationApi, AllocationStatusClient};
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
pub use services::{DateWindow, DateWindowEvaluator, WindowStatus};
pub use view::RequestAllocationView;
