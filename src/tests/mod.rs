//! Shared test tooling and end-to-end router tests
//!
//! - [`support`] spawns throwaway axum servers for client tests
//! - [`doubles`] provides scripted in-memory downstreams with call logs
//! - [`download_flow`] drives the full router through `oneshot`

pub mod support;
