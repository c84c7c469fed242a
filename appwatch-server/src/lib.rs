//! # appwatch-server — Application Monitor Service
//!
//! Background service that watches the visible, windowed applications
//! on this machine and streams additions, removals and focus changes to
//! one connected client over TCP. Key commands sent back by the client
//! are replayed into the local input stream.
//!
//! Exactly one client is served at a time; when it disconnects the
//! service goes back to accepting.

pub mod config;
pub mod service;
