//! # appwatch-client — Console Client
//!
//! Connects to one or more `appwatch-server`s, decodes each change stream
//! into a local mirror of that server's application list and prints each
//! change. Can also send a key command for the servers to replay, either
//! to all of them or only to those focused on a named application.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod display;
