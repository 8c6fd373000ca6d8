//! sima-iot-runtime: session controller and monitor plumbing.
//! The `sima-iot` binary is a thin CLI over these modules; embedders can
//! drive a [`session::Session`] with any connector directly.

pub mod cli;
pub mod config;
pub mod control;
pub mod monitor;
pub mod producer;
pub mod session;
pub mod simulate_cmd;
pub mod source;
