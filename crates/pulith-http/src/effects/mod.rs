//! I/O side of the crate: the fetch orchestrator.
//!
//! Everything here is async and talks to the network through
//! [`crate::net::Transport`]. Pure decisions (redirect handling, outbound
//! headers, content coding) live in [`crate::core`].

mod client;

pub use client::{Client, fetch};
