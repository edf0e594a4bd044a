//! Debugger bridge: the one external surface of the crate.
//!
//! A line-delimited JSON protocol over TCP, plus assembly of the bootstrap
//! script (with the user's custom type registry spliced in) that is shipped
//! to the debuggee on attach.

pub mod bootstrap;
pub mod client;
pub mod message;

pub use bootstrap::{build_bootstrap, custom_types_script};
pub use client::DebugClient;
pub use message::{DELIMITER, DebugMessage, decode, encode};
