//! Blocking TCP client for the debuggee.
//!
//! The bridge speaks line-delimited [`DebugMessage`]s. Connection setup
//! sends the assembled bootstrap script as the first message; after that
//! the caller drives request/response with callback ids.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use crate::bridge::bootstrap::build_bootstrap;
use crate::bridge::message::{self, DebugMessage};
use crate::config::DebuggerConfig;
use crate::error::{IntelError, IntelResult};

pub struct DebugClient {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    next_callback: AtomicU64,
}

impl DebugClient {
    pub fn connect(config: &DebuggerConfig) -> IntelResult<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let stream = TcpStream::connect(&addr).map_err(|e| IntelError::Bridge {
            reason: format!("cannot connect to {addr}: {e}"),
        })?;
        let reader = BufReader::new(stream.try_clone()?);
        tracing::info!(target: "bridge", "connected to debuggee at {addr}");
        Ok(Self {
            writer: stream,
            reader,
            next_callback: AtomicU64::new(1),
        })
    }

    /// Ship the bootstrap script, the first message of every session.
    pub fn send_bootstrap(&mut self, config: &DebuggerConfig) -> IntelResult<u64> {
        let script = build_bootstrap(config)?;
        self.request(DebugMessage::new("initReq", json!({ "code": script })))
    }

    /// Send a message with a fresh callback id; returns the id.
    pub fn request(&mut self, message: DebugMessage) -> IntelResult<u64> {
        let id = self.next_callback.fetch_add(1, Ordering::Relaxed);
        self.send(&message.with_callback(id))?;
        Ok(id)
    }

    pub fn send(&mut self, message: &DebugMessage) -> IntelResult<()> {
        let wire = message::encode(message)?;
        self.writer.write_all(wire.as_bytes())?;
        self.writer.flush()?;
        tracing::debug!(target: "bridge", "sent {}", message.cmd);
        Ok(())
    }

    /// Read the next message. `None` when the peer closed the stream.
    pub fn recv(&mut self) -> IntelResult<Option<DebugMessage>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let message = message::decode(&line)?;
        tracing::debug!(target: "bridge", "received {}", message.cmd);
        Ok(Some(message))
    }
}
