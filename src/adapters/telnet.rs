//! Telnet adapter for the operator shell.
//!
//! Implements [`ShellPort`] over plain `std::net` sockets, which ESP-IDF
//! backs with lwIP, so the same code runs on the board and on the host.
//! One client at a time; a second connection waits in the backlog until
//! the first one leaves.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::ShellPort;
use crate::error::CommsError;

pub const TELNET_PORT: u16 = 23;

/// Longest accepted input line; the rest is discarded.
const LINE_CAP: usize = 128;
/// Interpret-as-command marker that opens a telnet negotiation triple.
const IAC: u8 = 0xFF;
const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub struct TelnetShell {
    port: u16,
    listener: Option<TcpListener>,
    client: Option<TcpStream>,
    pending: Vec<u8>,
}

impl TelnetShell {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            listener: None,
            client: None,
            pending: Vec::new(),
        }
    }

    /// Port actually bound, once open.  Differs from the requested one
    /// only when that was 0.
    pub fn local_port(&self) -> Option<u16> {
        Some(self.listener.as_ref()?.local_addr().ok()?.port())
    }

    fn try_accept(&mut self) -> Result<bool, CommsError> {
        let Some(listener) = self.listener.as_ref() else {
            return Err(CommsError::ShellIo);
        };
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(false).map_err(|_| CommsError::ShellIo)?;
                let _ = stream.set_nodelay(true);
                info!("shell: client {} connected", peer);
                self.client = Some(stream);
                self.pending.clear();
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => {
                warn!("shell: accept failed: {}", e);
                Err(CommsError::ShellIo)
            }
        }
    }

    /// Pop one complete line off the receive buffer, if there is one.
    fn take_line(&mut self) -> Option<heapless::String<LINE_CAP>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=end).collect();

        let mut line = heapless::String::new();
        let mut bytes = raw.iter().copied();
        while let Some(b) = bytes.next() {
            match b {
                IAC => {
                    bytes.next();
                    bytes.next();
                }
                b'\r' | b'\n' => {}
                0x20..=0x7E => {
                    if line.push(b as char).is_err() {
                        break;
                    }
                }
                _ => {}
            }
        }
        Some(line)
    }
}

impl ShellPort for TelnetShell {
    fn open(&mut self) -> Result<(), CommsError> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).map_err(|e| {
            warn!("shell: bind to port {} failed: {}", self.port, e);
            CommsError::ShellStartFailed
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|_| CommsError::ShellStartFailed)?;
        info!("shell: listening on port {}", self.port);
        self.listener = Some(listener);
        Ok(())
    }

    fn read_line(&mut self, timeout_ms: u32) -> Result<Option<heapless::String<128>>, CommsError> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout_ms));

        while self.client.is_none() {
            if self.try_accept()? {
                break;
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(ACCEPT_POLL);
        }

        let mut chunk = [0u8; 64];
        loop {
            if let Some(line) = self.take_line() {
                debug!("shell: < {}", line);
                return Ok(Some(line));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let Some(client) = self.client.as_mut() else {
                return Err(CommsError::ShellDisconnected);
            };
            client
                .set_read_timeout(Some(deadline - now))
                .map_err(|_| CommsError::ShellIo)?;
            match client.read(&mut chunk) {
                Ok(0) => {
                    info!("shell: client hung up");
                    self.client = None;
                    return Err(CommsError::ShellDisconnected);
                }
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if self.pending.len() > LINE_CAP * 4 && !self.pending.contains(&b'\n') {
                        self.pending.clear();
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(None);
                }
                Err(e) => {
                    warn!("shell: read failed: {}", e);
                    self.client = None;
                    return Err(CommsError::ShellDisconnected);
                }
            }
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::ShellIo)?;
        client
            .write_all(line.as_bytes())
            .and_then(|()| client.write_all(b"\r\n"))
            .map_err(|e| {
                debug!("shell: write failed: {}", e);
                CommsError::ShellIo
            })
    }

    fn close(&mut self) {
        if self.client.take().is_some() {
            info!("shell: client dropped");
        }
        self.listener = None;
        self.pending.clear();
    }
}
