//! Stand-in ECON console for development and tests.
//!
//! Speaks the server side of the handshake (prompt, password check, verdict)
//! and then hands back a session that can push log lines to the connected
//! client and read the commands it sends.

use log::info;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::sleep;

pub const PASSWORD_PROMPT: &str = "Enter password:";
pub const AUTH_SUCCESS: &str = "Authentication successful. External console access granted.";
pub const AUTH_FAILURE: &str = "Wrong password.";

pub struct FakeConsole {
    listener: TcpListener,
    password: String,
    auth_delay: Duration,
}

impl FakeConsole {
    pub async fn bind(addr: &str, password: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            password: password.to_string(),
            auth_delay: Duration::ZERO,
        })
    }

    /// Holds back the handshake verdict, to keep a client mid-handshake
    pub fn with_auth_delay(mut self, delay: Duration) -> Self {
        self.auth_delay = delay;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one client and runs the handshake.
    ///
    /// Returns `None` when the client hung up or sent the wrong password.
    pub async fn accept(&self) -> io::Result<Option<ConsoleSession>> {
        let (stream, peer) = self.listener.accept().await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = ConsoleReader {
            lines: BufReader::new(read_half),
        };
        let mut writer = ConsoleWriter { half: write_half };

        writer.send_line(PASSWORD_PROMPT).await?;
        let password = match reader.recv_line().await? {
            Some(password) => password,
            None => return Ok(None),
        };

        if !self.auth_delay.is_zero() {
            sleep(self.auth_delay).await;
        }

        if password != self.password {
            info!("Console client {} sent the wrong password", peer);
            writer.send_line(AUTH_FAILURE).await?;
            writer.close().await?;
            return Ok(None);
        }

        writer.send_line(AUTH_SUCCESS).await?;
        info!("Console client {} authenticated", peer);

        Ok(Some(ConsoleSession {
            peer,
            reader,
            writer,
        }))
    }
}

/// Lines the console client sends (commands after the handshake)
pub struct ConsoleReader {
    lines: BufReader<OwnedReadHalf>,
}

impl ConsoleReader {
    /// Next line without its terminator, or `None` at end-of-stream
    pub async fn recv_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.lines.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

/// Log output going to the console client
pub struct ConsoleWriter {
    half: OwnedWriteHalf,
}

impl ConsoleWriter {
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.half.write_all(line.as_bytes()).await?;
        self.half.write_all(b"\n").await?;
        self.half.flush().await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.half.shutdown().await
    }
}

pub struct ConsoleSession {
    peer: SocketAddr,
    reader: ConsoleReader,
    writer: ConsoleWriter,
}

impl ConsoleSession {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.send_line(line).await
    }

    pub async fn recv_line(&mut self) -> io::Result<Option<String>> {
        self.reader.recv_line().await
    }

    pub fn into_parts(self) -> (ConsoleReader, ConsoleWriter) {
        (self.reader, self.writer)
    }
}
