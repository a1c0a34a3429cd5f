//! ECON remote console client
//!
//! One TCP connection carries both directions: console log lines flow in,
//! administrative commands flow out. The two halves of the socket live behind
//! separate locks so a command can be written while a read is parked waiting
//! for the next log line.
//!
//! Lock order is always write, then read. `connect` takes both for the whole
//! handshake, `command` takes only the write lock and `readline` takes only
//! the read lock. `disconnect` holds the write lock and only tries the read
//! lock; a read parked on the socket drops its half itself when it wakes.
//! `readline` drops the read lock before it touches the write side.

use crate::error::{EconError, Result};
use log::{debug, info, warn};
use std::io;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Console commands that may be forwarded from the command surface
pub const ALLOWED_COMMANDS: &[&str] = &[
    "echo",
    "exec",
    "kick",
    "ban",
    "unban",
    "bans",
    "status",
    "shutdown",
    "reload",
    "record",
    "stoprecord",
    "tune",
    "tune_reset",
    "tune_dump",
    "change_map",
    "restart",
    "broadcast",
    "say",
    "set_team",
    "set_team_all",
    "add_vote",
    "remove_vote",
    "force_vote",
    "clear_votes",
    "vote",
];

/// Maximum length of the joined argument string, in characters
pub const MAX_ARGS_LEN: usize = 120;

/// Substring the console sends once the password is accepted
pub const AUTH_SUCCESS_MARKER: &str = "Authentication successful";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticated,
    Closing,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Authenticated => 2,
            ConnectionState::Closing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Authenticated,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Read side of one connection, tagged with the connection it belongs to
struct LineReader {
    generation: u64,
    lines: BufReader<OwnedReadHalf>,
}

/// Write side of one connection
struct CommandWriter {
    generation: u64,
    half: OwnedWriteHalf,
}

pub struct EconClient {
    addr: String,
    password: String,
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<Option<CommandWriter>>,
    state: AtomicU8,
    generation: AtomicU64,
}

impl EconClient {
    pub fn new(host: &str, port: u16, password: &str) -> Self {
        Self {
            addr: format!("{}:{}", host, port),
            password: password.to_string(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// True when there is no usable connection or it is being torn down
    pub fn is_closing(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Disconnected | ConnectionState::Closing
        )
    }

    fn closed(&self) -> EconError {
        EconError::Closed {
            addr: self.addr.clone(),
        }
    }

    /// Opens a fresh connection and authenticates it.
    ///
    /// Any existing connection is closed first. Both locks are held until the
    /// handshake finishes, so no command or read can slip in between. On
    /// failure the client is left disconnected and the caller retries.
    pub async fn connect(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let mut reader = self.reader.lock().await;

        if let Some(mut old) = writer.take() {
            self.set_state(ConnectionState::Closing);
            if let Err(e) = old.half.shutdown().await {
                debug!("Error closing previous connection to {}: {}", self.addr, e);
            }
        }
        reader.take();
        self.set_state(ConnectionState::Connecting);

        match self.handshake().await {
            Ok((lines, half)) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                *reader = Some(LineReader { generation, lines });
                *writer = Some(CommandWriter { generation, half });
                self.set_state(ConnectionState::Authenticated);
                info!("Authenticated to {}", self.addr);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                warn!("Failed to connect to {}: {}", self.addr, e);
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = TcpStream::connect(&self.addr).await?;
        info!("Connected to {}", self.addr);

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half);

        write_half
            .write_all(format!("{}\n", self.password).as_bytes())
            .await?;
        write_half.flush().await?;

        // Password prompt
        read_raw_line(&mut lines).await?.ok_or_else(|| self.closed())?;

        let reply = read_raw_line(&mut lines)
            .await?
            .ok_or_else(|| self.closed())?;
        if !reply.contains(AUTH_SUCCESS_MARKER) {
            return Err(EconError::Authentication {
                addr: self.addr.clone(),
            });
        }

        Ok((lines, write_half))
    }

    /// Sends one allow-listed console command.
    ///
    /// Arguments are joined with spaces and sanitized by [`sanitize_args`].
    /// Nothing is read back; ECON commands are fire-and-forget here.
    pub async fn command<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<()> {
        if !is_allowed(name) {
            warn!("Rejected console command {:?}", name);
            return Err(EconError::InvalidCommand(name.to_string()));
        }
        let line = format_command(name, args);

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or_else(|| self.closed())?;
        writer.half.write_all(line.as_bytes()).await?;
        writer.half.flush().await?;

        debug!("Sent command {:?} to {}", line.trim_end(), self.addr);
        Ok(())
    }

    /// Reads the next console line with NULs and trailing whitespace removed.
    ///
    /// End-of-stream and socket faults close the whole connection, since a
    /// dead read side means the write side is dead too.
    pub async fn readline(&self) -> Result<String> {
        let (generation, error) = {
            let mut guard = self.reader.lock().await;
            if self.is_closing() {
                // Left behind by a disconnect
                guard.take();
                return Err(self.closed());
            }
            let reader = guard.as_mut().ok_or_else(|| self.closed())?;
            let generation = reader.generation;

            let error = match read_raw_line(&mut reader.lines).await {
                Ok(Some(line)) if !self.is_closing() => return Ok(clean_line(&line)),
                Ok(Some(_)) => {
                    // disconnect ran while this read was parked
                    guard.take();
                    return Err(self.closed());
                }
                Ok(None) => self.closed(),
                Err(e) => EconError::Io(e),
            };
            guard.take();
            (generation, error)
        };

        self.set_state(ConnectionState::Closing);
        self.close_writer(generation).await;
        Err(error)
    }

    /// Shuts down the write side if it still belongs to `generation`
    async fn close_writer(&self, generation: u64) {
        let mut guard = self.writer.lock().await;
        if guard.as_ref().map(|w| w.generation) != Some(generation) {
            // A reconnect already replaced it
            return;
        }
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.half.shutdown().await {
                debug!("Error closing connection to {}: {}", self.addr, e);
            }
        }
        self.set_state(ConnectionState::Disconnected);
        info!("Connection to {} closed", self.addr);
    }

    /// Closes the connection if one is open. Safe to call repeatedly.
    ///
    /// Both halves are released. If a `readline` is parked on the socket, the
    /// read half goes when that read returns, and the read reports `Closed`.
    pub async fn disconnect(&self) -> Result<()> {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            self.set_state(ConnectionState::Closing);
            let result = writer.half.shutdown().await;
            if let Ok(mut reader) = self.reader.try_lock() {
                if reader.as_ref().map(|r| r.generation) == Some(writer.generation) {
                    reader.take();
                }
            }
            self.set_state(ConnectionState::Disconnected);
            info!("Disconnected from {}", self.addr);
            result?;
        }
        Ok(())
    }
}

pub fn is_allowed(name: &str) -> bool {
    ALLOWED_COMMANDS.contains(&name)
}

/// Joins arguments, truncates to [`MAX_ARGS_LEN`] characters and replaces
/// line breaks so one argument cannot carry a second console command.
pub fn sanitize_args<S: AsRef<str>>(args: &[S]) -> String {
    let joined = args
        .iter()
        .map(|arg| arg.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    joined
        .chars()
        .take(MAX_ARGS_LEN)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Wire form of a command: `"<name> <args>\n"`, space kept even with no args
pub fn format_command<S: AsRef<str>>(name: &str, args: &[S]) -> String {
    format!("{} {}\n", name, sanitize_args(args))
}

fn clean_line(raw: &str) -> String {
    raw.replace('\0', "").trim_end().to_string()
}

async fn read_raw_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_console::FakeConsole;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const PASSWORD: &str = "secret";

    async fn console() -> (FakeConsole, EconClient) {
        let console = FakeConsole::bind("127.0.0.1:0", PASSWORD).await.unwrap();
        let port = console.local_addr().unwrap().port();
        let client = EconClient::new("127.0.0.1", port, PASSWORD);
        (console, client)
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed("status"));
        assert!(is_allowed("say"));
        assert!(is_allowed("vote"));
        assert!(!is_allowed("rm_server"));
        assert!(!is_allowed("sv_rcon_password"));
        assert!(!is_allowed("Status"));
        assert!(!is_allowed(""));
        assert_eq!(ALLOWED_COMMANDS.len(), 25);
    }

    #[test]
    fn test_format_command_without_args() {
        let args: [&str; 0] = [];
        assert_eq!(format_command("status", &args), "status \n");
    }

    #[test]
    fn test_format_command_joins_args() {
        assert_eq!(format_command("kick", &["3", "spamming"]), "kick 3 spamming\n");
    }

    #[test]
    fn test_sanitize_truncates_long_args() {
        let long = "a".repeat(200);
        let sanitized = sanitize_args(&[long]);

        assert_eq!(sanitized.chars().count(), MAX_ARGS_LEN);
        assert_eq!(sanitized, "a".repeat(120));
    }

    #[test]
    fn test_sanitize_truncates_by_characters() {
        let long = "é".repeat(130);
        assert_eq!(sanitize_args(&[long]).chars().count(), MAX_ARGS_LEN);
    }

    #[test]
    fn test_sanitize_replaces_newlines() {
        assert_eq!(sanitize_args(&["hi\nshutdown"]), "hi shutdown");
        assert_eq!(sanitize_args(&["a\r\nb"]), "a  b");
    }

    #[test]
    fn test_clean_line() {
        assert_eq!(clean_line("[x][chat]: 1:0:a: b\n"), "[x][chat]: 1:0:a: b");
        assert_eq!(clean_line("ab\0c\r\n"), "abc");
        assert_eq!(clean_line("\0\n"), "");
    }

    #[tokio::test]
    async fn test_read_raw_line_splits_on_newline() {
        let mock = tokio_test::io::Builder::new()
            .read(b"first\nsec")
            .read(b"ond\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_raw_line(&mut reader).await.unwrap().unwrap(), "first\n");
        assert_eq!(read_raw_line(&mut reader).await.unwrap().unwrap(), "second\r\n");
        assert!(read_raw_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_raw_line_replaces_invalid_utf8() {
        let mock = tokio_test::io::Builder::new().read(b"a\xffb\n").build();
        let mut reader = BufReader::new(mock);

        let line = read_raw_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(clean_line(&line), "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn test_read_raw_line_unterminated_tail() {
        let mock = tokio_test::io::Builder::new().read(b"partial").build();
        let mut reader = BufReader::new(mock);

        assert_eq!(read_raw_line(&mut reader).await.unwrap().unwrap(), "partial");
        assert!(read_raw_line(&mut reader).await.unwrap().is_none());
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let client = EconClient::new("127.0.0.1", 8303, PASSWORD);

        assert_eq!(client.addr(), "127.0.0.1:8303");
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.is_closing());
    }

    #[tokio::test]
    async fn test_connect_authenticates() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let session = accept.await.unwrap();

        assert!(session.is_some());
        assert_eq!(client.state(), ConnectionState::Authenticated);
        assert!(!client.is_closing());
    }

    #[tokio::test]
    async fn test_connect_wrong_password() {
        let console = FakeConsole::bind("127.0.0.1:0", PASSWORD).await.unwrap();
        let port = console.local_addr().unwrap().port();
        let client = EconClient::new("127.0.0.1", port, "wrong");

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        let result = client.connect().await;

        assert!(matches!(result, Err(EconError::Authentication { .. })));
        assert!(accept.await.unwrap().is_none());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = EconClient::new("127.0.0.1", port, PASSWORD);
        let result = client.connect().await;

        assert!(matches!(result, Err(EconError::Io(_))));
        assert!(client.is_closing());
    }

    #[tokio::test]
    async fn test_command_writes_line() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        let no_args: [&str; 0] = [];
        client.command("status", &no_args).await.unwrap();
        client.command("say", &["hello", "world"]).await.unwrap();

        assert_eq!(session.recv_line().await.unwrap().unwrap(), "status ");
        assert_eq!(session.recv_line().await.unwrap().unwrap(), "say hello world");
    }

    #[tokio::test]
    async fn test_command_injection_stays_on_one_line() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        client.command("say", &["hi\nshutdown"]).await.unwrap();
        client.command("status", &[""]).await.unwrap();

        assert_eq!(session.recv_line().await.unwrap().unwrap(), "say hi shutdown");
        assert_eq!(session.recv_line().await.unwrap().unwrap(), "status ");
    }

    #[tokio::test]
    async fn test_invalid_command_writes_nothing() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        let result = client.command("rm_server", &["-rf"]).await;
        assert!(matches!(result, Err(EconError::InvalidCommand(ref name)) if name == "rm_server"));

        client.disconnect().await.unwrap();
        // Only end-of-stream follows; the rejected command never reached the wire
        assert_eq!(session.recv_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_command_without_connection() {
        let client = EconClient::new("127.0.0.1", 8303, PASSWORD);
        let no_args: [&str; 0] = [];

        let result = client.command("status", &no_args).await;
        assert!(matches!(result, Err(EconError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_readline_strips_nul_and_terminators() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        session.send_line("[x][chat]: 1:0:Foo\0: hi  ").await.unwrap();
        assert_eq!(client.readline().await.unwrap(), "[x][chat]: 1:0:Foo: hi");
    }

    #[tokio::test]
    async fn test_readline_end_of_stream_closes_connection() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let session = accept.await.unwrap().unwrap();
        drop(session);

        let result = timeout(Duration::from_secs(5), client.readline())
            .await
            .unwrap();

        assert!(matches!(result, Err(EconError::Closed { .. })));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.is_closing());

        let no_args: [&str; 0] = [];
        assert!(client.command("status", &no_args).await.is_err());
        assert!(matches!(client.readline().await, Err(EconError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_readline_before_connect() {
        let client = EconClient::new("127.0.0.1", 8303, PASSWORD);
        assert!(matches!(client.readline().await, Err(EconError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let _session = accept.await.unwrap().unwrap();

        client.disconnect().await.unwrap();
        assert!(client.is_closing());
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_readline_after_disconnect_is_closed() {
        let (console, client) = console().await;

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        client.disconnect().await.unwrap();
        // The client may already have reset the socket
        let _ = session.send_line("[x][chat]: 1:0:Foo: after disconnect").await;

        let result = client.readline().await;
        assert!(matches!(result, Err(EconError::Closed { .. })), "got {:?}", result);
        assert!(client.is_closing());
    }

    #[tokio::test]
    async fn test_disconnect_during_parked_readline() {
        let (console, client) = console().await;
        let client = Arc::new(client);

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        client.connect().await.unwrap();
        let mut session = accept.await.unwrap().unwrap();

        let read = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.readline().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        timeout(Duration::from_secs(5), client.disconnect())
            .await
            .unwrap()
            .unwrap();
        session
            .send_line("[x][chat]: 1:0:Foo: after disconnect")
            .await
            .unwrap();

        let result = timeout(Duration::from_secs(5), read).await.unwrap().unwrap();
        assert!(matches!(result, Err(EconError::Closed { .. })), "got {:?}", result);
        assert!(matches!(client.readline().await, Err(EconError::Closed { .. })));
    }

    #[tokio::test]
    async fn test_reconnect_replaces_connection() {
        let (console, client) = console().await;
        let console = Arc::new(console);

        let first = {
            let console = Arc::clone(&console);
            tokio::spawn(async move { console.accept().await.unwrap() })
        };
        client.connect().await.unwrap();
        let mut first = first.await.unwrap().unwrap();

        let second = {
            let console = Arc::clone(&console);
            tokio::spawn(async move { console.accept().await.unwrap() })
        };
        client.connect().await.unwrap();
        let mut second = second.await.unwrap().unwrap();

        // The superseded connection sees end-of-stream
        assert_eq!(first.recv_line().await.unwrap(), None);

        client.command("say", &["again"]).await.unwrap();
        assert_eq!(second.recv_line().await.unwrap().unwrap(), "say again");
    }

    #[tokio::test]
    async fn test_command_waits_for_handshake() {
        let console = FakeConsole::bind("127.0.0.1:0", PASSWORD)
            .await
            .unwrap()
            .with_auth_delay(Duration::from_millis(200));
        let port = console.local_addr().unwrap().port();
        let client = Arc::new(EconClient::new("127.0.0.1", port, PASSWORD));

        let accept = tokio::spawn(async move { console.accept().await.unwrap() });
        let connect = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.connect().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.state(), ConnectionState::Connecting);

        let no_args: [&str; 0] = [];
        client.command("status", &no_args).await.unwrap();

        // The command could only run once connect released the write lock
        assert_eq!(client.state(), ConnectionState::Authenticated);
        assert!(connect.await.unwrap().is_ok());

        let mut session = accept.await.unwrap().unwrap();
        assert_eq!(session.recv_line().await.unwrap().unwrap(), "status ");
    }
}
