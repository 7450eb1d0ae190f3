//! Meta evaluator client
//!
//! The evaluator is a user-compiled program that applies meta-class
//! generators. It is driven over a synchronous line protocol on its
//! stdin/stdout:
//!
//! - `1`: handshake; the reply is a count followed by that many generator names
//! - `2`: evaluate; generator name, class name and the class's methods, answered
//!   by a byte length on its own line and then that many bytes of source text
//! - `3`: shutdown
//!
//! [`MetaClient`] hides the framing behind [`Evaluator::evaluate`]. The
//! transport is pluggable so the protocol can be exercised over in-memory
//! streams.

use indexmap::IndexSet;
use log::{debug, warn};
use parser::Class;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

pub const HANDSHAKE: &str = "1";
pub const EVALUATE: &str = "2";
pub const SHUTDOWN: &str = "3";

/// Largest generator count accepted in a handshake
pub const MAX_GENERATORS: usize = 4096;
/// Largest reply body accepted from an evaluate request
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    /// The evaluator closed its output before a reply was complete
    ChannelClosed,
    /// No reply line within the configured timeout
    Timeout(Duration),
    /// A count or length line that is not a number, or is out of range
    Malformed { what: &'static str, line: String },
    /// The reply body did not end at its declared length
    LengthMismatch { declared: usize, received: usize },
    Io(io::Error),
    Spawn { exe: PathBuf, source: io::Error },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::ChannelClosed => write!(f, "meta evaluator closed the channel"),
            ProtocolError::Timeout(after) => {
                write!(f, "meta evaluator did not reply within {:?}", after)
            }
            ProtocolError::Malformed { what, line } => {
                write!(f, "malformed {} from meta evaluator: {:?}", what, line)
            }
            ProtocolError::LengthMismatch { declared, received } => write!(
                f,
                "meta evaluator declared {} bytes but sent {}",
                declared, received
            ),
            ProtocolError::Io(e) => write!(f, "meta evaluator I/O error: {}", e),
            ProtocolError::Spawn { exe, source } => {
                write!(f, "failed to start {}: {}", exe.display(), source)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Io(e) => Some(e),
            ProtocolError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(e: io::Error) -> Self {
        ProtocolError::Io(e)
    }
}

/// Line channel to an evaluator
pub trait Transport {
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Next line including its terminator; `Ok(None)` once the channel is closed
    fn recv_line(&mut self) -> Result<Option<String>, ProtocolError>;

    /// Called after the shutdown command has been sent
    fn close(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Tear the channel down after a failed exchange
    fn abort(&mut self) {}
}

/// Transport over any reader/writer pair
#[derive(Debug)]
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        StreamTransport { reader, writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<R: BufRead, W: Write> Transport for StreamTransport<R, W> {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn recv_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Transport to a child process
///
/// Stdout is read on a helper thread so every read can time out.
pub struct ProcessTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<io::Result<String>>,
    timeout: Duration,
}

impl ProcessTransport {
    pub fn spawn(exe: &Path, timeout: Duration) -> Result<Self, ProtocolError> {
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProtocolError::Spawn {
                exe: exe.to_path_buf(),
                source,
            })?;
        let stdin = child.stdin.take();
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => return Err(ProtocolError::ChannelClosed),
        };

        let (sender, lines) = mpsc::channel();
        thread::Builder::new()
            .name("meta-evaluator-stdout".to_string())
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    let mut raw = Vec::new();
                    let line = match reader.read_until(b'\n', &mut raw) {
                        Ok(0) => break,
                        Ok(_) => String::from_utf8(raw)
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
                        Err(e) => Err(e),
                    };
                    let failed = line.is_err();
                    if sender.send(line).is_err() || failed {
                        break;
                    }
                }
            })?;
        debug!("spawned meta evaluator {} (pid {})", exe.display(), child.id());

        Ok(ProcessTransport {
            child,
            stdin,
            lines,
            timeout,
        })
    }
}

impl Transport for ProcessTransport {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => writeln!(stdin, "{}", line),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "meta evaluator stdin is closed",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }

    fn recv_line(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.lines.recv_timeout(self.timeout) {
            Ok(Ok(line)) => Ok(Some(line)),
            Ok(Err(e)) => Err(ProtocolError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Err(ProtocolError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// Wait for the process to exit, killing it once the timeout has passed
    fn close(&mut self) -> Result<(), ProtocolError> {
        drop(self.stdin.take());
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.child.try_wait()? {
                Some(status) => {
                    debug!("meta evaluator exited with {}", status);
                    return Ok(());
                }
                None if Instant::now() >= deadline => {
                    warn!("meta evaluator ignored shutdown, killing it");
                    self.child.kill()?;
                    self.child.wait()?;
                    return Ok(());
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Ok(None) = self.child.try_wait() {
            debug!("killing meta evaluator (pid {})", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Applies meta-class generators to finished classes
pub trait Evaluator {
    /// Generator names usable as class-keys
    fn generators(&self) -> &IndexSet<String>;

    /// Source text produced by `generator` for `class`
    fn evaluate(&mut self, generator: &str, class: &Class) -> Result<String, ProtocolError>;
}

/// Protocol client over a [`Transport`]
pub struct MetaClient<T: Transport> {
    transport: T,
    generators: IndexSet<String>,
    closed: bool,
}

impl MetaClient<ProcessTransport> {
    /// Start `exe` and perform the handshake
    pub fn spawn(exe: &Path, timeout: Duration) -> Result<Self, ProtocolError> {
        Self::connect(ProcessTransport::spawn(exe, timeout)?)
    }
}

impl<T: Transport> MetaClient<T> {
    /// Perform the handshake over `transport`
    pub fn connect(transport: T) -> Result<Self, ProtocolError> {
        let mut client = MetaClient {
            transport,
            generators: IndexSet::new(),
            closed: false,
        };
        client.handshake()?;
        Ok(client)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn handshake(&mut self) -> Result<(), ProtocolError> {
        self.transport.send_line(HANDSHAKE)?;
        self.transport.flush()?;

        let count = self.read_count("generator count", MAX_GENERATORS)?;
        let mut names = Vec::new();
        while names.len() < count {
            let line = self.expect_line()?;
            names.extend(line.split_whitespace().map(str::to_string));
        }
        if names.len() > count {
            return Err(ProtocolError::Malformed {
                what: "generator list",
                line: names.join(" "),
            });
        }
        self.generators = names.into_iter().collect();
        debug!("meta evaluator offers {:?}", self.generators);
        Ok(())
    }

    fn expect_line(&mut self) -> Result<String, ProtocolError> {
        self.transport
            .recv_line()?
            .ok_or(ProtocolError::ChannelClosed)
    }

    /// Next non-blank line as a count no larger than `limit`
    fn read_count(&mut self, what: &'static str, limit: usize) -> Result<usize, ProtocolError> {
        loop {
            let line = self.expect_line()?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return match trimmed.parse::<usize>() {
                Ok(count) if count <= limit => Ok(count),
                _ => Err(ProtocolError::Malformed {
                    what,
                    line: trimmed.to_string(),
                }),
            };
        }
    }

    /// Read lines until `declared` bytes have arrived
    fn read_body(&mut self, declared: usize) -> Result<String, ProtocolError> {
        let mut body = String::new();
        while body.len() < declared {
            let line = self.expect_line()?;
            body.push_str(&line);
        }
        // a terminator written after a body that did not end with one
        let excess = body.get(declared..).unwrap_or("");
        if excess == "\n" || excess == "\r\n" {
            body.truncate(declared);
        }
        if body.len() != declared {
            return Err(ProtocolError::LengthMismatch {
                declared,
                received: body.len(),
            });
        }
        Ok(body)
    }

    fn round_trip(&mut self, generator: &str, class: &Class) -> Result<String, ProtocolError> {
        for line in request_lines(generator, class) {
            self.transport.send_line(&line)?;
        }
        self.transport.flush()?;

        let declared = self.read_count("response length", MAX_RESPONSE_BYTES)?;
        self.read_body(declared)
    }

    /// Whether the client can no longer be used
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send the shutdown command and release the transport
    pub fn shutdown(&mut self) -> Result<(), ProtocolError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.send_line(SHUTDOWN)?;
        self.transport.flush()?;
        self.transport.close()
    }
}

/// Lines of an evaluate request
///
/// Methods are sent public, then private, then protected. Data members are
/// not part of the request.
pub fn request_lines(generator: &str, class: &Class) -> Vec<String> {
    let mut lines = vec![
        EVALUATE.to_string(),
        generator.to_string(),
        class.name.clone(),
        class.methods.len().to_string(),
    ];
    for method in class.methods.iter_evaluator_order() {
        lines.push(
            method
                .return_type
                .as_ref()
                .map(|ty| ty.qualified_name())
                .unwrap_or_default(),
        );
        lines.push(method.name.clone());
        lines.push(method.params.len().to_string());
        for param in &method.params {
            lines.push(param.ty.qualified_name());
            lines.push(param.name.clone());
        }
    }
    lines
}

impl<T: Transport> Evaluator for MetaClient<T> {
    fn generators(&self) -> &IndexSet<String> {
        &self.generators
    }

    fn evaluate(&mut self, generator: &str, class: &Class) -> Result<String, ProtocolError> {
        if self.closed {
            return Err(ProtocolError::ChannelClosed);
        }
        match self.round_trip(generator, class) {
            Ok(body) => {
                debug!(
                    "{} applied to {}: {} bytes generated",
                    generator,
                    class.name,
                    body.len()
                );
                Ok(body)
            }
            Err(e) => {
                // the stream position is unknown, later replies cannot be trusted
                warn!("abandoning meta evaluator after {}", e);
                self.closed = true;
                self.transport.abort();
                Err(e)
            }
        }
    }
}

impl<T: Transport> Drop for MetaClient<T> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            debug!("meta evaluator shutdown failed: {}", e);
        }
    }
}
