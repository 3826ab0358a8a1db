//! Per-connection protocol handling
//!
//! A connection is split in two. The read half stays with [`Session`],
//! whose loop frames incoming bytes into lines and acts on them. The write
//! half moves into a writer task fed by an unbounded queue; the sending end
//! of that queue lives in the shared [`SessionHandle`], which is what the
//! registry and other sessions see.

use crate::registry::SharedRegistry;
use log::{debug, error, info, trace, warn};
use shared::{format_text, Line, LineBuffer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

pub type SessionId = u64;

const READ_BUFFER_SIZE: usize = 1024;

/// The part of a session other tasks can hold on to
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<String>,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self { id, peer, outbound }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues `text` for writing to this session's connection.
    ///
    /// Best-effort: failures are logged and never reported to the caller.
    pub fn deliver(&self, text: String) {
        if let Err(e) = self.outbound.send(text) {
            error!("Deliver error to session {}: writer closed ({})", self.id, e);
        }
    }
}

/// One connected client, driven by its own read loop
pub struct Session<R> {
    handle: Arc<SessionHandle>,
    name: String,
    buffer: LineBuffer,
    registry: SharedRegistry,
    reader: R,
}

impl Session<OwnedReadHalf> {
    /// Splits an accepted connection and registers the new session
    pub async fn register(stream: TcpStream, peer: SocketAddr, registry: SharedRegistry) -> Self {
        let (reader, writer) = stream.into_split();
        Self::attach(reader, writer, peer, registry).await
    }
}

impl<R: AsyncRead + Unpin> Session<R> {
    /// Registers a session over an arbitrary reader/writer pair.
    ///
    /// Spawns the writer task and inserts the handle into the registry;
    /// the session receives broadcasts from this point on.
    pub async fn attach<W>(
        reader: R,
        writer: W,
        peer: SocketAddr,
        registry: SharedRegistry,
    ) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let handle = {
            let mut guard = registry.write().await;
            let id = guard.next_id();
            let handle = Arc::new(SessionHandle::new(id, peer, outbound_tx));
            guard.add(&handle);
            handle
        };

        spawn_writer(handle.id(), writer, outbound_rx);

        Self {
            handle,
            name: String::new(),
            buffer: LineBuffer::new(),
            registry,
            reader,
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    /// Current display name, empty until the client sends `NAME::`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &Arc<SessionHandle> {
        &self.handle
    }

    /// Reads until EOF or a read error, then removes the session.
    ///
    /// Dropping `self` at the end releases the read half and the handle;
    /// once no broadcast holds the handle, the writer task drains its queue
    /// and closes the write half.
    pub async fn run(mut self) {
        let mut chunk = [0u8; READ_BUFFER_SIZE];

        loop {
            match self.reader.read(&mut chunk).await {
                Ok(0) => {
                    info!("Connection closed: {}", self.name);
                    break;
                }
                Ok(len) => {
                    self.buffer.extend(&chunk[..len]);
                    while let Some(line) = self.buffer.next_line() {
                        self.handle_line(&line).await;
                    }
                    if !self.buffer.is_empty() {
                        trace!(
                            "Session {} waiting on partial line ({} bytes)",
                            self.id(),
                            self.buffer.pending_len()
                        );
                    }
                }
                Err(e) => {
                    warn!("Connection closed: {} ({})", self.name, e);
                    break;
                }
            }
        }

        self.registry.write().await.remove(self.handle.id());
    }

    /// Applies one complete line, without its `\n`
    pub async fn handle_line(&mut self, line: &str) {
        match Line::parse(line) {
            Line::Name(name) => {
                self.name = name;
                info!("User connected: {}", self.name);
            }
            Line::Text(content) => {
                let message = format_text(&self.name, &content);
                self.registry
                    .read()
                    .await
                    .broadcast(self.handle.id(), &message);
                info!("{}: {}", self.name, content);
            }
            Line::Unknown => {
                trace!("Session {} sent unrecognized line: {:?}", self.id(), line);
            }
        }
    }
}

/// Drains the outbound queue into the connection until every sender is gone
fn spawn_writer<W>(
    id: SessionId,
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = writer.write_all(text.as_bytes()).await {
                error!("Deliver error to session {}: {}", id, e);
            }
        }
        debug!("Writer for session {} finished", id);
    });
}
