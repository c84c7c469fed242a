//! TCP connections to appwatch servers.
//!
//! Each connection splits into a change stream and a command sink.
//! [`merge_events`] folds the change streams of several servers into one
//! stream tagged with the server's index, so a single loop can watch
//! them all.

use std::net::SocketAddr;
use std::time::Duration;

use appwatch_core::{AppWatchError, ChangeCodec, ChangeEvent, CommandCodec, CommandFrame};
use futures::stream::{self, Stream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

/// Decoded change stream from the server.
pub type EventStream = FramedRead<OwnedReadHalf, ChangeCodec>;

/// Sink for key commands to the server.
pub type CommandSink = FramedWrite<OwnedWriteHalf, CommandCodec>;

/// An item of [`merge_events`]: the server's index and its next event,
/// or `None` once that server's stream has ended.
pub type Tagged = (usize, Option<Result<ChangeEvent, AppWatchError>>);

/// Manages the TCP connection to one server.
pub struct ServerConnection {
    events: EventStream,
    commands: CommandSink,
    peer: SocketAddr,
}

impl ServerConnection {
    /// Connect to `addr` (`host:port`), giving up after `timeout`.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, Box<dyn std::error::Error>> {
        let addr: SocketAddr = addr.parse()?;
        info!("connecting to server at {addr}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr)).await??;
        Ok(Self::from_stream(stream)?)
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self, AppWatchError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            events: FramedRead::new(reader, ChangeCodec::new()),
            commands: FramedWrite::new(writer, CommandCodec),
            peer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn split(self) -> (EventStream, CommandSink) {
        (self.events, self.commands)
    }
}

/// Send one key command.
pub async fn send_command(sink: &mut CommandSink, frame: CommandFrame) -> Result<(), AppWatchError> {
    debug!(key_code = frame.key_code, modifiers = frame.modifiers.bits(), "sending command");
    sink.send(frame).await
}

/// Merge per-server change streams. Every stream contributes its events
/// tagged with its position, followed by one `(index, None)` when it ends.
pub fn merge_events<S>(streams: impl IntoIterator<Item = S>) -> impl Stream<Item = Tagged> + Unpin
where
    S: Stream<Item = Result<ChangeEvent, AppWatchError>> + Unpin,
{
    stream::select_all(streams.into_iter().enumerate().map(|(index, events)| {
        events
            .map(move |event| (index, Some(event)))
            .chain(stream::iter([(index, None)]))
    }))
}
