//! Per-connection session: the change producer/sender and the command
//! receiver.
//!
//! ```text
//!            ┌──────────────── Session::run ────────────────┐
//!            │ Polling → Diffing → Enqueuing → Flushing ──┐ │
//!  client ◄──┤   ▲                                        │ │
//!            │   └──────────── sleep(refresh) ◄───────────┘ │
//!            └──────────────────────────────────────────────┘
//!  client ──► run_command_loop ──► KeyInjector
//! ```
//!
//! Both loops share one [`Liveness`] flag. Whichever loop sees the
//! transport fail marks it dead, and the other stops at its next await.

pub mod commands;
pub mod queue;
pub mod state;

use std::collections::VecDeque;
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, trace, warn};

use crate::codec::ChangeCodec;
use crate::error::AppWatchError;
use crate::liveness::Liveness;
use crate::model::ChangeEvent;
use crate::platform::{Desktop, IconExtractor, ProcessSource};

pub use commands::run_command_loop;
pub use queue::ChangeQueue;
pub use state::{HEARTBEAT_IDLE_CYCLES, RefreshInterval, SessionState};

/// Sink the session loop writes encoded changes to.
pub type ChangeSink<W> = FramedWrite<W, ChangeCodec>;

// ── Session ──────────────────────────────────────────────────────

/// The session loop for one connected client.
///
/// # Lifetime
///
/// Created when a client connects; [`run`](Self::run) returns when the
/// liveness flag goes false or the transport fails, and the session is
/// dropped with it.
pub struct Session {
    source: Arc<dyn ProcessSource>,
    icons: Arc<dyn IconExtractor>,
    state: SessionState,
    queue: ChangeQueue,
    liveness: Liveness,
}

impl Session {
    pub fn new(
        source: Arc<dyn ProcessSource>,
        icons: Arc<dyn IconExtractor>,
        refresh: RefreshInterval,
        liveness: Liveness,
    ) -> Self {
        Self {
            source,
            icons,
            state: SessionState::new(refresh),
            queue: ChangeQueue::new(),
            liveness,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn queue(&self) -> &ChangeQueue {
        &self.queue
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// One poll cycle: capture, diff, enqueue.
    ///
    /// A failed capture aborts the cycle and leaves the previous snapshot
    /// untouched. Returns the number of events queued.
    pub fn poll(&mut self) -> Result<usize, AppWatchError> {
        let current = self.source.snapshot()?;
        let focus = self.source.foreground_pid();

        let events = self.state.advance(current, focus);
        let queued = events.len();
        self.queue.extend(events);
        Ok(queued)
    }

    /// Send every queued event, oldest first.
    ///
    /// The queue is empty afterwards whatever the outcome: on failure the
    /// unsent events are dropped, the transport is shut down and the
    /// connection is marked dead.
    pub async fn flush<W>(&mut self, sink: &mut ChangeSink<W>) -> Result<usize, AppWatchError>
    where
        W: AsyncWrite + Unpin,
    {
        if self.queue.is_empty() {
            return Ok(0);
        }

        let pending = self.queue.take();
        let count = pending.len();
        match self.send_all(pending, sink).await {
            Ok(()) => {
                trace!(count, "changes flushed");
                Ok(count)
            }
            Err(e) => {
                error!("flush failed, dropping unsent changes: {e}");
                let _ = sink.get_mut().shutdown().await;
                self.liveness.mark_dead();
                Err(e)
            }
        }
    }

    /// Run until the connection dies.
    ///
    /// Returns `Ok(())` when stopped through the liveness flag and the
    /// fatal error otherwise. The writer is shut down on the way out.
    pub async fn run<W>(mut self, writer: W) -> Result<(), AppWatchError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sink = FramedWrite::new(writer, ChangeCodec::new());
        info!(
            refresh_ms = self.state.refresh_interval().as_millis(),
            "session started"
        );

        let result = loop {
            if !self.liveness.is_alive() {
                break Ok(());
            }

            match self.poll() {
                Ok(queued) => debug!(queued, "poll cycle complete"),
                Err(e) if !e.is_connection_fatal() => warn!("poll cycle skipped: {e}"),
                Err(e) => break Err(e),
            }

            if !self.liveness.is_alive() {
                break Ok(());
            }

            if let Err(e) = self.flush(&mut sink).await {
                break Err(e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.state.refresh_interval().as_duration()) => {}
                _ = self.liveness.dead() => break Ok(()),
            }
        };

        if !self.queue.is_empty() {
            debug!(dropped = self.queue.len(), "discarding unsent changes");
            self.queue.clear();
        }
        self.liveness.mark_dead();
        let _ = sink.get_mut().shutdown().await;
        info!("session ended");

        result
    }

    async fn send_all<W>(
        &self,
        pending: VecDeque<ChangeEvent>,
        sink: &mut ChangeSink<W>,
    ) -> Result<(), AppWatchError>
    where
        W: AsyncWrite + Unpin,
    {
        for event in pending {
            sink.feed(self.resolve_icon(event)).await?;
        }
        sink.flush().await
    }

    /// Fill in the icon of an `Add`; failure just means no icon.
    fn resolve_icon(&self, event: ChangeEvent) -> ChangeEvent {
        match event {
            ChangeEvent::Add {
                pid,
                record,
                icon: None,
            } => {
                let icon = self.icons.extract_icon(&record.exec_path);
                ChangeEvent::Add { pid, record, icon }
            }
            other => other,
        }
    }
}

// ── serve_connection ─────────────────────────────────────────────

/// Serve one client over an already-split transport.
///
/// Spawns the command loop on `reader`, runs the session loop on
/// `writer` in the current task, then marks the connection dead and
/// waits for the command loop before returning the session's result.
pub async fn serve_connection<R, W>(
    reader: R,
    writer: W,
    desktop: &Desktop,
    refresh: RefreshInterval,
    liveness: Liveness,
) -> Result<(), AppWatchError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    let commands = tokio::spawn(run_command_loop(
        reader,
        Arc::clone(&desktop.injector),
        liveness.clone(),
    ));

    let session = Session::new(
        Arc::clone(&desktop.source),
        Arc::clone(&desktop.icons),
        refresh,
        liveness.clone(),
    );
    let result = session.run(writer).await;

    liveness.mark_dead();
    match commands.await {
        Ok(Ok(handled)) => debug!(handled, "command loop finished"),
        Ok(Err(e)) => warn!("command loop ended: {e}"),
        Err(e) => error!("command loop panicked: {e}"),
    }

    result
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    use crate::model::{ApplicationRecord, Pid, Snapshot};

    /// Replays scripted cycles, then keeps returning the last snapshot.
    struct ScriptedSource {
        cycles: Mutex<VecDeque<Result<(Snapshot, Pid), AppWatchError>>>,
        last: Mutex<(Snapshot, Pid)>,
    }

    impl ScriptedSource {
        fn new(cycles: Vec<Result<(Snapshot, Pid), AppWatchError>>) -> Arc<Self> {
            Arc::new(Self {
                cycles: Mutex::new(cycles.into()),
                last: Mutex::new((Snapshot::new(), 0)),
            })
        }
    }

    impl ProcessSource for ScriptedSource {
        fn snapshot(&self) -> Result<Snapshot, AppWatchError> {
            let next = self.cycles.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(Ok(cycle)) => *last = cycle,
                Some(Err(e)) => return Err(e),
                None => {}
            }
            Ok(last.0.clone())
        }

        fn foreground_pid(&self) -> Pid {
            self.last.lock().unwrap().1
        }
    }

    struct FixedIcon(Vec<u8>);

    impl IconExtractor for FixedIcon {
        fn extract_icon(&self, _exec_path: &Path) -> Option<Vec<u8>> {
            Some(self.0.clone())
        }
    }

    /// Accepts `budget` bytes, then fails every write.
    struct FlakyWriter {
        budget: usize,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.budget == 0 {
                return Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn app(pid: Pid) -> ApplicationRecord {
        ApplicationRecord::new(pid, format!("app{pid}.exe"), format!("C:\\app{pid}.exe"))
    }

    fn snap(pids: &[Pid]) -> Snapshot {
        pids.iter().map(|&p| app(p)).collect()
    }

    async fn next(frames: &mut FramedRead<tokio::io::DuplexStream, ChangeCodec>) -> ChangeEvent {
        frames.next().await.unwrap().unwrap()
    }

    fn session(source: Arc<ScriptedSource>) -> Session {
        Session::new(
            source,
            Arc::new(FixedIcon(vec![0xDE, 0xAD])),
            RefreshInterval::default(),
            Liveness::new(),
        )
    }

    #[test]
    fn failed_capture_keeps_previous_snapshot() {
        let source = ScriptedSource::new(vec![
            Ok((snap(&[1, 2]), 1)),
            Err(AppWatchError::Enumeration("EnumWindows".into())),
        ]);
        let mut s = session(source);

        assert_eq!(s.poll().unwrap(), 3);
        let err = s.poll().unwrap_err();
        assert!(!err.is_connection_fatal());
        assert_eq!(s.state().previous(), &snap(&[1, 2]));
        assert_eq!(s.state().previous_focus(), 1);
        assert_eq!(s.queue().len(), 3);
    }

    #[tokio::test]
    async fn flush_resolves_icons_and_empties_queue() {
        let source = ScriptedSource::new(vec![Ok((snap(&[5]), 0))]);
        let mut s = session(source);
        s.poll().unwrap();

        let (client, server) = tokio::io::duplex(4096);
        let mut sink = FramedWrite::new(server, ChangeCodec::new());
        assert_eq!(s.flush(&mut sink).await.unwrap(), 1);
        assert!(s.queue().is_empty());
        assert!(s.liveness().is_alive());

        let mut frames = FramedRead::new(client, ChangeCodec::new());
        match frames.next().await.unwrap().unwrap() {
            ChangeEvent::Add { pid, record, icon } => {
                assert_eq!(pid, 5);
                assert_eq!(record.name, "app5.exe");
                assert_eq!(icon, Some(vec![0xDE, 0xAD]));
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_flush_failure_drops_queue_and_kills_connection() {
        let source = ScriptedSource::new(vec![Ok((snap(&[1, 2, 3]), 2))]);
        let mut s = session(source);
        assert_eq!(s.poll().unwrap(), 4);

        let mut sink = FramedWrite::new(FlakyWriter { budget: 20 }, ChangeCodec::new());
        let err = s.flush(&mut sink).await.unwrap_err();
        assert!(err.is_connection_fatal());
        assert!(s.queue().is_empty());
        assert!(!s.liveness().is_alive());
    }

    #[tokio::test]
    async fn write_error_from_mock_transport() {
        let source = ScriptedSource::new(vec![Ok((snap(&[]), 9))]);
        let mut s = session(source);
        s.poll().unwrap();

        let mock = tokio_test::io::Builder::new()
            .write_error(std::io::ErrorKind::BrokenPipe.into())
            .build();
        let mut sink = FramedWrite::new(mock, ChangeCodec::new());
        assert!(matches!(
            s.flush(&mut sink).await,
            Err(AppWatchError::Connection(_))
        ));
        assert!(!s.liveness().is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn run_streams_changes_then_heartbeat() {
        let source = ScriptedSource::new(vec![Ok((snap(&[100]), 100)), Ok((snap(&[]), 0))]);
        let s = session(source);
        let liveness = s.liveness().clone();

        let (client, server) = tokio::io::duplex(64 * 1024);
        let handle = tokio::spawn(s.run(server));

        let mut frames = FramedRead::new(client, ChangeCodec::new());

        assert!(matches!(next(&mut frames).await, ChangeEvent::Add { pid: 100, .. }));
        assert_eq!(next(&mut frames).await, ChangeEvent::FocusChanged { pid: 100 });
        assert_eq!(next(&mut frames).await, ChangeEvent::Remove { pid: 100 });
        assert_eq!(next(&mut frames).await, ChangeEvent::FocusChanged { pid: 0 });
        // Ten idle cycles later.
        assert_eq!(next(&mut frames).await, ChangeEvent::Heartbeat);

        liveness.mark_dead();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_marked_dead_during_sleep() {
        let source = ScriptedSource::new(vec![]);
        let s = session(source);
        let liveness = s.liveness().clone();

        let (_client, server) = tokio::io::duplex(1024);
        let handle = tokio::spawn(s.run(server));

        tokio::time::sleep(Duration::from_millis(10)).await;
        liveness.mark_dead();
        tokio::time::timeout(Duration::from_millis(10), handle)
            .await
            .expect("session did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_returns_transport_error_and_marks_dead() {
        let source = ScriptedSource::new(vec![Ok((snap(&[1]), 1))]);
        let s = session(source);
        let liveness = s.liveness().clone();

        let result = s.run(FlakyWriter { budget: 0 }).await;
        assert!(matches!(result, Err(AppWatchError::Connection(_))));
        assert!(!liveness.is_alive());
    }
}
