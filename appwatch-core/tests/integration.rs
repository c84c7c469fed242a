//! Integration tests: a full session over a real TCP connection on
//! localhost, with scripted collaborators standing in for the desktop.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appwatch_core::{
    AppMirror, AppWatchError, ApplicationRecord, ChangeCodec, ChangeEvent, CommandCodec,
    CommandFrame, Desktop, IconExtractor, KeyAction, KeyInjector, KeyStroke, Liveness,
    Modifiers, Pid, ProcessSource, RefreshInterval, Snapshot, serve_connection,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

// ── Fakes ────────────────────────────────────────────────────────

/// Steps through scripted (snapshot, focus) pairs, then repeats the last.
struct Script {
    steps: Mutex<VecDeque<(Vec<(Pid, &'static str)>, Pid)>>,
    current: Mutex<(Snapshot, Pid)>,
}

impl Script {
    fn new(steps: Vec<(Vec<(Pid, &'static str)>, Pid)>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            current: Mutex::new((Snapshot::new(), 0)),
        })
    }
}

impl ProcessSource for Script {
    fn snapshot(&self) -> Result<Snapshot, AppWatchError> {
        let mut current = self.current.lock().unwrap();
        if let Some((apps, focus)) = self.steps.lock().unwrap().pop_front() {
            let snapshot: Snapshot = apps
                .into_iter()
                .map(|(pid, name)| ApplicationRecord::new(pid, name, format!("/bin/{name}")))
                .collect();
            *current = (snapshot, focus);
        }
        Ok(current.0.clone())
    }

    fn foreground_pid(&self) -> Pid {
        self.current.lock().unwrap().1
    }
}

/// Icons are the file name bytes, so tests can tell them apart.
struct NameIcon;

impl IconExtractor for NameIcon {
    fn extract_icon(&self, exec_path: &Path) -> Option<Vec<u8>> {
        exec_path
            .file_name()
            .map(|n| n.to_string_lossy().as_bytes().to_vec())
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<KeyStroke>>);

impl KeyInjector for Recorder {
    fn inject_key(&self, key_code: u32, action: KeyAction) -> Result<(), AppWatchError> {
        self.0.lock().unwrap().push(KeyStroke { key_code, action });
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn fast_refresh() -> RefreshInterval {
    RefreshInterval::from_millis(501).unwrap()
}

/// Serve exactly one connection on an ephemeral port.
async fn spawn_server(
    desktop: Desktop,
) -> (std::net::SocketAddr, Liveness, JoinHandle<Result<(), AppWatchError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let liveness = Liveness::new();

    let handle = tokio::spawn({
        let liveness = liveness.clone();
        async move {
            let (stream, _) = listener.accept().await?;
            let (reader, writer) = stream.into_split();
            serve_connection(reader, writer, &desktop, fast_refresh(), liveness).await
        }
    });

    (addr, liveness, handle)
}

async fn next_event<R>(frames: &mut FramedRead<R, ChangeCodec>) -> ChangeEvent
where
    R: tokio::io::AsyncRead + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("no event within 5s")
        .expect("stream closed")
        .expect("decode failed")
}

// ── Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn client_mirrors_remote_changes() {
    let script = Script::new(vec![
        (vec![(10, "notepad.exe"), (20, "calc.exe")], 10),
        (vec![(20, "calc.exe"), (30, "mspaint.exe")], 30),
    ]);
    let desktop = Desktop {
        source: script,
        icons: Arc::new(NameIcon),
        injector: Arc::new(Recorder::default()),
    };
    let (addr, liveness, server) = spawn_server(desktop).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, _writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, ChangeCodec::new());
    let mut mirror = AppMirror::new();

    let mut first = Vec::new();
    for _ in 0..3 {
        first.push(next_event(&mut frames).await);
    }
    match &first[0] {
        ChangeEvent::Add { pid, record, icon } => {
            assert_eq!(*pid, 10);
            assert_eq!(record.name, "notepad.exe");
            assert_eq!(icon.as_deref(), Some(b"notepad.exe".as_slice()));
        }
        other => panic!("expected Add, got {other:?}"),
    }
    assert!(matches!(first[1], ChangeEvent::Add { pid: 20, .. }));
    assert_eq!(first[2], ChangeEvent::FocusChanged { pid: 10 });
    first.into_iter().for_each(|e| mirror.apply(e));

    let second = [
        next_event(&mut frames).await,
        next_event(&mut frames).await,
        next_event(&mut frames).await,
    ];
    assert!(matches!(second[0], ChangeEvent::Add { pid: 30, .. }));
    assert_eq!(second[1], ChangeEvent::Remove { pid: 10 });
    assert_eq!(second[2], ChangeEvent::FocusChanged { pid: 30 });
    second.into_iter().for_each(|e| mirror.apply(e));

    let mut names: Vec<_> = mirror.apps().map(|a| a.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["calc.exe", "mspaint.exe"]);
    assert_eq!(mirror.focus(), 30);
    assert!(mirror.get(30).unwrap().has_focus);

    liveness.mark_dead();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn commands_reach_the_injector() {
    let injector = Arc::new(Recorder::default());
    let desktop = Desktop {
        source: Script::new(vec![(vec![(1, "shell.exe")], 1)]),
        icons: Arc::new(NameIcon),
        injector: injector.clone(),
    };
    let (addr, _liveness, server) = spawn_server(desktop).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, ChangeCodec::new());
    let mut commands = FramedWrite::new(writer, CommandCodec);

    // Wait for the session to be up before sending.
    assert!(matches!(next_event(&mut frames).await, ChangeEvent::Add { pid: 1, .. }));

    commands
        .send(CommandFrame::new(Modifiers::SHIFT | Modifiers::ALT, 0x09))
        .await
        .unwrap();

    // Closing the client ends both loops.
    drop(commands);
    drop(frames);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("session did not end")
        .unwrap()
        .ok();

    assert_eq!(
        *injector.0.lock().unwrap(),
        vec![
            KeyStroke::press(0x10),
            KeyStroke::press(0x12),
            KeyStroke::press(0x09),
            KeyStroke::release(0x09),
            KeyStroke::release(0x10),
            KeyStroke::release(0x12),
        ]
    );
}

#[tokio::test]
async fn session_ends_when_client_disconnects() {
    let desktop = Desktop {
        source: Script::new(vec![(vec![(5, "idle.exe")], 0)]),
        icons: Arc::new(NameIcon),
        injector: Arc::new(Recorder::default()),
    };
    let (addr, liveness, server) = spawn_server(desktop).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    drop(stream);

    // The command loop sees end of stream and marks the connection dead.
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("session did not end")
        .unwrap()
        .ok();
    assert!(!liveness.is_alive());
}
