//! Command receiver: reads key chords from the client and replays them.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::command::CommandCodec;
use crate::error::AppWatchError;
use crate::liveness::Liveness;
use crate::platform::KeyInjector;

/// Read command frames until the client goes away or the connection is
/// marked dead, injecting each chord as it arrives.
///
/// A failed injection is logged and the loop carries on. End of stream
/// is a normal exit; a truncated frame or read error is returned. The
/// connection is marked dead on every exit path.
///
/// Returns the number of commands handled.
pub async fn run_command_loop<R>(
    reader: R,
    injector: Arc<dyn KeyInjector>,
    liveness: Liveness,
) -> Result<u64, AppWatchError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, CommandCodec);
    let mut handled = 0u64;

    let result = loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = liveness.dead() => break Ok(handled),
        };

        match next {
            Some(Ok(frame)) => {
                debug!(
                    key_code = frame.key_code,
                    modifiers = frame.modifiers.bits(),
                    "command received"
                );
                if let Err(e) = injector.inject_sequence(&frame.keystrokes()) {
                    warn!("key injection failed: {e}");
                }
                handled += 1;
            }
            Some(Err(e)) => break Err(e),
            None => {
                info!("client closed command stream");
                break Ok(handled);
            }
        }
    };

    liveness.mark_dead();
    result
}
