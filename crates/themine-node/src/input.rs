use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use themine_core::call::CallEnvelope;
use themine_rpc::QueuedCall;

/// Feed one envelope per line into the apply queue.
///
/// Blank lines and lines starting with `#` are skipped. Lines that do not
/// parse are logged and counted. Returns the number of malformed lines once
/// the reader is exhausted or the queue closes.
pub async fn feed_calls<R>(reader: R, sender: mpsc::Sender<QueuedCall>) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut malformed = 0u64;
    let mut line_no = 0u64;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "call input unreadable; stopping reader");
                break;
            }
        };
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match CallEnvelope::from_json_line(trimmed) {
            Ok(envelope) => {
                if sender.send(QueuedCall { envelope, reply: None }).await.is_err() {
                    debug!("apply queue closed; stopping reader");
                    break;
                }
            }
            Err(e) => {
                malformed += 1;
                warn!(line = line_no, error = %e, "skipping malformed call");
            }
        }
    }
    malformed
}
