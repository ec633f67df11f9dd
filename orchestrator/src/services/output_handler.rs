//! Helper to handle managed server stdout/stderr output
//!
//! Server output is always drained so a chatty child can never block on a
//! full pipe. Lines are forwarded to the log at debug level and, while a
//! log-pattern readiness watcher is listening, copied to it as well.

use std::io::ErrorKind;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;

use shared::{Component, component_debug, component_warn};

/// Spawn consumers for a child's piped output.
///
/// Returns a line receiver when `capture` is set. It yields `None` once both
/// streams have closed, which usually means the process has exited.
pub fn forward_output(
    server: &str,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    capture: bool,
) -> Option<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = if capture {
        let (tx, rx) = mpsc::unbounded_channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    if let Some(stdout) = stdout {
        spawn_line_reader(stdout, Component::Server(server.to_string()), "stdout", tx.clone());
    }

    if let Some(stderr) = stderr {
        spawn_line_reader(stderr, Component::Server(server.to_string()), "stderr", tx);
    }

    rx
}

fn spawn_line_reader<R>(
    stream: R,
    component: Component,
    stream_name: &'static str,
    tx: Option<mpsc::UnboundedSender<String>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    component_warn!(component, stream = stream_name, "Output read failed: {}", e);
                    break;
                }
            }

            // Servers may print arbitrary bytes; never stop draining over encoding
            let line = decode_line(&buf);
            component_debug!(component, stream = stream_name, "{}", line);

            // The watcher goes away once readiness is decided
            if let Some(ref tx) = tx {
                let _ = tx.send(line);
            }
        }
    });
}

/// Lossy UTF-8 without the line terminator
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
