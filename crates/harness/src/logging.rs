//! Session logging.
//!
//! Installs the global tracing subscriber with two layers: a console layer
//! and a persistent file layer. File writes are handed to a dedicated
//! listener thread over a channel so test execution never blocks on disk
//! and log lines are never interleaved mid-line. The listener is the only
//! long-lived background worker in a run and must be stopped exactly once,
//! at session end.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    OpenLogFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to start the log listener thread: {0}")]
    Listener(std::io::Error),
}

enum LogMessage {
    Line(Vec<u8>),
    // The global subscriber holds live senders for the rest of the process,
    // so the drain loop ends on an explicit shutdown message rather than on
    // channel closure.
    Shutdown,
}

/// Handle to the background log listener thread.
///
/// [`LogListener::stop`] flushes and joins the listener; repeat calls are
/// no-ops, and dropping an unstopped listener stops it.
pub struct LogListener {
    sender: mpsc::Sender<LogMessage>,
    handle: Option<JoinHandle<()>>,
}

impl LogListener {
    /// Stop the listener: signal shutdown and join the thread, flushing any
    /// buffered lines.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(LogMessage::Shutdown);
            let _ = handle.join();
        }
    }
}

impl Drop for LogListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Channel-backed writer handed to the file fmt layer.
#[derive(Clone)]
struct ChannelWriter {
    sender: mpsc::Sender<LogMessage>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A stopped listener means the session is tearing down; drop the
        // line rather than erroring the caller's span.
        let _ = self.sender.send(LogMessage::Line(buf.to_vec()));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn spawn_listener(
    file: File,
    receiver: mpsc::Receiver<LogMessage>,
) -> Result<JoinHandle<()>, LoggingError> {
    std::thread::Builder::new()
        .name("log-listener".to_string())
        .spawn(move || {
            let mut writer = BufWriter::new(file);
            while let Ok(message) = receiver.recv() {
                match message {
                    LogMessage::Line(line) => {
                        if writer.write_all(&line).is_err() {
                            break;
                        }
                        let _ = writer.flush();
                    }
                    LogMessage::Shutdown => break,
                }
            }
            let _ = writer.flush();
        })
        .map_err(LoggingError::Listener)
}

/// Initialize session logging and start the file listener.
///
/// The environment filter honors `RUST_LOG` and falls back to the supplied
/// level. The file layer writes without ANSI escapes.
pub fn init(log_file: &Path, log_level: &str) -> Result<LogListener, LoggingError> {
    let file = File::create(log_file).map_err(|source| LoggingError::OpenLogFile {
        path: log_file.display().to_string(),
        source,
    })?;

    let (sender, receiver) = mpsc::channel();
    let handle = spawn_listener(file, receiver)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let file_writer = ChannelWriter {
        sender: sender.clone(),
    };

    // A second init in the same process (repeat session in tests) keeps the
    // first subscriber; the listener still runs so stop() stays uniform.
    if tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .is_err()
    {
        eprintln!("Global subscriber already installed; keeping the existing one");
    }

    Ok(LogListener {
        sender,
        handle: Some(handle),
    })
}
