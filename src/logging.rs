use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Log lines buffered for `/api/logs` subscribers before the oldest are dropped.
pub(crate) const LOG_CHANNEL_CAPACITY: usize = 500;

/// Tees every formatted log line to stdout and to a broadcast channel that
/// the API streams as server-sent events.
#[derive(Clone)]
pub(crate) struct SseMakeWriter {
    pub sender: tokio::sync::broadcast::Sender<String>,
    pub suppress_stdout: bool,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
            suppress_stdout: self.suppress_stdout,
        }
    }
}

pub(crate) struct SseWriter {
    sender: tokio::sync::broadcast::Sender<String>,
    suppress_stdout: bool,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf).trim_end().to_string();
        // No receivers is the normal case when nobody watches the stream.
        let _ = self.sender.send(line);
        if !self.suppress_stdout {
            std::io::stdout().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stdout {
            std::io::stdout().flush()?;
        }
        Ok(())
    }
}

/// Install the global subscriber and return the sender backing `/api/logs`.
pub(crate) fn init(verbose: bool) -> tokio::sync::broadcast::Sender<String> {
    let (log_tx, _) = tokio::sync::broadcast::channel::<String>(LOG_CHANNEL_CAPACITY);
    let make_writer = SseMakeWriter {
        sender: log_tx.clone(),
        suppress_stdout: false,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    // Already set when called twice in one process (tests).
    tracing::subscriber::set_global_default(subscriber).ok();
    log_tx
}
