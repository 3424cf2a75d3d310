use crate::record::LogRecord;
use crate::sink::SinkBinding;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Smallest channel capacity the dispatcher accepts.
const MIN_BUFFER: usize = 16;

enum Command {
    Record(LogRecord),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of the dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records handed to `dispatch`.
    pub total: u64,
    /// Records accepted into the channel.
    pub enqueued: u64,
    /// Records dropped because the channel was full or closed.
    pub dropped: u64,
    /// Successful sink deliveries (one per binding).
    pub delivered: u64,
    /// Sink deliveries that returned an error.
    pub failed: u64,
}

/// Delivers records to sink bindings from a background task.
///
/// `dispatch` never blocks and never fails: records are queued on a bounded
/// channel and dropped when it is full. The background task offers each
/// record to every binding whose level it passes. Sink errors are counted
/// and discarded.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Command>,
    bindings: Arc<[SinkBinding]>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Spawn the delivery task. Must be called within a Tokio runtime.
    pub fn spawn(bindings: Vec<SinkBinding>, buffer: usize) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(MIN_BUFFER);
        let (tx, mut rx) = mpsc::channel::<Command>(buffer);
        let bindings: Arc<[SinkBinding]> = bindings.into();
        let counters = Arc::new(Counters::default());

        let bindings_bg = Arc::clone(&bindings);
        let counters_bg = Arc::clone(&counters);

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Record(record) => deliver(&bindings_bg, &record, &counters_bg).await,
                    Command::Flush(ack) => {
                        flush_all(&bindings_bg).await;
                        let _ = ack.send(());
                    }
                    Command::Shutdown(ack) => {
                        flush_all(&bindings_bg).await;
                        close_all(&bindings_bg).await;
                        let _ = ack.send(());
                        break;
                    }
                }
            }
        });

        (
            Self {
                sender: tx,
                bindings,
                counters,
            },
            handle,
        )
    }

    /// Queue `record` for delivery.
    pub fn dispatch(&self, record: LogRecord) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        match self.sender.try_send(Command::Record(record)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("log channel full, dropping log record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("log dispatcher stopped, dropping log record");
            }
        }
    }

    /// Wait until every record queued before this call has been offered to
    /// the sinks, then flush them.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Command::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Flush and close every sink, then stop the delivery task.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Command::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    pub fn bindings(&self) -> &[SinkBinding] {
        &self.bindings
    }

    /// True when any bound sink supports proactive delivery.
    pub fn can_send(&self) -> bool {
        self.bindings.iter().any(|binding| binding.sink.can_send())
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            total: self.counters.total.load(Ordering::Relaxed),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

async fn deliver(bindings: &[SinkBinding], record: &LogRecord, counters: &Counters) {
    for binding in bindings.iter().filter(|binding| binding.accepts(record)) {
        match binding.sink.send(record).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(sink = %binding.kind, error = %e, "log sink send failed, record discarded");
            }
        }
    }
}

async fn flush_all(bindings: &[SinkBinding]) {
    for binding in bindings {
        if let Err(e) = binding.sink.flush().await {
            tracing::debug!(sink = %binding.kind, error = %e, "log sink flush failed");
        }
    }
}

async fn close_all(bindings: &[SinkBinding]) {
    for binding in bindings {
        if let Err(e) = binding.sink.close().await {
            tracing::debug!(sink = %binding.kind, error = %e, "log sink close failed");
        }
    }
}
