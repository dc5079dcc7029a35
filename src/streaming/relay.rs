//! Streaming relay and flush scheduler
//!
//! Backend bytes flow through a bounded pipeline before they reach the client:
//!
//! ```text
//! upstream ──► accumulation buffer ──(tick / high-water / end)──► flush queue ──► writer pool ──► client body
//! ```
//!
//! The accumulation buffer is owned by the producer loop alone. A flush hands
//! its contents off with `split().freeze()`, so a queued chunk never aliases
//! the buffer the producer keeps writing into. When the queue is full a tick
//! is skipped and the bytes ride along with the next flush. Writers take the
//! queue lock for "pick + write", which keeps chunks in queue order even with
//! several writers.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use axum::body::Body;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::pool::BufferPool;

/// Flush scheduler tuning
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Period of the flush ticker
    pub flush_interval: Duration,
    /// Capacity of the bounded flush queue
    pub queue_capacity: usize,
    /// Number of writer tasks draining the queue
    pub workers: usize,
    /// Buffered bytes that force a flush, waiting for queue space if needed
    pub high_water_mark: usize,
    /// Initial capacity of pooled accumulation buffers
    pub buffer_capacity: usize,
    /// Buffers kept idle in the pool between requests
    pub max_idle_buffers: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(200),
            queue_capacity: 10,
            workers: 10,
            high_water_mark: 1024 * 1024,
            buffer_capacity: 32 * 1024,
            max_idle_buffers: 64,
        }
    }
}

impl RelayConfig {
    /// Reject settings tokio cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.flush_interval.is_zero(), "flush interval must be positive");
        ensure!(self.queue_capacity > 0, "flush queue capacity must be positive");
        ensure!(self.workers > 0, "flush worker count must be positive");
        ensure!(self.high_water_mark > 0, "buffer high-water mark must be positive");
        Ok(())
    }
}

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTermination {
    /// Backend stream reached end-of-input and everything was handed off
    Completed,
    /// Client went away; remaining backend bytes are dropped
    ClientDisconnected,
    /// Backend stream failed mid-response; the client sees a truncated body
    UpstreamFailed,
    /// Writing to the client failed
    WriteFailed,
}

impl RelayTermination {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayTermination::Completed => "completed",
            RelayTermination::ClientDisconnected => "client_disconnected",
            RelayTermination::UpstreamFailed => "upstream_failed",
            RelayTermination::WriteFailed => "write_failed",
        }
    }
}

/// Summary of one relay run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub termination: RelayTermination,
    /// Bytes read from the backend
    pub bytes_received: u64,
    /// Bytes handed to the flush queue (includes any trailer)
    pub bytes_flushed: u64,
    /// Number of chunks handed to the flush queue
    pub flushes: u64,
    /// Ticks skipped because the queue was full
    pub dropped_ticks: u64,
}

/// Sending half of a client response body
pub type ClientSink = mpsc::Sender<Bytes>;

/// Create a streaming response body and the sink that feeds it.
///
/// The sink reports `closed()` once the body is dropped, which is how a
/// client disconnect becomes visible to the relay.
pub fn client_body() -> (ClientSink, Body) {
    let (sink, mut receiver) = mpsc::channel::<Bytes>(1);

    let stream = async_stream::stream! {
        while let Some(chunk) = receiver.recv().await {
            yield Ok::<_, Infallible>(chunk);
        }
    };

    (sink, Body::from_stream(stream))
}

/// Relays a backend byte stream into a client body through the flush pipeline
#[derive(Debug, Clone)]
pub struct StreamRelay {
    config: RelayConfig,
    buffers: Arc<BufferPool>,
}

#[derive(Debug, Default)]
struct WriterExit {
    written: u64,
    write_failed: bool,
}

impl StreamRelay {
    pub fn new(config: RelayConfig) -> Self {
        let buffers = Arc::new(BufferPool::new(
            config.buffer_capacity,
            config.max_idle_buffers,
        ));
        Self { config, buffers }
    }

    /// Drive `upstream` into `sink` until the backend finishes or the client leaves.
    ///
    /// `trailer` is appended after the backend's bytes only when the backend
    /// stream completed normally.
    pub async fn run<S, E>(
        &self,
        upstream: S,
        sink: ClientSink,
        trailer: Option<Bytes>,
    ) -> RelayOutcome
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut buffer = self.buffers.acquire();
        let (queue_tx, queue_rx) = mpsc::channel::<Bytes>(self.config.queue_capacity);

        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let writers: Vec<_> = (0..self.config.workers)
            .map(|id| tokio::spawn(write_worker(id, Arc::clone(&queue_rx), sink.clone())))
            .collect();
        // Writers own the receiver; once they all exit, queue sends fail fast.
        drop(queue_rx);

        let mut ticker = interval_at(
            Instant::now() + self.config.flush_interval,
            self.config.flush_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut upstream = std::pin::pin!(upstream);
        let mut bytes_received = 0u64;
        let mut bytes_flushed = 0u64;
        let mut flushes = 0u64;
        let mut dropped_ticks = 0u64;

        let mut termination = loop {
            tokio::select! {
                biased;

                _ = sink.closed() => break RelayTermination::ClientDisconnected,

                _ = ticker.tick() => {
                    if buffer.is_empty() {
                        continue;
                    }
                    match queue_tx.try_reserve() {
                        Ok(permit) => {
                            let chunk = buffer.split().freeze();
                            bytes_flushed += chunk.len() as u64;
                            flushes += 1;
                            permit.send(chunk);
                        }
                        Err(mpsc::error::TrySendError::Full(())) => {
                            dropped_ticks += 1;
                            metrics::counter!("relay_flush_dropped_total").increment(1);
                            debug!(
                                pending = buffer.len(),
                                "Flush queue full, carrying bytes to next tick"
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(())) => {
                            break RelayTermination::WriteFailed;
                        }
                    }
                }

                next = upstream.next() => match next {
                    Some(Ok(chunk)) => {
                        bytes_received += chunk.len() as u64;
                        buffer.extend_from_slice(&chunk);

                        if buffer.len() >= self.config.high_water_mark {
                            let chunk = buffer.split().freeze();
                            let len = chunk.len() as u64;
                            if queue_tx.send(chunk).await.is_err() {
                                break RelayTermination::WriteFailed;
                            }
                            bytes_flushed += len;
                            flushes += 1;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(
                            error = %e,
                            received = bytes_received,
                            "Upstream stream failed mid-response"
                        );
                        break RelayTermination::UpstreamFailed;
                    }
                    None => break RelayTermination::Completed,
                },
            }
        };

        if matches!(
            termination,
            RelayTermination::Completed | RelayTermination::UpstreamFailed
        ) {
            if termination == RelayTermination::Completed {
                if let Some(trailer) = &trailer {
                    buffer.extend_from_slice(trailer);
                }
            }

            if !buffer.is_empty() {
                let chunk = buffer.split().freeze();
                let len = chunk.len() as u64;
                if queue_tx.send(chunk).await.is_ok() {
                    bytes_flushed += len;
                    flushes += 1;
                } else {
                    termination = RelayTermination::WriteFailed;
                }
            }
        }

        drop(queue_tx);
        drop(buffer);

        let mut written = 0u64;
        for writer in writers {
            match writer.await {
                Ok(exit) => {
                    written += exit.written;
                    if exit.write_failed && termination == RelayTermination::Completed {
                        termination = RelayTermination::WriteFailed;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Relay writer task failed");
                    if termination == RelayTermination::Completed {
                        termination = RelayTermination::WriteFailed;
                    }
                }
            }
        }

        if termination == RelayTermination::Completed
            && sink.is_closed()
            && written < bytes_flushed
        {
            termination = RelayTermination::ClientDisconnected;
        }

        RelayOutcome {
            termination,
            bytes_received,
            bytes_flushed,
            flushes,
            dropped_ticks,
        }
    }
}

async fn write_worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    sink: ClientSink,
) -> WriterExit {
    let mut exit = WriterExit::default();

    loop {
        // Held across the write so chunks leave in the order they were queued.
        let mut queue = queue.lock().await;
        let Some(chunk) = queue.recv().await else {
            return exit;
        };

        let len = chunk.len() as u64;
        if sink.send(chunk).await.is_err() {
            warn!(worker = id, "Error writing response: client connection closed");
            exit.write_failed = true;
            return exit;
        }
        exit.written += len;
    }
}
