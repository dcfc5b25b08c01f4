//! Single-producer single-consumer command queue.
//!
//! The producer side stages commands locally; [`CommandProducer::flush`]
//! publishes the whole staged batch with a single ring commit, so the
//! consumer never observes half a batch. The consumer side,
//! [`CommandConsumer::dispatch_all`], runs on the render thread and executes
//! exactly the commands that were visible when it was called.
//!
//! ```text
//! control thread                         render thread
//! ──────────────                         ─────────────
//! push ─► staged ─► flush ═══ rtrb ═══► dispatch_all ─► Mixer::execute
//! ```
//!
//! Neither side blocks or allocates once the queue is built (staging may
//! grow its local buffer on the control thread).

use std::time::{Duration, Instant};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::command::Command;
use crate::error::{EngineError, Result};
use crate::mixer::Mixer;

/// Destination for commands.
///
/// Implemented by [`CommandProducer`] (threadsafe: commands cross to the
/// render thread on flush) and by [`Mixer`] (direct: commands execute
/// immediately and flush does nothing).
pub trait CommandSink {
    /// Submit one command.
    ///
    /// Fails only if the command could not be accepted; the command is then
    /// dropped.
    fn push(&mut self, cmd: Command) -> Result<()>;

    /// Make every pushed command visible to the consumer.
    fn flush(&mut self);
}

/// Create a queue holding up to `capacity` commands.
pub fn command_queue(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let capacity = capacity.max(1);
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        CommandProducer {
            producer,
            staged: Vec::with_capacity(capacity.min(1024)),
            drops: DropWarner::new("command queue full, dropping commands"),
        },
        CommandConsumer { consumer },
    )
}

/// Control-thread end of the command queue.
pub struct CommandProducer {
    producer: Producer<Command>,
    staged: Vec<Command>,
    drops: DropWarner,
}

impl CommandProducer {
    /// Number of pushed commands not yet flushed.
    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Total ring capacity.
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// Commands dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.drops.total()
    }
}

impl CommandSink for CommandProducer {
    fn push(&mut self, cmd: Command) -> Result<()> {
        if self.staged.len() >= self.producer.slots() {
            self.drops.record();
            return Err(EngineError::QueueFull);
        }
        self.staged.push(cmd);
        Ok(())
    }

    fn flush(&mut self) {
        let n = self.staged.len();
        if n == 0 {
            return;
        }
        // Free slots only grow between push and flush, so the chunk fits
        match self.producer.write_chunk_uninit(n) {
            Ok(chunk) => {
                chunk.fill_from_iter(self.staged.drain(..));
            }
            Err(e) => {
                tracing::error!(staged = n, error = %e, "command flush failed");
            }
        }
    }
}

impl std::fmt::Debug for CommandProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProducer")
            .field("staged", &self.staged.len())
            .field("free", &self.producer.slots())
            .finish()
    }
}

/// Render-thread end of the command queue.
pub struct CommandConsumer {
    consumer: Consumer<Command>,
}

impl CommandConsumer {
    /// Execute every command that was visible at the start of the call, in
    /// FIFO order. Returns the number executed.
    ///
    /// Commands flushed while this runs wait for the next call.
    pub fn dispatch_all(&mut self, mixer: &mut Mixer) -> usize {
        let available = self.consumer.slots();
        let mut count = 0;
        while count < available {
            match self.consumer.pop() {
                Ok(cmd) => {
                    mixer.execute(cmd);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        count
    }

    /// Commands waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

impl std::fmt::Debug for CommandConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandConsumer")
            .field("pending", &self.consumer.slots())
            .finish()
    }
}

/// Counts dropped items and warns at most once per second.
#[derive(Debug)]
pub(crate) struct DropWarner {
    message: &'static str,
    total: u64,
    since_warn: u64,
    last_warn: Option<Instant>,
}

impl DropWarner {
    const INTERVAL: Duration = Duration::from_secs(1);

    pub(crate) fn new(message: &'static str) -> Self {
        Self {
            message,
            total: 0,
            since_warn: 0,
            last_warn: None,
        }
    }

    pub(crate) fn record(&mut self) {
        self.total += 1;
        self.since_warn += 1;
        let now = Instant::now();
        let due = self
            .last_warn
            .is_none_or(|t| now.duration_since(t) >= Self::INTERVAL);
        if due {
            tracing::warn!(count = self.since_warn, total = self.total, "{}", self.message);
            self.last_warn = Some(now);
            self.since_warn = 0;
        }
    }

    pub(crate) fn total(&self) -> u64 {
        self.total
    }
}
