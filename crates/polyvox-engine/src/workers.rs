//! Parallel voice rendering.
//!
//! A [`WorkerPool`] keeps `N` render threads parked on a condition variable.
//! For a render, the main thread moves every active voice into a bounded job
//! channel, hands each woken worker its private [`BufferSet`], and then
//! renders jobs itself while the workers do the same. A worker renders until
//! the channel is empty, sends its buffers back, flips its status to
//! [`WorkerStatus::Ready`] and notifies the main thread, which sums the
//! buffers into the shared set.
//!
//! ## Worker state machine
//!
//! ```text
//!   Idle ──(assigned by main)──► Rendering ──(jobs exhausted)──► Ready
//!    ▲                                                             │
//!    └──────────────────(buffers merged by main)───────────────────┘
//!   any ──(pool shut down)──► Terminate
//! ```
//!
//! Voices travel as `Box<Voice>` and buffer sets by value, so at any moment
//! each is owned by exactly one thread. The only locks are the two condvar
//! mutexes, taken just before a thread sleeps or right after it finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex};
use polyvox_voice::Voice;

use crate::buffers::{BufferSet, SendRoutes};
use crate::error::{EngineError, Result};

/// Lifecycle state of one render worker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Parked, waiting for an assignment.
    Idle = 0,
    /// Assigned and pulling voices.
    Rendering = 1,
    /// Done; its buffers are waiting to be merged.
    Ready = 2,
    /// Shutting down.
    Terminate = 3,
}

impl WorkerStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerStatus::Idle,
            1 => WorkerStatus::Rendering,
            2 => WorkerStatus::Ready,
            _ => WorkerStatus::Terminate,
        }
    }
}

/// A voice waiting to be rendered, tagged with its slot in the active list.
struct Job {
    slot: usize,
    voice: Box<Voice>,
}

/// A rendered voice on its way back to the main thread.
struct Done {
    slot: usize,
    voice: Box<Voice>,
    finished: bool,
}

struct Assignment {
    buffers: BufferSet,
    routes: SendRoutes,
    blocks: usize,
}

struct WakeState {
    assignments: Vec<Option<Assignment>>,
    terminate: bool,
}

struct Shared {
    status: Vec<AtomicU8>,
    wake: Mutex<WakeState>,
    wake_cv: Condvar,
    ready: Mutex<()>,
    ready_cv: Condvar,
}

impl Shared {
    fn status(&self, worker: usize) -> WorkerStatus {
        WorkerStatus::from_u8(self.status[worker].load(Ordering::Acquire))
    }

    fn set_status(&self, worker: usize, status: WorkerStatus) {
        self.status[worker].store(status as u8, Ordering::Release);
    }

    fn any_rendering(&self) -> bool {
        (0..self.status.len()).any(|w| self.status(w) == WorkerStatus::Rendering)
    }
}

/// Output slots filled by [`WorkerPool::render`], indexed by voice slot.
pub(crate) struct SlotResults<'a> {
    pub(crate) voices: &'a mut [Option<Box<Voice>>],
    pub(crate) finished: &'a mut [bool],
}

/// Fixed set of render threads.
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    jobs_tx: Sender<Job>,
    jobs_rx: Receiver<Job>,
    done_rx: Receiver<Done>,
    filled_rx: Receiver<(usize, BufferSet)>,
    idle_buffers: Vec<Option<BufferSet>>,
}

impl WorkerPool {
    /// Start `threads` workers, each with a private buffer set shaped like
    /// `layout`. Job queues are sized for `polyphony` voices.
    ///
    /// Not real-time safe. On failure every thread already started is
    /// stopped again.
    pub fn new(threads: usize, layout: &BufferSet, polyphony: usize) -> Result<Self> {
        let polyphony = polyphony.max(1);
        let (jobs_tx, jobs_rx) = bounded::<Job>(polyphony);
        let (done_tx, done_rx) = bounded::<Done>(polyphony);
        let (filled_tx, filled_rx) = bounded::<(usize, BufferSet)>(threads.max(1));

        let shared = Arc::new(Shared {
            status: (0..threads)
                .map(|_| AtomicU8::new(WorkerStatus::Idle as u8))
                .collect(),
            wake: Mutex::new(WakeState {
                assignments: (0..threads).map(|_| None).collect(),
                terminate: false,
            }),
            wake_cv: Condvar::new(),
            ready: Mutex::new(()),
            ready_cv: Condvar::new(),
        });

        let mut pool = Self {
            shared,
            handles: Vec::with_capacity(threads),
            jobs_tx,
            jobs_rx,
            done_rx,
            filled_rx,
            idle_buffers: Vec::with_capacity(threads),
        };

        for index in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let jobs = pool.jobs_rx.clone();
            let done = done_tx.clone();
            let filled = filled_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("polyvox-render-{index}"))
                .spawn(move || worker_loop(index, &shared, &jobs, &done, &filled));
            match spawned {
                Ok(handle) => {
                    pool.handles.push(handle);
                    pool.idle_buffers
                        .push(Some(BufferSet::new(layout.groups(), layout.max_blocks())));
                }
                Err(e) => {
                    tracing::error!(worker = index, error = %e, "failed to spawn render worker");
                    pool.shutdown();
                    return Err(EngineError::ThreadSpawn(e.to_string()));
                }
            }
        }

        tracing::info!(threads, "render worker pool started");
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    /// Current status of worker `index`.
    pub fn status(&self, index: usize) -> Option<WorkerStatus> {
        (index < self.shared.status.len()).then(|| self.shared.status(index))
    }

    /// Render every voice in `voices` using the main thread plus `extra`
    /// workers, summing all output into `main`.
    ///
    /// `voices` is left empty; each voice comes back in `out.voices` at its
    /// original slot and `out.finished[slot]` says whether it ended.
    pub(crate) fn render(
        &mut self,
        main: &mut BufferSet,
        voices: &mut Vec<Box<Voice>>,
        out: SlotResults<'_>,
        routes: SendRoutes,
        blocks: usize,
        extra: usize,
    ) {
        let SlotResults {
            voices: slots,
            finished,
        } = out;

        let mut outstanding = 0usize;
        for (slot, voice) in voices.drain(..).enumerate() {
            match self.jobs_tx.try_send(Job { slot, voice }) {
                Ok(()) => outstanding += 1,
                Err(TrySendError::Full(job) | TrySendError::Disconnected(job)) => {
                    let Job { slot, mut voice } = job;
                    finished[slot] = main.render_voice(&mut voice, routes, blocks);
                    slots[slot] = Some(voice);
                }
            }
        }

        let mut busy = 0usize;
        {
            let mut wake = self.shared.wake.lock();
            for w in 0..extra.min(self.handles.len()) {
                if let Some(buffers) = self.idle_buffers[w].take() {
                    self.shared.set_status(w, WorkerStatus::Rendering);
                    wake.assignments[w] = Some(Assignment {
                        buffers,
                        routes,
                        blocks,
                    });
                    busy += 1;
                }
            }
        }
        self.shared.wake_cv.notify_all();

        loop {
            while let Ok(Done {
                slot,
                voice,
                finished: ended,
            }) = self.done_rx.try_recv()
            {
                finished[slot] = ended;
                slots[slot] = Some(voice);
                outstanding -= 1;
            }

            while let Ok((w, buffers)) = self.filled_rx.try_recv() {
                main.add_from(&buffers, blocks);
                self.idle_buffers[w] = Some(buffers);
                self.shared.set_status(w, WorkerStatus::Idle);
                busy -= 1;
            }

            if outstanding == 0 && busy == 0 {
                break;
            }

            if let Ok(Job { slot, mut voice }) = self.jobs_rx.try_recv() {
                finished[slot] = main.render_voice(&mut voice, routes, blocks);
                slots[slot] = Some(voice);
                outstanding -= 1;
                continue;
            }

            let mut guard = self.shared.ready.lock();
            if self.shared.any_rendering() {
                self.shared.ready_cv.wait(&mut guard);
            } else if busy == 0 && self.done_rx.is_empty() {
                tracing::error!(outstanding, "render workers stopped with voices outstanding");
                break;
            }
        }
    }

    /// Stop and join every worker. Idempotent.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        {
            let mut wake = self.shared.wake.lock();
            wake.terminate = true;
            for w in 0..self.shared.status.len() {
                self.shared.set_status(w, WorkerStatus::Terminate);
            }
        }
        self.shared.wake_cv.notify_all();

        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("render worker panicked");
            }
        }
        self.idle_buffers.clear();
        tracing::info!(threads = count, "render worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.handles.len())
            .finish_non_exhaustive()
    }
}

fn worker_loop(
    index: usize,
    shared: &Shared,
    jobs: &Receiver<Job>,
    done: &Sender<Done>,
    filled: &Sender<(usize, BufferSet)>,
) {
    loop {
        let assignment = {
            let mut wake = shared.wake.lock();
            loop {
                if wake.terminate {
                    return;
                }
                if let Some(a) = wake.assignments[index].take() {
                    break a;
                }
                shared.wake_cv.wait(&mut wake);
            }
        };

        let Assignment {
            mut buffers,
            routes,
            blocks,
        } = assignment;
        buffers.zero(blocks);

        while let Ok(Job { slot, mut voice }) = jobs.try_recv() {
            let finished = buffers.render_voice(&mut voice, routes, blocks);
            if done
                .send(Done {
                    slot,
                    voice,
                    finished,
                })
                .is_err()
            {
                return;
            }
        }

        // Ready must land before the buffers do; the main thread owns Idle
        shared.set_status(index, WorkerStatus::Ready);
        if filled.send((index, buffers)).is_err() {
            return;
        }
        let _guard = shared.ready.lock();
        shared.ready_cv.notify_one();
    }
}
