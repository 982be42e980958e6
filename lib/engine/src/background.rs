// Background job pool: a FIFO queue drained by dedicated worker threads.

use findora_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A unit of background work
pub trait BackgroundJob: Send + 'static {
    fn execute(self: Box<Self>);
}

struct Queue {
    jobs: VecDeque<Box<dyn BackgroundJob>>,
    in_flight: usize,
    running: bool,
}

impl Queue {
    #[inline]
    fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.in_flight == 0
    }
}

struct Shared {
    queue: Mutex<Queue>,
    work_ready: Condvar,
    idle: Condvar,
    processed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed-size pool of worker threads sharing one FIFO queue
pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(name: &str, threads: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                in_flight: 0,
                running: true,
            }),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            processed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let mut handles = Vec::with_capacity(threads);
        for worker_id in 0..threads.max(1) {
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", name, worker_id))
                .spawn(move || worker_loop(&shared))?;
            handles.push(handle);
        }

        Ok(Self {
            shared,
            handles: Mutex::new(handles),
        })
    }

    /// Queue a job. Fails once the pool is shutting down.
    pub fn submit(&self, job: Box<dyn BackgroundJob>) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if !queue.running {
            return Err(Error::ShutDown);
        }
        queue.jobs.push_back(job);
        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// Jobs queued but not yet started
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    pub fn processed(&self) -> u64 {
        self.shared.processed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.shared.panicked.load(Ordering::Relaxed)
    }

    /// Block until the queue is empty and no job is running
    pub fn wait_idle(&self) {
        let mut queue = self.shared.queue.lock();
        while !queue.is_idle() {
            self.shared.idle.wait(&mut queue);
        }
    }

    /// Finish queued jobs, then stop and join every worker
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.running = false;
        }
        self.shared.work_ready.notify_all();

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("background worker exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            while queue.jobs.is_empty() && queue.running {
                shared.work_ready.wait(&mut queue);
            }
            match queue.jobs.pop_front() {
                Some(job) => {
                    queue.in_flight += 1;
                    job
                }
                // Shut down and drained
                None => return,
            }
        };

        if panic::catch_unwind(AssertUnwindSafe(|| job.execute())).is_err() {
            shared.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::error!("background job panicked");
        }
        shared.processed.fetch_add(1, Ordering::Relaxed);

        let mut queue = shared.queue.lock();
        queue.in_flight -= 1;
        if queue.is_idle() {
            shared.idle.notify_all();
        }
    }
}
