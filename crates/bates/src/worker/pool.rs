//! Background conversion of non-PDF files.
//!
//! Workers only turn sources into PDF bytes. Numbering, stamping and ledger
//! writes stay on the coordinating thread, which consumes results strictly in
//! walker order through [`OrderedConversions`].

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::convert::ConverterRegistry;
use crate::error::{ConvertError, WorkerError};
use crate::walker::ConversionRoute;

/// Worker count used for `--jobs 0`.
pub fn available_workers() -> usize {
    num_cpus::get().max(1)
}

#[derive(Debug, Clone)]
pub struct ConversionTask {
    /// Position of the file in walker order.
    pub index: usize,
    pub route: ConversionRoute,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ConversionResult {
    pub index: usize,
    pub result: Result<Vec<u8>, ConvertError>,
}

pub struct ConversionPool {
    task_sender: Sender<ConversionTask>,
    result_receiver: Receiver<ConversionResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ConversionPool {
    pub fn new(converters: Arc<ConverterRegistry>, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (task_sender, task_receiver) = bounded::<ConversionTask>(worker_count * 2);
        let (result_sender, result_receiver) = unbounded::<ConversionResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_converters = Arc::clone(&converters);

            let handle = thread::Builder::new()
                .name(format!("bates-convert-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, task_rx, result_tx, shutdown_flag, worker_converters);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} conversion workers", worker_count);

        Ok(Self {
            task_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, task: ConversionTask) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.task_sender
            .send(task)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<ConversionResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down conversion pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Conversion worker {} panicked: {:?}", i, e);
            } else {
                debug!("Conversion worker {} finished", i);
            }
        }
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<ConversionTask>,
    result_sender: Sender<ConversionResult>,
    shutdown: Arc<AtomicBool>,
    converters: Arc<ConverterRegistry>,
) {
    debug!("Conversion worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Conversion worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                debug!("Worker {} converting #{}: {:?}", worker_id, task.index, task.path.file_name());
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    converters.convert(task.route, &task.path)
                }))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!("Worker {} converter panicked on #{}: {}", worker_id, task.index, message);
                    Err(ConvertError::Panicked(message))
                });

                if let Err(e) = result_sender.send(ConversionResult {
                    index: task.index,
                    result,
                }) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Conversion worker {} stopped", worker_id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Feeds a pool a bounded window of tasks and hands results back in index
/// order, whatever order the workers finish in.
pub struct OrderedConversions {
    pool: ConversionPool,
    pending: VecDeque<ConversionTask>,
    ready: BTreeMap<usize, Result<Vec<u8>, ConvertError>>,
    in_flight: usize,
    window: usize,
}

impl OrderedConversions {
    /// `tasks` must be sorted by index; they are taken back in that order.
    pub fn start(
        converters: Arc<ConverterRegistry>,
        worker_count: usize,
        tasks: Vec<ConversionTask>,
    ) -> Result<Self, WorkerError> {
        let pool = ConversionPool::new(converters, worker_count)?;
        let mut ordered = Self {
            pool,
            pending: tasks.into(),
            ready: BTreeMap::new(),
            in_flight: 0,
            window: worker_count.max(1) * 2,
        };
        ordered.top_up()?;
        Ok(ordered)
    }

    fn top_up(&mut self) -> Result<(), WorkerError> {
        while self.in_flight + self.ready.len() < self.window {
            match self.pending.pop_front() {
                Some(task) => {
                    self.pool.submit(task)?;
                    self.in_flight += 1;
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Blocks until the conversion for `index` is available.
    pub fn take(&mut self, index: usize) -> Result<Result<Vec<u8>, ConvertError>, WorkerError> {
        loop {
            if let Some(result) = self.ready.remove(&index) {
                self.top_up()?;
                return Ok(result);
            }
            if self.in_flight == 0 {
                return Err(WorkerError::ChannelClosed);
            }

            let finished = self.pool.recv_result().ok_or(WorkerError::ChannelClosed)?;
            self.in_flight -= 1;
            self.ready.insert(finished.index, finished.result);
            self.top_up()?;
        }
    }

    pub fn finish(self) {
        self.pool.shutdown();
        self.pool.wait();
    }
}
