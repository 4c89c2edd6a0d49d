//! # Listen Worker
//!
//! Runs capture cycles on a dedicated thread and reports each outcome to the
//! caller over a channel. Audio sources are opened inside the thread because
//! device streams are not always `Send`.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use pitchmatch_core::{
    AnalysisError, AudioSource, CaptureError, CycleOutcome, Listener, ListenerConfig, NoteTable,
    Result,
};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Consecutive failed cycles after which the worker gives up.
const MAX_CONSECUTIVE_MISSES: usize = 50;

/// What one cycle produced, as seen by the main thread.
#[derive(Debug)]
pub enum CycleReport {
    Detected { cycle: u64, outcome: CycleOutcome },
    /// The cycle was skipped; the game treats it as "no note detected".
    Missed { cycle: u64, reason: String },
    /// The worker stopped for good; always the last report.
    Failed { reason: String },
}

/// Listen thread management structure.
///
/// Dropping the report receiver or calling [`ListenWorker::shutdown`]
/// stops the thread after its current cycle.
#[derive(Debug)]
pub struct ListenWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ListenWorker {
    /// Spawns the listen loop.
    ///
    /// # Arguments
    /// * `open_source` - Opens the audio source on the worker thread; called
    ///   again at the start of the next cycle whenever opening fails
    /// * `config` - Listener configuration, already validated by the caller
    /// * `table` - Notes to classify against
    /// * `max_cycles` - Cycle budget; `None` keeps listening until shutdown
    ///   or until the source closes
    ///
    /// # Returns
    /// * `(Self, Receiver<CycleReport>)` - The worker handle and its reports
    pub fn start<F, S>(
        open_source: F,
        config: ListenerConfig,
        table: NoteTable,
        max_cycles: Option<u64>,
    ) -> (Self, Receiver<CycleReport>)
    where
        F: FnMut() -> std::result::Result<S, CaptureError> + Send + 'static,
        S: AudioSource + 'static,
    {
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let thread_handle = thread::spawn(move || {
            run_cycles(open_source, &config, &table, max_cycles, &report_tx, &shutdown_rx);
            info!("[WORKER] Listen thread finished");
        });

        (
            Self {
                shutdown_tx,
                thread_handle: Some(thread_handle),
            },
            report_rx,
        )
    }

    /// Asks the thread to stop and waits for it.
    pub fn shutdown(mut self) {
        let _ = self.shutdown_tx.try_send(());
        self.join();
    }

    /// Waits for the thread to finish on its own.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("[WORKER] Listen thread panicked");
            }
        }
    }
}

/// Runs one cycle, opening the source first if no listener is active.
///
/// A failed open leaves `slot` empty so the next cycle tries again.
fn next_cycle<F, S>(
    slot: &mut Option<Listener<S>>,
    open_source: &mut F,
    config: &ListenerConfig,
    table: &NoteTable,
) -> Result<CycleOutcome>
where
    F: FnMut() -> std::result::Result<S, CaptureError>,
    S: AudioSource,
{
    let listener = match slot.take() {
        Some(listener) => listener,
        None => {
            info!("[WORKER] Opening audio source...");
            let listener = Listener::new(open_source()?, config.clone())?;
            let effective = listener.config();
            info!(
                "[WORKER] Listening at {} Hz, {} reads of {} samples per cycle",
                effective.sample_rate,
                effective.reads_per_cycle(),
                effective.chunk_size
            );
            listener
        }
    };
    slot.insert(listener).listen_cycle(table)
}

fn run_cycles<F, S>(
    mut open_source: F,
    config: &ListenerConfig,
    table: &NoteTable,
    max_cycles: Option<u64>,
    report_tx: &Sender<CycleReport>,
    shutdown_rx: &Receiver<()>,
) where
    F: FnMut() -> std::result::Result<S, CaptureError>,
    S: AudioSource,
{
    let mut listener = None;
    let mut cycle = 0_u64;
    let mut consecutive_misses = 0;

    while max_cycles.is_none_or(|max| cycle < max) {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("[WORKER] Received shutdown signal");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        let report = match next_cycle(&mut listener, &mut open_source, config, table) {
            Ok(outcome) => {
                consecutive_misses = 0;
                CycleReport::Detected { cycle, outcome }
            }
            Err(AnalysisError::Capture(CaptureError::StreamClosed)) => {
                info!("[WORKER] Audio source closed after {} cycles", cycle);
                break;
            }
            Err(e @ AnalysisError::InvalidConfiguration(_)) => {
                error!("[WORKER] Fatal error configuring listener: {}", e);
                let _ = report_tx.send(CycleReport::Failed {
                    reason: e.to_string(),
                });
                break;
            }
            Err(e) => {
                consecutive_misses += 1;
                warn!("[WORKER] Cycle {} missed: {}", cycle, e);
                CycleReport::Missed {
                    cycle,
                    reason: e.to_string(),
                }
            }
        };

        if report_tx.send(report).is_err() {
            info!("[WORKER] Report channel closed");
            break;
        }

        if consecutive_misses >= MAX_CONSECUTIVE_MISSES {
            error!("[WORKER] {} consecutive misses, giving up", consecutive_misses);
            let _ = report_tx.send(CycleReport::Failed {
                reason: format!("{consecutive_misses} consecutive cycles missed"),
            });
            break;
        }
        cycle += 1;
    }
}
