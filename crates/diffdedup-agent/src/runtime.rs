//! Stage runtime.
//!
//! Drives one operator from a bounded input channel to a bounded output
//! channel. Each output event is awaited on the output channel before the
//! next input is received, so downstream back-pressure suspends input.

use diffdedup_core::{Dedup, DedupError, InputOp, OutputOp};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Log a progress line every this many input events.
const PROGRESS_EVERY: u64 = 10_000;

/// Counters for one stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Input events applied
    pub events_in: u64,
    /// Output events delivered downstream
    pub events_out: u64,
    /// Live clusters when the stage stopped
    pub clusters: usize,
}

/// A dedup operator wrapped for use in an async pipeline.
pub struct Stage<P, K, S = ()> {
    dedup: Dedup<P, K, S>,
    stats: StageStats,
}

/// Channels and task of a spawned stage.
pub struct StageHandle<P> {
    /// Feed input events here; drop it to finish the stage
    pub input: mpsc::Sender<InputOp<P>>,
    /// Output events, in emission order
    pub output: mpsc::Receiver<OutputOp<P>>,
    /// The running stage
    pub task: JoinHandle<Result<StageStats, StageError>>,
}

impl<P, K, S> Stage<P, K, S>
where
    P: Clone,
    K: Eq + Clone,
    S: Ord,
{
    /// Wrap an operator.
    #[must_use]
    pub fn new(dedup: Dedup<P, K, S>) -> Self {
        Self {
            dedup,
            stats: StageStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> StageStats {
        self.stats
    }

    /// Run until the input channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Dedup`] if an input event contradicts the
    /// operator's state, and [`StageError::DownstreamClosed`] if the output
    /// receiver is dropped. Both stop the stage.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<InputOp<P>>,
        output: mpsc::Sender<OutputOp<P>>,
    ) -> Result<StageStats, StageError> {
        tracing::info!(policy = %self.dedup.policy(), "Stage running");

        while let Some(op) = input.recv().await {
            let name = op.name();
            let id = op.id();

            let events = match self.dedup.apply(op) {
                Ok(events) => events,
                Err(err) => {
                    tracing::error!(op = name, id, error = %err, "Rejected input event");
                    return Err(err.into());
                }
            };
            self.stats.events_in += 1;

            for event in events {
                if output.send(event).await.is_err() {
                    tracing::warn!("Downstream closed, stopping stage");
                    return Err(StageError::DownstreamClosed);
                }
                self.stats.events_out += 1;
            }
            self.stats.clusters = self.dedup.len();

            if self.stats.events_in % PROGRESS_EVERY == 0 {
                tracing::info!(
                    events_in = self.stats.events_in,
                    events_out = self.stats.events_out,
                    clusters = self.stats.clusters,
                    "Stage progress"
                );
            }
        }

        tracing::info!(
            events_in = self.stats.events_in,
            events_out = self.stats.events_out,
            clusters = self.stats.clusters,
            "Input closed, stage finished"
        );
        Ok(self.stats)
    }
}

impl<P, K, S> Stage<P, K, S>
where
    P: Clone + Send + 'static,
    K: Eq + Clone + Send + 'static,
    S: Ord + Send + 'static,
{
    /// Spawn the stage on the current runtime with channels of `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn spawn(self, capacity: usize) -> StageHandle<P> {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);

        StageHandle {
            input: input_tx,
            output: output_rx,
            task: tokio::spawn(self.run(input_rx, output_tx)),
        }
    }
}

/// Errors that stop a stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The operator rejected an input event
    #[error("operator error: {0}")]
    Dedup(#[from] DedupError),
    /// The output receiver was dropped
    #[error("downstream channel closed")]
    DownstreamClosed,
}
