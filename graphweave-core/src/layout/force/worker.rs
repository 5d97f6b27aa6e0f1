//! Background worker.
//!
//! A run is split across two tasks on the layout's executor:
//!
//! 1. the *worker* decodes a serialized [`SimulationRequest`], ticks the
//!    simulation and streams [`WorkerMessage`]s over a channel, yielding
//!    between ticks so that an abort takes effect promptly;
//!
//! 2. the *applier* drains the channel and hands each message to a
//!    [`ResultSink`], which applies it only if its generation is still the
//!    current one.
//!
//! The request crosses the task boundary as bytes, so the worker shares no
//! state with the layout that spawned it.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use super::simulation::{Simulation, SimulationRequest};
use crate::error::LayoutError;
use crate::graph::Id;
use crate::layout::Position;

/// A message streamed back from a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Tick {
        generation: u64,
        positions: Vec<(Id, Position)>,
    },
    End {
        generation: u64,
        positions: Vec<(Id, Position)>,
    },
    Failed {
        generation: u64,
        reason: String,
    },
}

/// Receiver side of a run.
pub(crate) trait ResultSink: Send + Sync + 'static {
    /// Apply positions from `generation`; `finished` marks the last batch.
    fn apply(&self, generation: u64, positions: Vec<(Id, Position)>, finished: bool);

    /// Fail the run of `generation`.
    fn fail(&self, generation: u64, error: LayoutError);
}

pub(crate) fn encode(request: &SimulationRequest) -> Result<Vec<u8>, LayoutError> {
    Ok(rmp_serde::to_vec_named(request)?)
}

pub(crate) fn decode(payload: &[u8]) -> Result<SimulationRequest, LayoutError> {
    Ok(rmp_serde::from_slice(payload)?)
}

/// Run a simulation to convergence, streaming positions.
pub(crate) async fn run_worker(
    generation: u64,
    payload: Vec<u8>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
) {
    let request = match decode(&payload) {
        Ok(request) => request,
        Err(error) => {
            let _ = messages.send(WorkerMessage::Failed {
                generation,
                reason: error.to_string(),
            });
            return;
        }
    };

    let batch = request.params.ticks_per_update.max(1);
    let mut simulation = Simulation::new(request);

    while !simulation.is_converged() {
        for _ in 0..batch {
            if simulation.is_converged() {
                break;
            }
            simulation.tick();
        }

        trace!(generation, ticks = simulation.ticks(), alpha = simulation.alpha(), "worker tick");
        if simulation.is_converged() {
            break;
        }
        let tick = WorkerMessage::Tick {
            generation,
            positions: simulation.positions(),
        };
        if messages.send(tick).is_err() {
            return;
        }
        tokio::task::yield_now().await;
    }

    let _ = messages.send(WorkerMessage::End {
        generation,
        positions: simulation.positions(),
    });
}

/// Drain worker messages into `sink` until the run ends, fails, or stalls.
pub(crate) async fn apply_results<S: ResultSink>(
    sink: std::sync::Arc<S>,
    generation: u64,
    mut messages: mpsc::UnboundedReceiver<WorkerMessage>,
    stall_timeout: Option<Duration>,
) {
    loop {
        let next = match stall_timeout {
            Some(after) => match tokio::time::timeout(after, messages.recv()).await {
                Ok(message) => message,
                Err(_) => {
                    sink.fail(generation, LayoutError::Stalled { after });
                    return;
                }
            },
            None => messages.recv().await,
        };

        match next {
            Some(WorkerMessage::Tick { generation, positions }) => {
                sink.apply(generation, positions, false);
            }
            Some(WorkerMessage::End { generation, positions }) => {
                sink.apply(generation, positions, true);
                return;
            }
            Some(WorkerMessage::Failed { generation, reason }) => {
                sink.fail(generation, LayoutError::Worker(reason));
                return;
            }
            None => {
                sink.fail(
                    generation,
                    LayoutError::Worker("worker exited before finishing".to_owned()),
                );
                return;
            }
        }
    }
}
