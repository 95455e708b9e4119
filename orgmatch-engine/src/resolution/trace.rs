// Debug trace collection for one resolution
//
// Events are only buffered when tracing was requested (per query or by
// `debug_trace`); state transitions are always emitted as `tracing` events.

use crate::resolution::types::{DebugTrace, ResolutionState, TraceEvent, TraceEventKind};
use std::time::Instant;
use uuid::Uuid;

pub struct TraceRecorder {
    enabled: bool,
    started: Instant,
    resolution_id: Uuid,
    query: String,
    events: Vec<TraceEvent>,
}

impl TraceRecorder {
    pub fn new(query: &str, enabled: bool) -> Self {
        Self {
            enabled,
            started: Instant::now(),
            resolution_id: Uuid::new_v4(),
            query: query.to_string(),
            events: Vec::new(),
        }
    }

    pub fn resolution_id(&self) -> Uuid {
        self.resolution_id
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    pub fn enter(&mut self, state: ResolutionState) {
        tracing::trace!(
            resolution_id = %self.resolution_id,
            state = ?state,
            "Resolution state"
        );
        self.record(TraceEventKind::StateEntered { state });
    }

    pub fn record(&mut self, kind: TraceEventKind) {
        if self.enabled {
            let elapsed_ms = self.elapsed_ms();
            self.events.push(TraceEvent { elapsed_ms, kind });
        }
    }

    /// The collected trace, or `None` when tracing was not requested
    pub fn finish(self) -> Option<DebugTrace> {
        if !self.enabled {
            return None;
        }
        let total_elapsed_ms = self.elapsed_ms();
        Some(DebugTrace {
            resolution_id: self.resolution_id,
            query: self.query,
            events: self.events,
            total_elapsed_ms,
        })
    }
}
