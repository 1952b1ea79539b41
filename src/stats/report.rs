//! Point-in-time statistics over everything recorded so far

use super::{estimate_all, Aggregator};
use crate::error::Result;
use crate::models::{AggregateStat, Stat};
use crate::recorder::Recorder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Aggregate plus the per-sequence stats it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub aggregate: AggregateStat,
    /// Ascending by sequence number, before sanitizing or filtering
    pub per_sequence: Vec<Stat>,
}

/// Computes [`Report`]s on demand from a shared [`Recorder`]
#[derive(Debug, Clone)]
pub struct Reporter {
    recorder: Arc<Recorder>,
    aggregator: Aggregator,
}

impl Reporter {
    pub fn new(recorder: Arc<Recorder>, aggregator: Aggregator) -> Self {
        Self {
            recorder,
            aggregator,
        }
    }

    /// Estimate and aggregate from one snapshot of the recorder
    ///
    /// Returns [`crate::AppError::NoData`] while nothing is pairable yet.
    pub fn statistics(&self) -> Result<Report> {
        let groups = self.recorder.snapshot();
        let per_sequence = estimate_all(&groups);
        let aggregate = self.aggregator.process(&per_sequence)?;

        Ok(Report {
            aggregate,
            per_sequence,
        })
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }
}
