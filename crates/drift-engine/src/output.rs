//! Output boundary: where particle snapshots leave the engine.
//!
//! The stepper builds one frame of [`OutputRecord`]s at the run start and
//! at every `output_dt` boundary and hands it to an [`OutputSink`].
//! Persistence formats live behind the trait; [`MemoryOutput`] keeps
//! frames in memory.

use std::io;

use drift_core::{ParticleId, ParticleState, VariableSchema};
use smallvec::SmallVec;
use thiserror::Error;

use crate::particleset::ParticleSet;

/// Failure reported by an [`OutputSink`].
#[derive(Debug, Error)]
pub enum OutputError {
    /// The sink rejected the frame.
    #[error("output sink failed: {reason}")]
    Sink {
        /// What went wrong.
        reason: String,
    },
    /// Underlying I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One particle in one output frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputRecord {
    /// Particle id.
    pub id: ParticleId,
    /// Particle time.
    pub time: f64,
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
    /// Depth.
    pub depth: f64,
    /// Values of the variables marked for output, in schema order.
    pub vars: SmallVec<[f64; 8]>,
}

/// Receiver of output frames.
///
/// Frames are ragged: the number of records varies as particles are
/// released and deleted. Records within a frame are sorted by id.
pub trait OutputSink: Send {
    /// Called once before the first frame with the names of the written
    /// variables, in the order their values appear in
    /// [`OutputRecord::vars`].
    fn start(&mut self, variables: &[String]) -> Result<(), OutputError> {
        let _ = variables;
        Ok(())
    }

    /// Append one frame.
    fn append(&mut self, time: f64, records: &[OutputRecord]) -> Result<(), OutputError>;

    /// Push buffered frames to their destination.
    fn flush(&mut self) -> Result<(), OutputError>;
}

/// One appended frame.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputFrame {
    /// Clock value the frame was taken at.
    pub time: f64,
    /// Records sorted by id.
    pub records: Vec<OutputRecord>,
}

/// Sink keeping every frame in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryOutput {
    variables: Vec<String>,
    frames: Vec<OutputFrame>,
    flushes: usize,
}

impl MemoryOutput {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the written variables.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Frames appended so far.
    pub fn frames(&self) -> &[OutputFrame] {
        &self.frames
    }

    /// Frame times in append order.
    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    /// Every record of one particle across frames.
    pub fn trajectory(&self, id: ParticleId) -> Vec<&OutputRecord> {
        self.frames
            .iter()
            .filter_map(|f| {
                f.records
                    .binary_search_by_key(&id, |r| r.id)
                    .ok()
                    .map(|i| &f.records[i])
            })
            .collect()
    }

    /// Number of `flush` calls received.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl OutputSink for MemoryOutput {
    fn start(&mut self, variables: &[String]) -> Result<(), OutputError> {
        self.variables = variables.to_vec();
        Ok(())
    }

    fn append(&mut self, time: f64, records: &[OutputRecord]) -> Result<(), OutputError> {
        self.frames.push(OutputFrame {
            time,
            records: records.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Names of the variables marked for output.
pub(crate) fn written_variables(schema: &VariableSchema) -> Vec<String> {
    schema
        .iter()
        .filter(|v| v.to_write)
        .map(|v| v.name.clone())
        .collect()
}

/// Build the frame for clock value `time`: every live particle already
/// released at `time`, in id order.
pub(crate) fn frame(set: &ParticleSet, time: f64, direction: f64) -> Vec<OutputRecord> {
    let slots: Vec<usize> = set
        .schema()
        .iter()
        .enumerate()
        .filter(|(_, v)| v.to_write)
        .map(|(i, _)| i)
        .collect();
    (0..set.len())
        .filter(|&i| set.state()[i] != ParticleState::Delete)
        .filter(|&i| (time - set.time()[i]) * direction >= 0.0)
        .map(|i| {
            let rec = set.record(i);
            OutputRecord {
                id: rec.id,
                time: rec.time,
                lon: rec.lon,
                lat: rec.lat,
                depth: rec.depth,
                vars: slots.iter().map(|&s| rec.vars[s]).collect(),
            }
        })
        .collect()
}
