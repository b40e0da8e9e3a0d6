use std::fmt;

use thiserror::Error;

/// Stage of the reduction pipeline, used to tag run-global failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Submit,
    Solve,
    LineOfSight,
    Projection,
    Consensus,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Submit => "submit",
            PipelineStage::Solve => "solve",
            PipelineStage::LineOfSight => "line of sight",
            PipelineStage::Projection => "projection",
            PipelineStage::Consensus => "consensus",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("Invalid measurement convention: {0}")]
    InvalidConvention(String),

    #[error("Degenerate geometry: line of sight parallel to the radiant line (denominator = {denominator:e})")]
    DegenerateGeometry { denominator: f64 },

    #[error("Insufficient data for {what}: needed {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Trajectory solver failure: {0}")]
    SolverFailure(String),

    #[error("Invalid station: {0}")]
    InvalidStation(String),

    #[error("Invalid trajectory parameter: {0}")]
    InvalidParameter(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot (de)serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Pipeline stage '{stage}' failed: {source}")]
    Stage {
        stage: PipelineStage,
        source: Box<TrajectoryError>,
    },
}

impl TrajectoryError {
    /// Tag an error with the pipeline stage it aborted.
    pub fn at(self, stage: PipelineStage) -> Self {
        TrajectoryError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Pipeline stage of a run-global failure, if tagged.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            TrajectoryError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<ordered_float::FloatIsNan> for TrajectoryError {
    fn from(_: ordered_float::FloatIsNan) -> Self {
        TrajectoryError::InvalidStation("NaN encountered in station geometry".into())
    }
}

impl PartialEq for TrajectoryError {
    fn eq(&self, other: &Self) -> bool {
        use TrajectoryError::*;
        match (self, other) {
            (InvalidConvention(a), InvalidConvention(b)) => a == b,
            (DegenerateGeometry { denominator: a }, DegenerateGeometry { denominator: b }) => {
                a == b
            }
            (
                InsufficientData {
                    what: w1,
                    needed: n1,
                    got: g1,
                },
                InsufficientData {
                    what: w2,
                    needed: n2,
                    got: g2,
                },
            ) => w1 == w2 && n1 == n2 && g1 == g2,
            (SolverFailure(a), SolverFailure(b)) => a == b,
            (InvalidStation(a), InvalidStation(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,

            // Not comparable: equal if same variant
            (IoError(_), IoError(_)) => true,
            (SerializationError(_), SerializationError(_)) => true,

            (
                Stage {
                    stage: s1,
                    source: e1,
                },
                Stage {
                    stage: s2,
                    source: e2,
                },
            ) => s1 == s2 && e1 == e2,

            _ => false,
        }
    }
}
