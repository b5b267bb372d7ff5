//! Model training
//!
//! Temporal split, training pipeline, and evaluation metrics.

pub mod metrics;
pub mod split;
pub mod trainer;

pub use metrics::{CalibrationBin, DiscreteMetrics, EvaluationReport, Evaluator, TrainingHistory};
pub use split::TemporalSplit;
pub use trainer::{TrainInfo, TrainOutcome, Trainer};
