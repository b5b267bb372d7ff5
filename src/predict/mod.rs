//! Prediction and inference
//!
//! Load trained models, score match logs, and write prediction artifacts.

pub mod inference;
pub mod report;

pub use inference::{format_prediction, format_table, tail, Predictor};
