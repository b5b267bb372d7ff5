//! Logistic regression on Elo features
//!
//! Architecture: z-score(elo1, elo2, diff) → Linear(3 → 1) → sigmoid
//!
//! Fitted full-batch with plain SGD on binary cross-entropy. Weights start at
//! zero, so fitting the same prefix twice gives the same model.

use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::features::EloFeatures;
use crate::training::metrics::TrainingHistory;
use crate::{ForecastError, ModelConfig, Result};

use super::{ModelKind, WinProbabilityModel};

pub type TrainBackend = Autodiff<NdArray<f32>>;

type Device = <TrainBackend as Backend>::Device;
type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Weights file stem (the recorder adds the extension)
const WEIGHTS_FILE: &str = "weights";
const SCALER_FILE: &str = "scaler.json";

/// Z-score normalization of the feature columns, fitted on training rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: [f64; EloFeatures::DIM],
    pub std: [f64; EloFeatures::DIM],
}

impl FeatureScaler {
    /// Columns with (near) zero spread keep a floor on the std
    pub const MIN_STD: f64 = 1e-3;

    pub fn fit(features: &[EloFeatures]) -> Self {
        let n = features.len().max(1) as f64;
        let mut sum = [0.0; EloFeatures::DIM];
        let mut sum_sq = [0.0; EloFeatures::DIM];

        for row in features {
            for (j, v) in row.to_array().into_iter().enumerate() {
                sum[j] += v;
                sum_sq[j] += v * v;
            }
        }

        let mean = sum.map(|s| s / n);
        let mut std = [0.0; EloFeatures::DIM];
        for j in 0..EloFeatures::DIM {
            std[j] = (sum_sq[j] / n - mean[j] * mean[j]).max(0.0).sqrt().max(Self::MIN_STD);
        }

        FeatureScaler { mean, std }
    }

    pub fn transform(&self, row: &EloFeatures) -> [f64; EloFeatures::DIM] {
        let mut out = row.to_array();
        for j in 0..EloFeatures::DIM {
            out[j] = (out[j] - self.mean[j]) / self.std[j];
        }
        out
    }
}

/// Fitting hyperparameters
#[derive(Debug, Clone)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub patience: usize,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        LogisticConfig::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for LogisticConfig {
    fn from(config: &ModelConfig) -> Self {
        LogisticConfig {
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            patience: config.patience,
        }
    }
}

/// Logistic regression model
pub struct LogisticModel {
    linear: Linear<TrainBackend>,
    scaler: Option<FeatureScaler>,
    config: LogisticConfig,
    history: Option<TrainingHistory>,
    device: Device,
}

fn zero_linear(device: &Device) -> Linear<TrainBackend> {
    LinearConfig::new(EloFeatures::DIM, 1)
        .with_initializer(Initializer::Zeros)
        .init(device)
}

fn binary_cross_entropy(probs: Tensor<TrainBackend, 2>, targets: Tensor<TrainBackend, 2>) -> Tensor<TrainBackend, 1> {
    let eps = 1e-7;
    let probs_clamped = probs.clamp(eps, 1.0 - eps);
    let loss = targets.clone().neg() * probs_clamped.clone().log()
        - (targets.neg() + 1.0) * (probs_clamped.neg() + 1.0).log();
    loss.mean()
}

impl LogisticModel {
    pub fn new(config: LogisticConfig) -> Self {
        let device = Device::default();
        LogisticModel {
            linear: zero_linear(&device),
            scaler: None,
            config,
            history: None,
            device,
        }
    }

    pub fn scaler(&self) -> Option<&FeatureScaler> {
        self.scaler.as_ref()
    }

    fn to_tensor(&self, scaler: &FeatureScaler, features: &[EloFeatures]) -> Tensor<TrainBackend, 2> {
        let values: Vec<f32> = features
            .iter()
            .flat_map(|row| scaler.transform(row))
            .map(|v| v as f32)
            .collect();
        Tensor::from_data(
            TensorData::new(values, [features.len(), EloFeatures::DIM]),
            &self.device,
        )
    }

    /// Load a model saved with [`WinProbabilityModel::save`]
    pub fn load(dir: &Path, config: LogisticConfig) -> Result<Self> {
        let device = Device::default();
        let recorder = WeightsRecorder::new();
        let record = Recorder::<TrainBackend>::load(&recorder, dir.join(WEIGHTS_FILE), &device)
            .map_err(|e| ForecastError::Model(format!("Failed to load weights: {}", e)))?;
        let linear = zero_linear(&device).load_record(record);

        let scaler: FeatureScaler =
            serde_json::from_str(&std::fs::read_to_string(dir.join(SCALER_FILE))?)?;

        Ok(LogisticModel {
            linear,
            scaler: Some(scaler),
            config,
            history: None,
            device,
        })
    }
}

impl WinProbabilityModel for LogisticModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Logistic
    }

    fn fit(&mut self, features: &[EloFeatures], labels: &[bool]) -> Result<()> {
        if features.is_empty() {
            return Err(ForecastError::InsufficientData {
                available: 0,
                required: 1,
            });
        }
        if features.len() != labels.len() {
            return Err(ForecastError::InvalidArgument(format!(
                "{} feature rows for {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some(i) = features.iter().position(|f| !f.is_finite()) {
            return Err(ForecastError::InvalidArgument(format!(
                "non-finite Elo features in training row {}",
                i
            )));
        }

        let scaler = FeatureScaler::fit(features);
        log::info!(
            "Feature normalization: mean={:?}, std={:?}",
            scaler.mean,
            scaler.std
        );

        let x = self.to_tensor(&scaler, features);
        let targets: Vec<f32> = labels.iter().map(|&won| if won { 1.0 } else { 0.0 }).collect();
        let y = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(targets, [labels.len(), 1]),
            &self.device,
        );

        let mut linear = zero_linear(&self.device);
        let mut optimizer = SgdConfig::new().init();
        let mut history = TrainingHistory::new();
        let epochs = self.config.epochs;

        log::info!("Starting logistic regression fit for up to {} epochs", epochs);

        for epoch in 0..epochs {
            let probs = sigmoid(linear.forward(x.clone()));
            let loss = binary_cross_entropy(probs, y.clone());
            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &linear);
            linear = optimizer.step(self.config.learning_rate, linear, grads_params);

            history.record_epoch(epoch, loss_val as f64);

            if epoch % 50 == 0 || epoch + 1 == epochs {
                log::debug!("Epoch {}/{}: loss={:.6}", epoch + 1, epochs, loss_val);
            }
            if history.should_early_stop(self.config.patience) {
                log::info!(
                    "Early stop at epoch {} (best loss {:.6} at epoch {})",
                    epoch + 1,
                    history.best_loss,
                    history.best_epoch + 1
                );
                break;
            }
        }

        self.linear = linear;
        self.scaler = Some(scaler);
        self.history = Some(history);
        Ok(())
    }

    fn predict_proba(&self, features: &[EloFeatures]) -> Result<Vec<f64>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| ForecastError::Model("logistic model is not fitted".to_string()))?;
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let probs = sigmoid(self.linear.forward(self.to_tensor(scaler, features)));
        let values = probs
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ForecastError::Model(format!("Failed to read predictions: {:?}", e)))?;
        Ok(values.into_iter().map(f64::from).collect())
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or_else(|| ForecastError::Model("cannot save an unfitted model".to_string()))?;
        std::fs::create_dir_all(dir)?;

        let recorder = WeightsRecorder::new();
        Recorder::<TrainBackend>::record(&recorder, self.linear.clone().into_record(), dir.join(WEIGHTS_FILE))
            .map_err(|e| ForecastError::Model(format!("Failed to save weights: {}", e)))?;
        std::fs::write(dir.join(SCALER_FILE), serde_json::to_string_pretty(scaler)?)?;
        Ok(())
    }

    fn training_history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }
}
