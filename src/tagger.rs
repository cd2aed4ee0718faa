//! This module provides the `TaggerModel` struct for running ONNX-based WD tagger models.
//!
//! It includes functionality for:
//! - Naming the supported pretrained taggers (`WdModel`).
//! - Selecting execution providers (e.g., CPU, CUDA).
//! - Loading models from local paths or Hugging Face repositories.
//! - Running predictions on preprocessed image tensors and turning raw outputs
//!   into per-label probabilities.

use std::{fmt, path::Path, str::FromStr};

use ndarray::{Array, Axis, Ix4};
use ort::{execution_providers::CPUExecutionProvider, session::Session, value::Tensor};
use tracing::{debug, info};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

#[cfg(feature = "tensorrt")]
use ort::execution_providers::TensorRTExecutionProvider;

#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;

use crate::{
    error::{Result, TaggerError},
    file::ModelHub,
};

/// The pretrained WD v3 taggers the service can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WdModel {
    #[default]
    Vit,
    SwinV2,
    ConvNext,
    VitLarge,
    Eva02Large,
}

impl WdModel {
    pub const ALL: [WdModel; 5] = [
        WdModel::Vit,
        WdModel::SwinV2,
        WdModel::ConvNext,
        WdModel::VitLarge,
        WdModel::Eva02Large,
    ];

    pub fn repo_id(&self) -> &'static str {
        match self {
            WdModel::Vit => "SmilingWolf/wd-vit-tagger-v3",
            WdModel::SwinV2 => "SmilingWolf/wd-swinv2-tagger-v3",
            WdModel::ConvNext => "SmilingWolf/wd-convnext-tagger-v3",
            WdModel::VitLarge => "SmilingWolf/wd-vit-large-tagger-v3",
            WdModel::Eva02Large => "SmilingWolf/wd-eva02-large-tagger-v3",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WdModel::Vit => "vit",
            WdModel::SwinV2 => "swinv2",
            WdModel::ConvNext => "convnext",
            WdModel::VitLarge => "vit-large",
            WdModel::Eva02Large => "eva02-large",
        }
    }
}

impl FromStr for WdModel {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self> {
        WdModel::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| TaggerError::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for WdModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents the execution device for the ONNX model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Device {
    /// Use the CPU for inference.
    Cpu,
    /// Use the CUDA execution provider.
    #[cfg(feature = "cuda")]
    Cuda(i32),
    /// Use the TensorRT execution provider.
    #[cfg(feature = "tensorrt")]
    TensorRT(i32),
    /// Use the CoreML execution provider (for macOS).
    #[cfg(feature = "coreml")]
    CoreML,
}

impl Device {
    /// Creates a list of `Device` instances for CPU execution.
    pub fn cpu() -> Vec<Self> {
        vec![Self::Cpu]
    }
}

impl FromStr for Device {
    type Err = TaggerError;

    /// Parses `cpu`, `cuda[:id]`, `tensorrt[:id]` or `coreml`. Accelerators
    /// are only accepted when the matching cargo feature is enabled.
    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind, Some(id)),
            None => (s, None),
        };
        #[allow(unused_variables)]
        let device_id = id
            .map(|id| {
                id.parse::<i32>()
                    .map_err(|_| TaggerError::Inference(format!("invalid device id: {id}")))
            })
            .transpose()?
            .unwrap_or(0);

        match kind {
            "cpu" => Ok(Device::Cpu),
            #[cfg(feature = "cuda")]
            "cuda" => Ok(Device::Cuda(device_id)),
            #[cfg(feature = "tensorrt")]
            "tensorrt" => Ok(Device::TensorRT(device_id)),
            #[cfg(feature = "coreml")]
            "coreml" => Ok(Device::CoreML),
            other => Err(TaggerError::Inference(format!(
                "unsupported device: {other}"
            ))),
        }
    }
}

/// How raw model outputs become probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    /// Apply a sigmoid only if some output falls outside `[0, 1]`.
    #[default]
    Auto,
    Sigmoid,
    Identity,
}

impl FromStr for Activation {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "sigmoid" => Ok(Self::Sigmoid),
            "identity" | "none" => Ok(Self::Identity),
            other => Err(TaggerError::Inference(format!("unknown activation: {other}"))),
        }
    }
}

impl Activation {
    pub fn apply(&self, mut values: Vec<f32>) -> Vec<f32> {
        let sigmoid = match self {
            Activation::Sigmoid => true,
            Activation::Identity => false,
            Activation::Auto => values.iter().any(|v| !(0.0..=1.0).contains(v)),
        };
        if sigmoid {
            values.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp()));
        }
        values
    }
}

/// A wrapper around an ONNX Runtime session for image tagging.
#[derive(Debug)]
pub struct TaggerModel {
    session: Session,
    input_name: String,
    output_name: String,
    activation: Activation,
}

impl TaggerModel {
    /// Initializes the ONNX Runtime with a list of execution providers.
    ///
    /// This should be called once before creating any `TaggerModel` instances.
    pub fn init(devices: Vec<Device>) -> Result<()> {
        let mut providers = Vec::new();
        for device in devices {
            let provider = match device {
                Device::Cpu => CPUExecutionProvider::default().build(),
                #[cfg(feature = "cuda")]
                Device::Cuda(device_id) => CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                #[cfg(feature = "tensorrt")]
                Device::TensorRT(device_id) => TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                #[cfg(feature = "coreml")]
                Device::CoreML => CoreMLExecutionProvider::default().build(),
            };
            providers.push(provider);
        }

        ort::init()
            .with_name("wdcaption")
            .with_execution_providers(providers)
            .commit()
            .map_err(|e| TaggerError::Inference(e.to_string()))?;
        Ok(())
    }

    /// Loads a model from a local file path.
    pub fn load<P: AsRef<Path>>(model_path: P, activation: Activation) -> Result<Self> {
        let threads = num_cpus::get();
        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(model_path.as_ref()))
            .map_err(|e| TaggerError::Inference(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| TaggerError::Inference("Model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| TaggerError::Inference("Model has no outputs".to_string()))?;

        debug!(%input_name, %output_name, "loaded ONNX session");

        Ok(Self {
            session,
            input_name,
            output_name,
            activation,
        })
    }

    /// Loads a model from a Hugging Face repository, downloading it on first use.
    pub async fn from_pretrained(
        hub: &ModelHub,
        repo_id: &str,
        activation: Activation,
    ) -> Result<Self> {
        let model_path = hub.model_file(repo_id).await?;
        info!(repo_id, path = %model_path.display(), "loading tagger model");
        Self::load(&model_path, activation)
    }

    /// Runs prediction on a batch of preprocessed image tensors.
    ///
    /// Returns one probability vector per image in the batch.
    pub fn predict(&mut self, input_tensor: Array<f32, Ix4>) -> Result<Vec<Vec<f32>>> {
        let input_tensor =
            Tensor::from_array(input_tensor).map_err(|e| TaggerError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| TaggerError::Inference(e.to_string()))?;

        let preds = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(|e| TaggerError::Inference(e.to_string()))?;

        let activation = self.activation;
        let preds_vec = preds
            .axis_iter(Axis(0))
            .map(|row| activation.apply(row.iter().copied().collect()))
            .collect();

        Ok(preds_vec)
    }
}
