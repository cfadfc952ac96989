//! Model loading for Candle-based image classifiers

use crate::classifier::{probability_from_output, ImageModel};
use crate::model_config::{
    ArchitectureConfig, DeviceSpec, EfficientNetVariant, ModelConfig, ModelSource,
    OutputActivation, WeightFormat,
};
use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::{efficientnet, resnet};
use hf_hub::{api::sync::Api, Repo, RepoType};
use petlens_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Network = Arc<dyn Module + Send + Sync>;

/// Whether the configured weights can be expected to load
///
/// Local sources must exist on disk. Remote sources are resolved at load time.
pub fn artifact_present(config: &ModelConfig) -> bool {
    match &config.source {
        ModelSource::Local { path } => path.is_file(),
        ModelSource::HuggingFace { .. } => true,
    }
}

/// Candle network with its weights mapped and ready for inference
pub struct LoadedModel {
    name: String,
    architecture: String,
    network: Network,
    device: Device,
    device_spec: DeviceSpec,
    activation: OutputActivation,
    weights_path: PathBuf,
}

impl LoadedModel {
    /// Load a model from configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let weights_path = resolve_weights_path(&config.source)?;
        let device = create_device(config.device)?;

        tracing::info!(
            "Loading {} weights from {}",
            config.architecture.describe(),
            weights_path.display()
        );

        let var_builder = match config.format {
            // SAFETY: the weights file is not modified while mapped.
            WeightFormat::SafeTensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)
                    .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))?
            },
            WeightFormat::PyTorch => VarBuilder::from_pth(&weights_path, DType::F32, &device)
                .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e)))?,
        };

        let network = build_network(&config.architecture, var_builder)?;

        Ok(Self {
            name: config.name.clone(),
            architecture: config.architecture.describe(),
            network,
            device,
            device_spec: config.device,
            activation: config.output.activation,
            weights_path,
        })
    }

    /// Get weights path
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }
}

#[async_trait]
impl ImageModel for LoadedModel {
    async fn predict(&self, input: Tensor) -> Result<f32> {
        let network = Arc::clone(&self.network);
        let device = self.device.clone();
        let activation = self.activation;

        tokio::task::spawn_blocking(move || {
            let input = input
                .to_device(&device)
                .map_err(|e| Error::inference(format!("Failed to move input to device: {}", e)))?;
            let output = network
                .forward(&input)
                .map_err(|e| Error::inference(format!("Forward pass failed: {}", e)))?;
            probability_from_output(&output, activation)
        })
        .await
        .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn architecture(&self) -> String {
        self.architecture.clone()
    }

    fn device(&self) -> String {
        self.device_spec.to_string()
    }
}

/// Instantiate the configured architecture over the given weights
pub fn build_network(architecture: &ArchitectureConfig, vb: VarBuilder) -> Result<Network> {
    let network: Network = match architecture {
        ArchitectureConfig::ResNet { depth, num_outputs } => {
            let build = match depth {
                18 => resnet::resnet18,
                34 => resnet::resnet34,
                50 => resnet::resnet50,
                101 => resnet::resnet101,
                152 => resnet::resnet152,
                other => {
                    return Err(Error::config(format!("Unsupported ResNet depth {}", other)))
                }
            };
            Arc::new(
                build(*num_outputs, vb)
                    .map_err(|e| Error::model(format!("Failed to build resnet{}: {}", depth, e)))?,
            )
        }
        ArchitectureConfig::EfficientNet {
            variant,
            num_outputs,
        } => {
            let configs = efficientnet_configs(*variant);
            Arc::new(
                efficientnet::EfficientNet::new(vb, configs, *num_outputs).map_err(|e| {
                    Error::model(format!(
                        "Failed to build efficientnet-{}: {}",
                        variant.as_str(),
                        e
                    ))
                })?,
            )
        }
    };

    Ok(network)
}

fn efficientnet_configs(variant: EfficientNetVariant) -> Vec<efficientnet::MBConvConfig> {
    use efficientnet::MBConvConfig;

    match variant {
        EfficientNetVariant::B0 => MBConvConfig::b0(),
        EfficientNetVariant::B1 => MBConvConfig::b1(),
        EfficientNetVariant::B2 => MBConvConfig::b2(),
        EfficientNetVariant::B3 => MBConvConfig::b3(),
        EfficientNetVariant::B4 => MBConvConfig::b4(),
        EfficientNetVariant::B5 => MBConvConfig::b5(),
        EfficientNetVariant::B6 => MBConvConfig::b6(),
        EfficientNetVariant::B7 => MBConvConfig::b7(),
    }
}

/// Resolve the weights file from its source, downloading if needed
fn resolve_weights_path(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace {
            repo,
            revision,
            filename,
        } => {
            tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

            let api = Api::new()
                .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

            let repo = api.repo(Repo::with_revision(
                repo.clone(),
                RepoType::Model,
                revision.clone(),
            ));

            repo.get(filename)
                .map_err(|e| Error::config(format!("Failed to download model from HF: {}", e)))
        }
    }
}

/// Create Candle device from device specification
fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
    }
}
