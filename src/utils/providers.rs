//! Execution provider parsing and management utilities

use crate::{
    config::ExecutionProvider,
    error::{Result, StylizeError},
    processor::BackendType,
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and managing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse execution provider string in format "backend:provider"
    ///
    /// The ONNX backend accepts `auto`, `cpu`, `cuda`, `cuda:N` and `coreml`;
    /// Tract only accepts `cpu`. A bare backend name selects its default
    /// provider.
    ///
    /// # Examples
    /// ```rust
    /// use anime_stylize::utils::ExecutionProviderManager;
    /// use anime_stylize::{BackendType, ExecutionProvider};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:cuda:1")?;
    /// assert_eq!(backend, BackendType::Onnx);
    /// assert_eq!(provider, ExecutionProvider::Cuda { device_id: 1 });
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        if let Some((backend, provider)) = provider_str.split_once(':') {
            match backend {
                "onnx" => {
                    let execution_provider = provider.parse::<ExecutionProvider>().map_err(|_| {
                        StylizeError::invalid_config(format!(
                            "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, cuda:N, coreml",
                            provider
                        ))
                    })?;
                    Ok((BackendType::Onnx, execution_provider))
                },
                "tract" => match provider {
                    "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                    _ => Err(StylizeError::invalid_config(format!(
                        "Unknown Tract provider: {}. Tract only supports 'cpu'",
                        provider
                    ))),
                },
                _ => Err(StylizeError::invalid_config(format!(
                    "Unknown backend: {}. Supported backends: onnx, tract",
                    backend
                ))),
            }
        } else {
            match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(StylizeError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            }
        }
    }

    /// Get a list of all provider combinations with actual availability status
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        {
            use crate::backends::OnnxBackend;
            let mut onnx_availability = std::collections::HashMap::new();
            for (name, available, _) in OnnxBackend::list_providers() {
                onnx_availability.insert(name.to_lowercase(), available);
            }
            let available = |name: &str| onnx_availability.get(name).copied().unwrap_or(false);
            let auto_available = onnx_availability.values().any(|&available| available);

            providers.extend(Self::onnx_entries(
                auto_available,
                available("cpu"),
                available("cuda"),
                available("coreml"),
                "",
            ));
        }

        #[cfg(not(feature = "onnx"))]
        providers.extend(Self::onnx_entries(false, false, false, false, " (feature disabled)"));

        #[cfg(feature = "tract")]
        {
            use crate::backends::TractBackend;
            for (name, available, description) in TractBackend::list_providers() {
                providers.push(ProviderInfo {
                    name: format!("tract:{}", name.to_lowercase()),
                    backend_type: BackendType::Tract,
                    execution_provider: ExecutionProvider::Cpu,
                    available,
                    description,
                });
            }
        }

        #[cfg(not(feature = "tract"))]
        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: false,
            description: "Pure Rust CPU inference via Tract (feature disabled)".to_string(),
        });

        providers
    }

    fn onnx_entries(
        auto: bool,
        cpu: bool,
        cuda: bool,
        coreml: bool,
        suffix: &str,
    ) -> Vec<ProviderInfo> {
        let entry = |provider: ExecutionProvider, available: bool, description: &str| ProviderInfo {
            name: Self::provider_to_string(BackendType::Onnx, provider),
            backend_type: BackendType::Onnx,
            execution_provider: provider,
            available,
            description: format!("{description}{suffix}"),
        };

        vec![
            entry(
                ExecutionProvider::Auto,
                auto,
                "ONNX Runtime with auto-selected provider",
            ),
            entry(ExecutionProvider::Cpu, cpu, "ONNX Runtime CPU execution"),
            entry(
                ExecutionProvider::cuda(),
                cuda,
                "ONNX Runtime CUDA GPU acceleration (use onnx:cuda:N for other devices)",
            ),
            entry(
                ExecutionProvider::CoreMl,
                coreml,
                "ONNX Runtime CoreML (Apple Silicon) acceleration",
            ),
        ]
    }

    /// Validate a provider string without keeping the result
    #[must_use]
    pub fn is_valid_provider_string(provider_str: &str) -> bool {
        Self::parse_provider_string(provider_str).is_ok()
    }

    /// Get the default provider for a given backend type
    #[must_use]
    pub fn default_provider_for_backend(backend_type: BackendType) -> ExecutionProvider {
        match backend_type {
            BackendType::Onnx => ExecutionProvider::Auto,
            BackendType::Tract => ExecutionProvider::Cpu,
        }
    }

    /// Convert backend type and execution provider back to string
    ///
    /// CUDA device 0 is rendered as plain `cuda`.
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        let backend_str = match backend_type {
            BackendType::Onnx => "onnx",
            BackendType::Tract => "tract",
        };

        let provider_str = match provider {
            ExecutionProvider::Cuda { device_id: 0 } => "cuda".to_string(),
            other => other.to_string(),
        };

        format!("{}:{}", backend_str, provider_str)
    }
}
