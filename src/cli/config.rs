//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::ExecutionProvider,
    models::ModelCatalog,
    processor::{BackendType, ProcessorConfig, ProcessorConfigBuilder},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Convert CLI arguments to a `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the processor configuration for already resolved weights
    pub(crate) fn from_cli(cli: &Cli, weights_path: PathBuf) -> Result<ProcessorConfig> {
        let (backend_type, execution_provider) = Self::provider(cli)?;

        ProcessorConfigBuilder::new()
            .weights_path(weights_path)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .output_format(cli.format.into())
            .jpeg_quality(cli.jpeg_quality)
            .max_edge(cli.max_edge)
            .align_to_32(!cli.no_align)
            .upsample_align(cli.upsample_align)
            .debug(cli.verbose >= 2)
            .intra_threads(cli.threads)
            .inter_threads(cli.threads)
            .verbose_progress(cli.verbose > 0)
            .build()
            .context("Invalid configuration")
    }

    /// Backend and provider from `--execution-provider`, or the build's preferred backend
    pub(crate) fn provider(cli: &Cli) -> Result<(BackendType, ExecutionProvider)> {
        match &cli.execution_provider {
            Some(provider) => ExecutionProviderManager::parse_provider_string(provider)
                .context("Invalid execution provider format"),
            None => {
                let backend = BackendType::preferred();
                Ok((
                    backend,
                    ExecutionProviderManager::default_provider_for_backend(backend),
                ))
            },
        }
    }

    /// Weights catalog for `--weights-dir` or the default directory
    pub(crate) fn catalog(cli: &Cli) -> Result<ModelCatalog> {
        match &cli.weights_dir {
            Some(dir) => Ok(ModelCatalog::new(dir.clone())),
            None => ModelCatalog::from_default_dir().context("Failed to locate weights directory"),
        }
    }

    /// Resolve `--model` to a weights file, falling back to the catalog default
    pub(crate) fn resolve_weights(cli: &Cli) -> Result<PathBuf> {
        let catalog = Self::catalog(cli)?;

        match &cli.model {
            Some(model) => catalog
                .resolve(model)
                .with_context(|| format!("Failed to resolve model '{model}'")),
            None => {
                let path = catalog
                    .default_model()
                    .context("No model specified and none found in the weights directory")?;
                log::info!("📦 No --model given, using {}", path.display());
                Ok(path)
            },
        }
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        Self::provider(cli)?;

        if cli.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be between 0 and 100, got {}", cli.jpeg_quality);
        }
        if cli.max_edge == 0 {
            anyhow::bail!("--max-edge must be at least 1");
        }
        if cli.jobs == 0 {
            anyhow::bail!("--jobs must be at least 1");
        }
        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid file pattern '{pattern}'"))?;
        }

        let reads_stdin = cli.input.iter().any(|input| input == "-");
        if reads_stdin && cli.input.len() > 1 {
            anyhow::bail!("stdin (-) cannot be combined with other inputs");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliOutputFormat;
    use crate::config::OutputFormat;
    use clap::Parser;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["anime-stylize"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&[
            "photo.jpg",
            "-e",
            "tract:cpu",
            "-f",
            "jpeg",
            "--jpeg-quality",
            "80",
            "--max-edge",
            "512",
            "--no-align",
            "--upsample-align",
            "-t",
            "2",
        ]);

        let config = CliConfigBuilder::from_cli(&cli, PathBuf::from("paprika.onnx")).unwrap();
        assert_eq!(config.weights_path, PathBuf::from("paprika.onnx"));
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.max_edge, 512);
        assert!(!config.align_to_32);
        assert!(config.upsample_align);
        assert_eq!(config.intra_threads, 2);
        assert!(!config.debug);
    }

    #[test]
    fn test_default_provider_follows_preferred_backend() {
        let cli = parse(&["photo.jpg"]);
        let (backend, provider) = CliConfigBuilder::provider(&cli).unwrap();
        assert_eq!(backend, BackendType::preferred());
        assert_eq!(
            provider,
            ExecutionProviderManager::default_provider_for_backend(backend)
        );
        assert_eq!(cli.format, CliOutputFormat::Png);
    }

    #[test]
    fn test_cli_validation() {
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg"])).is_ok());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg", "-e", "tract:cuda"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg", "--jpeg-quality", "150"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg", "-j", "0"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["a.jpg", "--max-edge", "0"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["dir", "--pattern", "[abc"])).is_err());
        assert!(CliConfigBuilder::validate_cli(&parse(&["-", "b.jpg"])).is_err());
    }

    #[test]
    fn test_resolve_weights_by_name_and_default() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("paprika.onnx"), b"weights").unwrap();
        std::fs::write(temp.path().join("custom.onnx"), b"weights").unwrap();
        let dir = temp.path().to_str().unwrap();

        let named = parse(&["a.jpg", "--weights-dir", dir, "-m", "custom"]);
        assert_eq!(
            CliConfigBuilder::resolve_weights(&named).unwrap(),
            temp.path().join("custom.onnx")
        );

        let unnamed = parse(&["a.jpg", "--weights-dir", dir]);
        assert_eq!(
            CliConfigBuilder::resolve_weights(&unnamed).unwrap(),
            temp.path().join("paprika.onnx")
        );

        let missing = parse(&["a.jpg", "--weights-dir", dir, "-m", "hayao"]);
        assert!(CliConfigBuilder::resolve_weights(&missing).is_err());
    }

    #[test]
    fn test_resolve_weights_empty_dir_fails() {
        let temp = tempdir().unwrap();
        let cli = parse(&["a.jpg", "--weights-dir", temp.path().to_str().unwrap()]);
        assert!(CliConfigBuilder::resolve_weights(&cli).is_err());
    }
}
