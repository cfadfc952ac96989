use crate::settings::ConfigOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "petlens")]
#[command(author, version, about = "Classify uploaded images with a pre-trained binary classifier")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server with the upload page
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        /// Listen address
        #[arg(short = 'l', long)]
        listen: Option<String>,

        /// Listen port
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long)]
        log_json: bool,
    },

    /// Classify a single image file and print the result as JSON
    Classify {
        /// Image to classify
        image: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the effective configuration as YAML
    Config {
        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Configuration and model selection shared by all commands
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "petlens.yaml", env = "PETLENS_CONFIG")]
    pub config: PathBuf,

    /// Weights file; overrides the configured model source
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Standalone model configuration (YAML); replaces the `model` section
    #[arg(long)]
    pub model_config: Option<PathBuf>,
}

impl ModelArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model_path: self.model.clone(),
            model_config: self.model_config.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from([
            "petlens",
            "serve",
            "--port",
            "8080",
            "--model",
            "weights.safetensors",
        ]);

        match cli.command {
            Commands::Serve { model, port, .. } => {
                assert_eq!(port, Some(8080));
                let overrides = model.overrides();
                assert_eq!(overrides.model_path, Some(PathBuf::from("weights.safetensors")));
            }
            other => panic!("Expected serve command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::parse_from(["petlens", "classify", "cat.jpg"]);
        assert!(matches!(cli.command, Commands::Classify { ref image, .. } if image == &PathBuf::from("cat.jpg")));
    }
}
