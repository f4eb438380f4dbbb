pub mod toml_config;

pub use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use crate::core::ops::LISTING_FORMATS;
#[cfg(feature = "cli")]
use crate::core::yaz0;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{validate_non_empty_string, validate_one_of, validate_range, Validate};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "szs")]
#[command(about = "Inspect, extract and build Yaz0/U8/SARC archives")]
#[command(version)]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the container format of a file
    Detect { file: PathBuf },

    /// List archive entries
    List {
        archive: PathBuf,
        #[arg(short, long, help = "text, csv, tsv or json")]
        format: Option<String>,
        #[arg(short, long, help = "glob:... or regex:... matched against entry paths")]
        pattern: Option<String>,
    },

    /// Write one entry to stdout
    Cat { archive: PathBuf, entry: String },

    /// Extract entries into a directory
    Extract {
        archive: PathBuf,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Copy every entry into a ZIP file
    Export { archive: PathBuf, output: PathBuf },

    /// Strip the Yaz0 layer from a file
    Decompress { input: PathBuf, output: PathBuf },

    /// Wrap a file in Yaz0
    Compress {
        input: PathBuf,
        output: PathBuf,
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Build a U8 archive from a directory
    Pack {
        dir: PathBuf,
        output: PathBuf,
        #[arg(long, help = "Write a plain U8 archive without Yaz0")]
        no_compress: bool,
        #[arg(short, long)]
        window: Option<usize>,
    },

    /// Print the repository a version is published to
    Publish {
        #[arg(help = "Version string, defaults to this build's version")]
        version: Option<String>,
    },
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::List {
                format: Some(format),
                ..
            } => validate_one_of("format", &format.to_ascii_lowercase(), LISTING_FORMATS),
            Command::Cat { entry, .. } => validate_non_empty_string("entry", entry),
            Command::Publish {
                version: Some(version),
            } => validate_non_empty_string("version", version),
            Command::Compress {
                window: Some(window),
                ..
            }
            | Command::Pack {
                window: Some(window),
                ..
            } => validate_range("window", *window, 1, yaz0::MAX_DISTANCE),
            _ => Ok(()),
        }
    }
}
