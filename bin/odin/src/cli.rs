//! Command line arguments.

use clap::{Args, Parser, Subcommand};
use odin_document::DEFAULT_MODEL;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ./odin.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a conversation document against the configured backend
    Run(RunArgs),
    /// Send a single prompt and print the response
    Ask(AskArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Document path, http(s) URL, or `-` for stdin
    pub source: String,

    /// Template variables substituted into `{key}` placeholders
    #[arg(value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Directory message outputs are written under
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Do not print turns as they are processed
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AskArgs {
    /// Prompt text, file path, or http(s) URL; read from stdin when omitted
    pub prompt: Option<String>,

    /// Template variables substituted into `{key}` placeholders
    #[arg(value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Model to ask
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f64,
}
