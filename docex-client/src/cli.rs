use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use docex_client::config::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "docex")]
#[command(about = "Upload documents for extraction and fetch the results", version)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub cmd: Command,
}

/// Settings that take precedence over the config file and `DOCEX__*` variables
#[derive(Args, Debug)]
pub struct Overrides {
    /// Config file name, without extension
    #[arg(long, global = true, env = "DOCEX_CONFIG", default_value = "docex")]
    pub config: String,

    /// Backend base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Delay between status polls, in milliseconds
    #[arg(long, global = true)]
    pub interval_ms: Option<u64>,

    /// Status polls before giving up
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.polling.interval_ms = interval_ms;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.polling.max_attempts = max_attempts;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a PDF and print its document id
    Upload { file: PathBuf },
    /// Wait for a document to finish and print what was extracted
    Watch { document_id: String },
    /// Upload a PDF, then wait for it and print what was extracted
    Process { file: PathBuf },
    /// Resolve the exported result of a document
    Export {
        document_id: String,
        /// Open the link in the default browser instead of printing it
        #[arg(long, conflicts_with = "output")]
        open: bool,
        /// Download the export to this path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Presigned download link for a storage key
    Link { s3_path: String },
    /// Resolve the source PDF of a completed document
    Preview {
        document_id: String,
        /// Download the PDF to this path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}
