use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod cli;

use cli::{Cli, Command};
use docex_client::config::load_config_from;
use docex_client::error::{ClientError, ClientResult, format_error_chain};
use docex_client::export::{BrowserNavigator, PrintNavigator};
use docex_client::models::DocumentRecord;
use docex_client::upload::UploadFile;
use docex_client::workflow::{DocumentWorkflow, ExtractionView};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(
                code = e.error_code(),
                retryable = e.is_retryable(),
                error = %format_error_chain(&e),
                "Command failed"
            );
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> ClientResult<()> {
    let mut config = load_config_from(&cli.overrides.config)?;
    cli.overrides.apply(&mut config);
    info!(base_url = %config.api.base_url, "Configuration loaded");

    let workflow = DocumentWorkflow::from_config(&config)?;
    let client = workflow.client();

    match cli.cmd {
        Command::Upload { file } => {
            let receipt = client.complete_upload(&UploadFile::from_path(&file).await?).await?;
            println!("{}", receipt);
        }
        Command::Watch { document_id } => {
            watch(&workflow, &document_id, cancel).await?;
        }
        Command::Process { file } => {
            let receipt = client.complete_upload(&UploadFile::from_path(&file).await?).await?;
            let document_id = receipt
                .document_id
                .ok_or_else(|| ClientError::MalformedDescriptor {
                    message: format!("storage key {:?} does not carry a document id", receipt.s3_key),
                })?;
            eprintln!("Uploaded {} as {}", file.display(), document_id);
            watch(&workflow, &document_id, cancel).await?;
        }
        Command::Export {
            document_id,
            open,
            output,
        } => match output {
            Some(path) => {
                let link = client.result_link(&document_id).await?;
                download(&workflow, &link, &path).await?;
            }
            None if open => client.export_result(&document_id, &BrowserNavigator).await?,
            None => {
                client
                    .export_result(&document_id, &PrintNavigator::new(std::io::stdout()))
                    .await?
            }
        },
        Command::Link { s3_path } => {
            println!("{}", client.generate_download_link(&s3_path).await?);
        }
        Command::Preview {
            document_id,
            output,
        } => {
            let link = workflow
                .preview_url(&document_id, cancel)
                .await
                .ok_or_else(|| ClientError::PreviewUnavailable {
                    document_id: document_id.clone(),
                })?;
            match output {
                Some(path) => download(&workflow, &link, &path).await?,
                None => println!("{}", link),
            }
        }
    }
    Ok(())
}

async fn watch(
    workflow: &DocumentWorkflow,
    document_id: &str,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let mut attempt = 0;
    let mut progress = |record: &DocumentRecord| -> ClientResult<()> {
        attempt += 1;
        eprintln!("[{}] {}: {}", attempt, document_id, record.status);
        Ok(())
    };

    let opened = workflow
        .open_document(document_id, cancel, Some(&mut progress))
        .await?;
    print_view(&opened);
    Ok(())
}

fn print_view(opened: &ExtractionView) {
    print!("{}", opened.view);
    if let Some(url) = &opened.pdf_url {
        println!();
        println!("PDF: {}", url);
    }
}

async fn download(workflow: &DocumentWorkflow, url: &str, path: &Path) -> ClientResult<()> {
    let bytes = workflow.client().download_to(url, path).await?;
    eprintln!("Wrote {} bytes to {}", bytes, path.display());
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format().with_target(true).compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docex_client=info,docex=info"));

    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
