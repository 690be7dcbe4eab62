//! Result export: resolve the presigned result link and hand it to a navigator.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::api::{ExtractionClient, redact_query};
use crate::error::{ClientError, ClientResult};

/// Somewhere a resolved URL can be sent: a browser, a terminal, a test recorder.
pub trait Navigator {
    fn navigate(&self, url: &str) -> ClientResult<()>;
}

/// Writes each URL on its own line
pub struct PrintNavigator<W> {
    out: Mutex<W>,
}

impl<W: Write> PrintNavigator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> Navigator for PrintNavigator<W> {
    fn navigate(&self, url: &str) -> ClientResult<()> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}", url)?;
        out.flush()?;
        Ok(())
    }
}

/// Opens URLs with the platform's default handler
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl BrowserNavigator {
    fn command(url: &str) -> Command {
        #[cfg(target_os = "macos")]
        let command = {
            let mut c = Command::new("open");
            c.arg(url);
            c
        };
        #[cfg(target_os = "windows")]
        let command = {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        };
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let command = {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };
        command
    }
}

impl Navigator for BrowserNavigator {
    fn navigate(&self, url: &str) -> ClientResult<()> {
        debug!(url = %redact_query(url), "Opening in browser");
        Self::command(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

impl ExtractionClient {
    /// Resolve the exported result of a document and navigate to it exactly once.
    ///
    /// Any failure to resolve the link is an [`ClientError::Export`]; the
    /// navigator is not touched in that case.
    pub async fn export_result<N: Navigator + ?Sized>(
        &self,
        document_id: &str,
        navigator: &N,
    ) -> ClientResult<()> {
        let link = self.result_link(document_id).await?;
        navigator.navigate(&link).map_err(|e| ClientError::Export {
            message: format!("Could not open the export link: {}", e),
        })?;
        info!(doc_id = %document_id, "Export link opened");
        Ok(())
    }
}
