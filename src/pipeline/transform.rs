//! EPUB transformation: law XML → packaged EPUB bytes.
//!
//! Packaging is delegated. The [`EpubTransformer`] trait is the seam; the
//! shipped implementation, [`CommandTransformer`], drives an external
//! builder executable through scratch files in a [`TempDir`], the same way
//! media pipelines drive ffmpeg.
//!
//! ## Revision context
//!
//! For revision identifiers the transformer also receives a
//! [`RevisionContext`]: the revision ID plus the [`DocumentSource`] the
//! content came from, so it can fetch whatever revision metadata it needs.

use super::source::{find_revision, DocumentSource};
use crate::error::TransformError;
use crate::request::RevisionId;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// Default builder executable, looked up on `PATH`.
pub const DEFAULT_TRANSFORMER_PROGRAM: &str = "jplaw2epub";

/// What a transformer needs to render a specific historical revision.
#[derive(Clone)]
pub struct RevisionContext {
    pub revision_id: RevisionId,
    pub source: Arc<dyn DocumentSource>,
}

impl std::fmt::Debug for RevisionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionContext")
            .field("revision_id", &self.revision_id)
            .field("source", &"<dyn DocumentSource>")
            .finish()
    }
}

/// Turns law XML into an EPUB.
#[async_trait]
pub trait EpubTransformer: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(
        &self,
        content: &[u8],
        revision: Option<RevisionContext>,
    ) -> Result<Vec<u8>, TransformError>;
}

/// Runs an external EPUB builder:
///
/// ```text
/// <program> [<leading args>…] [--revision-id <ID> --revision-info <json>] -o <out.epub> <in.xml>
/// ```
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl CommandTransformer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before everything else, e.g. `["-jar", "builder.jar"]`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn build_args(
        &self,
        input: &Path,
        output: &Path,
        revision: Option<(&RevisionId, &Path)>,
    ) -> Vec<OsString> {
        let mut args = self.leading_args.clone();
        if let Some((id, info)) = revision {
            args.push("--revision-id".into());
            args.push(id.as_str().into());
            args.push("--revision-info".into());
            args.push(info.as_os_str().to_owned());
        }
        args.push("-o".into());
        args.push(output.as_os_str().to_owned());
        args.push(input.as_os_str().to_owned());
        args
    }
}

impl Default for CommandTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSFORMER_PROGRAM)
    }
}

/// Look the revision up through the source and write its record to `dir`.
async fn write_revision_info(ctx: &RevisionContext, dir: &Path) -> Result<PathBuf, TransformError> {
    let revision_err = |source| TransformError::Revision {
        revision_id: ctx.revision_id.to_string(),
        source,
    };

    let revisions = ctx
        .source
        .fetch_law_revisions(ctx.revision_id.law_id())
        .await
        .map_err(revision_err)?;
    let entry = find_revision(&revisions, ctx.revision_id.as_str()).ok_or_else(|| {
        revision_err(crate::error::SourceError::RevisionNotFound {
            revision_id: ctx.revision_id.to_string(),
        })
    })?;

    let path = dir.join("revision.json");
    let body = serde_json::to_vec_pretty(entry)
        .map_err(|e| TransformError::Rejected(format!("revision record: {e}")))?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

#[async_trait]
impl EpubTransformer for CommandTransformer {
    fn name(&self) -> &str {
        "command"
    }

    async fn transform(
        &self,
        content: &[u8],
        revision: Option<RevisionContext>,
    ) -> Result<Vec<u8>, TransformError> {
        if content.is_empty() {
            return Err(TransformError::Rejected("empty law XML".into()));
        }

        // Scratch files are removed when `scratch` drops, on every path.
        let scratch = TempDir::new()?;
        let input = scratch.path().join("law.xml");
        let output = scratch.path().join("law.epub");
        tokio::fs::write(&input, content).await?;

        let revision_info = match revision {
            Some(ref ctx) => Some(write_revision_info(ctx, scratch.path()).await?),
            None => None,
        };
        let args = self.build_args(
            &input,
            &output,
            revision
                .as_ref()
                .map(|ctx| &ctx.revision_id)
                .zip(revision_info.as_deref()),
        );

        debug!("Running {} {:?}", self.program.display(), args);
        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| TransformError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(TransformError::Failed {
                code: result
                    .status
                    .code()
                    .map(|c| format!("code {c}"))
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let epub = match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(TransformError::EmptyOutput { path: output }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransformError::EmptyOutput { path: output })
            }
            Err(e) => return Err(TransformError::Io(e)),
        };

        info!("EPUB builder produced {} bytes", epub.len());
        Ok(epub)
    }
}
