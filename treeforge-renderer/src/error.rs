//! Error types for treeforge-renderer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The embedded or user templates failed to parse.
    #[error("failed to load templates: {0}")]
    Load(#[source] tera::Error),

    /// A context struct could not be turned into a tera context.
    #[error("failed to build context for {template}: {source}")]
    Context {
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    /// Rendering an entry template failed, usually an override referencing
    /// a variable the context lacks.
    #[error("failed to render {template}: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
