pub mod chunk;
pub mod classify;
pub mod context;
pub mod diag;
pub mod import;
pub mod span;
pub mod text;

pub use chunk::{
    Argument, AsmFile, Chunk, ChunkKind, Comment, Constant, Define, Invocation, Label, MacroDef,
    SourceLine,
};
pub use classify::Classifier;
pub use context::Session;
pub use diag::{
    Diagnostic, RenderOptions, Severity, render_diagnostic, render_diagnostic_with_options,
    render_diagnostics, render_diagnostics_with_options,
};
pub use import::{ImportError, ImportOutput, Importer};
pub use span::{LineCursor, Origin, RawLine};
