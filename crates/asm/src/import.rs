use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::chunk::AsmFile;
use crate::classify::Classifier;
use crate::context::Session;
use crate::diag::Diagnostic;
use crate::span::LineCursor;

/// A finished import: the file plus any non-fatal diagnostics produced
/// while classifying it.
#[derive(Debug)]
pub struct ImportOutput {
    pub file: AsmFile,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    /// The classifier produced no chunks at all. Fatal for this import;
    /// retrying the same input cannot succeed.
    #[error("no chunks could be parsed from '{path}'")]
    Empty { path: String },
    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Drives the classifier over a whole input and assembles the resulting
/// chunk sequence into an `AsmFile`. One importer serves one session;
/// macros defined by the session's includes are recognized at callsites in
/// the imported text.
#[derive(Debug, Default)]
pub struct Importer<'a> {
    session: Session<'a>,
}

impl<'a> Importer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session<'a>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session<'a> {
        &self.session
    }

    pub fn import_path(&self, path: &Path) -> Result<ImportOutput, ImportError> {
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.import_source(&path.display().to_string(), &text)
    }

    pub fn import_source(&self, name: &str, text: &str) -> Result<ImportOutput, ImportError> {
        let file_name: Arc<str> = Arc::from(name);
        let mut cursor = LineCursor::new(file_name.clone(), text);
        let mut classifier = Classifier::new(&self.session);
        let mut warnings = Vec::new();
        let mut chunks = Vec::new();

        loop {
            let parsed = classifier.classify_next(&mut cursor, &mut warnings);
            if parsed.is_empty() {
                break;
            }
            chunks.extend(parsed);
        }

        if chunks.is_empty() {
            return Err(ImportError::Empty {
                path: name.to_string(),
            });
        }

        Ok(ImportOutput {
            file: AsmFile::from_chunks(file_name, chunks),
            warnings,
        })
    }
}
