//! Error types for morloc-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for morloc-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a morloc project.
///
/// Every variant is a build-time failure. Runtime failures inside generated
/// pools (failed validation, failed foreign calls) never surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// The upstream frontend failed to produce LIL.
    #[error("frontend failed (exit code {code}): {message}")]
    Frontend { code: i32, message: String },

    /// Malformed LIL record.
    #[error("LIL parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A manifold uses a language with no grammar/mogrifier pair.
    #[error("'{0}' is not a supported language")]
    UnsupportedLanguage(String),

    /// A mogrifier has no handler for a type.
    #[error("no {lang} handler for type '{ty}'")]
    UnsupportedType { lang: String, ty: String },

    /// A type expression could not be parsed.
    #[error("invalid type '{0}'")]
    InvalidType(String),

    /// A literal argument does not decode under its declared type.
    #[error("invalid {ty} literal '{value}' in manifold {mid}")]
    InvalidLiteral {
        mid: String,
        ty: String,
        value: String,
    },

    /// A referenced manifold does not exist.
    #[error("manifold not found: {0}")]
    ManifoldNotFound(String),

    /// The manifold reference graph contains a cycle.
    #[error("cyclic dependency detected: {0}")]
    CyclicDependency(String),

    /// A manifold is internally inconsistent.
    #[error("invalid manifold {mid}: {message}")]
    InvalidManifold { mid: String, message: String },

    /// An export entry is unusable.
    #[error("invalid export: {0}")]
    InvalidExport(String),

    /// Execution path exists and clobbering was not requested.
    #[error("directory '{}' already exists", .0.display())]
    WorkspaceExists(PathBuf),

    /// Execution path cannot be created for lack of permissions.
    #[error("permission denied: cannot mkdir '{}'", .0.display())]
    WorkspacePermission(PathBuf),

    /// Execution path parent does not exist.
    #[error("cannot create directory '{}'", .0.display())]
    WorkspaceMissingParent(PathBuf),

    /// Every temporary slot under the home directory is taken.
    #[error("too many temporary directories in '{}'", .0.display())]
    WorkspaceExhausted(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Render the error with a short recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::UnsupportedLanguage(_) => Some("supported languages are: sh, py, R"),
            Error::WorkspaceExists(_) => Some("pass -k/--clobber to reuse the directory"),
            Error::WorkspaceExhausted(_) => {
                Some("remove old build directories under the morloc home 'tmp' folder")
            }
            Error::CyclicDependency(_) => {
                Some("a manifold may not consume its own output, directly or indirectly")
            }
            Error::Frontend { .. } => Some("run with -l/--lil-only to inspect the frontend output"),
            _ => None,
        };

        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }

    /// Exit code the driver should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Frontend { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
