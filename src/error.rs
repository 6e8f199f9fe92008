use std::path::PathBuf;
use thiserror::Error;

use crate::ast::Location;

/// Result type for classforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for a classforge run. Each run stops at the first one raised.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    General(#[from] GeneralError),

    #[error("{file}:{location}: {error}")]
    Resolving {
        file: String,
        location: Location,
        error: ResolveError,
    },

    #[error("class {class}: {error}")]
    Limit { class: String, error: LimitError },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a resolution error reported at a declaration
    pub fn resolving(file: impl Into<String>, location: Location, error: ResolveError) -> Self {
        Self::Resolving { file: file.into(), location, error }
    }

    /// Create a binary-format limit error for a class
    pub fn limit(class: impl Into<String>, error: LimitError) -> Self {
        Self::Limit { class: class.into(), error }
    }

    /// Create an internal invariant violation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::General(GeneralError::MalformedClass { origin: origin.into(), reason: reason.into() })
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::General(GeneralError::Io { path: path.into(), source })
    }

    /// The resolution error carried by this error, if any
    pub fn as_resolve_error(&self) -> Option<&ResolveError> {
        match self {
            Error::Resolving { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Process exit status for this kind of error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::General(_) => 2,
            Error::Resolving { .. } => 3,
            Error::Limit { .. } => 4,
            Error::Internal { .. } => 70,
        }
    }
}

/// Environment and binary decoding failures
#[derive(Error, Debug)]
pub enum GeneralError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed class file {origin}: {reason}")]
    MalformedClass { origin: String, reason: String },

    #[error("invalid descriptor {descriptor:?}")]
    InvalidDescriptor { descriptor: String },
}

/// Semantic errors raised by the resolution passes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("duplicate class {name}")]
    DuplicateClass { name: String },

    #[error("duplicate field {name} in {class}")]
    DuplicateField { class: String, name: String },

    #[error("duplicate method {signature} in {class}")]
    DuplicateMethod { class: String, signature: String },

    #[error("duplicate import of {target}")]
    DuplicateImport { target: String },

    #[error("ambiguous import {name}: {}", candidates.join(", "))]
    AmbiguousImport { name: String, candidates: Vec<String> },

    #[error("cannot resolve import {path}")]
    UnresolvedImport { path: String },

    #[error("cannot resolve type {name}")]
    UnresolvedType { name: String },

    #[error("illegal modifier on {target}: {reason}")]
    IllegalModifier { target: String, reason: String },

    #[error("{class} cannot extend {target}: {reason}")]
    IllegalInheritance { class: String, target: String, reason: String },

    #[error("inner class {class} must be nested in another class")]
    InnerNotNested { class: String },

    #[error("{class} declares no constructor")]
    MissingConstructor { class: String },

    #[error("cyclic inheritance involving {class}")]
    CyclicInheritance { class: String },

    #[error("cyclic interface implementation involving {interface}")]
    CyclicImplementation { interface: String },

    #[error("{method} cannot override {overridden}: {reason}")]
    IncompatibleOverride { method: String, overridden: String, reason: String },

    #[error("{class} does not implement {method} declared in {interface}")]
    MissingImplementation { class: String, method: String, interface: String },
}

/// Ceilings imposed by the class-file format
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("too many fields ({count})")]
    TooManyFields { count: usize },

    #[error("too many methods ({count})")]
    TooManyMethods { count: usize },

    #[error("too many interfaces ({count})")]
    TooManyInterfaces { count: usize },

    #[error("identifier of {length} bytes is too long: {prefix}...")]
    IdentifierTooLong { prefix: String, length: usize },

    #[error("method {method} takes {slots} parameter slots, at most 255 are allowed")]
    TooManyParameterSlots { method: String, slots: usize },

    #[error("code of method {method} is {length} bytes, at most 65535 are allowed")]
    CodeTooLarge { method: String, length: usize },

    #[error("branch in method {method} spans {offset} bytes")]
    BranchTooFar { method: String, offset: i64 },

    #[error("constant of {length} bytes exceeds 65535")]
    ConstantTooLong { length: usize },

    #[error("constant pool count {count} exceeds 65535")]
    ConstantPool { count: usize },
}
