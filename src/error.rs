//! Error type shared by layout construction, `prepare()` and field access.

use thiserror::Error;

/// The single error returned at the crate boundary.
///
/// Carries the name of the layout in which the condition was detected and
/// the [`ErrorKind`] describing it. All conditions are programming or data
/// errors; nothing here is transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("datamap '{layout}': {kind}")]
pub struct DatamapError {
    pub layout: String,
    pub kind: ErrorKind,
}

impl DatamapError {
    pub fn new(layout: impl Into<String>, kind: ErrorKind) -> Self {
        DatamapError {
            layout: layout.into(),
            kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }
}

/// What went wrong. `DuplicateField`, `InvalidOccurs`, `InvalidPosition`
/// and `UnknownOption` are also raised while building a layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("field {field} must not be modified")]
    ReadOnly { field: String },

    #[error("field {field} must not be read")]
    WriteOnly { field: String },

    #[error("field {0} is not defined")]
    UnknownField(String),

    #[error("undefined option {0}")]
    UnknownOption(String),

    #[error("invalid option value: {0}")]
    InvalidOption(String),

    #[error("field name {0} is already defined")]
    DuplicateField(String),

    #[error("field {field}: {detail}")]
    FieldOverflow { field: String, detail: String },

    #[error("field {0} is not a repeating field")]
    NotRepeating(String),

    #[error("field {0} is a nested group and has no scalar value")]
    Composite(String),

    #[error("field {0} is not a nested group")]
    NotComposite(String),

    #[error("field {field} index {index} is out of range 0..{occurs}")]
    IndexOutOfRange {
        field: String,
        index: usize,
        occurs: usize,
    },

    #[error("field {field}: {given} values exceed occurrence count {occurs}")]
    TooManyValues {
        field: String,
        given: usize,
        occurs: usize,
    },

    #[error("field {field}: invalid occurrence count {count}")]
    InvalidOccurs { field: String, count: i64 },

    #[error("field {field}: invalid position ({detail})")]
    InvalidPosition { field: String, detail: String },

    #[error("field {field}: invalid length {length}")]
    InvalidLength { field: String, length: usize },

    #[error("field {field}: expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("field {field}: bytes {start}..{end} outside buffer of length {len}")]
    BufferTooShort {
        field: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("field {field}: invalid data ({detail})")]
    InvalidData { field: String, detail: String },

    #[error("field {field}: character {ch:?} cannot be encoded in {encoding}")]
    Unencodable {
        field: String,
        ch: char,
        encoding: &'static str,
    },

    #[error("format buffer: {0}")]
    FormatBuffer(String),
}

/// Result type for layout and record operations.
pub type Result<T> = std::result::Result<T, DatamapError>;
