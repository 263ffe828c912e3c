//! The error taxonomy every public operation in this crate returns.

use thiserror::Error;

/// Everything a core operation can fail with.
///
/// Variants map directly onto the kinds the original C implementation
/// distinguished (see `acorn-fs.h`'s `msgs[]` table); I/O failures are kept
/// separate from the custom codes instead of being folded into the same
/// signed-int space.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AfsError {
    #[error("unexpected end of file")]
    BadEof,

    #[error("not an Acorn filing system image")]
    NotAcorn,

    #[error("broken directory: {0}")]
    BrokenDir(&'static str),

    #[error("bad free space map: {0}")]
    BadFsmap(&'static str),

    #[error("free space map is full")]
    MapFull,

    #[error("directory is full")]
    DirFull,

    #[error("filesystem is corrupt: {0}")]
    Corrupt(String),

    #[error("no space left on device")]
    NoSpace,

    #[error("not a directory")]
    NotDir,

    #[error("no such file or directory")]
    NotFound,

    #[error("file exists")]
    Exists,

    #[error("name too long")]
    NameTooLong,

    #[error("operation not supported")]
    NotSupported,

    #[error("invalid argument")]
    Invalid,

    #[error("internal error: {0}")]
    Bug(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type AfsResult<T> = Result<T, AfsError>;

impl AfsError {
    /// Maps an error onto the CLI exit-code convention from spec.md §6:
    /// `2` for anything that is effectively "could not open/use the image".
    pub fn exit_code(&self) -> i32 {
        match self {
            AfsError::Invalid => 1,
            _ => 2,
        }
    }
}
