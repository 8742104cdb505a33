use thiserror::Error;

/// Errors surfaced to the host. Runtime evaluation failures are not errors:
/// they evaluate to nil and are logged, per the interpreter's sentinel
/// discipline. `Err` is reserved for the reader and for I/O.
#[derive(Debug, Error)]
pub enum Error {
    #[error("read error: {0}")]
    Read(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
