use thiserror::Error;

/// Rejected operation. Returned before any state is touched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("word cannot be empty")]
    EmptyWord,
    #[error("prefix cannot be empty")]
    EmptyPrefix,
}

pub type Result<T> = std::result::Result<T, Error>;
