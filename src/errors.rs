//! Error types for schema construction, packing, and bit cursor operations.

use thiserror::Error;

/// Errors produced when building a [crate::schema::Schema] from its builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Field name is empty or already registered (packed or external).
    #[error("invalid field name `{0}`")]
    InvalidFieldName(String),
    /// Packed field width is 0 or greater than 64 bits.
    #[error("invalid width of {width} bits for {field}")]
    InvalidFieldWidth { field: String, width: usize },
}

/// Pack-time validation failures.
///
/// These are programmer/data errors and surface to the direct caller of
/// [crate::schema::Schema::pack], or to a tracker's error callback when one
/// is attached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    /// A codec writer produced a negative raw value.
    #[error("{field}'s value should be unsigned")]
    Negative { field: String },
    /// A raw value does not fit the field's declared bit width.
    #[error("{value} is too big for {field}. It should be less than {limit}")]
    TooLarge {
        field: String,
        value: i64,
        limit: u128,
    },
    /// Bit cursor ran past the end of the computed buffer.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// Hash fragment could not be read back from the digest.
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Errors produced when reading bits from a byte buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// Requested bit range is beyond the end of the data.
    #[error("bit read out of bounds")]
    OutOfBounds,
    /// More than 64 bits were requested in a single read.
    #[error("more than 64 bits in a single read")]
    TooManyBitsRead,
}

/// Errors produced when writing bits into a byte buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Write would run past the end of the buffer.
    #[error("bit write out of bounds")]
    OutOfBounds,
    /// More than 64 bits were requested in a single write.
    #[error("more than 64 bits in a single write")]
    TooManyBitsWritten,
}
