//! Error types for storage, dispatch and command operations.
//!
//! None of these are transient: there is no I/O in the core, so every error
//! is a programming or configuration fault reported straight to the caller.

use alloc::string::String;

/// Malformed record schema, detected when a block store is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The field collides with a reserved per-block field.
    #[error("field name `{0}` is reserved")]
    ReservedName(String),
    /// Two fields share a name.
    #[error("field name `{0}` is already used")]
    DuplicateField(String),
    /// The field name is a language keyword.
    #[error("field name cannot be a keyword: `{0}`")]
    KeywordName(String),
    /// The field name is empty.
    #[error("field name cannot be empty")]
    EmptyName,
    /// More than one identity column was declared.
    #[error("schema declares more than one identity column (`{first}`, `{second}`)")]
    MultipleIdentity { first: String, second: String },
    /// A block must hold at least one record.
    #[error("block size must be positive")]
    ZeroBlockSize,
}

/// Wrong argument shape or type passed to a store, kernel or command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// A handle references a block that does not exist.
    #[error("block index {index} out of range (block count: {count})")]
    BlockOutOfRange { index: usize, count: usize },
    /// A slot index exceeds the valid elements of its block.
    #[error("slot {slot} out of range in block {block} ({len} elements)")]
    SlotOutOfRange { block: usize, slot: usize, len: usize },
    /// The field name is not part of the schema.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// The field exists but holds another type.
    #[error("field `{name}` does not hold values of type `{requested}`")]
    FieldType { name: String, requested: &'static str },
    /// An external array does not match the number of selected elements.
    #[error("expected {expected} values, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    /// A dispatch list element is not a block store of the kernel's record type.
    #[error("argument {position} is not a block store of `{expected}`")]
    NotABlockStore { position: usize, expected: &'static str },
    /// A required command parameter was not supplied.
    #[error("missing argument `{0}`")]
    MissingArgument(&'static str),
    /// A command parameter was supplied with the wrong type.
    #[error("argument `{name}` expects {expected}")]
    InvalidArgument { name: String, expected: &'static str },
    /// An argument does not match any declared parameter.
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
    /// An opaque handle no longer refers to a live object.
    #[error("handle {index}:{generation} is stale or was never issued")]
    StaleHandle { index: u32, generation: u32 },
}

/// Every failure the crate reports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    /// The operation is refused by design, e.g. deleting identity-bearing records.
    #[error("unsupported operation `{operation}`: {reason}")]
    Unsupported { operation: &'static str, reason: &'static str },
    /// The command name is not registered.
    #[error("command `{0}` is not recognized")]
    UnknownCommand(String),
    /// Constraints reference nodes that no longer exist; the step was not applied.
    #[error("{count} constraint(s) reference missing nodes")]
    DanglingReference { count: usize },
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn schema_error_converts() {
        let err: Error = SchemaError::ReservedName("active".to_string()).into();
        assert_eq!(err.to_string(), "field name `active` is reserved");
    }

    #[test]
    fn argument_error_message() {
        let err = ArgumentError::BlockOutOfRange { index: 4, count: 2 };
        assert_eq!(err.to_string(), "block index 4 out of range (block count: 2)");
    }
}
