//! Error types for the engine core.
//!
//! One enum per fallible subsystem, following the four-way partition the
//! engine observes in practice: a malformed archive/chunk is a [`FormatError`],
//! a value the content should never produce is a [`LogicError`], and anything
//! the VM itself can raise during execution is a [`VmError`]. "Missing"
//! conditions (a `-1` script address, an unbound rule address) are not errors
//! at all and are modeled as `Option`/ordinary control flow, not these types.

use std::fmt;

/// Archive and codec failures (component A/B).
#[derive(Debug)]
pub enum FormatError {
    /// Trailer magic did not read `=VS=`.
    BadMagic { found: u32 },
    /// A directory id was requested that is not present in the table of contents.
    DirectoryNotFound { id: u8 },
    /// A chunk tag byte had bit7 clear — not a chunk at all.
    NotAChunk { tag: u8 },
    /// A compressed or raw chunk's declared size ran past the end of input.
    TruncatedChunk { wanted: usize, available: usize },
    /// LZSS back-reference or literal ran off the end of its control byte's input.
    TruncatedLzss,
    /// A packed-int encoding underflowed (ran out of bytes mid-value).
    PackedIntUnderflow,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { found } => write!(f, "archive trailer magic mismatch: 0x{found:08X}"),
            Self::DirectoryNotFound { id } => write!(f, "no directory with id {id}"),
            Self::NotAChunk { tag } => write!(f, "chunk tag 0x{tag:02X} has bit7 clear"),
            Self::TruncatedChunk { wanted, available } => {
                write!(f, "chunk truncated: wanted {wanted} bytes, have {available}")
            }
            Self::TruncatedLzss => write!(f, "LZSS stream truncated mid-token"),
            Self::PackedIntUnderflow => write!(f, "packed int ran out of bytes"),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<std::io::Error> for FormatError {
    fn from(_: std::io::Error) -> Self {
        // Archive reads are always against an in-memory byte slice or a
        // pre-validated file; an I/O error at this layer means truncation.
        Self::TruncatedChunk {
            wanted: 0,
            available: 0,
        }
    }
}

/// Errors raised by the bytecode VM while executing (component D).
#[derive(Debug)]
pub enum VmError {
    /// `CALL_FUNC` referenced an id with no registered host callback.
    UnregisteredCallFunc { id: u32 },
    /// Opcode byte did not decode to a known instruction.
    BadOpcode { value: u8, addr: u32 },
    /// Execution was aborted by the cooperative `interrupt` flag (reload in flight).
    Interrupted,
    /// Every pooled VM instance was in use and a transient instance had to be
    /// allocated; this is not fatal but indicates content reentering deeper
    /// than the documented pool-of-two contract.
    PoolExhausted,
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnregisteredCallFunc { id } => write!(f, "CALL_FUNC {id}: no host callback registered"),
            Self::BadOpcode { value, addr } => {
                write!(f, "bad opcode 0x{value:02X} at VM address 0x{addr:08X}")
            }
            Self::Interrupted => write!(f, "VM execution interrupted (module reload in flight)"),
            Self::PoolExhausted => write!(f, "VM instance pool exhausted, using transient instance"),
        }
    }
}

impl std::error::Error for VmError {}

/// A value appeared where the format guarantees it should always be zero.
/// The reference implementation calls `exit`; this crate surfaces it as a
/// fatal error carrying the resource tag and offset so callers can report it.
#[derive(Debug)]
pub struct LogicError {
    pub res_type: u8,
    pub offset: usize,
    pub message: &'static str,
}

impl fmt::Display for LogicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "logic error in resource type 0x{:02X} at offset {}: {}",
            self.res_type, self.offset, self.message
        )
    }
}

impl std::error::Error for LogicError {}
