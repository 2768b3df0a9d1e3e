//! The module loader (component E): decodes a stream of bytecoded load
//! instructions interleaved with `=VS=` archive chunks into an
//! [`gamos_core::engine::EngineState`] ready to run.
//!
//! Grounded on the reference's per-module bootstrap loop: a tiny command
//! byte dialect (`0`=section boundary, `1..3`=packed-int assignment,
//! `4`=dispatch the next chunk as the last resource type's body, `5`=skip a
//! movie blob, `6`=the "loader2" inlined mini-stream form, `0xFF`=re-use the
//! previous chunk, anything else packs `(type<<1)|hasId`) feeding a
//! dispatch table over 7-bit resource types.

use std::fmt;

pub mod module_loader;
pub mod rule_parser;

pub use module_loader::ModuleLoader;

/// Errors raised while decoding a module's load stream.
#[derive(Debug)]
pub enum LoaderError {
    /// The underlying archive failed to read or decompress a chunk.
    Format(gamos_core::error::FormatError),
    /// A value appeared where the format guarantees it should never occur,
    /// e.g. a rule body that runs out of bytes mid-entry.
    Logic {
        res_type: u8,
        offset: usize,
        message: &'static str,
    },
    /// A resource type outside the documented dispatch table.
    UnknownResourceType { res_type: u8 },
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "{e}"),
            Self::Logic {
                res_type,
                offset,
                message,
            } => write!(
                f,
                "logic error in resource type 0x{res_type:02X} at offset {offset}: {message}"
            ),
            Self::UnknownResourceType { res_type } => {
                write!(f, "resource type 0x{res_type:02X} has no dispatch handler")
            }
        }
    }
}

impl std::error::Error for LoaderError {}

impl From<gamos_core::error::FormatError> for LoaderError {
    fn from(e: gamos_core::error::FormatError) -> Self {
        Self::Format(e)
    }
}
