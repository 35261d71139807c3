//! Decoder error types.
//!
//! Every failure inside a function body carries the absolute byte offset at
//! which it was detected and, where one was being decoded, the opcode, so that
//! `Display` output is enough to locate the problem in a malformed module.

use alloc::boxed::Box;
use core::fmt;

use crate::opcodes::Opcode;

/// Errors produced while decoding a module or a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The reader ran out of bytes in the middle of a node or section.
    StreamExhausted {
        offset: usize,
        opcode: Option<Opcode>,
    },
    /// The byte at `offset` has no registered signature.
    UnknownOpcode { offset: usize, byte: u8 },
    /// The decode stack popped something other than what was pushed.
    StackMisalignment {
        offset: usize,
        expected: Opcode,
        found: Option<Opcode>,
    },
    /// A recognized construct this decoder version does not support.
    Unimplemented {
        offset: usize,
        opcode: Option<Opcode>,
        feature: &'static str,
    },
    /// An immediate was declared with a width the decoder cannot read.
    InvalidImmediateWidth {
        offset: usize,
        opcode: Option<Opcode>,
        width: u8,
        float: bool,
    },
    /// Nesting exceeded `DecoderConfig::max_nesting_depth`.
    NestingTooDeep {
        offset: usize,
        opcode: Opcode,
        limit: usize,
    },
    /// The handler could not resolve a call target.
    UnknownFunction {
        offset: usize,
        opcode: Opcode,
        index: u8,
    },
    /// Two signatures or names were registered for the same opcode byte.
    DuplicateOpcode { byte: u8 },
    /// Unknown section tag in the module stream.
    UnknownSection { offset: usize, tag: u8 },
    /// A local/return type byte outside the known set.
    InvalidLocalType { offset: usize, byte: u8 },
    /// A name did not decode as NUL-terminated UTF-8.
    InvalidUtf8 { offset: usize },
    /// A count read from the stream exceeds the configured limit.
    LimitExceeded {
        offset: usize,
        what: &'static str,
        count: u32,
        limit: u32,
    },
    /// A function entry refers to a signature that was never declared.
    UnknownSignature { function: u32, signature: u16 },
    /// Decoding the body of function `index` failed.
    FunctionBody {
        index: u32,
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Attach the opcode being decoded, if the error does not carry one yet.
    pub(crate) fn in_opcode(self, op: Opcode) -> Self {
        match self {
            DecodeError::StreamExhausted { offset, opcode: None } => {
                DecodeError::StreamExhausted {
                    offset,
                    opcode: Some(op),
                }
            }
            DecodeError::Unimplemented {
                offset,
                opcode: None,
                feature,
            } => DecodeError::Unimplemented {
                offset,
                opcode: Some(op),
                feature,
            },
            DecodeError::InvalidImmediateWidth {
                offset,
                opcode: None,
                width,
                float,
            } => DecodeError::InvalidImmediateWidth {
                offset,
                opcode: Some(op),
                width,
                float,
            },
            other => other,
        }
    }

    /// Byte offset the error was detected at, if it has one.
    pub fn offset(&self) -> Option<usize> {
        match *self {
            DecodeError::StreamExhausted { offset, .. }
            | DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::StackMisalignment { offset, .. }
            | DecodeError::Unimplemented { offset, .. }
            | DecodeError::InvalidImmediateWidth { offset, .. }
            | DecodeError::NestingTooDeep { offset, .. }
            | DecodeError::UnknownFunction { offset, .. }
            | DecodeError::UnknownSection { offset, .. }
            | DecodeError::InvalidLocalType { offset, .. }
            | DecodeError::InvalidUtf8 { offset }
            | DecodeError::LimitExceeded { offset, .. } => Some(offset),
            DecodeError::DuplicateOpcode { .. } | DecodeError::UnknownSignature { .. } => None,
            DecodeError::FunctionBody { ref source, .. } => source.offset(),
        }
    }

    /// The innermost error, looking through `FunctionBody` wrappers.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::FunctionBody { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for conditions caused by a truncated stream.
    pub fn is_truncation(&self) -> bool {
        matches!(self.root_cause(), DecodeError::StreamExhausted { .. })
    }
}

struct InOpcode(Option<Opcode>);

impl fmt::Display for InOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(op) => write!(f, " in {}", op),
            None => Ok(()),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::StreamExhausted { offset, opcode } => write!(
                f,
                "Unexpected end of stream at offset {:#x}{}",
                offset,
                InOpcode(*opcode)
            ),
            DecodeError::UnknownOpcode { offset, byte } => write!(
                f,
                "No signature for opcode {:#04x} ({}) at offset {:#x}",
                byte,
                Opcode::from(*byte).name(),
                offset
            ),
            DecodeError::StackMisalignment {
                offset,
                expected,
                found,
            } => match found {
                Some(found) => write!(
                    f,
                    "Decode stack misaligned at offset {:#x}: expected {}, popped {}",
                    offset, expected, found
                ),
                None => write!(
                    f,
                    "Decode stack misaligned at offset {:#x}: expected {}, stack empty",
                    offset, expected
                ),
            },
            DecodeError::Unimplemented {
                offset,
                opcode,
                feature,
            } => write!(
                f,
                "Not implemented: {} at offset {:#x}{}",
                feature,
                offset,
                InOpcode(*opcode)
            ),
            DecodeError::InvalidImmediateWidth {
                offset,
                opcode,
                width,
                float,
            } => write!(
                f,
                "Invalid {} immediate width {} at offset {:#x}{}",
                if *float { "float" } else { "integer" },
                width,
                offset,
                InOpcode(*opcode)
            ),
            DecodeError::NestingTooDeep {
                offset,
                opcode,
                limit,
            } => write!(
                f,
                "Nesting deeper than {} at offset {:#x} in {}",
                limit, offset, opcode
            ),
            DecodeError::UnknownFunction {
                offset,
                opcode,
                index,
            } => write!(
                f,
                "No signature for function #{} at offset {:#x} in {}",
                index, offset, opcode
            ),
            DecodeError::DuplicateOpcode { byte } => {
                write!(f, "Duplicate opcode {:#04x}", byte)
            }
            DecodeError::UnknownSection { offset, tag } => {
                write!(f, "Unknown section {:#04x} at offset {:#x}", tag, offset)
            }
            DecodeError::InvalidLocalType { offset, byte } => {
                write!(f, "Invalid local type {:#04x} at offset {:#x}", byte, offset)
            }
            DecodeError::InvalidUtf8 { offset } => {
                write!(f, "Invalid UTF-8 string at offset {:#x}", offset)
            }
            DecodeError::LimitExceeded {
                offset,
                what,
                count,
                limit,
            } => write!(
                f,
                "Too many {} at offset {:#x}: {} (limit {})",
                what, offset, count, limit
            ),
            DecodeError::UnknownSignature {
                function,
                signature,
            } => write!(
                f,
                "Function #{} uses undeclared signature #{}",
                function, signature
            ),
            DecodeError::FunctionBody { index, source } => {
                write!(f, "Error decoding body of function #{}: {}", index, source)
            }
        }
    }
}
