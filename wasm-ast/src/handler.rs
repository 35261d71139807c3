//! Handler interface for AST decode events.

use crate::immediate::Immediate;
use crate::opcodes::Opcode;

/// Value types used in signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LocalType {
    /// No value.
    Statement = 0,
    I32 = 1,
    I64 = 2,
    F32 = 3,
    F64 = 4,
}

impl LocalType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(LocalType::Statement),
            1 => Some(LocalType::I32),
            2 => Some(LocalType::I64),
            3 => Some(LocalType::F32),
            4 => Some(LocalType::F64),
            _ => None,
        }
    }
}

/// What the decoder needs to know about a call target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSignature {
    pub argument_count: u8,
    pub return_type: LocalType,
}

/// Receives events from the AST decoder.
///
/// `stack` is always the chain of enclosing opcodes, outermost first, and
/// never includes the node the event is about. Both slices are decoder state
/// and must be copied if retained.
pub trait DecodeHandler {
    /// A node with children is about to have them decoded.
    fn on_begin_node(&mut self, opcode: Opcode, stack: &[Opcode]) {
        let _ = (opcode, stack);
    }

    /// A node and everything beneath it has been decoded. `children` counts
    /// direct children only; they were the last `children` nodes reported at
    /// this depth.
    fn on_node(
        &mut self,
        opcode: Opcode,
        children: usize,
        immediates: &[Immediate],
        stack: &[Opcode],
    );

    /// Resolve the signature of the function a call opcode targets. `None`
    /// makes the decode fail with `DecodeError::UnknownFunction`.
    fn resolve_call_signature(&mut self, index: u8) -> Option<CallSignature> {
        let _ = index;
        None
    }
}

impl<H: DecodeHandler + ?Sized> DecodeHandler for &mut H {
    fn on_begin_node(&mut self, opcode: Opcode, stack: &[Opcode]) {
        (**self).on_begin_node(opcode, stack)
    }

    fn on_node(
        &mut self,
        opcode: Opcode,
        children: usize,
        immediates: &[Immediate],
        stack: &[Opcode],
    ) {
        (**self).on_node(opcode, children, immediates, stack)
    }

    fn resolve_call_signature(&mut self, index: u8) -> Option<CallSignature> {
        (**self).resolve_call_signature(index)
    }
}
