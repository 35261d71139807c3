//! Opcode signatures.
//!
//! A signature lists, in stream order, what follows an opcode byte: child
//! nodes, fixed-width immediates, or a special form whose arity is only known
//! while decoding. The table is built once and shared read-only.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::DecodeError;
use crate::opcodes::{
    ConstantOpcode, ControlOpcode, LoadOpcode, MiscOpcode, Opcode, SimpleOpcode, StoreOpcode,
};

/// Variable-arity forms handled by dedicated decoder code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    /// Callee index byte; argument count comes from the handler.
    CallFunction,
    /// Statement count byte followed by that many statements.
    Block,
    /// Not supported by this decoder version.
    CallIndirect,
    /// Not supported by this decoder version.
    TableSwitch,
}

impl SpecialForm {
    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::CallFunction => "call",
            SpecialForm::Block => "block",
            SpecialForm::CallIndirect => "indirect call",
            SpecialForm::TableSwitch => "table switch",
        }
    }
}

/// One argument descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argument {
    /// `count` child subtrees, decoded in order.
    Node(u8),
    /// Signed integer immediate of the given byte width.
    Integer(u8),
    /// IEEE-754 immediate of the given byte width.
    Float(u8),
    /// Arity computed at decode time.
    Special(SpecialForm),
}

/// Ordered argument descriptors for one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub opcode: Opcode,
    pub arguments: &'static [Argument],
}

impl Signature {
    /// True if no arguments follow the opcode.
    pub fn is_leaf(&self) -> bool {
        self.arguments.is_empty()
    }

    /// True if decoding this opcode may produce child nodes.
    pub fn has_children(&self) -> bool {
        self.arguments.iter().any(|arg| match arg {
            Argument::Node(count) => *count > 0,
            Argument::Special(_) => true,
            Argument::Integer(_) | Argument::Float(_) => false,
        })
    }

    /// Statically known child count (special forms count as zero).
    pub fn static_children(&self) -> usize {
        self.arguments
            .iter()
            .map(|arg| match arg {
                Argument::Node(count) => *count as usize,
                _ => 0,
            })
            .sum()
    }
}

const LEAF: &[Argument] = &[];
const UNARY: &[Argument] = &[Argument::Node(1)];
const BINARY: &[Argument] = &[Argument::Node(2)];
const TERNARY: &[Argument] = &[Argument::Node(3)];
const INDEX: &[Argument] = &[Argument::Integer(1)];
const INDEX_UNARY: &[Argument] = &[Argument::Integer(1), Argument::Node(1)];
const INDEX_BINARY: &[Argument] = &[Argument::Integer(1), Argument::Node(2)];
const BLOCK: &[Argument] = &[Argument::Special(SpecialForm::Block)];
const CALL: &[Argument] = &[Argument::Special(SpecialForm::CallFunction)];
const CALL_INDIRECT: &[Argument] = &[Argument::Special(SpecialForm::CallIndirect)];
const TABLE_SWITCH: &[Argument] = &[Argument::Special(SpecialForm::TableSwitch)];

/// Opcode → signature map.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    signatures: HashMap<u8, Signature>,
}

impl SignatureTable {
    /// Create an empty table.
    pub fn new() -> Self {
        SignatureTable::default()
    }

    /// Register a signature; each opcode may be defined once.
    pub fn define(
        &mut self,
        opcode: impl Into<Opcode>,
        arguments: &'static [Argument],
    ) -> Result<(), DecodeError> {
        let opcode = opcode.into();
        if self.signatures.contains_key(&opcode.byte()) {
            return Err(DecodeError::DuplicateOpcode {
                byte: opcode.byte(),
            });
        }
        self.signatures
            .insert(opcode.byte(), Signature { opcode, arguments });
        Ok(())
    }

    /// Signature for `opcode`. `offset` is only used for the error.
    pub fn get(&self, opcode: Opcode, offset: usize) -> Result<&Signature, DecodeError> {
        self.signatures
            .get(&opcode.byte())
            .ok_or(DecodeError::UnknownOpcode {
                offset,
                byte: opcode.byte(),
            })
    }

    pub fn contains(&self, opcode: Opcode) -> bool {
        self.signatures.contains_key(&opcode.byte())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// All registered opcodes in ascending byte order.
    pub fn opcodes(&self) -> Vec<Opcode> {
        let mut ops: Vec<Opcode> = self.signatures.values().map(|s| s.opcode).collect();
        ops.sort();
        ops
    }

    /// The built-in table covering every opcode group.
    pub fn standard() -> Result<Self, DecodeError> {
        use ConstantOpcode::*;
        use ControlOpcode::*;
        use MiscOpcode::*;

        let mut table = SignatureTable::new();

        // Control
        table.define(Nop, LEAF)?;
        table.define(Unreachable, LEAF)?;
        table.define(ControlOpcode::Block, BLOCK)?;
        table.define(Loop, BLOCK)?;
        table.define(If, BINARY)?;
        table.define(IfThen, TERNARY)?;
        table.define(Select, TERNARY)?;
        table.define(Br, INDEX_UNARY)?;
        table.define(BrIf, INDEX_BINARY)?;
        table.define(TableSwitch, TABLE_SWITCH)?;
        table.define(Return, UNARY)?;

        // Constants
        table.define(I8Const, &[Argument::Integer(1)])?;
        table.define(I32Const, &[Argument::Integer(4)])?;
        table.define(I64Const, &[Argument::Integer(8)])?;
        table.define(F32Const, &[Argument::Float(4)])?;
        table.define(F64Const, &[Argument::Float(8)])?;

        // Misc
        table.define(GetLocal, INDEX)?;
        table.define(SetLocal, INDEX_UNARY)?;
        table.define(LoadGlobal, INDEX)?;
        table.define(StoreGlobal, INDEX_UNARY)?;
        table.define(CallFunction, CALL)?;
        table.define(CallIndirect, CALL_INDIRECT)?;
        table.define(MemorySize, LEAF)?;
        table.define(ResizeMemL, UNARY)?;
        table.define(ResizeMemH, UNARY)?;

        // Memory access byte, then address (and value for stores)
        for &(op, _) in LoadOpcode::ALL {
            table.define(op, INDEX_UNARY)?;
        }
        for &(op, _) in StoreOpcode::ALL {
            table.define(op, INDEX_BINARY)?;
        }

        for &(op, _) in SimpleOpcode::ALL {
            let arguments = if op.arity() == 1 { UNARY } else { BINARY };
            table.define(op, arguments)?;
        }

        log::debug!("[WASM-AST] Signature table built: {} opcodes", table.len());
        Ok(table)
    }
}

static SIGNATURES: spin::Once<SignatureTable> = spin::Once::new();

/// The process-wide signature table, built on first use.
pub fn global() -> Result<&'static SignatureTable, DecodeError> {
    SIGNATURES.try_call_once(SignatureTable::standard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes;

    #[test]
    fn test_standard_table_covers_every_opcode() {
        let table = SignatureTable::standard().unwrap();
        let index = opcodes::index().unwrap();
        assert_eq!(table.len(), index.len());
        for op in table.opcodes() {
            assert!(op.group().is_some(), "{:?} has no group", op);
        }
    }

    #[test]
    fn test_lookup_is_stable() {
        let table = global().unwrap();
        let add = Opcode::from(SimpleOpcode::I32Add);
        let first = *table.get(add, 0).unwrap();
        let second = *table.get(add, 0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.arguments, &[Argument::Node(2)]);
        assert!(core::ptr::eq(global().unwrap(), table));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let mut table = SignatureTable::new();
        table.define(ControlOpcode::Nop, LEAF).unwrap();
        assert_eq!(
            table.define(ControlOpcode::Nop, UNARY),
            Err(DecodeError::DuplicateOpcode { byte: 0x00 })
        );
        // The first definition survives.
        assert!(table
            .get(Opcode::from(ControlOpcode::Nop), 0)
            .unwrap()
            .is_leaf());
    }

    #[test]
    fn test_unknown_opcode() {
        let table = global().unwrap();
        assert_eq!(
            table.get(Opcode::from(0xFEu8), 7),
            Err(DecodeError::UnknownOpcode {
                offset: 7,
                byte: 0xFE
            })
        );
    }

    #[test]
    fn test_signature_shapes() {
        let table = global().unwrap();
        let sig = |op: Opcode| *table.get(op, 0).unwrap();

        let nop = sig(ControlOpcode::Nop.into());
        assert!(nop.is_leaf());
        assert!(!nop.has_children());

        let i8_const = sig(ConstantOpcode::I8Const.into());
        assert!(!i8_const.has_children());
        assert_eq!(i8_const.arguments, &[Argument::Integer(1)]);

        let store = sig(StoreOpcode::I32StoreMem.into());
        assert_eq!(store.static_children(), 2);

        let block = sig(ControlOpcode::Block.into());
        assert!(block.has_children());
        assert_eq!(block.static_children(), 0);

        let convert = sig(SimpleOpcode::F64ConvertF32.into());
        assert_eq!(convert.arguments, &[Argument::Node(1)]);
    }
}
