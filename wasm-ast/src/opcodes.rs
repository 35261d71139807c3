//! Opcode definitions.
//!
//! The opcode space is split into six groups with disjoint numeric ranges.
//! Each group is a `#[repr(u8)]` enum; the decoder itself works with the
//! untyped [`Opcode`] byte so that unknown values can still be reported.

use core::fmt;

use hashbrown::HashMap;

use crate::error::DecodeError;

macro_rules! opcode_group {
    (
        $(#[$meta:meta])*
        $name:ident => $group:ident {
            $($variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value,)*
        }

        impl $name {
            /// Every opcode in this group, with its symbolic name.
            pub const ALL: &'static [($name, &'static str)] = &[
                $(($name::$variant, stringify!($variant)),)*
            ];

            /// Look up a group member by byte value.
            pub fn from_byte(b: u8) -> Option<Self> {
                match b {
                    $($value => Some($name::$variant),)*
                    _ => None,
                }
            }

            /// Symbolic name.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }

        impl From<$name> for Opcode {
            fn from(op: $name) -> Opcode {
                Opcode(op as u8)
            }
        }

        impl PartialEq<$name> for Opcode {
            fn eq(&self, other: &$name) -> bool {
                self.0 == *other as u8
            }
        }

        impl OpcodeTable for $name {
            const GROUP: OpcodeGroup = OpcodeGroup::$group;

            fn entries() -> &'static [(Opcode, &'static str)] {
                const ENTRIES: &[(Opcode, &str)] = &[
                    $((Opcode($value), stringify!($variant)),)*
                ];
                ENTRIES
            }
        }
    };
}

/// A single opcode byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(u8);

/// Which of the disjoint opcode tables a byte belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeGroup {
    Control,
    Constant,
    Misc,
    Load,
    Store,
    Simple,
}

/// Common view over the opcode group enums, used to build the name index.
pub trait OpcodeTable {
    const GROUP: OpcodeGroup;

    fn entries() -> &'static [(Opcode, &'static str)];
}

opcode_group! {
    /// Structured control flow.
    ControlOpcode => Control {
        Nop = 0x00,
        Block = 0x01,
        Loop = 0x02,
        If = 0x03,
        IfThen = 0x04,
        Select = 0x05,
        Br = 0x06,
        BrIf = 0x07,
        TableSwitch = 0x08,
        Return = 0x14,
        Unreachable = 0x15,
    }
}

opcode_group! {
    /// Constants with an embedded immediate.
    ConstantOpcode => Constant {
        I8Const = 0x09,
        I32Const = 0x0A,
        I64Const = 0x0B,
        F64Const = 0x0C,
        F32Const = 0x0D,
    }
}

opcode_group! {
    /// Locals, globals, calls and memory sizing.
    MiscOpcode => Misc {
        GetLocal = 0x0E,
        SetLocal = 0x0F,
        LoadGlobal = 0x10,
        StoreGlobal = 0x11,
        CallFunction = 0x12,
        CallIndirect = 0x13,
        ResizeMemL = 0x39,
        ResizeMemH = 0x3A,
        MemorySize = 0x3B,
    }
}

opcode_group! {
    /// Memory loads. Each takes a memory-access byte and an address node.
    LoadOpcode => Load {
        I32LoadMem8S = 0x20,
        I32LoadMem8U = 0x21,
        I32LoadMem16S = 0x22,
        I32LoadMem16U = 0x23,
        I64LoadMem8S = 0x24,
        I64LoadMem8U = 0x25,
        I64LoadMem16S = 0x26,
        I64LoadMem16U = 0x27,
        I64LoadMem32S = 0x28,
        I64LoadMem32U = 0x29,
        I32LoadMem = 0x2A,
        I64LoadMem = 0x2B,
        F32LoadMem = 0x2C,
        F64LoadMem = 0x2D,
    }
}

opcode_group! {
    /// Memory stores. Each takes a memory-access byte, an address and a value.
    StoreOpcode => Store {
        I32StoreMem8 = 0x2E,
        I32StoreMem16 = 0x2F,
        I64StoreMem8 = 0x30,
        I64StoreMem16 = 0x31,
        I64StoreMem32 = 0x32,
        I32StoreMem = 0x33,
        I64StoreMem = 0x34,
        F32StoreMem = 0x35,
        F64StoreMem = 0x36,
    }
}

opcode_group! {
    /// Arithmetic, comparison and conversion operators.
    SimpleOpcode => Simple {
        I32Add = 0x40,
        I32Sub = 0x41,
        I32Mul = 0x42,
        I32DivS = 0x43,
        I32DivU = 0x44,
        I32RemS = 0x45,
        I32RemU = 0x46,
        I32And = 0x47,
        I32Ior = 0x48,
        I32Xor = 0x49,
        I32Shl = 0x4A,
        I32ShrU = 0x4B,
        I32ShrS = 0x4C,
        I32Eq = 0x4D,
        I32Ne = 0x4E,
        I32LtS = 0x4F,
        I32LeS = 0x50,
        I32LtU = 0x51,
        I32LeU = 0x52,
        I32GtS = 0x53,
        I32GeS = 0x54,
        I32GtU = 0x55,
        I32GeU = 0x56,
        I32Clz = 0x57,
        I32Ctz = 0x58,
        I32Popcnt = 0x59,
        BoolNot = 0x5A,
        I64Add = 0x5B,
        I64Sub = 0x5C,
        I64Mul = 0x5D,
        I64DivS = 0x5E,
        I64DivU = 0x5F,
        I64RemS = 0x60,
        I64RemU = 0x61,
        I64And = 0x62,
        I64Ior = 0x63,
        I64Xor = 0x64,
        I64Shl = 0x65,
        I64ShrU = 0x66,
        I64ShrS = 0x67,
        I64Eq = 0x68,
        I64Ne = 0x69,
        I64LtS = 0x6A,
        I64LeS = 0x6B,
        I64LtU = 0x6C,
        I64LeU = 0x6D,
        I64GtS = 0x6E,
        I64GeS = 0x6F,
        I64GtU = 0x70,
        I64GeU = 0x71,
        I64Clz = 0x72,
        I64Ctz = 0x73,
        I64Popcnt = 0x74,
        F32Add = 0x75,
        F32Sub = 0x76,
        F32Mul = 0x77,
        F32Div = 0x78,
        F32Min = 0x79,
        F32Max = 0x7A,
        F32Abs = 0x7B,
        F32Neg = 0x7C,
        F32CopySign = 0x7D,
        F32Ceil = 0x7E,
        F32Floor = 0x7F,
        F32Trunc = 0x80,
        F32NearestInt = 0x81,
        F32Sqrt = 0x82,
        F32Eq = 0x83,
        F32Ne = 0x84,
        F32Lt = 0x85,
        F32Le = 0x86,
        F32Gt = 0x87,
        F32Ge = 0x88,
        F64Add = 0x89,
        F64Sub = 0x8A,
        F64Mul = 0x8B,
        F64Div = 0x8C,
        F64Min = 0x8D,
        F64Max = 0x8E,
        F64Abs = 0x8F,
        F64Neg = 0x90,
        F64CopySign = 0x91,
        F64Ceil = 0x92,
        F64Floor = 0x93,
        F64Trunc = 0x94,
        F64NearestInt = 0x95,
        F64Sqrt = 0x96,
        F64Eq = 0x97,
        F64Ne = 0x98,
        F64Lt = 0x99,
        F64Le = 0x9A,
        F64Gt = 0x9B,
        F64Ge = 0x9C,
        I32SConvertF32 = 0x9D,
        I32SConvertF64 = 0x9E,
        I32UConvertF32 = 0x9F,
        I32UConvertF64 = 0xA0,
        I32ConvertI64 = 0xA1,
        I64SConvertF32 = 0xA2,
        I64SConvertF64 = 0xA3,
        I64UConvertF32 = 0xA4,
        I64UConvertF64 = 0xA5,
        I64SConvertI32 = 0xA6,
        I64UConvertI32 = 0xA7,
        F32SConvertI32 = 0xA8,
        F32UConvertI32 = 0xA9,
        F32SConvertI64 = 0xAA,
        F32UConvertI64 = 0xAB,
        F32ConvertF64 = 0xAC,
        F32ReinterpretI32 = 0xAD,
        F64SConvertI32 = 0xAE,
        F64UConvertI32 = 0xAF,
        F64SConvertI64 = 0xB0,
        F64UConvertI64 = 0xB1,
        F64ConvertF32 = 0xB2,
        F64ReinterpretI64 = 0xB3,
        I32ReinterpretF32 = 0xB4,
        I64ReinterpretF64 = 0xB5,
    }
}

impl SimpleOpcode {
    /// Number of operand nodes the operator takes.
    pub fn arity(self) -> u8 {
        use SimpleOpcode::*;
        match self {
            I32Clz | I32Ctz | I32Popcnt | BoolNot | I64Clz | I64Ctz | I64Popcnt | F32Abs
            | F32Neg | F32Ceil | F32Floor | F32Trunc | F32NearestInt | F32Sqrt | F64Abs
            | F64Neg | F64Ceil | F64Floor | F64Trunc | F64NearestInt | F64Sqrt => 1,
            _ if (self as u8) >= I32SConvertF32 as u8 => 1,
            _ => 2,
        }
    }
}

/// Name and group for one registered opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub group: OpcodeGroup,
}

/// Byte → name/group index over all six groups.
#[derive(Debug, Clone)]
pub struct OpcodeIndex {
    by_byte: HashMap<u8, OpcodeInfo>,
    by_name: HashMap<&'static str, Opcode>,
}

impl OpcodeIndex {
    fn new() -> Self {
        OpcodeIndex {
            by_byte: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Add every member of one group, rejecting bytes already registered.
    pub fn register<T: OpcodeTable>(&mut self) -> Result<(), DecodeError> {
        for &(op, name) in T::entries() {
            if self.by_byte.contains_key(&op.0) || self.by_name.contains_key(name) {
                return Err(DecodeError::DuplicateOpcode { byte: op.0 });
            }
            self.by_byte.insert(
                op.0,
                OpcodeInfo {
                    name,
                    group: T::GROUP,
                },
            );
            self.by_name.insert(name, op);
        }
        Ok(())
    }

    /// Build the index over the six standard groups.
    pub fn standard() -> Result<Self, DecodeError> {
        let mut index = OpcodeIndex::new();
        index.register::<ControlOpcode>()?;
        index.register::<ConstantOpcode>()?;
        index.register::<MiscOpcode>()?;
        index.register::<LoadOpcode>()?;
        index.register::<StoreOpcode>()?;
        index.register::<SimpleOpcode>()?;
        Ok(index)
    }

    pub fn get(&self, op: Opcode) -> Option<&OpcodeInfo> {
        self.by_byte.get(&op.0)
    }

    pub fn lookup(&self, name: &str) -> Option<Opcode> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_byte.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_byte.is_empty()
    }
}

static OPCODE_INDEX: spin::Once<OpcodeIndex> = spin::Once::new();

/// The process-wide opcode index, built on first use.
pub fn index() -> Result<&'static OpcodeIndex, DecodeError> {
    OPCODE_INDEX.try_call_once(OpcodeIndex::standard)
}

impl Opcode {
    /// Raw byte value.
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Look up an opcode by its symbolic name (e.g. `"I32Add"`).
    pub fn by_name(name: &str) -> Option<Opcode> {
        index().ok()?.lookup(name)
    }

    /// Symbolic name, or `"<unknown>"` for bytes outside every group.
    pub fn name(self) -> &'static str {
        self.info().map(|info| info.name).unwrap_or("<unknown>")
    }

    /// Which group the opcode belongs to.
    pub fn group(self) -> Option<OpcodeGroup> {
        self.info().map(|info| info.group)
    }

    fn info(self) -> Option<OpcodeInfo> {
        index().ok()?.get(self).copied()
    }
}

impl From<u8> for Opcode {
    fn from(b: u8) -> Opcode {
        Opcode(b)
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op.0
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#04x})", self.name(), self.0)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.group() {
            Some(_) => f.write_str(self.name()),
            None => write!(f, "<unknown {:#04x}>", self.0),
        }
    }
}
