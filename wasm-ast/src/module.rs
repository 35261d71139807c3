//! Module decoder.
//!
//! A module is a sequence of tagged sections terminated by an `End` tag (or
//! by the end of the buffer). Function entries carry their body size up
//! front, so a body that fails to decode never desynchronizes the section
//! stream; the error is wrapped with the function's index instead.

use alloc::borrow::ToOwned;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;

use crate::ast::AstDecoder;
use crate::error::DecodeError;
use crate::handler::{CallSignature, DecodeHandler, LocalType};
use crate::reader::{read_c_string_at, ByteReader};
use crate::signature::{self, SignatureTable};
use crate::tree::{Node, TreeBuilder};
use crate::DecoderConfig;

// ============================================================================
// Section Layout
// ============================================================================

/// Section tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Section {
    Memory = 0x00,
    Signatures = 0x01,
    Functions = 0x02,
    Globals = 0x03,
    DataSegments = 0x04,
    FunctionTable = 0x05,
    End = 0x06,
}

impl Section {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Section::Memory),
            0x01 => Some(Section::Signatures),
            0x02 => Some(Section::Functions),
            0x03 => Some(Section::Globals),
            0x04 => Some(Section::DataSegments),
            0x05 => Some(Section::FunctionTable),
            0x06 => Some(Section::End),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Section::Memory => "memory section",
            Section::Signatures => "signature section",
            Section::Functions => "function section",
            Section::Globals => "globals section",
            Section::DataSegments => "data segments section",
            Section::FunctionTable => "function table section",
            Section::End => "end of module",
        }
    }
}

bitflags! {
    /// Function entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u8 {
        /// A u32 name offset follows the signature index.
        const NAME = 0x01;
        /// Imported; the entry ends after the name.
        const IMPORT = 0x02;
        /// Four u16 local counts precede the body size.
        const LOCALS = 0x04;
        const EXPORT = 0x08;
    }
}

/// Memory section contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDecl {
    pub min_size_log2: u8,
    pub max_size_log2: u8,
    pub externally_visible: bool,
}

/// Local variable counts per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Locals {
    pub i32: u16,
    pub i64: u16,
    pub f32: u16,
    pub f64: u16,
}

impl Locals {
    pub fn total(&self) -> u32 {
        self.i32 as u32 + self.i64 as u32 + self.f32 as u32 + self.f64 as u32
    }
}

/// An imported function entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportDecl {
    /// Function index across all function sections, imports included.
    pub index: u32,
    pub flags: FunctionFlags,
    pub signature_index: u16,
    pub name_offset: Option<u32>,
}

/// A function entry with a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDecl {
    /// Function index across all function sections, imports included.
    pub index: u32,
    pub flags: FunctionFlags,
    pub signature_index: u16,
    pub name_offset: Option<u32>,
    pub locals: Option<Locals>,
    /// Absolute offset of the first body byte.
    pub body_offset: usize,
    pub body_size: u16,
}

// ============================================================================
// Handler
// ============================================================================

/// Receives module-level events. Every method has a no-op default.
pub trait ModuleHandler {
    fn on_memory(&mut self, memory: &MemoryDecl) {
        let _ = memory;
    }

    /// `arguments` is reused between calls.
    fn on_signature(&mut self, return_type: LocalType, arguments: &[LocalType]) {
        let _ = (return_type, arguments);
    }

    fn on_import(&mut self, import: &ImportDecl) {
        let _ = import;
    }

    /// Return a handler to decode the body with, or `None` to skip it.
    fn on_function(&mut self, function: &FunctionDecl) -> Option<&mut dyn DecodeHandler> {
        let _ = function;
        None
    }

    fn on_end_of_module(&mut self) {}
}

// ============================================================================
// Decoder
// ============================================================================

/// Section-level decoder.
pub struct ModuleDecoder<'a> {
    table: &'a SignatureTable,
    config: &'a DecoderConfig,
}

impl<'a> ModuleDecoder<'a> {
    /// Decoder using the built-in signature table.
    pub fn new(config: &'a DecoderConfig) -> Result<Self, DecodeError> {
        Ok(ModuleDecoder {
            table: signature::global()?,
            config,
        })
    }

    pub fn with_table(table: &'a SignatureTable, config: &'a DecoderConfig) -> Self {
        ModuleDecoder { table, config }
    }

    /// Decode sections until `End` or the end of the reader.
    ///
    /// Returns the number of sections decoded, counting `End` if present.
    pub fn decode_module<H: ModuleHandler + ?Sized>(
        &self,
        reader: &mut ByteReader<'_>,
        handler: &mut H,
    ) -> Result<u32, DecodeError> {
        let mut sections = 0;
        // Function indices run across every function section.
        let mut next_function = 0u32;

        while let Some(tag) = reader.read_byte() {
            let offset = reader.position() - 1;
            let section =
                Section::from_byte(tag).ok_or(DecodeError::UnknownSection { offset, tag })?;

            log::debug!("[WASM-AST] {} at {:#x}", section.name(), offset);

            match section {
                Section::Memory => self.decode_memory(reader, handler)?,
                Section::Signatures => self.decode_signatures(reader, handler)?,
                Section::Functions => self.decode_functions(reader, handler, &mut next_function)?,
                Section::End => {
                    handler.on_end_of_module();
                    return Ok(sections + 1);
                }
                Section::Globals | Section::DataSegments | Section::FunctionTable => {
                    return Err(DecodeError::Unimplemented {
                        offset,
                        opcode: None,
                        feature: section.name(),
                    });
                }
            }

            sections += 1;
        }

        Ok(sections)
    }

    fn decode_memory<H: ModuleHandler + ?Sized>(
        &self,
        reader: &mut ByteReader<'_>,
        handler: &mut H,
    ) -> Result<(), DecodeError> {
        let [min, max, visibility] = reader.read_array::<3>().ok_or_else(|| reader.exhausted())?;
        handler.on_memory(&MemoryDecl {
            min_size_log2: min,
            max_size_log2: max,
            externally_visible: visibility != 0,
        });
        Ok(())
    }

    fn decode_signatures<H: ModuleHandler + ?Sized>(
        &self,
        reader: &mut ByteReader<'_>,
        handler: &mut H,
    ) -> Result<(), DecodeError> {
        let count = self.read_count(reader, "signatures", self.config.max_signatures)?;
        log::debug!("[WASM-AST] Reading {} signatures", count);

        let mut arguments = Vec::new();
        for _ in 0..count {
            let argument_count = reader.read_byte().ok_or_else(|| reader.exhausted())?;
            let return_type = read_local_type(reader)?;

            arguments.clear();
            for _ in 0..argument_count {
                arguments.push(read_local_type(reader)?);
            }

            handler.on_signature(return_type, &arguments);
        }
        Ok(())
    }

    fn decode_functions<H: ModuleHandler + ?Sized>(
        &self,
        reader: &mut ByteReader<'_>,
        handler: &mut H,
        next_function: &mut u32,
    ) -> Result<(), DecodeError> {
        let offset = reader.position();
        let count = self.read_count(reader, "functions", self.config.max_functions)?;
        let first = *next_function;
        let total = first.saturating_add(count);
        if total > self.config.max_functions {
            return Err(DecodeError::LimitExceeded {
                offset,
                what: "functions",
                count: total,
                limit: self.config.max_functions,
            });
        }
        *next_function = total;

        for index in first..total {
            let flags = reader.read_byte().ok_or_else(|| reader.exhausted())?;
            let flags = FunctionFlags::from_bits_retain(flags);
            let signature_index = reader.read_u16().ok_or_else(|| reader.exhausted())?;

            let name_offset = if flags.contains(FunctionFlags::NAME) {
                Some(reader.read_u32().ok_or_else(|| reader.exhausted())?)
            } else {
                None
            };

            if flags.contains(FunctionFlags::IMPORT) {
                handler.on_import(&ImportDecl {
                    index,
                    flags,
                    signature_index,
                    name_offset,
                });
                continue;
            }

            let locals = if flags.contains(FunctionFlags::LOCALS) {
                let mut counts = [0u16; 4];
                for count in counts.iter_mut() {
                    *count = reader.read_u16().ok_or_else(|| reader.exhausted())?;
                }
                Some(Locals {
                    i32: counts[0],
                    i64: counts[1],
                    f32: counts[2],
                    f64: counts[3],
                })
            } else {
                None
            };

            let body_size = reader.read_u16().ok_or_else(|| reader.exhausted())?;
            let decl = FunctionDecl {
                index,
                flags,
                signature_index,
                name_offset,
                locals,
                body_offset: reader.position(),
                body_size,
            };

            log::debug!(
                "[WASM-AST] Function #{}: body at {:#x}, {} bytes",
                index,
                decl.body_offset,
                body_size
            );

            let body_handler = handler.on_function(&decl);
            let mut body =
                reader
                    .substream(body_size as usize)
                    .ok_or_else(|| DecodeError::FunctionBody {
                        index,
                        source: Box::new(reader.exhausted()),
                    })?;

            if let Some(ast_handler) = body_handler {
                AstDecoder::new(self.table, ast_handler, self.config)
                    .decode_function_body(&mut body)
                    .map_err(|e| {
                        log::warn!("[WASM-AST] Function #{} body rejected: {}", index, e);
                        DecodeError::FunctionBody {
                            index,
                            source: Box::new(e),
                        }
                    })?;
            }
        }
        Ok(())
    }

    fn read_count(
        &self,
        reader: &mut ByteReader<'_>,
        what: &'static str,
        limit: u32,
    ) -> Result<u32, DecodeError> {
        let offset = reader.position();
        let count = reader.read_var_u32()?;
        if count > limit {
            return Err(DecodeError::LimitExceeded {
                offset,
                what,
                count,
                limit,
            });
        }
        Ok(count)
    }
}

fn read_local_type(reader: &mut ByteReader<'_>) -> Result<LocalType, DecodeError> {
    let offset = reader.position();
    let byte = reader.read_byte().ok_or_else(|| reader.exhausted())?;
    LocalType::from_byte(byte).ok_or(DecodeError::InvalidLocalType { offset, byte })
}

// ============================================================================
// Module Builder
// ============================================================================

/// A declared function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub return_type: LocalType,
    pub arguments: Vec<LocalType>,
}

impl FunctionSignature {
    fn call_signature(&self) -> CallSignature {
        CallSignature {
            argument_count: self.arguments.len() as u8,
            return_type: self.return_type,
        }
    }
}

/// An imported function.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub index: u32,
    pub flags: FunctionFlags,
    pub signature_index: u16,
    pub name: Option<String>,
}

/// A defined function with its decoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub index: u32,
    pub flags: FunctionFlags,
    pub signature_index: u16,
    pub name: Option<String>,
    pub locals: Locals,
    pub body_offset: usize,
    pub body_size: u16,
    /// Top-level statements of the body.
    pub body: Vec<Node>,
}

impl Function {
    pub fn is_exported(&self) -> bool {
        self.flags.contains(FunctionFlags::EXPORT)
    }
}

/// A fully decoded module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub memory: Option<MemoryDecl>,
    pub signatures: Vec<FunctionSignature>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    /// Sections decoded, counting `End`.
    pub sections: u32,
    /// Whether an `End` section was seen.
    pub complete: bool,
}

/// First pass: declarations only, bodies skipped.
#[derive(Default)]
struct Declarations {
    memory: Option<MemoryDecl>,
    signatures: Vec<FunctionSignature>,
    imports: Vec<ImportDecl>,
    functions: Vec<FunctionDecl>,
    /// Signature index per function-section entry, imports included.
    entries: Vec<(u32, u16)>,
    complete: bool,
}

impl ModuleHandler for Declarations {
    fn on_memory(&mut self, memory: &MemoryDecl) {
        self.memory = Some(*memory);
    }

    fn on_signature(&mut self, return_type: LocalType, arguments: &[LocalType]) {
        self.signatures.push(FunctionSignature {
            return_type,
            arguments: arguments.to_vec(),
        });
    }

    fn on_import(&mut self, import: &ImportDecl) {
        self.entries.push((import.index, import.signature_index));
        self.imports.push(*import);
    }

    fn on_function(&mut self, function: &FunctionDecl) -> Option<&mut dyn DecodeHandler> {
        self.entries.push((function.index, function.signature_index));
        self.functions.push(*function);
        None
    }

    fn on_end_of_module(&mut self) {
        self.complete = true;
    }
}

impl Module {
    /// Decode a whole module.
    ///
    /// Declarations are collected first so that calls can be resolved against
    /// functions defined later in the section; every body is then decoded
    /// into expression trees.
    pub fn decode(bytes: &[u8], config: &DecoderConfig) -> Result<Module, DecodeError> {
        let decoder = ModuleDecoder::new(config)?;
        let mut decls = Declarations::default();
        let sections = decoder.decode_module(&mut ByteReader::new(bytes), &mut decls)?;

        let mut callees = Vec::with_capacity(decls.entries.len());
        for &(index, signature_index) in &decls.entries {
            let signature = decls
                .signatures
                .get(signature_index as usize)
                .ok_or(DecodeError::UnknownSignature {
                    function: index,
                    signature: signature_index,
                })?;
            callees.push(signature.call_signature());
        }

        let mut builder = TreeBuilder::with_callees(callees);
        let mut functions = Vec::with_capacity(decls.functions.len());
        for decl in &decls.functions {
            let mut body = ByteReader::window(bytes, decl.body_offset, decl.body_size as usize)
                .ok_or_else(|| DecodeError::FunctionBody {
                    index: decl.index,
                    source: Box::new(DecodeError::StreamExhausted {
                        offset: bytes.len(),
                        opcode: None,
                    }),
                })?;

            let nodes = AstDecoder::new(decoder.table, &mut builder, config)
                .decode_function_body(&mut body)
                .map_err(|e| DecodeError::FunctionBody {
                    index: decl.index,
                    source: Box::new(e),
                })?;
            let statements = builder.finish();
            log::debug!(
                "[WASM-AST] Function #{}: {} nodes, {} statements",
                decl.index,
                nodes,
                statements.len()
            );

            functions.push(Function {
                index: decl.index,
                flags: decl.flags,
                signature_index: decl.signature_index,
                name: resolve_name(bytes, decl.name_offset)?,
                locals: decl.locals.unwrap_or_default(),
                body_offset: decl.body_offset,
                body_size: decl.body_size,
                body: statements,
            });
        }

        let imports = decls
            .imports
            .iter()
            .map(|import| {
                Ok(Import {
                    index: import.index,
                    flags: import.flags,
                    signature_index: import.signature_index,
                    name: resolve_name(bytes, import.name_offset)?,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        Ok(Module {
            memory: decls.memory,
            signatures: decls.signatures,
            imports,
            functions,
            sections,
            complete: decls.complete,
        })
    }

    /// Find a defined function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
    }

    /// Signature of a defined function.
    pub fn signature_of(&self, function: &Function) -> Option<&FunctionSignature> {
        self.signatures.get(function.signature_index as usize)
    }
}

fn resolve_name(bytes: &[u8], offset: Option<u32>) -> Result<Option<String>, DecodeError> {
    offset
        .map(|offset| read_c_string_at(bytes, offset as usize).map(|s| s.to_owned()))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immediate::Immediate;
    use crate::opcodes::{ControlOpcode, MiscOpcode, Opcode};
    use alloc::vec;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Memory(MemoryDecl),
        Signature(LocalType, Vec<LocalType>),
        Import(ImportDecl),
        Function(FunctionDecl),
        End,
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        decode_bodies: bool,
        body: TreeBuilder,
    }

    impl ModuleHandler for Recorder {
        fn on_memory(&mut self, memory: &MemoryDecl) {
            self.events.push(Event::Memory(*memory));
        }

        fn on_signature(&mut self, return_type: LocalType, arguments: &[LocalType]) {
            self.events
                .push(Event::Signature(return_type, arguments.to_vec()));
        }

        fn on_import(&mut self, import: &ImportDecl) {
            self.events.push(Event::Import(*import));
        }

        fn on_function(&mut self, function: &FunctionDecl) -> Option<&mut dyn DecodeHandler> {
            self.events.push(Event::Function(*function));
            if self.decode_bodies {
                Some(&mut self.body as &mut dyn DecodeHandler)
            } else {
                None
            }
        }

        fn on_end_of_module(&mut self) {
            self.events.push(Event::End);
        }
    }

    fn decode(bytes: &[u8], recorder: &mut Recorder) -> Result<u32, DecodeError> {
        let config = DecoderConfig::default();
        let decoder = ModuleDecoder::new(&config).unwrap();
        decoder.decode_module(&mut ByteReader::new(bytes), recorder)
    }

    fn tag(section: Section) -> u8 {
        section as u8
    }

    #[test]
    fn test_empty_module() {
        let mut rec = Recorder::default();
        assert_eq!(decode(&[], &mut rec), Ok(0));
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_memory_section() {
        let mut rec = Recorder::default();
        let bytes = [tag(Section::Memory), 0x00, 0x00, 0x01];
        assert_eq!(decode(&bytes, &mut rec), Ok(1));
        assert_eq!(
            rec.events,
            vec![Event::Memory(MemoryDecl {
                min_size_log2: 0,
                max_size_log2: 0,
                externally_visible: true,
            })]
        );
    }

    #[test]
    fn test_signature_section() {
        let mut rec = Recorder::default();
        let bytes = [tag(Section::Signatures), 0x02, 0x00, 0x00, 0x01, 0x02, 0x00];
        assert_eq!(decode(&bytes, &mut rec), Ok(1));
        assert_eq!(
            rec.events,
            vec![
                Event::Signature(LocalType::Statement, vec![]),
                Event::Signature(LocalType::I64, vec![LocalType::Statement]),
            ]
        );
    }

    #[test]
    fn test_function_section() {
        let mut bytes = vec![tag(Section::Functions), 0x02];
        // #0: no flags, signature 0, empty body
        bytes.push(0x00);
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        // #1: named, signature 2, 4-byte body
        bytes.push(0x01);
        bytes.extend_from_slice(&2u16.to_ne_bytes());
        bytes.extend_from_slice(&3u32.to_ne_bytes());
        bytes.extend_from_slice(&4u16.to_ne_bytes());
        bytes.extend_from_slice(&[0x00; 4]);
        bytes.push(tag(Section::End));

        let mut rec = Recorder::default();
        assert_eq!(decode(&bytes, &mut rec), Ok(2));
        assert_eq!(
            rec.events,
            vec![
                Event::Function(FunctionDecl {
                    index: 0,
                    flags: FunctionFlags::empty(),
                    signature_index: 0,
                    name_offset: None,
                    locals: None,
                    body_offset: 7,
                    body_size: 0,
                }),
                Event::Function(FunctionDecl {
                    index: 1,
                    flags: FunctionFlags::NAME,
                    signature_index: 2,
                    name_offset: Some(3),
                    locals: None,
                    body_offset: 16,
                    body_size: 4,
                }),
                Event::End,
            ]
        );
    }

    #[test]
    fn test_bodies_decoded_when_requested() {
        let nop = Opcode::from(ControlOpcode::Nop).byte();
        let br = Opcode::from(ControlOpcode::Br).byte();

        let mut bytes = vec![tag(Section::Functions), 0x01, 0x00];
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&4u16.to_ne_bytes());
        bytes.extend_from_slice(&[nop, br, 0x00, nop]);
        bytes.push(tag(Section::End));

        let mut rec = Recorder {
            decode_bodies: true,
            ..Recorder::default()
        };
        assert_eq!(decode(&bytes, &mut rec), Ok(2));

        let nodes = rec.body.finish();
        assert_eq!(
            nodes,
            vec![
                Node::new(ControlOpcode::Nop),
                Node::new(ControlOpcode::Br)
                    .with_immediate(Immediate::Int(0))
                    .with_child(Node::new(ControlOpcode::Nop)),
            ]
        );
    }

    #[test]
    fn test_imports_and_locals() {
        let mut bytes = vec![tag(Section::Functions), 0x02];
        // #0: imported, named
        bytes.push(0x03);
        bytes.extend_from_slice(&1u16.to_ne_bytes());
        bytes.extend_from_slice(&40u32.to_ne_bytes());
        // #1: exported, with locals, empty body
        bytes.push(0x0C);
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        for count in [1u16, 2, 3, 4] {
            bytes.extend_from_slice(&count.to_ne_bytes());
        }
        bytes.extend_from_slice(&0u16.to_ne_bytes());

        let mut rec = Recorder::default();
        assert_eq!(decode(&bytes, &mut rec), Ok(1));
        assert_eq!(
            rec.events[0],
            Event::Import(ImportDecl {
                index: 0,
                flags: FunctionFlags::NAME | FunctionFlags::IMPORT,
                signature_index: 1,
                name_offset: Some(40),
            })
        );
        match &rec.events[1] {
            Event::Function(decl) => {
                assert_eq!(decl.index, 1);
                assert!(decl.flags.contains(FunctionFlags::EXPORT));
                assert_eq!(
                    decl.locals,
                    Some(Locals {
                        i32: 1,
                        i64: 2,
                        f32: 3,
                        f64: 4
                    })
                );
                assert_eq!(decl.body_offset, bytes.len());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_body_overrun() {
        let mut bytes = vec![tag(Section::Functions), 0x01, 0x00];
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&10u16.to_ne_bytes());
        bytes.push(0x00);

        let mut rec = Recorder::default();
        assert_eq!(
            decode(&bytes, &mut rec),
            Err(DecodeError::FunctionBody {
                index: 0,
                source: Box::new(DecodeError::StreamExhausted {
                    offset: 7,
                    opcode: None
                }),
            })
        );
    }

    #[test]
    fn test_truncated_sections() {
        let mut rec = Recorder::default();
        assert_eq!(
            decode(&[tag(Section::Memory), 0x00], &mut rec),
            Err(DecodeError::StreamExhausted {
                offset: 1,
                opcode: None
            })
        );
        assert!(decode(&[tag(Section::Signatures), 0x01, 0x02], &mut rec)
            .unwrap_err()
            .is_truncation());
    }

    #[test]
    fn test_unimplemented_and_unknown_sections() {
        let mut rec = Recorder::default();
        assert_eq!(
            decode(&[tag(Section::Globals)], &mut rec),
            Err(DecodeError::Unimplemented {
                offset: 0,
                opcode: None,
                feature: "globals section",
            })
        );
        assert_eq!(
            decode(&[tag(Section::Memory), 0, 0, 0, 0x42], &mut rec),
            Err(DecodeError::UnknownSection {
                offset: 4,
                tag: 0x42
            })
        );
    }

    #[test]
    fn test_invalid_local_type() {
        let mut rec = Recorder::default();
        assert_eq!(
            decode(&[tag(Section::Signatures), 0x01, 0x00, 0x09], &mut rec),
            Err(DecodeError::InvalidLocalType {
                offset: 3,
                byte: 0x09
            })
        );
    }

    #[test]
    fn test_count_limit() {
        let config = DecoderConfig {
            max_functions: 2,
            ..DecoderConfig::default()
        };
        let decoder = ModuleDecoder::new(&config).unwrap();
        let mut rec = Recorder::default();
        assert_eq!(
            decoder.decode_module(&mut ByteReader::new(&[tag(Section::Functions), 0x03]), &mut rec),
            Err(DecodeError::LimitExceeded {
                offset: 1,
                what: "functions",
                count: 3,
                limit: 2,
            })
        );
    }

    #[test]
    fn test_function_indices_span_sections() {
        let mut bytes = Vec::new();
        for _ in 0..2 {
            bytes.extend_from_slice(&[tag(Section::Functions), 0x01, 0x00]);
            bytes.extend_from_slice(&0u16.to_ne_bytes());
            bytes.extend_from_slice(&0u16.to_ne_bytes());
        }
        bytes.push(tag(Section::End));

        let mut rec = Recorder::default();
        assert_eq!(decode(&bytes, &mut rec), Ok(3));
        let indices: Vec<u32> = rec
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Function(decl) => Some(decl.index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_calls_across_function_sections() {
        let call = Opcode::from(MiscOpcode::CallFunction).byte();
        let nop = Opcode::from(ControlOpcode::Nop).byte();

        let mut bytes = vec![tag(Section::Signatures), 0x01, 0x00, 0x00];
        bytes.extend_from_slice(&[tag(Section::Functions), 0x01, 0x00]);
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&1u16.to_ne_bytes());
        bytes.push(nop);
        bytes.extend_from_slice(&[tag(Section::Functions), 0x01, 0x00]);
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&2u16.to_ne_bytes());
        bytes.extend_from_slice(&[call, 0x01]);
        bytes.push(tag(Section::End));

        let module = Module::decode(&bytes, &DecoderConfig::default()).unwrap();
        assert_eq!(module.functions.len(), 2);
        assert_eq!(module.functions[0].index, 0);
        assert_eq!(module.functions[1].index, 1);
        let callee = module.functions[1].body[0].immediates[0];
        assert_eq!(callee, Immediate::Int(module.functions[1].index as i32));
    }

    #[test]
    fn test_count_limit_spans_sections() {
        let config = DecoderConfig {
            max_functions: 1,
            ..DecoderConfig::default()
        };
        let decoder = ModuleDecoder::new(&config).unwrap();
        let mut bytes = vec![tag(Section::Functions), 0x01, 0x00];
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        bytes.extend_from_slice(&0u16.to_ne_bytes());
        let second = bytes.len() + 1;
        bytes.extend_from_slice(&[tag(Section::Functions), 0x01]);

        let mut rec = Recorder::default();
        assert_eq!(
            decoder.decode_module(&mut ByteReader::new(&bytes), &mut rec),
            Err(DecodeError::LimitExceeded {
                offset: second,
                what: "functions",
                count: 2,
                limit: 1,
            })
        );
    }
}
