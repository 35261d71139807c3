//! AST decoder.
//!
//! Function bodies are a preorder encoding of expression trees: an opcode
//! byte followed by whatever its signature declares (immediates, child
//! subtrees, or a special form). The decoder walks that encoding recursively,
//! reporting each node to a [`DecodeHandler`] once it is complete, so the
//! handler sees children before their parent.
//!
//! Recursion depth is bounded by `DecoderConfig::max_nesting_depth`; deeper
//! input fails with `DecodeError::NestingTooDeep` instead of exhausting the
//! native stack.

use alloc::vec::Vec;

use crate::error::DecodeError;
use crate::handler::DecodeHandler;
use crate::immediate::{decode_immediate, Immediate, ImmediateKind};
use crate::opcodes::Opcode;
use crate::reader::ByteReader;
use crate::signature::{self, Argument, SignatureTable, SpecialForm};
use crate::DecoderConfig;

/// Recursive-descent decoder for one function body at a time.
pub struct AstDecoder<'a, H: DecodeHandler + ?Sized> {
    table: &'a SignatureTable,
    handler: &'a mut H,
    /// Enclosing opcodes of the node being decoded, outermost first.
    stack: Vec<Opcode>,
    max_depth: usize,
}

impl<'a, H: DecodeHandler + ?Sized> AstDecoder<'a, H> {
    /// Create a decoder reporting to `handler`.
    pub fn new(table: &'a SignatureTable, handler: &'a mut H, config: &DecoderConfig) -> Self {
        AstDecoder {
            table,
            handler,
            stack: Vec::new(),
            max_depth: config.max_nesting_depth,
        }
    }

    /// Current decode stack.
    pub fn stack(&self) -> &[Opcode] {
        &self.stack
    }

    /// Decode every top-level node in `reader`, which must be scoped to
    /// exactly one function body.
    ///
    /// Returns the total number of nodes decoded, nested ones included. On
    /// error, events already delivered for the node in progress are not
    /// retracted.
    pub fn decode_function_body(
        &mut self,
        reader: &mut ByteReader<'_>,
    ) -> Result<usize, DecodeError> {
        self.stack.clear();
        let mut count = 0;

        while !reader.is_at_end() && !reader.has_overread() {
            count += self.decode_node(reader)?;
        }

        if reader.has_overread() {
            return Err(reader.exhausted());
        }
        if let Some(&top) = self.stack.last() {
            return Err(DecodeError::StackMisalignment {
                offset: reader.position(),
                expected: top,
                found: None,
            });
        }

        Ok(count)
    }

    /// Decode one node and its subtree, returning the subtree's node count.
    fn decode_node(&mut self, reader: &mut ByteReader<'_>) -> Result<usize, DecodeError> {
        let offset = reader.position();
        let opcode = Opcode::from(reader.read_byte().ok_or_else(|| reader.exhausted())?);
        let signature = *self.table.get(opcode, offset)?;

        log::trace!(
            "[WASM-AST] {:#x}: {} depth={}",
            offset,
            opcode,
            self.stack.len()
        );

        if signature.has_children() {
            self.handler.on_begin_node(opcode, &self.stack);
        }

        let mut immediates: Vec<Immediate> = Vec::new();
        let mut children = 0usize;
        let mut nodes = 1usize;

        for argument in signature.arguments {
            match *argument {
                Argument::Node(count) => {
                    nodes += self.decode_children(opcode, count as usize, reader)?;
                    children += count as usize;
                }
                Argument::Integer(width) => {
                    let value = decode_immediate(reader, width, ImmediateKind::Integer)
                        .map_err(|e| e.in_opcode(opcode))?;
                    immediates.push(value);
                }
                Argument::Float(width) => {
                    let value = decode_immediate(reader, width, ImmediateKind::Float)
                        .map_err(|e| e.in_opcode(opcode))?;
                    immediates.push(value);
                }
                Argument::Special(form) => {
                    let (direct, total) =
                        self.decode_special(opcode, form, &mut immediates, reader)?;
                    children += direct;
                    nodes += total;
                }
            }
        }

        self.handler.on_node(opcode, children, &immediates, &self.stack);
        Ok(nodes)
    }

    /// Decode exactly `count` children of `parent`; returns their total size.
    fn decode_children(
        &mut self,
        parent: Opcode,
        count: usize,
        reader: &mut ByteReader<'_>,
    ) -> Result<usize, DecodeError> {
        self.push(parent, reader)?;

        let mut nodes = 0;
        for _ in 0..count {
            nodes += self
                .decode_node(reader)
                .map_err(|e| e.in_opcode(parent))?;
        }

        self.pop(parent, reader)?;
        Ok(nodes)
    }

    /// Returns `(direct children, total nodes beneath)`.
    fn decode_special(
        &mut self,
        opcode: Opcode,
        form: SpecialForm,
        immediates: &mut Vec<Immediate>,
        reader: &mut ByteReader<'_>,
    ) -> Result<(usize, usize), DecodeError> {
        let offset = reader.position();

        match form {
            SpecialForm::CallFunction => {
                let index = reader
                    .read_byte()
                    .ok_or_else(|| reader.exhausted().in_opcode(opcode))?;
                let callee = self.handler.resolve_call_signature(index).ok_or(
                    DecodeError::UnknownFunction {
                        offset,
                        opcode,
                        index,
                    },
                )?;

                let count = callee.argument_count as usize;
                let nodes = self.decode_children(opcode, count, reader)?;
                immediates.push(Immediate::Int(index as i32));
                Ok((count, nodes))
            }
            SpecialForm::Block => {
                let count = reader
                    .read_byte()
                    .ok_or_else(|| reader.exhausted().in_opcode(opcode))?
                    as usize;
                let nodes = self.decode_children(opcode, count, reader)?;
                Ok((count, nodes))
            }
            SpecialForm::CallIndirect | SpecialForm::TableSwitch => {
                Err(DecodeError::Unimplemented {
                    offset,
                    opcode: Some(opcode),
                    feature: form.name(),
                })
            }
        }
    }

    fn push(&mut self, opcode: Opcode, reader: &ByteReader<'_>) -> Result<(), DecodeError> {
        if self.stack.len() >= self.max_depth {
            return Err(DecodeError::NestingTooDeep {
                offset: reader.position(),
                opcode,
                limit: self.max_depth,
            });
        }
        self.stack.push(opcode);
        Ok(())
    }

    fn pop(&mut self, expected: Opcode, reader: &ByteReader<'_>) -> Result<(), DecodeError> {
        match self.stack.pop() {
            Some(top) if top == expected => Ok(()),
            found => Err(DecodeError::StackMisalignment {
                offset: reader.position(),
                expected,
                found,
            }),
        }
    }
}

/// Decode one function body with the built-in signature table and default
/// configuration.
pub fn decode_function_body<H: DecodeHandler + ?Sized>(
    reader: &mut ByteReader<'_>,
    handler: &mut H,
) -> Result<usize, DecodeError> {
    let table = signature::global()?;
    let config = DecoderConfig::default();
    AstDecoder::new(table, handler, &config).decode_function_body(reader)
}
