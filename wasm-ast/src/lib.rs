//! KPIO Prototype WebAssembly AST Decoder
//!
//! Streaming decoder for the early, pre-standard WebAssembly binary format in
//! which function bodies are preorder-encoded expression trees rather than a
//! stack-machine instruction list.
//!
//! # Layout
//!
//! - `reader` - byte cursor over a fully buffered module
//! - `opcodes` - the six opcode groups and symbolic names
//! - `signature` - per-opcode argument descriptors
//! - `immediate` - fixed-width immediate decoding
//! - `handler` - the event interface function-body decoding reports to
//! - `ast` - the recursive-descent function-body decoder
//! - `tree` - a handler that materializes expression trees
//! - `module` - section decoder and the `Module` builder
//!
//! # Example
//!
//! ```ignore
//! let module = Module::decode(&bytes, &DecoderConfig::default())?;
//! for function in &module.functions {
//!     for statement in &function.body {
//!         log::info!("{}", statement);
//!     }
//! }
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod error;
pub mod handler;
pub mod immediate;
pub mod module;
pub mod opcodes;
pub mod reader;
pub mod signature;
pub mod tree;


pub use ast::{decode_function_body, AstDecoder};
pub use error::DecodeError;
pub use handler::{CallSignature, DecodeHandler, LocalType};
pub use immediate::Immediate;
pub use module::{Function, Module, ModuleDecoder, ModuleHandler};
pub use opcodes::Opcode;
pub use reader::ByteReader;
pub use signature::{Argument, Signature, SignatureTable, SpecialForm};
pub use tree::{Node, TreeBuilder};

/// Decoder limits.
///
/// Every limit guards a recursion or allocation whose size is taken from
/// untrusted input.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum depth of nested expression nodes in a function body.
    pub max_nesting_depth: usize,
    /// Maximum entries in the signature section.
    pub max_signatures: u32,
    /// Maximum function entries, summed over all function sections.
    pub max_functions: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            max_nesting_depth: 256,
            max_signatures: 65536,
            max_functions: 65536,
        }
    }
}
