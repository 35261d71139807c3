//! Tree materialization from decode events.
//!
//! `TreeBuilder` keeps a stack of completed subtrees. When a node with N
//! children is reported, its children are exactly the last N entries on that
//! stack, so they are popped and attached to the new node.

use alloc::vec::Vec;
use core::fmt;

use crate::handler::{CallSignature, DecodeHandler};
use crate::immediate::Immediate;
use crate::opcodes::Opcode;

/// A decoded expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub opcode: Opcode,
    pub immediates: Vec<Immediate>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(opcode: impl Into<Opcode>) -> Self {
        Node {
            opcode: opcode.into(),
            immediates: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style: append an immediate.
    pub fn with_immediate(mut self, value: impl Into<Immediate>) -> Self {
        self.immediates.push(value.into());
        self
    }

    /// Builder-style: append a child.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Node::size).sum::<usize>()
    }

    /// Depth of this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Node::depth).max().unwrap_or(0)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(f, "({}", self.opcode)?;
        for imm in &self.immediates {
            write!(f, " {}", imm)?;
        }
        for child in &self.children {
            writeln!(f)?;
            write!(f, "{:width$}", "", width = (indent + 1) * 2)?;
            child.write_indented(f, indent + 1)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Handler that rebuilds the expression trees of a function body.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    completed: Vec<Node>,
    callees: Vec<CallSignature>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        TreeBuilder::default()
    }

    /// Resolve call targets by index into `callees`.
    pub fn with_callees(callees: Vec<CallSignature>) -> Self {
        TreeBuilder {
            completed: Vec::new(),
            callees,
        }
    }

    pub fn callees(&self) -> &[CallSignature] {
        &self.callees
    }

    pub fn push_callee(&mut self, signature: CallSignature) {
        self.callees.push(signature);
    }

    /// Completed top-level nodes so far.
    pub fn nodes(&self) -> &[Node] {
        &self.completed
    }

    /// Take the completed nodes, leaving the builder empty but keeping its
    /// callee table.
    pub fn finish(&mut self) -> Vec<Node> {
        core::mem::take(&mut self.completed)
    }
}

impl DecodeHandler for TreeBuilder {
    fn on_node(
        &mut self,
        opcode: Opcode,
        children: usize,
        immediates: &[Immediate],
        _stack: &[Opcode],
    ) {
        let split = self.completed.len().saturating_sub(children);
        if self.completed.len() - split != children {
            log::warn!(
                "[WASM-AST] {} reported {} children, only {} available",
                opcode,
                children,
                self.completed.len() - split
            );
        }
        let children = self.completed.split_off(split);
        self.completed.push(Node {
            opcode,
            immediates: immediates.to_vec(),
            children,
        });
    }

    fn resolve_call_signature(&mut self, index: u8) -> Option<CallSignature> {
        self.callees.get(index as usize).copied()
    }
}
