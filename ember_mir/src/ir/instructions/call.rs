//! Call sequences.
//!
//! A call is built from three pieces: a `PrepareCall` marker that reserves
//! the argument vector, one boxed `PassArg` per argument, and the variadic
//! `Call` itself. Operand 0 of the call is the marker, operand 1 the
//! callee, and argument `i` (with `this` at 0) sits in operand `i + 2`.
//!
//! Arguments are evaluated left to right but attached right to left, so
//! the last `PassArg` emitted is the first one the call receives.

use super::InstructionKind;
use crate::ir::graph::MirGraph;
use crate::ir::node::{DefId, NodeRef};
use crate::ir::types::MirType;
use crate::ir::value::HeapRef;

const PREPARE_CALL_OPERAND: usize = 0;
const FUNCTION_OPERAND: usize = 1;
const NUM_NON_ARGUMENT_OPERANDS: usize = 2;

impl MirGraph {
    pub fn new_prepare_call(&mut self) -> DefId {
        self.create(InstructionKind::PrepareCall, MirType::None, &[])
    }

    /// Box `value` for the argument vector. The slot is assigned by
    /// [`add_arg`](MirGraph::add_arg).
    pub fn new_pass_arg(&mut self, value: DefId) -> DefId {
        self.create(InstructionKind::PassArg { argnum: None }, MirType::Value, &[value])
    }

    /// A call with room for `argc` arguments including `this`. The prepare
    /// marker, callee and arguments are wired in afterwards.
    pub fn new_call(
        &mut self,
        target: Option<HeapRef>,
        argc: u32,
        bytecode_argc: u32,
        construct: bool,
    ) -> DefId {
        debug_assert!(bytecode_argc <= argc, "bytecode argc exceeds padded argc");
        self.alloc_def(
            InstructionKind::Call {
                construct,
                bytecode_argc,
                target,
            },
            MirType::Value,
            NUM_NON_ARGUMENT_OPERANDS + argc as usize,
        )
    }

    pub fn init_prepare_call(&mut self, call: DefId, prepare: DefId) {
        debug_assert!(
            matches!(self.def(prepare).kind(), InstructionKind::PrepareCall),
            "{} is not a prepare-call",
            prepare
        );
        self.init_operand(NodeRef::Def(call), PREPARE_CALL_OPERAND, prepare);
    }

    pub fn init_function(&mut self, call: DefId, function: DefId) {
        debug_assert!(
            !matches!(self.def(function).kind(), InstructionKind::PassArg { .. }),
            "callee {} is a pass-arg",
            function
        );
        self.init_operand(NodeRef::Def(call), FUNCTION_OPERAND, function);
    }

    pub fn replace_function(&mut self, call: DefId, function: DefId) {
        self.replace_operand(NodeRef::Def(call), FUNCTION_OPERAND, function);
    }

    /// Attach `pass_arg` as argument `argnum` and tell it its slot.
    pub fn add_arg(&mut self, call: DefId, argnum: u32, pass_arg: DefId) {
        match self.def_mut(pass_arg).kind_mut() {
            InstructionKind::PassArg { argnum: slot } => *slot = Some(argnum),
            other => debug_assert!(false, "{} is {:?}, not a pass-arg", pass_arg, other),
        }
        self.init_operand(
            NodeRef::Def(call),
            NUM_NON_ARGUMENT_OPERANDS + argnum as usize,
            pass_arg,
        );
    }

    /// Argument `index` of a call, `this` at 0.
    pub fn call_arg(&self, call: DefId, index: u32) -> DefId {
        self.def(call)
            .get_operand(NUM_NON_ARGUMENT_OPERANDS + index as usize)
    }

    pub fn call_function(&self, call: DefId) -> DefId {
        self.def(call).get_operand(FUNCTION_OPERAND)
    }

    /// Number of arguments of a call, including `this`.
    pub fn call_argc(&self, call: DefId) -> u32 {
        (self.def(call).num_operands() - NUM_NON_ARGUMENT_OPERANDS) as u32
    }

    /// Argument-vector size reserved by a prepare-call, read from the call
    /// that consumes it.
    pub fn prepare_call_argc(&self, prepare: DefId) -> Option<u32> {
        self.def(prepare)
            .def_uses()
            .find(|&(user, index)| {
                index == PREPARE_CALL_OPERAND
                    && matches!(self.def(user).kind(), InstructionKind::Call { .. })
            })
            .map(|(user, _)| self.call_argc(user))
    }
}
