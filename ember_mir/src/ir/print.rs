//! Textual dumps of MIR.
//!
//! ```text
//! block0 (pc 0) preds: [] succs: [block1]
//!   constant0 = constant 1 : Int32
//!   add2 = add constant0 parameter1 : Int32
//!   goto3 = goto block1 : None
//! ```

use super::block::BlockId;
use super::graph::MirGraph;
use super::instructions::InstructionKind;
use super::node::DefId;
use super::resume::ResumePointId;
use std::fmt;

impl MirGraph {
    /// `<opcode><id>`, e.g. `add4`.
    pub fn print_name(&self, def: DefId) -> String {
        let d = self.def(def);
        format!("{}{}", d.opcode().name().to_ascii_lowercase(), d.id())
    }

    /// Display adapter for one definition.
    pub fn display_def(&self, def: DefId) -> DefDisplay<'_> {
        DefDisplay { graph: self, def }
    }

    /// Display adapter for one resume point.
    pub fn display_resume_point(&self, rp: ResumePointId) -> ResumePointDisplay<'_> {
        ResumePointDisplay { graph: self, rp }
    }

    fn write_operand_name(&self, f: &mut fmt::Formatter<'_>, op: DefId) -> fmt::Result {
        if op.is_valid() {
            f.write_str(&self.print_name(op))
        } else {
            f.write_str("(null)")
        }
    }

    fn write_opcode(&self, f: &mut fmt::Formatter<'_>, def: DefId) -> fmt::Result {
        let d = self.def(def);
        f.write_str(&d.opcode().name().to_ascii_lowercase())?;
        if let InstructionKind::Constant(value) = d.kind() {
            return write!(f, " {}", value);
        }
        for &op in d.operands() {
            f.write_str(" ")?;
            self.write_operand_name(f, op)?;
        }
        for succ in d.kind().successors() {
            write!(f, " {}", block_name(*succ))?;
        }
        Ok(())
    }
}

fn block_name(block: BlockId) -> String {
    format!("block{}", block.index())
}

/// Prints `name = opcode operands : type`.
pub struct DefDisplay<'g> {
    graph: &'g MirGraph,
    def: DefId,
}

impl fmt::Display for DefDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.graph.print_name(self.def))?;
        self.graph.write_opcode(f, self.def)?;
        write!(f, " : {}", self.graph.result_type(self.def))
    }
}

/// Prints `resumepoint mode pc operands`, newest frame only.
pub struct ResumePointDisplay<'g> {
    graph: &'g MirGraph,
    rp: ResumePointId,
}

impl fmt::Display for ResumePointDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let point = self.graph.resume_point(self.rp);
        write!(f, "resumepoint {} pc {}", point.mode().name(), point.pc())?;
        for &op in point.operands() {
            f.write_str(" ")?;
            self.graph.write_operand_name(f, op)?;
        }
        if let Some(caller) = point.caller() {
            write!(f, " (caller {})", caller)?;
        }
        Ok(())
    }
}

impl fmt::Display for MirGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &block in self.blocks() {
            let b = self.block(block);
            write!(f, "{} (pc {})", block_name(block), b.pc())?;
            if b.is_loop_header() {
                f.write_str(" [loop header]")?;
            }
            let preds: Vec<_> = b.predecessors().iter().map(|&p| block_name(p)).collect();
            let succs: Vec<_> = self.successors(block).iter().map(|&s| block_name(s)).collect();
            writeln!(f, " preds: [{}] succs: [{}]", preds.join(", "), succs.join(", "))?;
            if let Some(rp) = b.entry_resume_point() {
                writeln!(f, "  {}", self.display_resume_point(rp))?;
            }
            for &phi in b.phis() {
                writeln!(f, "  {}", self.display_def(phi))?;
            }
            for ins in self.instructions(block) {
                writeln!(f, "  {}", self.display_def(ins))?;
                if let Some(rp) = self.def(ins).resume_point() {
                    writeln!(f, "    {}", self.display_resume_point(rp))?;
                }
            }
        }
        Ok(())
    }
}
