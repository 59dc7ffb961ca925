//! DOT export of the dependency graph.
//!
//! Combinational dependencies are solid edges; dependencies crossing a
//! cycle boundary (`REG` argument, ROM/RAM read address) are dashed.

use std::io::{self, Write};

use crate::program::{Instruction, Program, Reg};

/// The registers an instruction reads, each tagged with whether the read
/// is sequential.
fn operands(instruction: &Instruction) -> Vec<(Reg, bool)> {
    match *instruction {
        Instruction::Const { .. } => vec![],
        Instruction::Copy { input, .. } => vec![(input, false)],
        Instruction::Not { input, .. } => vec![(input, false)],
        Instruction::Binary { lhs, rhs, .. } => vec![(lhs, false), (rhs, false)],
        Instruction::Mux {
            choice,
            first,
            second,
            ..
        } => vec![(choice, false), (first, false), (second, false)],
        Instruction::Reg { input, .. } => vec![(input, true)],
        Instruction::Concat { lhs, rhs, .. } => vec![(lhs, false), (rhs, false)],
        Instruction::Select { input, .. } => vec![(input, false)],
        Instruction::Slice { input, .. } => vec![(input, false)],
        Instruction::Rom { read_addr, .. } => vec![(read_addr, true)],
        Instruction::Ram {
            read_addr,
            write_enable,
            write_addr,
            write_data,
            ..
        } => vec![
            (read_addr, true),
            (write_enable, false),
            (write_addr, false),
            (write_data, false),
        ],
    }
}

pub fn export(program: &Program, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "digraph netlist {{")?;
    writeln!(out, "    rankdir=LR;")?;

    for reg in program.inputs() {
        writeln!(out, "    \"{}\" [shape=box];", program.register_name(reg))?;
    }
    for reg in program.outputs() {
        writeln!(
            out,
            "    \"{}\" [peripheries=2];",
            program.register_name(reg)
        )?;
    }

    for instruction in &program.instructions {
        let target = program.register_name(instruction.output());
        for (operand, sequential) in operands(instruction) {
            let source = program.register_name(operand);
            if sequential {
                writeln!(out, "    \"{}\" -> \"{}\" [style=dashed];", source, target)?;
            } else {
                writeln!(out, "    \"{}\" -> \"{}\";", source, target)?;
            }
        }
    }

    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::report::ReportContext;

    #[test]
    fn sequential_edges_are_dashed() {
        let ctx = ReportContext::new("<test>");
        let program =
            parser::parse(&ctx, "INPUT a OUTPUT o VAR a, o, t IN t = NOT a o = REG t").unwrap();

        let mut exported = Vec::new();
        export(&program, &mut exported).unwrap();
        let exported = String::from_utf8(exported).unwrap();

        assert!(exported.contains("\"a\" -> \"t\";"));
        assert!(exported.contains("\"t\" -> \"o\" [style=dashed];"));
        assert!(exported.contains("\"a\" [shape=box];"));
    }
}
