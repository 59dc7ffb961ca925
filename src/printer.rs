//! Prints a compiled program back as netlist source.
//!
//! The output parses back to an equivalent program: same registers in the
//! same order, same widths, same equations. Registers materialised for
//! constant operands come out as ordinary declared variables.

use std::io::{self, Write};

use crate::program::{Instruction, Program, Reg};

fn write_names(
    out: &mut impl Write,
    keyword: &str,
    names: impl Iterator<Item = String>,
) -> io::Result<()> {
    write!(out, "{}", keyword)?;
    for (i, name) in names.enumerate() {
        if i == 0 {
            write!(out, " {}", name)?;
        } else {
            write!(out, ", {}", name)?;
        }
    }
    writeln!(out)
}

pub fn print_program(program: &Program, out: &mut impl Write) -> io::Result<()> {
    write_names(
        out,
        "INPUT",
        program.inputs().map(|reg| program.register_name(reg)),
    )?;
    write_names(
        out,
        "OUTPUT",
        program.outputs().map(|reg| program.register_name(reg)),
    )?;
    write_names(
        out,
        "VAR",
        program.registers.iter().enumerate().map(|(i, info)| {
            format!("{}:{}", program.register_name(Reg(i as u32)), info.bus_size)
        }),
    )?;
    writeln!(out, "IN")?;

    for instruction in &program.instructions {
        print_instruction(program, instruction, out)?;
    }
    Ok(())
}

fn print_instruction(
    program: &Program,
    instruction: &Instruction,
    out: &mut impl Write,
) -> io::Result<()> {
    let name = |reg: Reg| program.register_name(reg);
    let target = name(instruction.output());

    match *instruction {
        Instruction::Const { output, value } => {
            let width = program.bus_size(output) as usize;
            writeln!(out, "{} = {:0width$b}", target, value, width = width)
        }
        Instruction::Copy { input, .. } => writeln!(out, "{} = {}", target, name(input)),
        Instruction::Not { input, .. } => writeln!(out, "{} = NOT {}", target, name(input)),
        Instruction::Binary { op, lhs, rhs, .. } => {
            writeln!(out, "{} = {} {} {}", target, op.opcode(), name(lhs), name(rhs))
        }
        Instruction::Mux {
            choice,
            first,
            second,
            ..
        } => writeln!(
            out,
            "{} = MUX {} {} {}",
            target,
            name(choice),
            name(first),
            name(second)
        ),
        Instruction::Reg { input, .. } => writeln!(out, "{} = REG {}", target, name(input)),
        Instruction::Concat { lhs, rhs, .. } => {
            writeln!(out, "{} = CONCAT {} {}", target, name(lhs), name(rhs))
        }
        Instruction::Select { i, input, .. } => {
            writeln!(out, "{} = SELECT {} {}", target, i, name(input))
        }
        Instruction::Slice {
            start, end, input, ..
        } => writeln!(out, "{} = SLICE {} {} {}", target, start, end, name(input)),
        Instruction::Rom {
            memory_block,
            read_addr,
            ..
        } => {
            let block = &program.memories[memory_block];
            writeln!(
                out,
                "{} = ROM {} {} {}",
                target,
                block.addr_size,
                block.word_size,
                name(read_addr)
            )
        }
        Instruction::Ram {
            memory_block,
            read_addr,
            write_enable,
            write_addr,
            write_data,
            ..
        } => {
            let block = &program.memories[memory_block];
            writeln!(
                out,
                "{} = RAM {} {} {} {} {} {}",
                target,
                block.addr_size,
                block.word_size,
                name(read_addr),
                name(write_enable),
                name(write_addr),
                name(write_data)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::report::ReportContext;

    #[test]
    fn printed_programs_parse_back() {
        let ctx = ReportContext::new("<test>");
        let source = "INPUT c OUTPUT s VAR c, s:2, t:2 IN \
                      t = CONCAT c 0 s = MUX c t 0b11:2";
        let program = parser::parse(&ctx, source).unwrap();

        let mut printed = Vec::new();
        print_program(&program, &mut printed).unwrap();
        let printed = String::from_utf8(printed).unwrap();

        let reparsed = parser::parse(&ctx, &printed).unwrap();
        assert_eq!(program.instructions, reparsed.instructions);
        assert_eq!(program.memories, reparsed.memories);
        let widths: Vec<_> = program.registers.iter().map(|r| r.bus_size).collect();
        let reparsed_widths: Vec<_> = reparsed.registers.iter().map(|r| r.bus_size).collect();
        assert_eq!(widths, reparsed_widths);
    }
}
