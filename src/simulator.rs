//! The cycle-accurate evaluator.
//!
//! The simulator owns all mutable per-cycle state: the current and
//! previous value arrays (one slot per register) and one word array per
//! memory block. The program itself stays immutable and shared.

use crate::program::{bus_mask, BinaryOp, Instruction, Program, Reg, Value};
use crate::report::{Code, Report, ReportContext, Severity};
use crate::scheduler::Schedule;

#[derive(Debug)]
pub struct Simulator<'p> {
    program: &'p Program,
    order: Vec<usize>,
    /// Values of the current cycle, indexed by register.
    cur: Vec<Value>,
    /// Values as of the end of the previous cycle; read by `REG`.
    prev: Vec<Value>,
    memories: Vec<Vec<Value>>,
    /// Write ports (enable, address, data) of each RAM block; `None` for
    /// ROM blocks.
    ram_ports: Vec<Option<(Reg, Reg, Reg)>>,
}

impl<'p> Simulator<'p> {
    /// Prepares a simulation: allocates the register and memory state and
    /// binds the provided memory images to their blocks.
    ///
    /// Every ROM block must have an image; a RAM block without one starts
    /// zeroed with a warning. An image whose size is not exactly
    /// `2^addr_size` words is an error, and an image matching no block is
    /// reported as unused.
    pub fn new(
        ctx: &ReportContext,
        program: &'p Program,
        schedule: Schedule,
        memory_images: &[(String, Vec<Value>)],
    ) -> Result<Self, Report> {
        let register_count = program.registers.len();
        let mut memories: Vec<Vec<Value>> = program
            .memories
            .iter()
            .map(|block| vec![0; block.word_count()])
            .collect();

        let mut ram_ports: Vec<Option<(Reg, Reg, Reg)>> = vec![None; program.memories.len()];
        let mut is_rom = vec![false; program.memories.len()];
        for instruction in &program.instructions {
            match *instruction {
                Instruction::Rom { memory_block, .. } => is_rom[memory_block] = true,
                Instruction::Ram {
                    memory_block,
                    write_enable,
                    write_addr,
                    write_data,
                    ..
                } => ram_ports[memory_block] = Some((write_enable, write_addr, write_data)),
                _ => {}
            }
        }

        for (index, block) in program.memories.iter().enumerate() {
            let name = program.register_name(block.output);
            match memory_images.iter().find(|(image, _)| *image == name) {
                Some((_, words)) => {
                    if words.len() != block.word_count() {
                        return Err(ctx
                            .report(Severity::Error)
                            .with_code(Code::MemorySizeMismatch)
                            .with_message(format!(
                                "expected a memory image of {} words for '{}', found {}",
                                block.word_count(),
                                name,
                                words.len()
                            ))
                            .build());
                    }
                    for (slot, word) in memories[index].iter_mut().zip(words) {
                        *slot = word & bus_mask(block.word_size);
                    }
                }
                None if is_rom[index] => {
                    return Err(ctx
                        .report(Severity::Error)
                        .with_code(Code::UninitialisedMemory)
                        .with_message(format!("the ROM '{}' has no memory image", name))
                        .build());
                }
                None => {
                    ctx.report(Severity::Warning)
                        .with_code(Code::UninitialisedMemory)
                        .with_message(format!(
                            "the RAM '{}' has no memory image, starting zeroed",
                            name
                        ))
                        .build()
                        .print();
                }
            }
        }

        for (name, _) in memory_images {
            let unused = !program
                .memories
                .iter()
                .any(|block| program.register_name(block.output) == *name);
            if unused {
                ctx.report(Severity::Warning)
                    .with_code(Code::UnusedBinding)
                    .with_message(format!(
                        "the memory image '{}' does not correspond to any ROM or RAM",
                        name
                    ))
                    .build()
                    .print();
            }
        }

        Ok(Simulator {
            program,
            order: schedule.into_order(),
            cur: vec![0; register_count],
            prev: vec![0; register_count],
            memories,
            ram_ports,
        })
    }

    /// The register value as observed from outside: masked to the
    /// register's bus size.
    pub fn get_register(&self, reg: Reg) -> Value {
        self.cur[reg.index()] & bus_mask(self.program.bus_size(reg))
    }

    /// Runs one cycle: snapshots the previous values, binds the inputs
    /// (one value per input register, in register order), evaluates the
    /// scheduled equations, then applies the RAM writes.
    ///
    /// RAM writes happen after every equation has been evaluated, so an
    /// in-cycle RAM read observes the pre-write contents.
    pub fn cycle(&mut self, inputs: &[Value]) {
        let program = self.program;
        assert_eq!(
            inputs.len(),
            program.inputs().count(),
            "wrong number of input values"
        );

        self.prev.copy_from_slice(&self.cur);

        for (reg, &value) in program.inputs().zip(inputs.iter()) {
            self.cur[reg.index()] = value & bus_mask(program.bus_size(reg));
        }

        for &index in &self.order {
            let instruction = &program.instructions[index];
            let value = match *instruction {
                Instruction::Const { value, .. } => value,

                Instruction::Copy { input, .. } => self.cur[input.index()],

                Instruction::Not { output, input } => {
                    !self.cur[input.index()] & bus_mask(program.bus_size(output))
                }

                Instruction::Binary {
                    op,
                    output,
                    lhs,
                    rhs,
                } => {
                    let l = self.cur[lhs.index()];
                    let r = self.cur[rhs.index()];
                    let m = bus_mask(program.bus_size(output));
                    match op {
                        BinaryOp::And => l & r,
                        BinaryOp::Or => l | r,
                        BinaryOp::Xor => l ^ r,
                        BinaryOp::Nand => !(l & r) & m,
                        BinaryOp::Nor => !(l | r) & m,
                        BinaryOp::Xnor => !(l ^ r) & m,
                    }
                }

                Instruction::Mux {
                    choice,
                    first,
                    second,
                    ..
                } => {
                    if self.cur[choice.index()] & 1 != 0 {
                        self.cur[first.index()]
                    } else {
                        self.cur[second.index()]
                    }
                }

                Instruction::Reg { input, .. } => self.prev[input.index()],

                Instruction::Concat { lhs, rhs, .. } => {
                    let lhs_size = program.bus_size(lhs);
                    (self.cur[lhs.index()] & bus_mask(lhs_size))
                        | ((self.cur[rhs.index()] & bus_mask(program.bus_size(rhs))) << lhs_size)
                }

                Instruction::Select { i, input, .. } => (self.cur[input.index()] >> i) & 1,

                Instruction::Slice {
                    start, end, input, ..
                } => (self.cur[input.index()] >> start) & bus_mask(end - start + 1),

                Instruction::Rom {
                    memory_block,
                    read_addr,
                    ..
                } => {
                    let block = &program.memories[memory_block];
                    let addr = self.cur[read_addr.index()] & bus_mask(block.addr_size);
                    self.memories[memory_block][addr as usize]
                }

                Instruction::Ram {
                    memory_block,
                    read_addr,
                    ..
                } => {
                    let block = &program.memories[memory_block];
                    let addr = self.cur[read_addr.index()] & bus_mask(block.addr_size);
                    self.memories[memory_block][addr as usize]
                }
            };
            self.cur[instruction.output().index()] = value;
        }

        for (memory_block, ports) in self.ram_ports.iter().enumerate() {
            if let Some((write_enable, write_addr, write_data)) = *ports {
                if self.cur[write_enable.index()] & 1 != 0 {
                    let block = &program.memories[memory_block];
                    let addr = self.cur[write_addr.index()] & bus_mask(block.addr_size);
                    self.memories[memory_block][addr as usize] =
                        self.cur[write_data.index()] & bus_mask(block.word_size);
                }
            }
        }
    }
}
