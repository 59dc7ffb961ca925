//! Orders the equations so that every combinational dependency is
//! evaluated before its consumer.
//!
//! Sequential primitives break cycles: the argument of `REG` and the read
//! address of `ROM`/`RAM` read last cycle's value or the current memory
//! state, so they contribute no edge. The write ports of `RAM` are
//! computed in the current cycle and remain ordinary dependencies.

use crate::program::{Instruction, Program, Reg};
use crate::report::{Code, Report, ReportContext, Severity};

/// The evaluation order: indices into [`Program::instructions`], built
/// once at load time and reused every cycle.
#[derive(Debug, Clone)]
pub struct Schedule {
    order: Vec<usize>,
}

impl Schedule {
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn into_order(self) -> Vec<usize> {
        self.order
    }
}

/// The registers an instruction reads in the current cycle.
fn combinational_operands(instruction: &Instruction) -> Vec<Reg> {
    match *instruction {
        Instruction::Const { .. } => vec![],
        Instruction::Copy { input, .. } => vec![input],
        Instruction::Not { input, .. } => vec![input],
        Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        Instruction::Mux {
            choice,
            first,
            second,
            ..
        } => vec![choice, first, second],
        Instruction::Reg { .. } => vec![],
        Instruction::Concat { lhs, rhs, .. } => vec![lhs, rhs],
        Instruction::Select { input, .. } => vec![input],
        Instruction::Slice { input, .. } => vec![input],
        Instruction::Rom { .. } => vec![],
        Instruction::Ram {
            write_enable,
            write_addr,
            write_data,
            ..
        } => vec![write_enable, write_addr, write_data],
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    NotVisited,
    InProgress,
    Visited,
}

struct Visitor<'p> {
    program: &'p Program,
    /// Instruction defining each register, if any (inputs have none).
    defined_by: Vec<Option<usize>>,
    states: Vec<VisitState>,
    /// The instructions on the current DFS stack, for cycle reporting.
    path: Vec<usize>,
    sorted: Vec<usize>,
}

impl<'p> Visitor<'p> {
    fn new(program: &'p Program) -> Self {
        let mut defined_by = vec![None; program.registers.len()];
        for (index, instruction) in program.instructions.iter().enumerate() {
            defined_by[instruction.output().index()] = Some(index);
        }
        Visitor {
            program,
            defined_by,
            states: vec![VisitState::NotVisited; program.instructions.len()],
            path: Vec::new(),
            sorted: Vec::with_capacity(program.instructions.len()),
        }
    }

    fn visit(&mut self, index: usize) -> Result<(), Vec<usize>> {
        match self.states[index] {
            VisitState::Visited => Ok(()),
            VisitState::InProgress => {
                let start = self.path.iter().position(|&i| i == index).unwrap_or(0);
                Err(self.path[start..].to_vec())
            }
            VisitState::NotVisited => {
                self.states[index] = VisitState::InProgress;
                self.path.push(index);
                for operand in combinational_operands(&self.program.instructions[index]) {
                    if let Some(dependency) = self.defined_by[operand.index()] {
                        self.visit(dependency)?;
                    }
                }
                self.path.pop();
                self.states[index] = VisitState::Visited;
                self.sorted.push(index);
                Ok(())
            }
        }
    }
}

/// Depth-first topological sort over the combinational edges.
///
/// Instructions are visited in source order so that ties break
/// deterministically by first appearance.
pub fn schedule(ctx: &ReportContext, program: &Program) -> Result<Schedule, Report> {
    let mut visitor = Visitor::new(program);

    for index in 0..program.instructions.len() {
        if let Err(cycle) = visitor.visit(index) {
            let mut names: Vec<String> = cycle
                .iter()
                .map(|&i| program.register_name(program.instructions[i].output()))
                .collect();
            names.push(names[0].clone());
            return Err(ctx
                .report(Severity::Error)
                .with_code(Code::CombinationalCycle)
                .with_message(format!(
                    "combinational cycle between variables: {}",
                    names.join(" -> ")
                ))
                .build());
        }
    }

    Ok(Schedule {
        order: visitor.sorted,
    })
}
