//! A compiler and cycle-accurate simulator for netlist descriptions of
//! synchronous digital circuits.
//!
//! A netlist declares fixed-width bit-vector variables and defines each
//! non-input variable by one combinational or sequential equation. The
//! pipeline is: tokens ([`lexer`]) are parsed and checked into an
//! immutable [`program::Program`] ([`parser`]), the equations are ordered
//! by [`scheduler`], and [`simulator`] executes the schedule one clock
//! cycle at a time.

pub mod dot;
pub mod input;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod program;
pub mod report;
pub mod scheduler;
pub mod simulator;

pub use program::Program;
pub use report::{Report, ReportContext};

/// Parses and checks a netlist source file.
pub fn compile(ctx: &ReportContext, source: &str) -> Result<Program, Report> {
    parser::parse(ctx, source)
}
