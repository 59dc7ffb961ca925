//! Input and memory binding.
//!
//! Inputs and memory images come either from a binding file or, when no
//! file is given, interactively from stdin. The binding file is
//! line-oriented: `#` starts a comment, and every other non-empty line is
//! a name followed by whitespace-separated values. A name matching an
//! input variable binds one value per cycle; any other name is treated as
//! a memory image of exactly `2^addr_size` words, address 0 first. Values
//! are decimal unless prefixed with `0b`, `0d` or `0x`.

use std::io::{self, BufRead, Write};

use crate::program::{bus_mask, BusSize, Program, Value};
use crate::report::{Code, Report, ReportContext, Severity, SourcePosition};

/// Parses a single binding value.
pub fn parse_value(text: &str) -> Option<Value> {
    if let Some(digits) = text.strip_prefix("0b") {
        Value::from_str_radix(digits, 2).ok()
    } else if let Some(digits) = text.strip_prefix("0x") {
        Value::from_str_radix(digits, 16).ok()
    } else if let Some(digits) = text.strip_prefix("0d") {
        Value::from_str_radix(digits, 10).ok()
    } else {
        text.parse().ok()
    }
}

pub struct InputManager {
    ctx: ReportContext,
    /// Raw name → values bindings, in file order.
    bindings: Vec<(String, Vec<Value>, SourcePosition)>,
    /// Per-cycle value sequences, parallel to the program's input list.
    /// Filled by [`InputManager::bind`].
    sequences: Vec<Vec<Value>>,
    memory_images: Vec<(String, Vec<Value>)>,
    interactive: bool,
}

impl InputManager {
    /// An input manager that prompts on stdin every cycle.
    pub fn interactive() -> Self {
        InputManager {
            ctx: ReportContext::new("<stdin>"),
            bindings: Vec::new(),
            sequences: Vec::new(),
            memory_images: Vec::new(),
            interactive: true,
        }
    }

    /// Parses a binding file.
    pub fn from_file(ctx: &ReportContext, contents: &str) -> Result<Self, Report> {
        let mut bindings: Vec<(String, Vec<Value>, SourcePosition)> = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            let position = SourcePosition {
                line: index as u32 + 1,
                column: 1,
            };
            let line = line.split('#').next().unwrap_or("");
            let mut words = line.split_whitespace();
            let name = match words.next() {
                Some(name) => name,
                None => continue,
            };

            let mut values = Vec::new();
            for word in words {
                match parse_value(word) {
                    Some(value) => values.push(value),
                    None => {
                        return Err(ctx
                            .report(Severity::Error)
                            .with_location(position)
                            .with_code(Code::MalformedBinding)
                            .with_message(format!("'{}' is not a valid value", word))
                            .build())
                    }
                }
            }

            if bindings.iter().any(|(n, _, _)| n == name) {
                return Err(ctx
                    .report(Severity::Error)
                    .with_location(position)
                    .with_code(Code::MalformedBinding)
                    .with_message(format!("'{}' is bound twice", name))
                    .build());
            }
            bindings.push((name.to_string(), values, position));
        }

        Ok(InputManager {
            ctx: ctx.clone(),
            bindings,
            sequences: Vec::new(),
            memory_images: Vec::new(),
            interactive: false,
        })
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Matches the bindings against the program: every input variable must
    /// be bound (before cycle 0), input values must fit their bus, and
    /// every binding that is not an input becomes a memory image.
    pub fn bind(&mut self, program: &Program) -> Result<(), Report> {
        if self.interactive {
            return Ok(());
        }

        for reg in program.inputs() {
            let name = program.register_name(reg);
            let bus_size = program.bus_size(reg);
            match self.bindings.iter().find(|(n, _, _)| *n == name) {
                Some((_, values, position)) => {
                    if let Some(value) = values.iter().find(|&&v| v > bus_mask(bus_size)) {
                        return Err(self
                            .ctx
                            .report(Severity::Error)
                            .with_location(*position)
                            .with_code(Code::MalformedBinding)
                            .with_message(format!(
                                "the value {} bound to '{}' does not fit in a bus of size {}",
                                value, name, bus_size
                            ))
                            .build());
                    }
                    self.sequences.push(values.clone());
                }
                None => {
                    return Err(self
                        .ctx
                        .report(Severity::Error)
                        .with_code(Code::MissingInput)
                        .with_message(format!("no values bound to the input '{}'", name))
                        .build())
                }
            }
        }

        let input_names: Vec<String> = program
            .inputs()
            .map(|reg| program.register_name(reg))
            .collect();
        self.memory_images = self
            .bindings
            .iter()
            .filter(|(name, _, _)| !input_names.contains(name))
            .map(|(name, values, _)| (name.clone(), values.clone()))
            .collect();

        Ok(())
    }

    pub fn memory_images(&self) -> &[(String, Vec<Value>)] {
        &self.memory_images
    }

    /// The number of cycles the bound sequences can feed, if bounded.
    pub fn cycle_count(&self) -> Option<usize> {
        if self.interactive {
            return None;
        }
        self.sequences.iter().map(|values| values.len()).min()
    }

    /// The input values for one cycle, in the program's input order, or
    /// `None` once the source is exhausted.
    pub fn next_inputs(&mut self, program: &Program, cycle: usize) -> Result<Option<Vec<Value>>, Report> {
        if self.interactive {
            return Ok(read_inputs_from_stdin(program));
        }

        let mut values = Vec::with_capacity(self.sequences.len());
        for sequence in &self.sequences {
            match sequence.get(cycle) {
                Some(&value) => values.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(values))
    }
}

/// Prompts for every input on stdin. Returns `None` at end of input,
/// which stops the simulation at the cycle boundary.
fn read_inputs_from_stdin(program: &Program) -> Option<Vec<Value>> {
    if !program.has_inputs() {
        print!("Press enter to run a cycle. ");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).ok()? == 0 {
            return None;
        }
        return Some(Vec::new());
    }

    let mut values = Vec::new();
    for reg in program.inputs() {
        values.push(request_value(
            &program.register_name(reg),
            program.bus_size(reg),
        )?);
    }
    Some(values)
}

fn request_value(name: &str, bus_size: BusSize) -> Option<Value> {
    if bus_size == 1 {
        print!("  {} (1 bit): ", name);
    } else {
        print!("  {} ({} bits): ", name, bus_size);
    }

    loop {
        io::stdout().flush().ok()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).ok()? == 0 {
            return None;
        }

        match parse_value(line.trim()) {
            Some(value) if value <= bus_mask(bus_size) => break Some(value),
            Some(value) => {
                print!("  {} does not fit in {} bits, try again: ", value, bus_size)
            }
            None => print!("  Please enter a value (decimal, 0b... or 0x...): "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn program(source: &str) -> Program {
        let ctx = ReportContext::new("<test>");
        parser::parse(&ctx, source).unwrap()
    }

    #[test]
    fn values_accept_all_three_bases() {
        assert_eq!(parse_value("12"), Some(12));
        assert_eq!(parse_value("0b101"), Some(5));
        assert_eq!(parse_value("0d42"), Some(42));
        assert_eq!(parse_value("0xff"), Some(255));
        assert_eq!(parse_value("0b12"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn binds_inputs_in_register_order() {
        let program = program("INPUT a, b OUTPUT o VAR a, b, o IN o = AND a b");
        let ctx = ReportContext::new("<bindings>");
        let mut manager =
            InputManager::from_file(&ctx, "# a then b\nb 0 1\na 1 1\n").unwrap();
        manager.bind(&program).unwrap();

        assert_eq!(manager.cycle_count(), Some(2));
        assert_eq!(
            manager.next_inputs(&program, 0).unwrap(),
            Some(vec![1, 0])
        );
        assert_eq!(
            manager.next_inputs(&program, 1).unwrap(),
            Some(vec![1, 1])
        );
        assert_eq!(manager.next_inputs(&program, 2).unwrap(), None);
    }

    #[test]
    fn a_missing_input_is_an_error_before_cycle_zero() {
        let program = program("INPUT a, b OUTPUT o VAR a, b, o IN o = AND a b");
        let ctx = ReportContext::new("<bindings>");
        let mut manager = InputManager::from_file(&ctx, "a 1 1\n").unwrap();
        assert_eq!(
            manager.bind(&program).unwrap_err().code(),
            Code::MissingInput
        );
    }

    #[test]
    fn non_input_bindings_become_memory_images() {
        let program = program(
            "INPUT addr OUTPUT d VAR addr:1, d:4 IN d = ROM 1 4 addr",
        );
        let ctx = ReportContext::new("<bindings>");
        let mut manager =
            InputManager::from_file(&ctx, "addr 0 1\nd 0b1010 0b0101\n").unwrap();
        manager.bind(&program).unwrap();
        assert_eq!(
            manager.memory_images(),
            &[("d".to_string(), vec![0b1010, 0b0101])]
        );
    }

    #[test]
    fn input_values_must_fit_their_bus() {
        let program = program("INPUT a OUTPUT o VAR a:2, o:2 IN o = a");
        let ctx = ReportContext::new("<bindings>");
        let mut manager = InputManager::from_file(&ctx, "a 4\n").unwrap();
        assert_eq!(
            manager.bind(&program).unwrap_err().code(),
            Code::MalformedBinding
        );
    }
}
