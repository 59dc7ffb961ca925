//! Recursive-descent parser and semantic checker.
//!
//! Parsing is done in two passes over a single file: the INPUT and OUTPUT
//! name references are gathered first, then the VAR declarations, and only
//! then are the equations parsed, resolving every identifier against the
//! declaration table. All width and range checks happen here so that the
//! evaluator can rely on them as invariants.

use std::collections::{HashMap, HashSet};

use crate::lexer::{Token, TokenStream};
use crate::program::{bus_mask, BinaryOp, BusSize, Program, ProgramBuilder, Reg, Value, MAX_BUS_SIZE};
use crate::report::{Code, Report, ReportContext, Severity, SourcePosition};

/// Parses and checks a complete netlist source file.
pub fn parse(ctx: &ReportContext, source: &str) -> Result<Program, Report> {
    Parser::new(ctx, source)?.parse_program()
}

struct Declaration {
    reg: Reg,
    bus_size: BusSize,
    position: SourcePosition,
    is_input: bool,
}

/// A parsed constant literal. `bus_size` is the explicit `:size` override
/// when present, and the width implied by the spelling otherwise.
struct Constant {
    value: Value,
    bus_size: BusSize,
    explicit_size: bool,
}

struct Parser<'a> {
    ctx: &'a ReportContext,
    stream: TokenStream<'a>,
    token: Option<Token>,
    position: SourcePosition,
    builder: ProgramBuilder,
    vars: HashMap<String, Declaration>,
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a ReportContext, source: &'a str) -> Result<Self, Report> {
        let mut parser = Parser {
            ctx,
            stream: TokenStream::new(ctx, source),
            token: None,
            position: SourcePosition { line: 1, column: 1 },
            builder: ProgramBuilder::new(),
            vars: HashMap::new(),
        };
        parser.advance()?;
        Ok(parser)
    }

    fn advance(&mut self) -> Result<(), Report> {
        match self.stream.next()? {
            Some((token, position)) => {
                self.token = Some(token);
                self.position = position;
            }
            None => {
                self.token = None;
                self.position = self.stream.position();
            }
        }
        Ok(())
    }

    fn error(&self, code: Code, position: SourcePosition, message: String) -> Report {
        self.ctx
            .report(Severity::Error)
            .with_location(position)
            .with_code(code)
            .with_message(message)
            .build()
    }

    fn unexpected(&self, expected: &str) -> Report {
        let found = match &self.token {
            Some(token) => format!("'{}'", token),
            None => "end of file".to_string(),
        };
        self.error(
            Code::UnexpectedToken,
            self.position,
            format!("unexpected token: found {}, expected {}", found, expected),
        )
    }

    fn parse_program(mut self) -> Result<Program, Report> {
        let input_refs = self.parse_references(Token::Input, Token::Output, "OUTPUT")?;
        let output_refs = self.parse_references(Token::Output, Token::Var, "VAR")?;
        self.parse_declarations(&input_refs, &output_refs)?;

        for (name, position) in input_refs.iter().chain(output_refs.iter()) {
            if !self.vars.contains_key(name) {
                return Err(self.error(
                    Code::MissingDeclaration,
                    *position,
                    format!("missing declaration of '{}' in the VAR section", name),
                ));
            }
        }

        let defined = self.parse_equations()?;

        let mut missing: Vec<&Declaration> = self
            .vars
            .values()
            .filter(|decl| !decl.is_input && !defined.contains(&decl.reg))
            .collect();
        missing.sort_by_key(|decl| decl.reg.0);
        if let Some(decl) = missing.first() {
            let name = self
                .vars
                .iter()
                .find(|(_, d)| d.reg == decl.reg)
                .map(|(name, _)| name.clone())
                .unwrap_or_default();
            return Err(self.error(
                Code::MissingEquation,
                decl.position,
                format!("declared variable '{}' has no associated equation", name),
            ));
        }

        Ok(self.builder.build())
    }

    /// Parses `start ident (, ident)*`, stopping at the `end` keyword
    /// (which is left in the stream).
    fn parse_references(
        &mut self,
        start: Token,
        end: Token,
        end_spelling: &str,
    ) -> Result<Vec<(String, SourcePosition)>, Report> {
        let (dup_code, what) = match start {
            Token::Input => (Code::DuplicateInput, "input"),
            _ => (Code::DuplicateOutput, "output"),
        };

        if self.token != Some(start) {
            return Err(self.unexpected(&format!("'{}'", what.to_uppercase())));
        }
        self.advance()?;

        let mut refs: Vec<(String, SourcePosition)> = Vec::new();
        let mut seen: HashMap<String, SourcePosition> = HashMap::new();

        while self.token != Some(end.clone()) {
            let (name, position) = self.expect_identifier(&format!("an {} name", what))?;
            if let Some(previous) = seen.get(&name) {
                return Err(self.error(
                    dup_code,
                    position,
                    format!(
                        "the variable '{}' has already been marked as {} at {}",
                        name, what, previous
                    ),
                ));
            }
            seen.insert(name.clone(), position);
            refs.push((name, position));

            match &self.token {
                Some(Token::Comma) => self.advance()?,
                Some(token) if *token == end => {}
                _ => return Err(self.unexpected(&format!("',' or '{}'", end_spelling))),
            }
        }
        Ok(refs)
    }

    fn parse_declarations(
        &mut self,
        input_refs: &[(String, SourcePosition)],
        output_refs: &[(String, SourcePosition)],
    ) -> Result<(), Report> {
        if self.token != Some(Token::Var) {
            return Err(self.unexpected("'VAR'"));
        }
        self.advance()?;

        while self.token != Some(Token::In) {
            let (name, position) = self.expect_identifier("a variable declaration")?;

            let bus_size = if self.token == Some(Token::Colon) {
                self.advance()?;
                self.parse_bus_size()?
            } else {
                1
            };

            if let Some(previous) = self.vars.get(&name) {
                return Err(self.error(
                    Code::DuplicateVariable,
                    position,
                    format!(
                        "the variable '{}' has already been declared at {}",
                        name, previous.position
                    ),
                ));
            }

            let is_input = input_refs.iter().any(|(n, _)| *n == name);
            let is_output = output_refs.iter().any(|(n, _)| *n == name);
            let reg = self.builder.add_register(bus_size, &name, is_input, is_output);
            self.vars.insert(
                name,
                Declaration {
                    reg,
                    bus_size,
                    position,
                    is_input,
                },
            );

            match &self.token {
                Some(Token::Comma) => self.advance()?,
                Some(Token::In) => {}
                _ => return Err(self.unexpected("',' or 'IN'")),
            }
        }
        Ok(())
    }

    fn parse_equations(&mut self) -> Result<HashSet<Reg>, Report> {
        if self.token != Some(Token::In) {
            return Err(self.unexpected("'IN'"));
        }
        self.advance()?;

        let mut defined: HashSet<Reg> = HashSet::new();

        while self.token.is_some() {
            let (name, position) = self.expect_identifier("an equation")?;
            let (target, target_bus, is_input) = match self.vars.get(&name) {
                Some(decl) => (decl.reg, decl.bus_size, decl.is_input),
                None => {
                    return Err(self.error(
                        Code::UndeclaredVariable,
                        position,
                        format!("assignment to undeclared variable '{}'", name),
                    ))
                }
            };
            if is_input {
                return Err(self.error(
                    Code::AssignmentToInput,
                    position,
                    format!("assignment to input variable '{}'", name),
                ));
            }
            if !defined.insert(target) {
                return Err(self.error(
                    Code::DuplicateEquation,
                    position,
                    format!("the variable '{}' already has an equation", name),
                ));
            }

            if self.token != Some(Token::Equal) {
                return Err(self.unexpected("'='"));
            }
            self.advance()?;

            self.parse_expression(target, target_bus)?;
        }

        Ok(defined)
    }

    fn parse_expression(&mut self, target: Reg, target_bus: BusSize) -> Result<(), Report> {
        let expr_pos = self.position;

        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                return Err(self.error(
                    Code::MissingExpression,
                    self.position,
                    "missing expression for assignment".to_string(),
                ))
            }
        };

        match token {
            Token::Identifier(name) => {
                self.advance()?;
                let (input, bus) = self.resolve_variable(&name, expr_pos)?;
                self.check_bus(bus, target_bus, expr_pos)?;
                self.builder.add_copy(target, input);
            }

            Token::Integer(_)
            | Token::BinaryConstant(_)
            | Token::DecimalConstant(_)
            | Token::HexadecimalConstant(_) => {
                // A constant on the right-hand side of an equation adopts
                // the target's bus size; an explicit size annotation must
                // agree with it.
                let constant = self.parse_constant()?;
                if constant.explicit_size && constant.bus_size != target_bus {
                    return Err(self.error(
                        Code::WidthMismatch,
                        expr_pos,
                        format!(
                            "the constant has declared bus size {} but the assigned variable has bus size {}",
                            constant.bus_size, target_bus
                        ),
                    ));
                }
                if constant.value > bus_mask(target_bus) {
                    return Err(self.error(
                        Code::LiteralTooWide,
                        expr_pos,
                        format!(
                            "the value {} does not fit in a bus of size {}",
                            constant.value, target_bus
                        ),
                    ));
                }
                self.builder.add_const(target, constant.value);
            }

            Token::Not => {
                self.advance()?;
                let (input, bus) = self.parse_argument()?;
                self.check_bus(bus, target_bus, expr_pos)?;
                self.builder.add_not(target, input);
            }

            Token::And | Token::Nand | Token::Or | Token::Nor | Token::Xor | Token::Xnor => {
                let op = match token {
                    Token::And => BinaryOp::And,
                    Token::Nand => BinaryOp::Nand,
                    Token::Or => BinaryOp::Or,
                    Token::Nor => BinaryOp::Nor,
                    Token::Xor => BinaryOp::Xor,
                    _ => BinaryOp::Xnor,
                };
                self.advance()?;
                let (lhs, lhs_bus) = self.parse_argument()?;
                let (rhs, rhs_bus) = self.parse_argument()?;
                if lhs_bus != rhs_bus {
                    return Err(self.error(
                        Code::WidthMismatch,
                        expr_pos,
                        format!(
                            "the two arguments of {} have bus sizes {} and {}",
                            op.opcode(),
                            lhs_bus,
                            rhs_bus
                        ),
                    ));
                }
                self.check_bus(lhs_bus, target_bus, expr_pos)?;
                self.builder.add_binary(op, target, lhs, rhs);
            }

            Token::Mux => {
                self.advance()?;
                let (choice, choice_bus) = self.parse_argument()?;
                let (first, first_bus) = self.parse_argument()?;
                let (second, second_bus) = self.parse_argument()?;
                if choice_bus != 1 {
                    return Err(self.error(
                        Code::WidthMismatch,
                        expr_pos,
                        format!("the choice argument of MUX has bus size {}, expected 1", choice_bus),
                    ));
                }
                if first_bus != second_bus {
                    return Err(self.error(
                        Code::WidthMismatch,
                        expr_pos,
                        format!(
                            "the two branches of MUX have bus sizes {} and {}",
                            first_bus, second_bus
                        ),
                    ));
                }
                self.check_bus(first_bus, target_bus, expr_pos)?;
                self.builder.add_mux(target, choice, first, second);
            }

            Token::Reg => {
                self.advance()?;
                let (name, position) = self.expect_identifier("a variable")?;
                let (input, bus) = self.resolve_variable(&name, position)?;
                self.check_bus(bus, target_bus, expr_pos)?;
                self.builder.add_reg(target, input);
            }

            Token::Concat => {
                self.advance()?;
                let (lhs, lhs_bus) = self.parse_argument()?;
                let (rhs, rhs_bus) = self.parse_argument()?;
                if lhs_bus + rhs_bus != target_bus {
                    return Err(self.error(
                        Code::WidthMismatch,
                        expr_pos,
                        format!(
                            "CONCAT produces a bus of size {} but the assigned variable has bus size {}",
                            lhs_bus + rhs_bus,
                            target_bus
                        ),
                    ));
                }
                self.builder.add_concat(target, lhs, rhs);
            }

            Token::Select => {
                self.advance()?;
                let i = self.parse_index()?;
                let (input, bus) = self.parse_argument()?;
                if i >= bus {
                    return Err(self.error(
                        Code::IndexOutOfRange,
                        expr_pos,
                        format!("index {} out of range for a bus of size {}", i, bus),
                    ));
                }
                self.check_bus(1, target_bus, expr_pos)?;
                self.builder.add_select(target, i, input);
            }

            Token::Slice => {
                self.advance()?;
                let start = self.parse_index()?;
                let end = self.parse_index()?;
                let (input, bus) = self.parse_argument()?;
                if start >= end {
                    return Err(self.error(
                        Code::InvalidSliceBounds,
                        expr_pos,
                        format!(
                            "the start of the slice ({}) must be less than its end ({})",
                            start, end
                        ),
                    ));
                }
                if end >= bus {
                    return Err(self.error(
                        Code::IndexOutOfRange,
                        expr_pos,
                        format!("index {} out of range for a bus of size {}", end, bus),
                    ));
                }
                self.check_bus(end - start + 1, target_bus, expr_pos)?;
                self.builder.add_slice(target, start, end, input);
            }

            Token::Rom => {
                self.advance()?;
                let addr_size = self.parse_bus_size()?;
                let word_size = self.parse_bus_size()?;
                let (read_addr, read_bus) = self.parse_argument()?;
                self.check_bus(read_bus, addr_size, expr_pos)?;
                self.check_bus(word_size, target_bus, expr_pos)?;
                self.builder.add_rom(target, addr_size, word_size, read_addr);
            }

            Token::Ram => {
                self.advance()?;
                let addr_size = self.parse_bus_size()?;
                let word_size = self.parse_bus_size()?;
                let (read_addr, read_bus) = self.parse_argument()?;
                let (write_enable, enable_bus) = self.parse_argument()?;
                let (write_addr, write_addr_bus) = self.parse_argument()?;
                let (write_data, data_bus) = self.parse_argument()?;
                self.check_bus(read_bus, addr_size, expr_pos)?;
                self.check_bus(enable_bus, 1, expr_pos)?;
                self.check_bus(write_addr_bus, addr_size, expr_pos)?;
                self.check_bus(data_bus, word_size, expr_pos)?;
                self.check_bus(word_size, target_bus, expr_pos)?;
                self.builder.add_ram(
                    target,
                    addr_size,
                    word_size,
                    read_addr,
                    write_enable,
                    write_addr,
                    write_data,
                );
            }

            _ => return Err(self.unexpected("an expression")),
        }

        Ok(())
    }

    fn check_bus(&self, found: BusSize, expected: BusSize, position: SourcePosition) -> Result<(), Report> {
        if found != expected {
            return Err(self.error(
                Code::WidthMismatch,
                position,
                format!("mismatched bus sizes: found {}, expected {}", found, expected),
            ));
        }
        Ok(())
    }

    /// An argument is either a declared variable or a constant; constants
    /// are materialised as anonymous registers defined by a constant
    /// equation.
    fn parse_argument(&mut self) -> Result<(Reg, BusSize), Report> {
        match &self.token {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                let position = self.position;
                self.advance()?;
                self.resolve_variable(&name, position)
            }
            Some(Token::Integer(_))
            | Some(Token::BinaryConstant(_))
            | Some(Token::DecimalConstant(_))
            | Some(Token::HexadecimalConstant(_)) => {
                let constant = self.parse_constant()?;
                let reg = self.builder.add_register(constant.bus_size, "", false, false);
                self.builder.add_const(reg, constant.value);
                Ok((reg, constant.bus_size))
            }
            _ => Err(self.unexpected("an identifier or a constant")),
        }
    }

    fn resolve_variable(
        &self,
        name: &str,
        position: SourcePosition,
    ) -> Result<(Reg, BusSize), Report> {
        match self.vars.get(name) {
            Some(decl) => Ok((decl.reg, decl.bus_size)),
            None => Err(self.error(
                Code::UndeclaredVariable,
                position,
                format!("undeclared variable '{}'", name),
            )),
        }
    }

    /// Parses one of the four constant forms of the language:
    /// bare binary digits, `0b` binary, `0d` decimal (size required) and
    /// `0x` hexadecimal, with an optional `:size` suffix for the prefixed
    /// forms.
    fn parse_constant(&mut self) -> Result<Constant, Report> {
        let position = self.position;
        let token = self.token.clone();

        match token {
            Some(Token::Integer(digits)) => {
                self.advance()?;
                let bus_size = self.implied_bus_size(digits.len(), 1, position)?;
                let value = Value::from_str_radix(&digits, 2).map_err(|_| {
                    self.error(
                        Code::MalformedLiteral,
                        position,
                        format!("'{}' is not a valid binary constant", digits),
                    )
                })?;
                Ok(Constant {
                    value,
                    bus_size,
                    explicit_size: false,
                })
            }

            Some(Token::BinaryConstant(digits)) => {
                self.advance()?;
                let value = Value::from_str_radix(&digits, 2).map_err(|_| {
                    self.error(
                        Code::MalformedLiteral,
                        position,
                        format!("'0b{}' is not a valid binary constant", digits),
                    )
                })?;
                self.finish_constant(value, digits.len(), 1, position)
            }

            Some(Token::DecimalConstant(digits)) => {
                self.advance()?;
                let value = Value::from_str_radix(&digits, 10).map_err(|_| {
                    self.error(
                        Code::MalformedLiteral,
                        position,
                        format!("'0d{}' is not a valid decimal constant", digits),
                    )
                })?;
                let bus_size = match self.parse_size_spec()? {
                    Some(size) => size,
                    None => {
                        return Err(self.error(
                            Code::MalformedLiteral,
                            position,
                            "a decimal constant requires a size specifier".to_string(),
                        ))
                    }
                };
                self.check_constant_fits(value, bus_size, position)?;
                Ok(Constant {
                    value,
                    bus_size,
                    explicit_size: true,
                })
            }

            Some(Token::HexadecimalConstant(digits)) => {
                self.advance()?;
                let value = Value::from_str_radix(&digits, 16).map_err(|_| {
                    self.error(
                        Code::MalformedLiteral,
                        position,
                        format!("'0x{}' is not a valid hexadecimal constant", digits),
                    )
                })?;
                // One hexadecimal digit covers four bits.
                self.finish_constant(value, digits.len(), 4, position)
            }

            _ => Err(self.unexpected("a constant")),
        }
    }

    fn finish_constant(
        &mut self,
        value: Value,
        digit_count: usize,
        bits_per_digit: usize,
        position: SourcePosition,
    ) -> Result<Constant, Report> {
        match self.parse_size_spec()? {
            Some(bus_size) => {
                self.check_constant_fits(value, bus_size, position)?;
                Ok(Constant {
                    value,
                    bus_size,
                    explicit_size: true,
                })
            }
            None => {
                let bus_size = self.implied_bus_size(digit_count, bits_per_digit, position)?;
                Ok(Constant {
                    value,
                    bus_size,
                    explicit_size: false,
                })
            }
        }
    }

    fn implied_bus_size(
        &self,
        digit_count: usize,
        bits_per_digit: usize,
        position: SourcePosition,
    ) -> Result<BusSize, Report> {
        let bus_size = digit_count * bits_per_digit;
        if digit_count == 0 {
            return Err(self.error(
                Code::MalformedLiteral,
                position,
                "constant with no digits".to_string(),
            ));
        }
        if bus_size > MAX_BUS_SIZE as usize {
            return Err(self.error(
                Code::InvalidBusSize,
                position,
                format!(
                    "the constant implies a bus size of {}, the maximum is {}",
                    bus_size, MAX_BUS_SIZE
                ),
            ));
        }
        Ok(bus_size as BusSize)
    }

    fn check_constant_fits(
        &self,
        value: Value,
        bus_size: BusSize,
        position: SourcePosition,
    ) -> Result<(), Report> {
        if value > bus_mask(bus_size) {
            return Err(self.error(
                Code::LiteralTooWide,
                position,
                format!(
                    "the value {} does not fit in a bus of size {} (maximum is {})",
                    value,
                    bus_size,
                    bus_mask(bus_size)
                ),
            ));
        }
        Ok(())
    }

    fn parse_size_spec(&mut self) -> Result<Option<BusSize>, Report> {
        if self.token == Some(Token::Colon) {
            self.advance()?;
            Ok(Some(self.parse_bus_size()?))
        } else {
            Ok(None)
        }
    }

    /// A base-10 integer constrained to the valid bus size range.
    fn parse_bus_size(&mut self) -> Result<BusSize, Report> {
        let position = self.position;
        let size = self.parse_index()?;
        if !(1..=MAX_BUS_SIZE).contains(&size) {
            return Err(self.error(
                Code::InvalidBusSize,
                position,
                format!("bus sizes must lie between 1 and {}, found {}", MAX_BUS_SIZE, size),
            ));
        }
        Ok(size)
    }

    /// A base-10 integer used as a bit index.
    fn parse_index(&mut self) -> Result<BusSize, Report> {
        match &self.token {
            Some(Token::Integer(digits)) => {
                let position = self.position;
                let value: BusSize = digits.parse().map_err(|_| {
                    self.error(
                        Code::MalformedLiteral,
                        position,
                        format!("'{}' is too large", digits),
                    )
                })?;
                self.advance()?;
                Ok(value)
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<(String, SourcePosition), Report> {
        match &self.token {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                let position = self.position;
                self.advance()?;
                Ok((name, position))
            }
            _ => Err(self.unexpected(expected)),
        }
    }
}
