use std::fmt;

/// A position in the source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable numeric codes for every diagnostic the tool can emit.
///
/// The code ranges follow the phase that raises them: lexical analysis,
/// parsing, semantic checking, scheduling, binding, and finally internal
/// invariants that only a compiler bug can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    UnknownCharacter = 2,
    MalformedLiteral = 3,

    UnexpectedToken = 10,
    MissingExpression = 11,

    DuplicateInput = 20,
    DuplicateOutput = 21,
    DuplicateVariable = 22,
    MissingDeclaration = 23,
    UndeclaredVariable = 24,
    AssignmentToInput = 25,
    DuplicateEquation = 26,
    MissingEquation = 27,
    WidthMismatch = 28,
    IndexOutOfRange = 29,
    InvalidSliceBounds = 30,
    LiteralTooWide = 31,
    InvalidBusSize = 32,

    CombinationalCycle = 40,

    UnusedBinding = 50,
    MemorySizeMismatch = 51,
    UninitialisedMemory = 52,
    MissingInput = 53,
    MalformedBinding = 54,

    FileError = 60,
    InvalidCommandLine = 61,

    InternalInvariant = 92,
}

/// A single diagnostic: a severity, a stable code, an optional source
/// position and a message.
///
/// Warnings are printed as they are produced and do not interrupt the
/// current phase. Errors are returned up the call chain and abort it.
#[derive(Debug)]
pub struct Report {
    file: String,
    severity: Severity,
    code: Code,
    position: Option<SourcePosition>,
    message: String,
}

impl Report {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn position(&self) -> Option<SourcePosition> {
        self.position
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prints the report to stderr.
    pub fn print(&self) {
        eprintln!("{}", self);
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(
                f,
                "{}:{}: {} [{:03}]: {}",
                self.file, position, self.severity, self.code as u32, self.message
            ),
            None => write!(
                f,
                "{}: {} [{:03}]: {}",
                self.file, self.severity, self.code as u32, self.message
            ),
        }
    }
}

impl std::error::Error for Report {}

/// Builder for a [`Report`], obtained from [`ReportContext::report`].
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    pub fn with_location(mut self, position: SourcePosition) -> Self {
        self.report.position = Some(position);
        self
    }

    pub fn with_code(mut self, code: Code) -> Self {
        self.report.code = code;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.report.message = message.into();
        self
    }

    pub fn build(self) -> Report {
        self.report
    }
}

/// Shared state for diagnostics of one source file.
#[derive(Debug, Clone)]
pub struct ReportContext {
    file_name: String,
}

impl ReportContext {
    pub fn new(file_name: impl Into<String>) -> Self {
        ReportContext {
            file_name: file_name.into(),
        }
    }

    pub fn report(&self, severity: Severity) -> ReportBuilder {
        ReportBuilder {
            report: Report {
                file: self.file_name.clone(),
                severity,
                code: Code::InternalInvariant,
                position: None,
                message: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_formatting() {
        let ctx = ReportContext::new("adder.net");
        let report = ctx
            .report(Severity::Error)
            .with_location(SourcePosition { line: 3, column: 7 })
            .with_code(Code::WidthMismatch)
            .with_message("mismatched bus sizes")
            .build();

        assert_eq!(
            report.to_string(),
            "adder.net:3:7: error [028]: mismatched bus sizes"
        );
        assert_eq!(report.code(), Code::WidthMismatch);
    }
}
