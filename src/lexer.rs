use logos::Logos;

use crate::report::{Code, Report, ReportContext, Severity, SourcePosition};

/// Tracks line boundaries so tokens can be reported as line:column pairs.
#[derive(Default)]
pub struct LexerExtras {
    line: u32,
    line_start: usize,
}

fn newline(lex: &mut logos::Lexer<Token>) -> logos::Skip {
    lex.extras.line += 1;
    lex.extras.line_start = lex.span().end;
    logos::Skip
}

fn ident(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

fn digits(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

/// Strips the `0b`/`0d`/`0x` prefix, keeping only the digits.
fn prefixed_digits(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice()[2..].to_string()
}

/// One token of a netlist source file. Keywords are case-insensitive.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(extras = LexerExtras)]
pub enum Token {
    #[token("INPUT", ignore(ascii_case))]
    Input,
    #[token("OUTPUT", ignore(ascii_case))]
    Output,
    #[token("VAR", ignore(ascii_case))]
    Var,
    #[token("IN", ignore(ascii_case))]
    In,

    #[token("NOT", ignore(ascii_case))]
    Not,
    #[token("AND", ignore(ascii_case))]
    And,
    #[token("NAND", ignore(ascii_case))]
    Nand,
    #[token("OR", ignore(ascii_case))]
    Or,
    #[token("NOR", ignore(ascii_case))]
    Nor,
    #[token("XOR", ignore(ascii_case))]
    Xor,
    #[token("XNOR", ignore(ascii_case))]
    Xnor,

    #[token("MUX", ignore(ascii_case))]
    Mux,
    #[token("REG", ignore(ascii_case))]
    Reg,
    #[token("CONCAT", ignore(ascii_case))]
    Concat,
    #[token("SELECT", ignore(ascii_case))]
    Select,
    #[token("SLICE", ignore(ascii_case))]
    Slice,
    #[token("ROM", ignore(ascii_case))]
    Rom,
    #[token("RAM", ignore(ascii_case))]
    Ram,

    #[token("=")]
    Equal,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,

    #[regex(r"[A-Za-z_][A-Za-z0-9_']*", ident)]
    Identifier(String),

    /// A bare integer. Interpreted in base 2 as a constant and in base 10
    /// as a bus size or bit index, so the spelling is kept as-is.
    #[regex(r"[0-9]+", digits)]
    Integer(String),

    #[regex(r"0b[01]*", prefixed_digits)]
    BinaryConstant(String),
    #[regex(r"0d[0-9]*", prefixed_digits)]
    DecimalConstant(String),
    #[regex(r"0x[0-9a-fA-F]*", prefixed_digits)]
    HexadecimalConstant(String),

    #[regex(r"[ \t\r\f]+", logos::skip)]
    Whitespace,
    #[token("\n", newline)]
    Newline,
    #[regex(r"#[^\n]*", logos::skip)]
    Comment,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Input => write!(f, "INPUT"),
            Token::Output => write!(f, "OUTPUT"),
            Token::Var => write!(f, "VAR"),
            Token::In => write!(f, "IN"),
            Token::Not => write!(f, "NOT"),
            Token::And => write!(f, "AND"),
            Token::Nand => write!(f, "NAND"),
            Token::Or => write!(f, "OR"),
            Token::Nor => write!(f, "NOR"),
            Token::Xor => write!(f, "XOR"),
            Token::Xnor => write!(f, "XNOR"),
            Token::Mux => write!(f, "MUX"),
            Token::Reg => write!(f, "REG"),
            Token::Concat => write!(f, "CONCAT"),
            Token::Select => write!(f, "SELECT"),
            Token::Slice => write!(f, "SLICE"),
            Token::Rom => write!(f, "ROM"),
            Token::Ram => write!(f, "RAM"),
            Token::Equal => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Integer(digits) => write!(f, "{}", digits),
            Token::BinaryConstant(digits) => write!(f, "0b{}", digits),
            Token::DecimalConstant(digits) => write!(f, "0d{}", digits),
            Token::HexadecimalConstant(digits) => write!(f, "0x{}", digits),
            Token::Whitespace | Token::Newline | Token::Comment => Ok(()),
        }
    }
}

/// A lazy stream of `(Token, SourcePosition)` pairs over one source file.
pub struct TokenStream<'a> {
    ctx: &'a ReportContext,
    lexer: logos::Lexer<'a, Token>,
}

impl<'a> TokenStream<'a> {
    pub fn new(ctx: &'a ReportContext, source: &'a str) -> Self {
        let mut lexer = Token::lexer(source);
        lexer.extras.line = 1;
        TokenStream { ctx, lexer }
    }

    /// Position of the most recently produced token (or of the end of the
    /// input once the stream is exhausted).
    pub fn position(&self) -> SourcePosition {
        SourcePosition {
            line: self.lexer.extras.line,
            column: (self.lexer.span().start - self.lexer.extras.line_start) as u32 + 1,
        }
    }

    /// Produces the next token, or `None` at the end of the input.
    pub fn next(&mut self) -> Result<Option<(Token, SourcePosition)>, Report> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some((token, self.position()))),
            Some(Err(())) => Err(self
                .ctx
                .report(Severity::Error)
                .with_location(self.position())
                .with_code(Code::UnknownCharacter)
                .with_message(format!(
                    "unknown character '{}' in input",
                    self.lexer.slice().escape_default()
                ))
                .build()),
        }
    }
}
