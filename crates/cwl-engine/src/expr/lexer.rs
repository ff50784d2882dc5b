//! Tokens of the embedded expression sub-language.

use logos::Logos;

/// A token of the expression sub-language.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum Token {
    /// The `function` keyword.
    #[token("function")]
    FunctionKeyword,

    /// The `var` keyword.
    #[token("var")]
    VarKeyword,

    /// The `return` keyword.
    #[token("return")]
    ReturnKeyword,

    /// The `true` keyword.
    #[token("true")]
    TrueKeyword,

    /// The `false` keyword.
    #[token("false")]
    FalseKeyword,

    /// The `null` keyword.
    #[token("null")]
    NullKeyword,

    /// An identifier.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    /// An integer literal.
    #[regex(r"[0-9]+")]
    Integer,

    /// A floating point literal.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    Float,

    /// A single or double quoted string literal.
    ///
    /// Escape sequences are not validated by the lexer.
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    /// The `.` symbol.
    #[token(".")]
    Dot,

    /// The `,` symbol.
    #[token(",")]
    Comma,

    /// The `;` symbol.
    #[token(";")]
    Semicolon,

    /// The `=` symbol.
    #[token("=")]
    Assign,

    /// The `(` symbol.
    #[token("(")]
    OpenParen,

    /// The `)` symbol.
    #[token(")")]
    CloseParen,

    /// The `[` symbol.
    #[token("[")]
    OpenBracket,

    /// The `]` symbol.
    #[token("]")]
    CloseBracket,

    /// The `{` symbol.
    #[token("{")]
    OpenBrace,

    /// The `}` symbol.
    #[token("}")]
    CloseBrace,

    /// The `+` symbol.
    #[token("+")]
    Plus,

    /// The `-` symbol.
    #[token("-")]
    Minus,

    /// The `*` symbol.
    #[token("*")]
    Star,

    /// The `/` symbol.
    #[token("/")]
    Slash,

    /// The `%` symbol.
    #[token("%")]
    Percent,

    /// The `==` symbol.
    #[token("==")]
    Equal,

    /// The `!=` symbol.
    #[token("!=")]
    NotEqual,

    /// The `<` symbol.
    #[token("<")]
    Less,

    /// The `<=` symbol.
    #[token("<=")]
    LessEqual,

    /// The `>` symbol.
    #[token(">")]
    Greater,

    /// The `>=` symbol.
    #[token(">=")]
    GreaterEqual,

    /// The `&&` symbol.
    #[token("&&")]
    LogicalAnd,

    /// The `||` symbol.
    #[token("||")]
    LogicalOr,

    /// The `!` symbol.
    #[token("!")]
    Exclamation,

    /// The `?` symbol.
    #[token("?")]
    Question,

    /// The `:` symbol.
    #[token(":")]
    Colon,
}

/// Tokenizes a source string.
///
/// Returns the tokens paired with their source slices, or a message
/// naming the first unrecognized character sequence.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, &str)>, String> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.slice())),
            Err(_) => {
                return Err(format!(
                    "unexpected character sequence `{slice}`",
                    slice = lexer.slice()
                ));
            }
        }
    }

    Ok(tokens)
}
