//! Parser for the embedded expression sub-language.

use super::lexer::Token;
use super::lexer::tokenize;

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    /// Numeric negation.
    Negate,
    /// Logical not.
    Not,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    /// Addition or string concatenation.
    Add,
    /// Subtraction.
    Subtract,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
    /// Remainder.
    Remainder,
    /// Equality.
    Equal,
    /// Inequality.
    NotEqual,
    /// Less-than.
    Less,
    /// Less-than-or-equal.
    LessEqual,
    /// Greater-than.
    Greater,
    /// Greater-than-or-equal.
    GreaterEqual,
    /// Logical and.
    And,
    /// Logical or.
    Or,
}

/// An expression of the sub-language.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// The `null` literal.
    Null,
    /// A boolean literal.
    Bool(bool),
    /// An integer literal.
    Int(i64),
    /// A floating point literal.
    Float(f64),
    /// A string literal.
    String(String),
    /// An identifier reference.
    Ident(String),
    /// A member access.
    Member(Box<Expr>, String),
    /// An index access.
    Index(Box<Expr>, Box<Expr>),
    /// A call of a library function.
    Call(String, Vec<Expr>),
    /// A unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A conditional (`cond ? then : else`) expression.
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// A statement of a script body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    /// A `var name = expr;` declaration.
    Var(String, Expr),
    /// A `return expr;` statement.
    Return(Expr),
    /// A bare expression statement.
    Expr(Expr),
}

/// A function defined by an expression library.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Function {
    /// The parameter names.
    pub params: Vec<String>,
    /// The body statements.
    pub body: Vec<Stmt>,
}

/// Parses a parameter reference expression.
pub(crate) fn parse_expression(source: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parses a script body into its statements.
pub(crate) fn parse_body(source: &str) -> Result<Vec<Stmt>, String> {
    let mut parser = Parser::new(source)?;
    let body = parser.body()?;
    parser.expect_end()?;
    Ok(body)
}

/// Parses an expression library into its function definitions.
pub(crate) fn parse_library(source: &str) -> Result<Vec<(String, Function)>, String> {
    let mut parser = Parser::new(source)?;
    let mut functions = Vec::new();
    while !parser.at_end() {
        functions.push(parser.function()?);
    }
    Ok(functions)
}

/// A recursive descent parser over a tokenized source.
struct Parser<'s> {
    /// The tokens paired with their source slices.
    tokens: Vec<(Token, &'s str)>,
    /// The index of the next token.
    pos: usize,
}

impl<'s> Parser<'s> {
    /// Constructs a parser by tokenizing the source.
    fn new(source: &'s str) -> Result<Self, String> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    /// Peeks at the next token without consuming it.
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(t, _)| *t)
    }

    /// Consumes and returns the next token and its slice.
    fn next(&mut self) -> Result<(Token, &'s str), String> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;
        Ok(token)
    }

    /// Consumes the next token if it matches.
    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Consumes the next token, requiring it to match.
    fn expect(&mut self, token: Token) -> Result<&'s str, String> {
        let (actual, slice) = self.next()?;
        if actual != token {
            return Err(format!("unexpected token `{slice}`"));
        }
        Ok(slice)
    }

    /// Determines if all tokens have been consumed.
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Requires that all tokens have been consumed.
    fn expect_end(&self) -> Result<(), String> {
        match self.tokens.get(self.pos) {
            Some((_, slice)) => Err(format!("unexpected trailing token `{slice}`")),
            None => Ok(()),
        }
    }

    /// Parses a `function name(params) { body }` definition.
    fn function(&mut self) -> Result<(String, Function), String> {
        self.expect(Token::FunctionKeyword)?;
        let name = self.expect(Token::Ident)?.to_string();
        self.expect(Token::OpenParen)?;
        let mut params = Vec::new();
        if !self.eat(Token::CloseParen) {
            loop {
                params.push(self.expect(Token::Ident)?.to_string());
                if !self.eat(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
        }
        self.expect(Token::OpenBrace)?;
        let mut body = Vec::new();
        while !self.eat(Token::CloseBrace) {
            body.push(self.statement()?);
        }
        Ok((name, Function { params, body }))
    }

    /// Parses a sequence of statements until the end of input.
    fn body(&mut self) -> Result<Vec<Stmt>, String> {
        let mut body = Vec::new();
        while !self.at_end() {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    /// Parses a single statement.
    ///
    /// The trailing semicolon is optional for the final statement of a
    /// body.
    fn statement(&mut self) -> Result<Stmt, String> {
        let stmt = match self.peek() {
            Some(Token::VarKeyword) => {
                self.next()?;
                let name = self.expect(Token::Ident)?.to_string();
                self.expect(Token::Assign)?;
                Stmt::Var(name, self.expression()?)
            }
            Some(Token::ReturnKeyword) => {
                self.next()?;
                Stmt::Return(self.expression()?)
            }
            _ => Stmt::Expr(self.expression()?),
        };
        self.eat(Token::Semicolon);
        Ok(stmt)
    }

    /// Parses a conditional expression.
    fn expression(&mut self) -> Result<Expr, String> {
        let cond = self.logical_or()?;
        if self.eat(Token::Question) {
            let then = self.expression()?;
            self.expect(Token::Colon)?;
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    /// Parses a logical or expression.
    fn logical_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.logical_and()?;
        while self.eat(Token::LogicalOr) {
            let rhs = self.logical_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses a logical and expression.
    fn logical_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.equality()?;
        while self.eat(Token::LogicalAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses an equality expression.
    fn equality(&mut self) -> Result<Expr, String> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Equal,
                Some(Token::NotEqual) => BinaryOp::NotEqual,
                _ => break,
            };
            self.next()?;
            let rhs = self.relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses a relational expression.
    fn relational(&mut self) -> Result<Expr, String> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::LessEqual) => BinaryOp::LessEqual,
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.next()?;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses an additive expression.
    fn additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.next()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses a multiplicative expression.
    fn multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Remainder,
                _ => break,
            };
            self.next()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses a unary expression.
    fn unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Exclamation) => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.next()?;
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    /// Parses member accesses, index accesses, and calls.
    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(Token::Dot) {
                let member = self.expect(Token::Ident)?.to_string();
                expr = Expr::Member(Box::new(expr), member);
            } else if self.eat(Token::OpenBracket) {
                let index = self.expression()?;
                self.expect(Token::CloseBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek() == Some(Token::OpenParen) {
                // Only library functions are callable.
                let Expr::Ident(name) = expr else {
                    return Err("only named library functions may be called".to_string());
                };
                self.next()?;
                let mut args = Vec::new();
                if !self.eat(Token::CloseParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::CloseParen)?;
                }
                expr = Expr::Call(name, args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses a primary expression.
    fn primary(&mut self) -> Result<Expr, String> {
        let (token, slice) = self.next()?;
        Ok(match token {
            Token::NullKeyword => Expr::Null,
            Token::TrueKeyword => Expr::Bool(true),
            Token::FalseKeyword => Expr::Bool(false),
            Token::Integer => Expr::Int(
                slice
                    .parse()
                    .map_err(|_| format!("integer literal `{slice}` is out of range"))?,
            ),
            Token::Float => Expr::Float(
                slice
                    .parse()
                    .map_err(|_| format!("invalid float literal `{slice}`"))?,
            ),
            Token::String => Expr::String(unescape(&slice[1..slice.len() - 1])),
            Token::Ident => Expr::Ident(slice.to_string()),
            Token::OpenParen => {
                let expr = self.expression()?;
                self.expect(Token::CloseParen)?;
                expr
            }
            _ => return Err(format!("unexpected token `{slice}`")),
        })
    }
}

/// Resolves escape sequences within a string literal body.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(c) => out.push(c),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_member_and_index_chains() {
        let expr = parse_expression("inputs.files[0].path").expect("should parse");
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Index(
                    Box::new(Expr::Member(
                        Box::new(Expr::Ident("inputs".to_string())),
                        "files".to_string(),
                    )),
                    Box::new(Expr::Int(0)),
                )),
                "path".to_string(),
            )
        );
    }

    #[test]
    fn parses_operator_precedence() {
        let expr = parse_expression("1 + 2 * 3").expect("should parse");
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Int(1)),
                Box::new(Expr::Binary(
                    BinaryOp::Multiply,
                    Box::new(Expr::Int(2)),
                    Box::new(Expr::Int(3)),
                )),
            )
        );
    }

    #[test]
    fn parses_a_script_body() {
        let body = parse_body("var x = 1; return x + 1").expect("should parse");
        assert_eq!(
            body,
            vec![
                Stmt::Var("x".to_string(), Expr::Int(1)),
                Stmt::Return(Expr::Binary(
                    BinaryOp::Add,
                    Box::new(Expr::Ident("x".to_string())),
                    Box::new(Expr::Int(1)),
                )),
            ]
        );
    }

    #[test]
    fn parses_a_library() {
        let functions =
            parse_library("function double(x) { return x * 2; }").expect("should parse");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].0, "double");
        assert_eq!(functions[0].1.params, vec!["x".to_string()]);
    }

    #[test]
    fn rejects_trailing_tokens() {
        parse_expression("1 1").expect_err("should not parse");
    }
}
