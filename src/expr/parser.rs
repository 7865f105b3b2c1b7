//! Recursive-descent parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom (('**' | '^') unary)?
//! atom    := number | constant | name | func '(' sum ')' | '(' sum ')'
//! ```
//!
//! Power is right-associative and binds tighter than unary minus, so
//! `-x**2` is `-(x**2)` and `2**-1` is `2**(-1)`.

use super::ast::{Constant, Expr, Func};
use super::lexer::Token;
use crate::error::{DriftError, Result};

pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    /// Parse the whole token stream as one expression.
    pub(crate) fn parse(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(self.error("empty formula"));
        }
        let expr = self.parse_sum()?;
        if let Some(token) = self.peek() {
            return Err(self.error(format!("unexpected token after expression: {token:?}")));
        }
        Ok(expr)
    }

    fn error(&self, reason: impl Into<String>) -> DriftError {
        DriftError::formula(self.source, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            other => Err(self.error(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    let rhs = self.parse_product()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Minus) => {
                    self.advance();
                    let rhs = self.parse_product()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(*n)),
            Some(Token::LParen) => {
                let inner = self.parse_sum()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    let func = Func::from_name(name)
                        .ok_or_else(|| self.error(format!("unknown function '{name}'")))?;
                    self.advance();
                    let arg = self.parse_sum()?;
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else if let Some(constant) = Constant::from_name(name) {
                    Ok(Expr::Const(constant))
                } else if Func::from_name(name).is_some() {
                    Err(self.error(format!("function '{name}' used without arguments")))
                } else {
                    Ok(Expr::Var(name.clone()))
                }
            }
            other => Err(self.error(format!(
                "expected number, name or '(', got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::Bindings;
    use crate::expr::lexer::tokenize;

    fn parse(source: &str) -> Result<Expr> {
        let tokens = tokenize(source)?;
        Parser::new(source, &tokens).parse()
    }

    fn eval(source: &str, x: f64) -> f64 {
        let bindings: Bindings = [("x".to_string(), x)].into();
        parse(source).unwrap().eval(&bindings).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4", 0.0), 14.0);
        assert_eq!(eval("(2 + 3) * 4", 0.0), 20.0);
        assert_eq!(eval("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval("12 / 3 / 2", 0.0), 2.0);
    }

    #[test]
    fn test_power_right_associative_and_unary() {
        assert_eq!(eval("2 ** 3 ** 2", 0.0), 512.0);
        assert_eq!(eval("2 ^ 3", 0.0), 8.0);
        assert_eq!(eval("-x**2", 3.0), -9.0);
        assert_eq!(eval("2**-1", 0.0), 0.5);
        assert_eq!(eval("--x", 3.0), 3.0);
    }

    #[test]
    fn test_functions_and_constants() {
        assert!((eval("log(E)", 0.0) - 1.0).abs() < 1e-12);
        assert!((eval("ln(x)", 1.0)).abs() < 1e-12);
        assert!((eval("cos(pi)", 0.0) + 1.0).abs() < 1e-12);
        assert_eq!(eval("sqrt(abs(x))", -16.0), 4.0);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "x +", "(x", "x)", "foo(x)", "sqrt", "2 x", "* x"] {
            let err = parse(bad).unwrap_err();
            assert!(err.is_config_error(), "{bad}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for source in ["x**2 + y/z", "-x**2", "(a + b)*(a - b)", "log(x)*exp(-y)", "2**3**2"] {
            let expr = parse(source).unwrap();
            assert_eq!(parse(&expr.to_string()).unwrap(), expr, "{source}");
        }
    }
}
