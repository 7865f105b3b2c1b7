//! Symbolic expressions over attribute names.
//!
//! Formulas such as `x**2 + log(y)/z` are parsed into an [`Expr`] tree that
//! can be evaluated against bound attribute values and differentiated
//! symbolically. Supported syntax:
//!
//! - numeric literals, including scientific notation (`1.5e-3`)
//! - `+ - * /`, `**` or `^` for powers, unary minus, parentheses
//! - `log`/`ln` (natural), `exp`, `sqrt`, `sin`, `cos`, `tan`, `abs`
//! - the constants `pi` and `E`
//!
//! Any other identifier is a variable.

mod ast;
mod calculus;
mod lexer;
mod parser;

pub use ast::{Bindings, Constant, Expr, Func};

use crate::error::Result;

/// A parsed formula with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    variables: Vec<String>,
}

impl Formula {
    /// Parse a formula.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DriftError::Formula`] if the text cannot be
    /// tokenized or parsed.
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::Parser::new(source, &tokens).parse()?;
        let variables = expr.variables();
        Ok(Self {
            source: source.trim().to_string(),
            expr,
            variables,
        })
    }

    /// Source text as given (trimmed).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tree.
    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variables in order of first appearance.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Partial derivative with respect to `var`.
    #[must_use]
    pub fn derivative(&self, var: &str) -> Expr {
        self.expr.derivative(var)
    }

    /// Evaluate with bound variable values.
    ///
    /// # Errors
    ///
    /// Returns a formula error if a variable is unbound.
    pub fn eval(&self, bindings: &Bindings) -> Result<f64> {
        self.expr.eval(bindings)
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::str::FromStr for Formula {
    type Err = crate::error::DriftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_variables_exclude_constants() {
        let formula = Formula::parse("  x**2 + pi*y/E - log(x) ").unwrap();
        assert_eq!(formula.variables(), &["x".to_string(), "y".to_string()]);
        assert_eq!(formula.source(), "x**2 + pi*y/E - log(x)");
    }

    #[test]
    fn test_formula_parse_error_is_config_error() {
        let err: crate::error::DriftError = "x +* y".parse::<Formula>().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("x +* y"));
    }
}
