//! Expression tree, evaluation and printing.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{DriftError, Result};

/// Built-in unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    /// Natural logarithm (`log` or `ln`).
    Ln,
    /// Exponential.
    Exp,
    /// Square root.
    Sqrt,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
    /// Absolute value.
    Abs,
}

impl Func {
    /// Look up a function by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "log" | "ln" => Some(Self::Ln),
            "exp" => Some(Self::Exp),
            "sqrt" => Some(Self::Sqrt),
            "sin" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "tan" => Some(Self::Tan),
            "abs" => Some(Self::Abs),
            _ => None,
        }
    }

    /// Canonical name used when printing.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ln => "log",
            Self::Exp => "exp",
            Self::Sqrt => "sqrt",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Abs => "abs",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Ln => x.ln(),
            Self::Exp => x.exp(),
            Self::Sqrt => x.sqrt(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Abs => x.abs(),
        }
    }
}

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    /// `pi`.
    Pi,
    /// Euler's number, written `E`.
    E,
}

impl Constant {
    /// Look up a reserved constant name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Self::Pi),
            "E" => Some(Self::E),
            _ => None,
        }
    }

    /// Numeric value.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Pi => std::f64::consts::PI,
            Self::E => std::f64::consts::E,
        }
    }
}

/// Symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Named constant.
    Const(Constant),
    /// Attribute reference.
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    /// Function application.
    Call(Func, Box<Expr>),
}

/// Variable bindings used for evaluation.
pub type Bindings = BTreeMap<String, f64>;

impl Expr {
    /// Variable reference.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Numeric value if the expression is a literal.
    #[must_use]
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether the expression mentions `name`.
    #[must_use]
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Self::Num(_) | Self::Const(_) => false,
            Self::Var(v) => v == name,
            Self::Neg(a) | Self::Call(_, a) => a.depends_on(name),
            Self::Add(a, b) | Self::Sub(a, b) | Self::Mul(a, b) | Self::Div(a, b) | Self::Pow(a, b) => {
                a.depends_on(name) || b.depends_on(name)
            }
        }
    }

    /// Distinct variable names in order of first appearance.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Self::Num(_) | Self::Const(_) => {}
            Self::Var(v) => {
                if !names.contains(v) {
                    names.push(v.clone());
                }
            }
            Self::Neg(a) | Self::Call(_, a) => a.collect_variables(names),
            Self::Add(a, b) | Self::Sub(a, b) | Self::Mul(a, b) | Self::Div(a, b) | Self::Pow(a, b) => {
                a.collect_variables(names);
                b.collect_variables(names);
            }
        }
    }

    /// Evaluate with the given variable values.
    ///
    /// Domain errors (log of a negative, division by zero) yield NaN or
    /// infinity rather than an error.
    ///
    /// # Errors
    ///
    /// Returns a formula error when a variable has no binding.
    pub fn eval(&self, bindings: &Bindings) -> Result<f64> {
        Ok(match self {
            Self::Num(n) => *n,
            Self::Const(c) => c.value(),
            Self::Var(v) => *bindings.get(v).ok_or_else(|| {
                DriftError::formula(self.to_string(), format!("no value bound for '{v}'"))
            })?,
            Self::Neg(a) => -a.eval(bindings)?,
            Self::Add(a, b) => a.eval(bindings)? + b.eval(bindings)?,
            Self::Sub(a, b) => a.eval(bindings)? - b.eval(bindings)?,
            Self::Mul(a, b) => a.eval(bindings)? * b.eval(bindings)?,
            Self::Div(a, b) => a.eval(bindings)? / b.eval(bindings)?,
            Self::Pow(a, b) => pow(a.eval(bindings)?, b.eval(bindings)?),
            Self::Call(f, a) => f.apply(a.eval(bindings)?),
        })
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Add(..) | Self::Sub(..) => 1,
            Self::Mul(..) | Self::Div(..) => 2,
            Self::Neg(_) => 3,
            Self::Num(n) if *n < 0.0 => 3,
            Self::Pow(..) => 4,
            Self::Num(_) | Self::Const(_) | Self::Var(_) | Self::Call(..) => 5,
        }
    }
}

/// Integer exponents use `powi` so negative bases stay real.
pub(crate) fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= f64::from(i32::MAX) {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min_precedence: u8) -> fmt::Result {
    if expr.precedence() < min_precedence {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Const(Constant::Pi) => write!(f, "pi"),
            Self::Const(Constant::E) => write!(f, "E"),
            Self::Var(v) => write!(f, "{v}"),
            Self::Neg(a) => {
                write!(f, "-")?;
                write_operand(f, a, 4)
            }
            Self::Add(a, b) => {
                write_operand(f, a, 1)?;
                write!(f, " + ")?;
                write_operand(f, b, 2)
            }
            Self::Sub(a, b) => {
                write_operand(f, a, 1)?;
                write!(f, " - ")?;
                write_operand(f, b, 2)
            }
            Self::Mul(a, b) => {
                write_operand(f, a, 2)?;
                write!(f, "*")?;
                write_operand(f, b, 3)
            }
            Self::Div(a, b) => {
                write_operand(f, a, 2)?;
                write!(f, "/")?;
                write_operand(f, b, 4)
            }
            Self::Pow(a, b) => {
                write_operand(f, a, 5)?;
                write!(f, "**")?;
                write_operand(f, b, 4)
            }
            Self::Call(func, a) => write!(f, "{}({a})", func.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(e: Expr) -> Box<Expr> {
        Box::new(e)
    }

    #[test]
    fn test_eval_and_variables() {
        let expr = Expr::Add(
            b(Expr::Pow(b(Expr::var("x")), b(Expr::Num(2.0)))),
            b(Expr::Div(b(Expr::var("y")), b(Expr::var("x")))),
        );
        let bindings: Bindings = [("x".to_string(), 2.0), ("y".to_string(), 6.0)].into();
        assert_eq!(expr.eval(&bindings).unwrap(), 7.0);
        assert_eq!(expr.variables(), vec!["x", "y"]);
        assert!(expr.depends_on("y"));
        assert!(!expr.depends_on("z"));
    }

    #[test]
    fn test_eval_unbound_variable() {
        let err = Expr::var("z").eval(&Bindings::new()).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_negative_base_integer_power() {
        assert_eq!(pow(-2.0, 3.0), -8.0);
        assert!(pow(-2.0, 0.5).is_nan());
    }

    #[test]
    fn test_display_parenthesizes_by_precedence() {
        let sum = Expr::Add(b(Expr::var("a")), b(Expr::var("b")));
        let expr = Expr::Mul(b(sum.clone()), b(Expr::Neg(b(Expr::var("c")))));
        assert_eq!(expr.to_string(), "(a + b)*-c");

        let nested = Expr::Sub(b(Expr::var("a")), b(sum));
        assert_eq!(nested.to_string(), "a - (a + b)");

        let power = Expr::Pow(b(Expr::Num(-2.0)), b(Expr::Const(Constant::Pi)));
        assert_eq!(power.to_string(), "(-2)**pi");
        let call = Expr::Call(Func::Ln, b(Expr::var("x")));
        assert_eq!(call.to_string(), "log(x)");
    }
}
