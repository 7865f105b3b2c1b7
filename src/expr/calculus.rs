//! Symbolic differentiation and algebraic simplification.

use super::ast::{pow, Expr, Func};

fn num(n: f64) -> Expr {
    Expr::Num(n)
}

fn add(a: Expr, b: Expr) -> Expr {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => num(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Add(Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => num(x - y),
        (Some(x), _) if x == 0.0 => neg(b),
        (_, Some(y)) if y == 0.0 => a,
        _ if a == b => num(0.0),
        _ => Expr::Sub(Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => num(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => num(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        (Some(x), _) if x == -1.0 => neg(b),
        (_, Some(y)) if y == -1.0 => neg(a),
        // keep literals on the left
        (None, Some(_)) => Expr::Mul(Box::new(b), Box::new(a)),
        _ => Expr::Mul(Box::new(a), Box::new(b)),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) if y != 0.0 => num(x / y),
        (Some(x), _) if x == 0.0 => num(0.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Div(Box::new(a), Box::new(b)),
    }
}

fn power(a: Expr, b: Expr) -> Expr {
    match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => num(pow(x, y)),
        (_, Some(y)) if y == 0.0 => num(1.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Pow(Box::new(a), Box::new(b)),
    }
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Num(n) => num(-n),
        Expr::Neg(inner) => *inner,
        other => Expr::Neg(Box::new(other)),
    }
}

fn call(func: Func, a: Expr) -> Expr {
    Expr::Call(func, Box::new(a))
}

impl Expr {
    /// Simplify bottom-up: fold literal arithmetic and drop additive and
    /// multiplicative identities. The result evaluates to the same value.
    #[must_use]
    pub fn simplify(&self) -> Expr {
        match self {
            Self::Num(_) | Self::Const(_) | Self::Var(_) => self.clone(),
            Self::Neg(a) => neg(a.simplify()),
            Self::Add(a, b) => add(a.simplify(), b.simplify()),
            Self::Sub(a, b) => sub(a.simplify(), b.simplify()),
            Self::Mul(a, b) => mul(a.simplify(), b.simplify()),
            Self::Div(a, b) => div(a.simplify(), b.simplify()),
            Self::Pow(a, b) => power(a.simplify(), b.simplify()),
            Self::Call(f, a) => call(*f, a.simplify()),
        }
    }

    /// Partial derivative with respect to `var`, simplified.
    #[must_use]
    pub fn derivative(&self, var: &str) -> Expr {
        self.differentiate(var).simplify()
    }

    fn differentiate(&self, var: &str) -> Expr {
        if !self.depends_on(var) {
            return num(0.0);
        }
        match self {
            Self::Num(_) | Self::Const(_) => num(0.0),
            Self::Var(_) => num(1.0),
            Self::Neg(a) => neg(a.differentiate(var)),
            Self::Add(a, b) => add(a.differentiate(var), b.differentiate(var)),
            Self::Sub(a, b) => sub(a.differentiate(var), b.differentiate(var)),
            Self::Mul(a, b) => add(
                mul(a.differentiate(var), (**b).clone()),
                mul((**a).clone(), b.differentiate(var)),
            ),
            Self::Div(a, b) => div(
                sub(
                    mul(a.differentiate(var), (**b).clone()),
                    mul((**a).clone(), b.differentiate(var)),
                ),
                power((**b).clone(), num(2.0)),
            ),
            Self::Pow(a, b) => {
                let (a, b) = (&**a, &**b);
                if !b.depends_on(var) {
                    // d(a^n) = n a^(n-1) a'
                    mul(
                        mul(b.clone(), power(a.clone(), sub(b.clone(), num(1.0)))),
                        a.differentiate(var),
                    )
                } else if !a.depends_on(var) {
                    // d(c^b) = c^b ln(c) b'
                    mul(
                        mul(self.clone(), call(Func::Ln, a.clone())),
                        b.differentiate(var),
                    )
                } else {
                    // d(a^b) = a^b (b' ln a + b a' / a)
                    mul(
                        self.clone(),
                        add(
                            mul(b.differentiate(var), call(Func::Ln, a.clone())),
                            div(mul(b.clone(), a.differentiate(var)), a.clone()),
                        ),
                    )
                }
            }
            Self::Call(func, a) => {
                let inner = a.differentiate(var);
                let a = (**a).clone();
                let outer = match func {
                    Func::Ln => div(num(1.0), a),
                    Func::Exp => self.clone(),
                    Func::Sqrt => div(num(1.0), mul(num(2.0), self.clone())),
                    Func::Sin => call(Func::Cos, a),
                    Func::Cos => neg(call(Func::Sin, a)),
                    Func::Tan => div(num(1.0), power(call(Func::Cos, a), num(2.0))),
                    Func::Abs => div(a, self.clone()),
                };
                mul(outer, inner)
            }
        }
    }
}
