//! Tree-walking evaluator for the sandboxed expression grammar.
//!
//! The evaluator never touches the host environment: identifiers resolve
//! only through the caller-supplied [`Scope`], and the only callable
//! surface is the `Math.<fn>` whitelist below. A per-call deadline bounds
//! pathological recursive expressions.

use std::time::{Duration, Instant};

use crate::ast::{BinOp, Expr, Literal, UnOp};
use crate::error::EvalError;

/// Runtime value produced by evaluating an [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value; also the result of resolving an unknown identifier
    Null,
    /// Boolean
    Bool(bool),
    /// All numbers are `f64`; integers and floats are not distinguished
    Number(f64),
    /// String
    Str(String),
}

impl Value {
    /// Truthiness used by `&&`, `||`, `!`, and ternary conditions.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// Resolves dotted identifier chains (`data.temp`, `instance.state`, ...) to
/// runtime [`Value`]s. Implemented separately by the state-machine annotator
/// and the reducer, since each exposes a different set of roots.
///
/// An identifier this implementation does not recognize resolves to
/// [`Value::Null`] rather than erroring.
pub trait Scope {
    /// Resolve a dotted identifier chain, e.g. `["data", "temp"]`.
    fn resolve(&self, path: &[String]) -> Value;
}

/// Default time budget for a single `eval` call.
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(25);

struct Budget {
    deadline: Instant,
}

impl Budget {
    fn check(&self) -> Result<(), EvalError> {
        if Instant::now() > self.deadline {
            Err(EvalError::TimeBudgetExceeded)
        } else {
            Ok(())
        }
    }
}

/// Evaluate `expr` against `scope`, aborting if evaluation runs past `budget`.
pub fn eval_with_budget(expr: &Expr, scope: &dyn Scope, budget: Duration) -> Result<Value, EvalError> {
    let b = Budget {
        deadline: Instant::now() + budget,
    };
    eval_inner(expr, scope, &b)
}

/// Evaluate `expr` against `scope` using [`DEFAULT_BUDGET`].
pub fn eval(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    eval_with_budget(expr, scope, DEFAULT_BUDGET)
}

fn eval_inner(expr: &Expr, scope: &dyn Scope, budget: &Budget) -> Result<Value, EvalError> {
    budget.check()?;
    match expr {
        Expr::Literal(Literal::Null) => Ok(Value::Null),
        Expr::Literal(Literal::Bool(b)) => Ok(Value::Bool(*b)),
        Expr::Literal(Literal::Number(n)) => Ok(Value::Number(*n)),
        Expr::Literal(Literal::Str(s)) => Ok(Value::Str(s.clone())),
        Expr::Group(inner) => eval_inner(inner, scope, budget),
        Expr::Ident(path) => Ok(scope.resolve(path)),
        Expr::Unary(UnOp::Not, inner) => Ok(Value::Bool(!eval_inner(inner, scope, budget)?.truthy())),
        Expr::Unary(UnOp::Neg, inner) => {
            let v = eval_inner(inner, scope, budget)?;
            let n = v.as_number().ok_or_else(|| EvalError::NotANumber(format!("{v:?}")))?;
            Ok(Value::Number(-n))
        }
        Expr::Ternary(cond, then, otherwise) => {
            if eval_inner(cond, scope, budget)?.truthy() {
                eval_inner(then, scope, budget)
            } else {
                eval_inner(otherwise, scope, budget)
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, scope, budget),
        Expr::Call(callee, args) => eval_call(callee, args, scope, budget),
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, scope: &dyn Scope, budget: &Budget) -> Result<Value, EvalError> {
    // && and || short-circuit, so the rhs is only evaluated when needed.
    if op == BinOp::And {
        let l = eval_inner(lhs, scope, budget)?;
        return if !l.truthy() {
            Ok(Value::Bool(false))
        } else {
            Ok(Value::Bool(eval_inner(rhs, scope, budget)?.truthy()))
        };
    }
    if op == BinOp::Or {
        let l = eval_inner(lhs, scope, budget)?;
        return if l.truthy() {
            Ok(Value::Bool(true))
        } else {
            Ok(Value::Bool(eval_inner(rhs, scope, budget)?.truthy()))
        };
    }

    let l = eval_inner(lhs, scope, budget)?;
    let r = eval_inner(rhs, scope, budget)?;
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            // A comparison against null (missing identifier) is always false
            // rather than a type error.
            let (Some(ln), Some(rn)) = (l.as_number(), r.as_number()) else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ln < rn,
                BinOp::Le => ln <= rn,
                BinOp::Gt => ln > rn,
                BinOp::Ge => ln >= rn,
                _ => unreachable!(),
            }))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let ln = l.as_number().ok_or_else(|| EvalError::NotANumber(format!("{l:?}")))?;
            let rn = r.as_number().ok_or_else(|| EvalError::NotANumber(format!("{r:?}")))?;
            Ok(Value::Number(match op {
                BinOp::Add => ln + rn,
                BinOp::Sub => ln - rn,
                BinOp::Mul => ln * rn,
                BinOp::Div => ln / rn,
                _ => unreachable!(),
            }))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn eval_call(callee: &Expr, args: &[Expr], scope: &dyn Scope, budget: &Budget) -> Result<Value, EvalError> {
    let Expr::Ident(path) = callee else {
        return Err(EvalError::UnknownFunction(format!("{callee:?}")));
    };
    if path.len() != 2 || path[0] != "Math" {
        return Err(EvalError::UnknownFunction(path.join(".")));
    }
    let argv = args
        .iter()
        .map(|a| eval_inner(a, scope, budget))
        .collect::<Result<Vec<_>, _>>()?;
    call_math(&path[1], &argv)
}

fn arg_f64(fname: &str, argv: &[Value], i: usize) -> Result<f64, EvalError> {
    argv.get(i)
        .and_then(Value::as_number)
        .ok_or_else(|| EvalError::InvalidArgument(fname.to_string(), format!("missing or non-numeric argument {i}")))
}

/// The reducer's `Math.<fn>` whitelist: `abs, sign, min, max, floor, ceil,
/// round, sqrt, pow, log, exp`. Anything else is rejected.
fn call_math(name: &str, argv: &[Value]) -> Result<Value, EvalError> {
    let n = |i| arg_f64(name, argv, i);
    Ok(Value::Number(match name {
        "abs" => n(0)?.abs(),
        "sign" => n(0)?.signum(),
        "min" => n(0)?.min(n(1)?),
        "max" => n(0)?.max(n(1)?),
        "floor" => n(0)?.floor(),
        "ceil" => n(0)?.ceil(),
        "round" => n(0)?.round(),
        "sqrt" => n(0)?.sqrt(),
        "pow" => n(0)?.powf(n(1)?),
        "log" => n(0)?.ln(),
        "exp" => n(0)?.exp(),
        other => return Err(EvalError::UnknownFunction(format!("Math.{other}"))),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapScope(HashMap<String, Value>);
    impl Scope for MapScope {
        fn resolve(&self, path: &[String]) -> Value {
            self.0.get(&path.join(".")).cloned().unwrap_or(Value::Null)
        }
    }

    #[test]
    fn missing_identifier_resolves_null_and_compares_false() {
        let scope = MapScope(HashMap::new());
        let expr = crate::parser::parse("data.missing > 5").unwrap();
        assert_eq!(eval(&expr, &scope).unwrap(), Value::Bool(false));
    }

    #[test]
    fn math_whitelist_sqrt() {
        let mut m = HashMap::new();
        m.insert("data.x".to_string(), Value::Number(9.0));
        let scope = MapScope(m);
        let expr = crate::parser::parse("Math.sqrt(data.x)").unwrap();
        assert_eq!(eval(&expr, &scope).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn unknown_function_rejected() {
        let scope = MapScope(HashMap::new());
        let expr = crate::parser::parse("Math.exec(1)").unwrap();
        assert!(matches!(eval(&expr, &scope), Err(EvalError::UnknownFunction(_))));
    }

    #[test]
    fn short_circuit_and() {
        let scope = MapScope(HashMap::new());
        // rhs references an unknown function; if `&&` didn't short-circuit this would error.
        let expr = crate::parser::parse("false && Math.exec(1) == 1").unwrap();
        assert_eq!(eval(&expr, &scope).unwrap(), Value::Bool(false));
    }
}
