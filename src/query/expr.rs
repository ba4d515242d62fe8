/// Scalar expressions
///
/// A backend-neutral expression tree used by WHERE clauses, assignments,
/// selectors and inserted values. The SQLite backend only renders it back
/// to SQL; the in-memory store evaluates it row by row.
use crate::core::{Result, SqlFrontError, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Concat => "||",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

const AGGREGATES: &[&str] = &["COUNT", "SUM", "AVG", "MIN", "MAX", "TOTAL", "GROUP_CONCAT"];

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference; table qualifiers are dropped.
    Column(String),
    Literal(Value),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        /// `COUNT(*)` style argument.
        wildcard: bool,
    },
    /// SQL the expression model cannot represent; kept verbatim.
    Raw(String),
}

impl Expr {
    pub fn column(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// True when the expression contains an aggregate function call.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expr::Function { name, args, .. } => {
                AGGREGATES.contains(&name.to_uppercase().as_str())
                    || args.iter().any(Expr::is_aggregate)
            }
            Expr::Binary { left, right, .. } => left.is_aggregate() || right.is_aggregate(),
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.is_aggregate(),
            Expr::InList { expr, list, .. } => {
                expr.is_aggregate() || list.iter().any(Expr::is_aggregate)
            }
            Expr::Between { expr, low, high, .. } => {
                expr.is_aggregate() || low.is_aggregate() || high.is_aggregate()
            }
            Expr::Like { expr, pattern, .. } => expr.is_aggregate() || pattern.is_aggregate(),
            Expr::Column(_) | Expr::Literal(_) | Expr::Raw(_) => false,
        }
    }

    /// Collects every column name the expression references.
    pub fn referenced_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => out.push(name),
            Expr::Literal(_) | Expr::Raw(_) => {}
            Expr::Binary { left, right, .. } => {
                left.referenced_columns(out);
                right.referenced_columns(out);
            }
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.referenced_columns(out),
            Expr::InList { expr, list, .. } => {
                expr.referenced_columns(out);
                list.iter().for_each(|e| e.referenced_columns(out));
            }
            Expr::Between { expr, low, high, .. } => {
                expr.referenced_columns(out);
                low.referenced_columns(out);
                high.referenced_columns(out);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.referenced_columns(out);
                pattern.referenced_columns(out);
            }
            Expr::Function { args, .. } => args.iter().for_each(|e| e.referenced_columns(out)),
        }
    }

    /// Evaluates the expression against one row.
    ///
    /// # Arguments
    ///
    /// * `resolve` - Returns the value of a named column in the current row
    pub fn eval<F>(&self, resolve: &F) -> Result<Value>
    where
        F: Fn(&str) -> Result<Value>,
    {
        match self {
            Expr::Column(name) => resolve(name),
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Binary { left, op, right } => {
                let l = left.eval(resolve)?;
                // AND/OR need three-valued logic before looking at the right side
                match op {
                    BinaryOp::And if !l.is_null() && !l.is_truthy() => return Ok(Value::Integer(0)),
                    BinaryOp::Or if l.is_truthy() => return Ok(Value::Integer(1)),
                    _ => {}
                }
                let r = right.eval(resolve)?;
                eval_binary(&l, *op, &r)
            }
            Expr::Unary { op, expr } => {
                let v = expr.eval(resolve)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                match op {
                    UnaryOp::Not => Ok(bool_value(!v.is_truthy())),
                    UnaryOp::Plus => Ok(v),
                    UnaryOp::Minus => match v {
                        Value::Integer(i) => Ok(i
                            .checked_neg()
                            .map(Value::Integer)
                            .unwrap_or(Value::Real(-(i as f64)))),
                        other => other
                            .as_f64()
                            .map(|f| Value::Real(-f))
                            .ok_or_else(|| SqlFrontError::Conversion(format!("cannot negate {}", other))),
                    },
                }
            }
            Expr::IsNull { expr, negated } => {
                let is_null = expr.eval(resolve)?.is_null();
                Ok(bool_value(is_null != *negated))
            }
            Expr::InList { expr, list, negated } => {
                let v = expr.eval(resolve)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let candidate = item.eval(resolve)?;
                    match v.sql_cmp(&candidate) {
                        Some(Ordering::Equal) => return Ok(bool_value(!*negated)),
                        None => saw_null = true,
                        _ => {}
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(bool_value(*negated))
                }
            }
            Expr::Between { expr, low, high, negated } => {
                let v = expr.eval(resolve)?;
                let (lo, hi) = (low.eval(resolve)?, high.eval(resolve)?);
                match (v.sql_cmp(&lo), v.sql_cmp(&hi)) {
                    (Some(a), Some(b)) => {
                        let inside = a != Ordering::Less && b != Ordering::Greater;
                        Ok(bool_value(inside != *negated))
                    }
                    _ => Ok(Value::Null),
                }
            }
            Expr::Like { expr, pattern, negated } => {
                let v = expr.eval(resolve)?;
                let p = pattern.eval(resolve)?;
                if v.is_null() || p.is_null() {
                    return Ok(Value::Null);
                }
                let matched = like_regex(&p.to_string())?.is_match(&v.to_string());
                Ok(bool_value(matched != *negated))
            }
            Expr::Function { name, args, .. } => {
                let values = args
                    .iter()
                    .map(|a| a.eval(resolve))
                    .collect::<Result<Vec<_>>>()?;
                eval_function(name, values)
            }
            Expr::Raw(sql) => Err(SqlFrontError::NotImplemented(format!("expression '{}'", sql))),
        }
    }

    /// Evaluates a predicate; NULL counts as false.
    pub fn matches<F>(&self, resolve: &F) -> Result<bool>
    where
        F: Fn(&str) -> Result<Value>,
    {
        Ok(self.eval(resolve)?.is_truthy())
    }
}

fn bool_value(b: bool) -> Value {
    Value::Integer(if b { 1 } else { 0 })
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::And => {
            if !r.is_null() && !r.is_truthy() {
                Ok(bool_value(false))
            } else if l.is_null() || r.is_null() {
                Ok(Value::Null)
            } else {
                Ok(bool_value(true))
            }
        }
        BinaryOp::Or => {
            if r.is_truthy() {
                Ok(bool_value(true))
            } else if l.is_null() || r.is_null() {
                Ok(Value::Null)
            } else {
                Ok(bool_value(false))
            }
        }
        _ if l.is_null() || r.is_null() => Ok(Value::Null),
        BinaryOp::Concat => Ok(Value::Text(format!("{}{}", l, r))),
        BinaryOp::Eq => Ok(bool_value(l.sql_cmp(r) == Some(Ordering::Equal))),
        BinaryOp::NotEq => Ok(bool_value(l.sql_cmp(r) != Some(Ordering::Equal))),
        BinaryOp::Lt => Ok(bool_value(l.sql_cmp(r) == Some(Ordering::Less))),
        BinaryOp::LtEq => Ok(bool_value(l.sql_cmp(r) != Some(Ordering::Greater))),
        BinaryOp::Gt => Ok(bool_value(l.sql_cmp(r) == Some(Ordering::Greater))),
        BinaryOp::GtEq => Ok(bool_value(l.sql_cmp(r) != Some(Ordering::Less))),
        BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
            eval_arithmetic(l, op, r)
        }
    }
}

fn eval_arithmetic(l: &Value, op: BinaryOp, r: &Value) -> Result<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        let (a, b) = (*a, *b);
        return Ok(match op {
            BinaryOp::Divide | BinaryOp::Modulo if b == 0 => Value::Null,
            BinaryOp::Plus => checked_or_real(a.checked_add(b), a as f64 + b as f64),
            BinaryOp::Minus => checked_or_real(a.checked_sub(b), a as f64 - b as f64),
            BinaryOp::Multiply => checked_or_real(a.checked_mul(b), a as f64 * b as f64),
            BinaryOp::Divide => checked_or_real(a.checked_div(b), a as f64 / b as f64),
            // i64::MIN % -1 overflows but is 0
            _ => Value::Integer(a.checked_rem(b).unwrap_or(0)),
        });
    }
    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(SqlFrontError::Conversion(format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                l,
                r
            )))
        }
    };
    Ok(match op {
        BinaryOp::Plus => Value::Real(a + b),
        BinaryOp::Minus => Value::Real(a - b),
        BinaryOp::Multiply => Value::Real(a * b),
        BinaryOp::Divide if b == 0.0 => Value::Null,
        BinaryOp::Divide => Value::Real(a / b),
        BinaryOp::Modulo if b == 0.0 => Value::Null,
        _ => Value::Real(a % b),
    })
}

/// Integer overflow falls back to a real result.
fn checked_or_real(result: Option<i64>, real: f64) -> Value {
    match result {
        Some(i) => Value::Integer(i),
        None => Value::Real(real),
    }
}

fn eval_function(name: &str, args: Vec<Value>) -> Result<Value> {
    let upper = name.to_uppercase();
    let first = args.first().cloned().unwrap_or(Value::Null);
    match upper.as_str() {
        "UPPER" => Ok(map_text(first, |s| s.to_uppercase())),
        "LOWER" => Ok(map_text(first, |s| s.to_lowercase())),
        "LENGTH" => Ok(match first {
            Value::Null => Value::Null,
            Value::Blob(b) => Value::Integer(b.len() as i64),
            other => Value::Integer(other.to_string().chars().count() as i64),
        }),
        "ABS" => Ok(match first {
            Value::Null => Value::Null,
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .unwrap_or(Value::Real((i as f64).abs())),
            other => other.as_f64().map(|f| Value::Real(f.abs())).unwrap_or(Value::Null),
        }),
        "COALESCE" | "IFNULL" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        _ => Err(SqlFrontError::NotImplemented(format!("function {}", upper))),
    }
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        other => Value::Text(f(&other.to_string())),
    }
}

/// Translates a SQL LIKE pattern into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| SqlFrontError::App(e.to_string()))
}

fn operand(expr: &Expr) -> String {
    match expr {
        Expr::Binary { .. } => format!("({})", expr),
        other => other.to_string(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(v) => write!(f, "{}", v.to_sql_literal()),
            Expr::Binary { left, op, right } => {
                write!(f, "{} {} {}", operand(left), op.symbol(), operand(right))
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {}", expr),
                UnaryOp::Minus => write!(f, "-{}", expr),
                UnaryOp::Plus => write!(f, "+{}", expr),
            },
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::InList { expr, list, negated } => {
                let items: Vec<String> = list.iter().map(|e| e.to_string()).collect();
                write!(
                    f,
                    "{} {}IN ({})",
                    expr,
                    if *negated { "NOT " } else { "" },
                    items.join(", ")
                )
            }
            Expr::Between { expr, low, high, negated } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::Like { expr, pattern, negated } => {
                write!(f, "{} {}LIKE {}", expr, if *negated { "NOT " } else { "" }, pattern)
            }
            Expr::Function { name, args, wildcard } => {
                if *wildcard {
                    return write!(f, "{}(*)", name);
                }
                let items: Vec<String> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{}({})", name, items.join(", "))
            }
            Expr::Raw(sql) => write!(f, "{}", sql),
        }
    }
}
