use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;

/// The closed operator set usable in motif constraints.
///
/// `=` and `<>` in motif source are aliases for `==` and `!=`; they are
/// normalized at lex time and never appear in the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    In,
    NotIn,
}

impl Op {
    /// Parse an operator token, accepting the `=`/`<>` aliases.
    pub fn from_token(token: &str) -> Option<Op> {
        match token {
            "=" | "==" => Some(Op::Eq),
            "!=" | "<>" => Some(Op::Ne),
            ">" => Some(Op::Gt),
            ">=" => Some(Op::Ge),
            "<" => Some(Op::Lt),
            "<=" => Some(Op::Le),
            "contains" => Some(Op::Contains),
            "!contains" => Some(Op::NotContains),
            "in" => Some(Op::In),
            "!in" => Some(Op::NotIn),
            _ => None,
        }
    }

    /// The canonical token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Contains => "contains",
            Op::NotContains => "!contains",
            Op::In => "in",
            Op::NotIn => "!in",
        }
    }

    /// Whether this operator succeeds vacuously when the attribute is absent.
    pub fn holds_on_missing(&self) -> bool {
        matches!(self, Op::Ne | Op::NotIn | Op::NotContains)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A typed attribute value.
///
/// `Ident` is an unquoted identifier from motif source; it carries string
/// content and compares textually equal to `Str`. `List` holds collection
/// attributes on the host side and the right-hand side of `in`/`!in`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    List(Vec<Value>),
}

impl Value {
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Order two values, or `None` when the types are incomparable.
    ///
    /// Numbers compare numerically, text compares lexicographically, and a
    /// number never compares against text. Lists never order.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.as_text(), other.as_text()) {
            return Some(a.cmp(b));
        }
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(v: Vec<V>) -> Value {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            // {:?} keeps the decimal point so the literal re-lexes as a float
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => {
                if s.contains('"') {
                    write!(f, "'{s}'")
                } else {
                    write!(f, "\"{s}\"")
                }
            }
            Value::Ident(s) => f.write_str(s),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

/// Does `collection contains needle` hold?
///
/// Lists test membership; text tests substring containment. Any other
/// left-hand type fails silently.
fn contains(collection: &Value, needle: &Value) -> bool {
    match collection {
        Value::List(items) => match needle {
            // A list needle requires every element to be present.
            Value::List(needles) => needles.iter().all(|n| items.contains(n)),
            _ => items.contains(needle),
        },
        Value::Str(s) | Value::Ident(s) => needle.as_text().is_some_and(|n| s.contains(n)),
        _ => false,
    }
}

/// Does `lhs` belong to the collection `rhs`?
///
/// A scalar `rhs` is treated as a one-element collection.
fn member_of(lhs: &Value, rhs: &Value) -> bool {
    match rhs {
        Value::List(items) => items.contains(lhs),
        scalar => lhs == scalar,
    }
}

/// Evaluate `lhs OP rhs` where `lhs` is a host attribute lookup.
///
/// A missing attribute satisfies only `!=`, `!in`, and `!contains`.
/// Type-mismatched order comparisons fail silently rather than erroring.
pub fn eval(op: Op, lhs: Option<&Value>, rhs: &Value) -> bool {
    let Some(lhs) = lhs else {
        return op.holds_on_missing();
    };
    match op {
        Op::Eq => lhs == rhs,
        Op::Ne => lhs != rhs,
        Op::Gt => lhs.compare(rhs) == Some(Ordering::Greater),
        Op::Ge => matches!(
            lhs.compare(rhs),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        Op::Lt => lhs.compare(rhs) == Some(Ordering::Less),
        Op::Le => matches!(lhs.compare(rhs), Some(Ordering::Less) | Some(Ordering::Equal)),
        Op::Contains => contains(lhs, rhs),
        Op::NotContains => !contains(lhs, rhs),
        Op::In => member_of(lhs, rhs),
        Op::NotIn => !member_of(lhs, rhs),
    }
}

/// Evaluate `lhs OP rhs` where both sides are attribute lookups.
///
/// Used by dynamic constraints: when either side is absent, the negated
/// operators hold vacuously and everything else fails.
pub fn eval_dynamic(op: Op, lhs: Option<&Value>, rhs: Option<&Value>) -> bool {
    match (lhs, rhs) {
        (Some(_), Some(rhs)) => eval(op, lhs, rhs),
        _ => op.holds_on_missing(),
    }
}
