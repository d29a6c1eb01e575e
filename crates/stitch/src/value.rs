//! Runtime values.
//!
//! Values form a closed sum. Small values (integers, booleans, strings) are
//! stored inline; nodes live in the evaluator's [`NodeArena`] and are
//! referenced by [`NodeId`], so cloning a `Value::Node` shares identity and
//! node graphs may contain cycles without ownership loops. Functions,
//! node types, and packages are shared behind `Rc` and capture their defining
//! environment as an [`EnvId`] into the evaluator's environment table.
//!
//! Capabilities (arithmetic, comparison, calling, constructing, connecting,
//! member access) are dispatched by exhaustive matching on the variant;
//! a variant outside a capability's family produces a descriptive error
//! rather than a fallback behavior.

use std::rc::Rc;

use indexmap::IndexMap;
use strum::Display;

use crate::{
    ast::Block,
    env::EnvId,
    error::EvalErrorKind,
    node::{Connection, NodeArena, NodeId, NodeType, SlotRef},
    resolver::InternalFunction,
    token::TokenKind,
};

/// Stable runtime type discriminator for every value variant.
///
/// The display forms appear verbatim in error messages and in the analysis
/// pass output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum TypeTag {
    #[default]
    #[strum(serialize = "UNKNOWN")]
    Unknown,
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "STRING")]
    Str,
    #[strum(serialize = "BOOL")]
    Bool,
    #[strum(serialize = "LIST")]
    List,
    #[strum(serialize = "MAP")]
    Map,
    #[strum(serialize = "NODE TYPE")]
    NodeType,
    #[strum(serialize = "NODE")]
    Node,
    #[strum(serialize = "NODESLOT")]
    Slot,
    #[strum(serialize = "CONNECTION")]
    Connection,
    #[strum(serialize = "FUNCTION")]
    Function,
    #[strum(serialize = "INTERNAL FUNCTION")]
    Internal,
    #[strum(serialize = "PACKAGE")]
    Package,
}

impl TypeTag {
    /// Primitive types concatenate onto strings via their inspect form.
    pub fn is_primitive(self) -> bool {
        matches!(self, Self::Integer | Self::Str)
    }
}

/// A homogeneous list: the element discriminator plus the elements.
///
/// An empty list carries [`TypeTag::Unknown`] until elements give it a type.
#[derive(Debug, Clone, Default)]
pub struct ListValue {
    pub elem: TypeTag,
    pub items: Vec<Value>,
}

/// A user-defined function: positional parameters, a block body, and the
/// environment captured at the definition site.
#[derive(Debug)]
pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: Block,
    pub env: EnvId,
}

/// A package produced by `import`: a name plus the root environment the
/// imported program was evaluated in.
#[derive(Debug)]
pub struct PackageValue {
    pub name: String,
    pub env: EnvId,
}

/// The closed family of runtime values.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Str(String),
    Bool(bool),
    List(ListValue),
    Map(IndexMap<String, Value>),
    NodeType(Rc<NodeType>),
    Node(NodeId),
    Slot(SlotRef),
    Connection(Box<Connection>),
    Function(Rc<FunctionValue>),
    Internal(InternalFunction),
    Package(Rc<PackageValue>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Integer(_) => TypeTag::Integer,
            Self::Str(_) => TypeTag::Str,
            Self::Bool(_) => TypeTag::Bool,
            Self::List(_) => TypeTag::List,
            Self::Map(_) => TypeTag::Map,
            Self::NodeType(_) => TypeTag::NodeType,
            Self::Node(_) => TypeTag::Node,
            Self::Slot(_) => TypeTag::Slot,
            Self::Connection(_) => TypeTag::Connection,
            Self::Function(_) => TypeTag::Function,
            Self::Internal(_) => TypeTag::Internal,
            Self::Package(_) => TypeTag::Package,
        }
    }

    /// Whether `->` may use this value as an endpoint. Lists qualify as a
    /// whole; their elements are checked when the connection is made.
    pub fn is_connectable(&self) -> bool {
        matches!(self, Self::Node(_) | Self::Slot(_) | Self::List(_))
    }

    /// A human-readable rendering. Needs the arena because node values only
    /// hold ids.
    pub fn inspect(&self, arena: &NodeArena) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Str(v) => format!("\"{v}\""),
            Self::Bool(v) => v.to_string(),
            Self::List(list) => {
                let items: Vec<String> = list.items.iter().map(|v| v.inspect(arena)).collect();
                format!("[{}]", items.join(", "))
            }
            Self::Map(map) => {
                let mut out = String::from("{");
                for (key, value) in map {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(&value.inspect(arena));
                    out.push(';');
                }
                out.push('}');
                out
            }
            Self::NodeType(nt) => nt.inspect(),
            Self::Node(id) => arena.get(*id).inspect(),
            Self::Slot(slot) => format!("Slot{{Name: \"{}\", Input: {}}}", slot.name, slot.is_input),
            Self::Connection(conn) => format!(
                "Slot{{Name: \"{}\", Input: {}}} -> Slot{{Name: \"{}\", Input: {}}}",
                conn.start.name, conn.start.is_input, conn.end.name, conn.end.is_input
            ),
            Self::Function(func) => format!("fn ({})", func.params.join(", ")),
            Self::Internal(func) => format!("fn ({})", func.native.params.join(", ")),
            Self::Package(pkg) => format!("import \"{}.stitch\"", pkg.name),
        }
    }
}

/// Applies an arithmetic operator (`+ - * / %`).
///
/// A string on the left concatenates any primitive right operand via its
/// inspect form; integers require an integer partner; lists concatenate
/// lists of the same element type. Everything else lacks the capability.
pub fn arith(op: TokenKind, op_text: &str, left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    if let Value::Str(l) = left {
        if op == TokenKind::Plus && right.type_tag().is_primitive() {
            let appended = match right {
                Value::Str(r) => r.clone(),
                Value::Integer(r) => r.to_string(),
                _ => unreachable!("primitive tags are STRING and INTEGER"),
            };
            return Ok(Value::Str(format!("{l}{appended}")));
        }
    }

    match left {
        Value::Integer(l) => {
            let Value::Integer(r) = right else {
                return Err(EvalErrorKind::TypeMismatch {
                    left: left.type_tag(),
                    right: right.type_tag(),
                });
            };
            let result = match op {
                TokenKind::Plus => l.wrapping_add(*r),
                TokenKind::Minus => l.wrapping_sub(*r),
                TokenKind::Star => l.wrapping_mul(*r),
                TokenKind::Slash => {
                    if *r == 0 {
                        return Err(EvalErrorKind::DivisionByZero);
                    }
                    l.wrapping_div(*r)
                }
                TokenKind::Percent => {
                    if *r == 0 {
                        return Err(EvalErrorKind::DivisionByZero);
                    }
                    l.wrapping_rem(*r)
                }
                _ => unreachable!("arith called with non-arithmetic operator"),
            };
            Ok(Value::Integer(result))
        }
        Value::List(l) if op == TokenKind::Plus => concat_lists(l, right),
        _ => Err(EvalErrorKind::OperatorUndefined {
            operator: op_text.to_owned(),
            tag: left.type_tag(),
        }),
    }
}

fn concat_lists(left: &ListValue, right: &Value) -> Result<Value, EvalErrorKind> {
    let Value::List(r) = right else {
        return Err(EvalErrorKind::ListConcatNonList(right.type_tag()));
    };
    if !left.items.is_empty() && !r.items.is_empty() && left.elem != r.elem {
        return Err(EvalErrorKind::ListConcatMismatch {
            left: left.elem,
            right: r.elem,
        });
    }
    let elem = if left.items.is_empty() { r.elem } else { left.elem };
    let mut items = Vec::with_capacity(left.items.len() + r.items.len());
    items.extend(left.items.iter().cloned());
    items.extend(r.items.iter().cloned());
    Ok(Value::List(ListValue { elem, items }))
}

/// Applies a comparison operator (`== != < <= > >=`).
///
/// Integers order and equate among themselves; booleans only equate.
pub fn compare(op: TokenKind, left: &Value, right: &Value) -> Result<bool, EvalErrorKind> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Ok(match op {
            TokenKind::Eq => l == r,
            TokenKind::NotEq => l != r,
            TokenKind::Lt => l < r,
            TokenKind::LtEq => l <= r,
            TokenKind::Gt => l > r,
            TokenKind::GtEq => l >= r,
            _ => unreachable!("compare called with non-comparison operator"),
        }),
        (Value::Bool(l), Value::Bool(r)) => match op {
            TokenKind::Eq => Ok(l == r),
            TokenKind::NotEq => Ok(l != r),
            _ => Err(EvalErrorKind::BoolOrdering),
        },
        (Value::Integer(_) | Value::Bool(_), Value::Integer(_) | Value::Bool(_)) => {
            Err(EvalErrorKind::IncomparableTypes {
                left: left.type_tag(),
                right: right.type_tag(),
            })
        }
        (Value::Integer(_) | Value::Bool(_), _) => Err(EvalErrorKind::NotComparable(right.type_tag())),
        _ => Err(EvalErrorKind::NotComparable(left.type_tag())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn int(v: i64) -> Value {
        Value::Integer(v)
    }

    #[test]
    fn integer_arithmetic() {
        let sum = arith(TokenKind::Plus, "+", &int(1), &int(2)).unwrap();
        assert!(matches!(sum, Value::Integer(3)));
        let rem = arith(TokenKind::Percent, "%", &int(7), &int(3)).unwrap();
        assert!(matches!(rem, Value::Integer(1)));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = arith(TokenKind::Slash, "/", &int(1), &int(0)).unwrap_err();
        assert!(matches!(err, EvalErrorKind::DivisionByZero));
    }

    #[test]
    fn string_concat_uses_inspect_form_for_integers() {
        let joined = arith(TokenKind::Plus, "+", &Value::Str("hello".into()), &int(42)).unwrap();
        let Value::Str(s) = joined else { panic!("expected string") };
        assert_eq!(s, "hello42");
    }

    #[test]
    fn string_concat_keeps_strings_raw() {
        let joined = arith(
            TokenKind::Plus,
            "+",
            &Value::Str("a".into()),
            &Value::Str("b".into()),
        )
        .unwrap();
        let Value::Str(s) = joined else { panic!("expected string") };
        assert_eq!(s, "ab");
    }

    #[test]
    fn bools_do_not_concatenate_onto_strings() {
        let err = arith(TokenKind::Plus, "+", &Value::Str("x".into()), &Value::Bool(true)).unwrap_err();
        assert!(matches!(err, EvalErrorKind::OperatorUndefined { .. }));
    }

    #[test]
    fn list_concat_preserves_order_and_type() {
        let a = Value::List(ListValue {
            elem: TypeTag::Integer,
            items: vec![int(1), int(2)],
        });
        let b = Value::List(ListValue {
            elem: TypeTag::Integer,
            items: vec![int(3)],
        });
        let Value::List(joined) = arith(TokenKind::Plus, "+", &a, &b).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(joined.elem, TypeTag::Integer);
        assert_eq!(joined.items.len(), 3);
    }

    #[test]
    fn list_concat_rejects_mismatched_elements() {
        let a = Value::List(ListValue {
            elem: TypeTag::Integer,
            items: vec![int(1)],
        });
        let b = Value::List(ListValue {
            elem: TypeTag::Str,
            items: vec![Value::Str("x".into())],
        });
        let err = arith(TokenKind::Plus, "+", &a, &b).unwrap_err();
        assert!(matches!(err, EvalErrorKind::ListConcatMismatch { .. }));
    }

    #[test]
    fn empty_list_concat_adopts_the_other_side() {
        let empty = Value::List(ListValue::default());
        let ints = Value::List(ListValue {
            elem: TypeTag::Integer,
            items: vec![int(9)],
        });
        let Value::List(joined) = arith(TokenKind::Plus, "+", &empty, &ints).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(joined.elem, TypeTag::Integer);
    }

    #[test]
    fn integers_order_booleans_only_equate() {
        assert!(compare(TokenKind::Lt, &int(1), &int(2)).unwrap());
        assert!(compare(TokenKind::GtEq, &int(2), &int(2)).unwrap());
        assert!(compare(TokenKind::Eq, &Value::Bool(true), &Value::Bool(true)).unwrap());
        let err = compare(TokenKind::Lt, &Value::Bool(true), &Value::Bool(false)).unwrap_err();
        assert!(matches!(err, EvalErrorKind::BoolOrdering));
    }

    #[test]
    fn mixed_comparisons_fail() {
        let err = compare(TokenKind::Eq, &int(1), &Value::Bool(true)).unwrap_err();
        assert!(matches!(err, EvalErrorKind::IncomparableTypes { .. }));
        let err = compare(TokenKind::Eq, &Value::Str("a".into()), &int(1)).unwrap_err();
        assert!(matches!(err, EvalErrorKind::NotComparable(TypeTag::Str)));
    }
}
