//! The refinement expression AST (spec §3, §4.1).
//!
//! Nodes are boxed behind [`Rc`] rather than [`Box`] so that the
//! [transformer framework](crate::transform) can preserve physical identity
//! when a rewrite leaves a subtree untouched: cloning an `Rc` is cheap and
//! `Rc::ptr_eq` lets callers (and tests) observe structural sharing.

use std::rc::Rc;

use num_bigint::BigInt;

use crate::var::RefinementVar;

/// A node in the refinement expression tree, reference-counted for sharing.
pub type ExprRef = Rc<Expr>;

/// The element-type family a refinement expression node belongs to (spec §3 "Type of an expression").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum RefinementType {
    Int,
    Str,
    Bytes,
    Bool,
    IntTuple,
}

/// Unary operators accepted by the refinement language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum UnaryOperator {
    #[strum(to_string = "+")]
    Plus,
    #[strum(to_string = "-")]
    Minus,
    #[strum(to_string = "not")]
    Not,
}

/// Binary operators accepted by the refinement language (spec §3: `+ − × // %`, comparisons, `and`/`or`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BinaryOperator {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "//")]
    FloorDiv,
    #[strum(to_string = "%")]
    Mod,
    #[strum(to_string = "==")]
    Eq,
    #[strum(to_string = "!=")]
    NotEq,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = "<=")]
    Le,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = ">=")]
    Ge,
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or")]
    Or,
}

impl BinaryOperator {
    /// Whether this operator produces a `Bool` result regardless of operand type.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// The inverted comparison, used when an inequality needs to be evaluated
    /// with its operands swapped (spec §4.4 "symmetric for right operand after operator inversion").
    pub fn inverted(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
            other => other,
        }
    }
}

/// One entry of a `Tuple` node: a sub-expression and whether it is an unpack (`*x`) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleEntry {
    pub value: ExprRef,
    pub is_unpacked: bool,
}

impl TupleEntry {
    pub fn plain(value: ExprRef) -> Self {
        Self {
            value,
            is_unpacked: false,
        }
    }

    pub fn unpacked(value: ExprRef) -> Self {
        Self {
            value,
            is_unpacked: true,
        }
    }
}

/// A refinement expression node (spec §3 variant table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(BigInt),
    Str(String),
    /// Bytes literal, stored as the already-encoded byte string (spec §3).
    Bytes(Vec<u8>),
    Boolean(bool),
    /// The "unknown but compatible" top value.
    Wildcard,
    Var(RefinementVar),
    UnaryOp {
        op: UnaryOperator,
        operand: ExprRef,
    },
    BinaryOp {
        op: BinaryOperator,
        left: ExprRef,
        right: ExprRef,
    },
    /// Represents integer-tuple shapes; see [`TupleEntry`] for unpack handling.
    Tuple(Vec<TupleEntry>),
    /// A call to one of the built-in shape functions (spec §4.4); positional-only.
    Call {
        name: String,
        args: Vec<ExprRef>,
    },
}

impl Expr {
    pub fn number(n: impl Into<BigInt>) -> ExprRef {
        Rc::new(Self::Number(n.into()))
    }

    pub fn boolean(b: bool) -> ExprRef {
        Rc::new(Self::Boolean(b))
    }

    pub fn wildcard() -> ExprRef {
        Rc::new(Self::Wildcard)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&BigInt> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&RefinementVar> {
        match self {
            Self::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[TupleEntry]> {
        match self {
            Self::Tuple(entries) => Some(entries),
            _ => None,
        }
    }

    /// A leaf node's statically known [`RefinementType`], where it can be determined
    /// without consulting surrounding context (spec §3 "Every node has a statically
    /// known type after parse-adapter validation" — composite nodes are typed by the
    /// parser adapter at construction time, not recomputed here).
    pub fn literal_type(&self) -> Option<RefinementType> {
        match self {
            Self::Number(_) => Some(RefinementType::Int),
            Self::Str(_) => Some(RefinementType::Str),
            Self::Bytes(_) => Some(RefinementType::Bytes),
            Self::Boolean(_) => Some(RefinementType::Bool),
            Self::Var(v) => Some(v.element_type),
            Self::Tuple(_) => Some(RefinementType::IntTuple),
            Self::Wildcard | Self::UnaryOp { .. } | Self::BinaryOp { .. } | Self::Call { .. } => None,
        }
    }
}
