//! Refinement construction (spec §4.6): wraps a value/condition expression
//! pair together with the element class it refines, and the two smart
//! constructors the rest of the pipeline builds refinements through.

use crate::expr::{BinaryOperator, Expr, ExprRef, RefinementType};
use crate::eval::{self, EvalOptions};
use crate::diagnostic::Diagnostics;
use crate::var::VarRegistry;

/// The element-type family a [`TypeRefinement`] narrows. Spec §3 names this
/// the same five domains the expression engine already carries
/// (`RefinementType`); kept as an alias rather than a parallel enum so the two
/// never drift apart (see `DESIGN.md`).
pub type RefinementClass = RefinementType;

/// A value expression plus an optional condition expression, tagged with the
/// class being refined (spec §4.6 "Refinement"). Both expressions are
/// produced by [the parser adapter](crate::parser_adapter) or by one of the
/// constructors below; `TypeRefinement` itself does no parsing.
#[derive(Debug, Clone)]
pub struct TypeRefinement {
    pub class: RefinementClass,
    pub value: ExprRef,
    /// Whether this refinement is distinguishable from "no refinement at all"
    /// when compared for equality (spec §3 "isEnforced flag"). A refinement
    /// built from an inferred literal (rather than a user-written
    /// declaration) is typically not enforced.
    pub is_enforced: bool,
    pub condition: Option<ExprRef>,
}

impl TypeRefinement {
    /// Builds a refinement directly from a literal expression, with no
    /// condition (spec §4.6 "fromLiteral"). Returns `None` for an
    /// integer-tuple class: a tuple shape has no single-literal form, so
    /// this constructor refuses rather than wrapping a non-tuple value under
    /// an `IntTuple` tag.
    pub fn from_literal(class: RefinementClass, value: ExprRef, is_enforced: bool) -> Option<Self> {
        if class == RefinementType::IntTuple {
            return None;
        }
        Some(Self { class, value, is_enforced, condition: None })
    }

    /// Builds a refinement whose value is `left op right`, immediately
    /// simplified (spec §4.6 "fromBinaryOp ... creates a binary-op
    /// expression, and immediately evaluates it"). Both inputs must refine
    /// the same class; that invariant is the caller's to uphold; see
    /// `DESIGN.md` for why this asserts rather than reports a diagnostic.
    pub fn from_binary_op(op: BinaryOperator, left: &Self, right: &Self, registry: &VarRegistry) -> Self {
        debug_assert_eq!(left.class, right.class, "fromBinaryOp requires both refinements to share a class");
        let raw = std::rc::Rc::new(Expr::BinaryOp {
            op,
            left: left.value.clone(),
            right: right.value.clone(),
        });
        let mut opts = EvalOptions::new(false, Diagnostics::none());
        let value = eval::simplify(&raw, registry, &mut opts);
        Self {
            class: left.class,
            value,
            is_enforced: left.is_enforced && right.is_enforced,
            condition: None,
        }
    }

    /// Structural equality between two refinements: same class, same
    /// `isEnforced`, and the value/condition expressions compare structurally
    /// equal (spec §3 "Two refinements are equal iff ...").
    pub fn structurally_eq(&self, other: &Self) -> bool {
        if self.class != other.class || self.is_enforced != other.is_enforced || self.value != other.value {
            return false;
        }
        match (&self.condition, &other.condition) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True when `value` is a bare literal or variable with no condition —
    /// the shape consistency rule 1 requires of a precondition's value
    /// expression (spec §4.3 "precondition value-shape atoms").
    pub fn is_precondition_atom(&self) -> bool {
        self.condition.is_none() && (self.value.literal_type().is_some() || self.value.as_var().is_some() || self.value.is_wildcard())
    }
}
