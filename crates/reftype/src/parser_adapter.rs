//! Maps a [`SourceExpr`] into the refinement AST, with the domain/arity/type
//! validation of spec §4.2. Failures report through the diagnostic callback
//! and degrade to "no expression" (`None`) rather than aborting (spec §7).

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::builtins;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::expr::{BinaryOperator, Expr, ExprRef, RefinementType, TupleEntry, UnaryOperator};
use crate::source::{SourceBinaryOp, SourceCallArg, SourceExpr, SourceExprKind, SourceUnaryOp};
use crate::var::{free_var, OccurrenceKind, RefinementVar, ScopeId, VarRegistry};

/// Everything `adapt_expr` needs besides the expression itself (spec §4.2
/// "a source expression node, a target domain, a scope node, a map of
/// outer-scope variables, and a diagnostic callback").
pub struct AdapterContext<'a> {
    pub registry: &'a mut VarRegistry,
    pub scope_id: ScopeId,
    pub scope_name: Arc<str>,
    pub outer_vars: &'a IndexMap<String, RefinementVar>,
    pub diagnostics: Diagnostics<'a>,
    /// Stand-in for the tokenizer/parser (out of scope, spec §1): re-parses a
    /// standalone string-literal refinement into a [`SourceExpr`], given the
    /// literal's text and its byte offset inside the original file.
    pub reparse: Option<&'a dyn Fn(&str, u32) -> Option<SourceExpr>>,
}

fn report(ctx: &mut AdapterContext, mut diag: Diagnostic, source: &SourceExpr) {
    if let Some(range) = source.range.clone() {
        diag = diag.at(range);
    }
    ctx.diagnostics.report_error(diag);
}

fn check_domain(ctx: &mut AdapterContext, expected: Option<RefinementType>, actual: RefinementType, source: &SourceExpr) -> Option<()> {
    match expected {
        Some(e) if e != actual => {
            report(ctx, Diagnostic::error("refinement-domain-mismatch", format!("expected {e}, found {actual}")), source);
            None
        }
        _ => Some(()),
    }
}

fn occurrence_kind(is_value: bool) -> OccurrenceKind {
    if is_value {
        OccurrenceKind::Value
    } else {
        OccurrenceKind::Condition
    }
}

/// Adapts `source` under the required `domain` (spec §4.2 entry point).
/// `is_value` distinguishes a refinement's *value* expression from its
/// *condition* expression (spec §4.2 "Variable registration").
pub fn adapt_expr(ctx: &mut AdapterContext, source: &SourceExpr, domain: RefinementType, is_value: bool) -> Option<ExprRef> {
    adapt_inner(ctx, source, Some(domain), is_value).map(|(e, _)| e)
}

/// Core recursive adapter. `expected = None` means "infer the domain from
/// `source` itself" — used for comparison operands, where equality compares
/// "any one uniform type" rather than a single fixed domain (spec §4.2).
fn adapt_inner(ctx: &mut AdapterContext, source: &SourceExpr, expected: Option<RefinementType>, is_value: bool) -> Option<(ExprRef, RefinementType)> {
    match &source.kind {
        SourceExprKind::StringForReparse { text, file_offset } => {
            let Some(reparse) = ctx.reparse else {
                report(ctx, Diagnostic::error("refinement-reparse-unavailable", "no reparse callback was supplied for a string refinement"), source);
                return None;
            };
            let Some(inner) = reparse(text, *file_offset) else {
                report(ctx, Diagnostic::error("refinement-reparse-failed", format!("failed to parse refinement string {text:?}")), source);
                return None;
            };
            adapt_inner(ctx, &inner, expected, is_value)
        }
        SourceExprKind::Number { text, is_integer, is_imaginary } => {
            if !is_integer || *is_imaginary {
                report(ctx, Diagnostic::error("refinement-invalid-number", "refinement numeric literals must be non-imaginary integers"), source);
                return None;
            }
            let Ok(n) = text.parse::<BigInt>() else {
                report(ctx, Diagnostic::error("refinement-invalid-number", format!("could not parse integer literal {text:?}")), source);
                return None;
            };
            check_domain(ctx, expected, RefinementType::Int, source)?;
            Some((Expr::number(n), RefinementType::Int))
        }
        SourceExprKind::Str { value, is_bytes } => {
            let ty = if *is_bytes { RefinementType::Bytes } else { RefinementType::Str };
            check_domain(ctx, expected, ty, source)?;
            let expr = if *is_bytes {
                Rc::new(Expr::Bytes(value.clone().into_bytes()))
            } else {
                Rc::new(Expr::Str(value.clone()))
            };
            Some((expr, ty))
        }
        SourceExprKind::Boolean(b) => {
            check_domain(ctx, expected, RefinementType::Bool, source)?;
            Some((Expr::boolean(*b), RefinementType::Bool))
        }
        SourceExprKind::Name(name) => adapt_name(ctx, name, expected, is_value, source),
        SourceExprKind::UnaryOp { op, operand } => adapt_unary(ctx, *op, operand, expected, is_value, source),
        SourceExprKind::BinaryOp { op, left, right } => adapt_binary(ctx, *op, left, right, expected, is_value, source),
        SourceExprKind::Tuple(elements) => adapt_tuple(ctx, elements, expected, is_value, source),
        SourceExprKind::Call { name, args } => adapt_call(ctx, name, args, expected, is_value, source),
    }
}

fn adapt_name(ctx: &mut AdapterContext, name: &str, expected: Option<RefinementType>, is_value: bool, source: &SourceExpr) -> Option<(ExprRef, RefinementType)> {
    if name.is_empty() {
        report(ctx, Diagnostic::error("refinement-empty-name", "a refinement variable name must not be empty"), source);
        return None;
    }
    if name == "_" {
        // Wildcard is domain-polymorphic; tag it with whatever the caller
        // expected (or Int as an arbitrary default) since nothing downstream
        // inspects a Wildcard's "declared" type.
        return Some((Expr::wildcard(), expected.unwrap_or(RefinementType::Int)));
    }
    // Outer-scope binding takes precedence (spec §4.2 "Accepted constructs").
    if let Some(outer) = ctx.outer_vars.get(name) {
        check_domain(ctx, expected, outer.element_type, source)?;
        let var = outer.clone();
        ctx.registry.record_occurrence(var.var_id(), source.range.clone(), occurrence_kind(is_value));
        return Some((Rc::new(Expr::Var(var.clone())), var.element_type));
    }
    let Some(ty) = expected else {
        report(
            ctx,
            Diagnostic::error("refinement-cannot-infer-type", format!("cannot infer the type of '{name}' without an expected domain")),
            source,
        );
        return None;
    };
    let candidate = free_var(name, ctx.scope_id, &ctx.scope_name, ty);
    let interned = ctx.registry.intern(candidate);
    if interned.element_type != ty {
        report(
            ctx,
            Diagnostic::error(
                "refinement-domain-mismatch",
                format!("'{name}' was already used as {}, now as {ty}", interned.element_type),
            ),
            source,
        );
        return None;
    }
    ctx.registry.record_occurrence(interned.var_id(), source.range.clone(), occurrence_kind(is_value));
    Some((Rc::new(Expr::Var(interned.clone())), interned.element_type))
}

fn adapt_unary(ctx: &mut AdapterContext, op: SourceUnaryOp, operand: &SourceExpr, expected: Option<RefinementType>, is_value: bool, source: &SourceExpr) -> Option<(ExprRef, RefinementType)> {
    match op {
        SourceUnaryOp::Plus | SourceUnaryOp::Minus => {
            check_domain(ctx, expected, RefinementType::Int, source)?;
            let (inner, _) = adapt_inner(ctx, operand, Some(RefinementType::Int), is_value)?;
            // spec §4.2: "unary + / - on integer literal -> folded into Number".
            if let Expr::Number(n) = inner.as_ref() {
                let folded = if matches!(op, SourceUnaryOp::Minus) { -n.clone() } else { n.clone() };
                return Some((Expr::number(folded), RefinementType::Int));
            }
            let uop = if matches!(op, SourceUnaryOp::Minus) { UnaryOperator::Minus } else { UnaryOperator::Plus };
            Some((Rc::new(Expr::UnaryOp { op: uop, operand: inner }), RefinementType::Int))
        }
        SourceUnaryOp::Not => {
            check_domain(ctx, expected, RefinementType::Bool, source)?;
            let (inner, _) = adapt_inner(ctx, operand, Some(RefinementType::Bool), is_value)?;
            Some((Rc::new(Expr::UnaryOp { op: UnaryOperator::Not, operand: inner }), RefinementType::Bool))
        }
    }
}

fn adapt_binary(
    ctx: &mut AdapterContext,
    op: SourceBinaryOp,
    left: &SourceExpr,
    right: &SourceExpr,
    expected: Option<RefinementType>,
    is_value: bool,
    source: &SourceExpr,
) -> Option<(ExprRef, RefinementType)> {
    match op {
        SourceBinaryOp::And | SourceBinaryOp::Or => {
            check_domain(ctx, expected, RefinementType::Bool, source)?;
            let (l, _) = adapt_inner(ctx, left, Some(RefinementType::Bool), is_value)?;
            let (r, _) = adapt_inner(ctx, right, Some(RefinementType::Bool), is_value)?;
            let bop = if matches!(op, SourceBinaryOp::And) { BinaryOperator::And } else { BinaryOperator::Or };
            Some((Rc::new(Expr::BinaryOp { op: bop, left: l, right: r }), RefinementType::Bool))
        }
        SourceBinaryOp::Eq | SourceBinaryOp::NotEq => {
            check_domain(ctx, expected, RefinementType::Bool, source)?;
            let (l, lty) = adapt_inner(ctx, left, None, is_value)?;
            let (r, rty) = adapt_inner(ctx, right, Some(lty), is_value)?;
            if lty != rty {
                report(ctx, Diagnostic::error("refinement-comparison-type-mismatch", format!("equality compares {lty} with {rty}")), source);
                return None;
            }
            let bop = if matches!(op, SourceBinaryOp::Eq) { BinaryOperator::Eq } else { BinaryOperator::NotEq };
            Some((Rc::new(Expr::BinaryOp { op: bop, left: l, right: r }), RefinementType::Bool))
        }
        SourceBinaryOp::Lt | SourceBinaryOp::Le | SourceBinaryOp::Gt | SourceBinaryOp::Ge => {
            check_domain(ctx, expected, RefinementType::Bool, source)?;
            let (l, _) = adapt_inner(ctx, left, Some(RefinementType::Int), is_value)?;
            let (r, _) = adapt_inner(ctx, right, Some(RefinementType::Int), is_value)?;
            let bop = match op {
                SourceBinaryOp::Lt => BinaryOperator::Lt,
                SourceBinaryOp::Le => BinaryOperator::Le,
                SourceBinaryOp::Gt => BinaryOperator::Gt,
                SourceBinaryOp::Ge => BinaryOperator::Ge,
                _ => unreachable!(),
            };
            Some((Rc::new(Expr::BinaryOp { op: bop, left: l, right: r }), RefinementType::Bool))
        }
        SourceBinaryOp::Add => {
            let (l, lty) = adapt_inner(ctx, left, expected, is_value)?;
            if !matches!(lty, RefinementType::Int | RefinementType::Str | RefinementType::Bytes) {
                report(ctx, Diagnostic::error("refinement-invalid-operand-type", format!("'+' is not defined for {lty}")), source);
                return None;
            }
            let (r, _) = adapt_inner(ctx, right, Some(lty), is_value)?;
            Some((Rc::new(Expr::BinaryOp { op: BinaryOperator::Add, left: l, right: r }), lty))
        }
        SourceBinaryOp::Sub | SourceBinaryOp::Mul | SourceBinaryOp::FloorDiv | SourceBinaryOp::Mod => {
            check_domain(ctx, expected, RefinementType::Int, source)?;
            let (l, _) = adapt_inner(ctx, left, Some(RefinementType::Int), is_value)?;
            let (r, _) = adapt_inner(ctx, right, Some(RefinementType::Int), is_value)?;
            let bop = match op {
                SourceBinaryOp::Sub => BinaryOperator::Sub,
                SourceBinaryOp::Mul => BinaryOperator::Mul,
                SourceBinaryOp::FloorDiv => BinaryOperator::FloorDiv,
                SourceBinaryOp::Mod => BinaryOperator::Mod,
                _ => unreachable!(),
            };
            Some((Rc::new(Expr::BinaryOp { op: bop, left: l, right: r }), RefinementType::Int))
        }
    }
}

fn adapt_tuple(ctx: &mut AdapterContext, elements: &[crate::source::SourceTupleElement], expected: Option<RefinementType>, is_value: bool, source: &SourceExpr) -> Option<(ExprRef, RefinementType)> {
    check_domain(ctx, expected, RefinementType::IntTuple, source)?;
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        if element.is_unpacked {
            let (v, _) = adapt_inner(ctx, &element.value, Some(RefinementType::IntTuple), is_value)?;
            out.push(TupleEntry::unpacked(v));
        } else {
            let (v, _) = adapt_inner(ctx, &element.value, Some(RefinementType::Int), is_value)?;
            out.push(TupleEntry::plain(v));
        }
    }
    Some((Rc::new(Expr::Tuple(out)), RefinementType::IntTuple))
}

fn adapt_call(ctx: &mut AdapterContext, name: &str, args: &[SourceCallArg], expected: Option<RefinementType>, is_value: bool, source: &SourceExpr) -> Option<(ExprRef, RefinementType)> {
    let Some(sig) = builtins::lookup(name) else {
        report(ctx, Diagnostic::error("refinement-unknown-function", format!("'{name}' is not a recognized refinement function")), source);
        return None;
    };
    check_domain(ctx, expected, sig.return_type, source)?;
    if args.len() != sig.params.len() {
        report(
            ctx,
            Diagnostic::error("refinement-arity-mismatch", format!("'{name}' expects {} argument(s), found {}", sig.params.len(), args.len())),
            source,
        );
        return None;
    }
    let mut out = Vec::with_capacity(args.len());
    for (arg, param_ty) in args.iter().zip(sig.params) {
        let positional = match arg {
            SourceCallArg::Positional(e) => e,
            SourceCallArg::Keyword(..) => {
                report(ctx, Diagnostic::error("refinement-keyword-argument", format!("'{name}' does not accept keyword arguments")), source);
                return None;
            }
            SourceCallArg::Unpacked(..) => {
                report(ctx, Diagnostic::error("refinement-unpacked-argument", format!("'{name}' does not accept an unpacked argument")), source);
                return None;
            }
        };
        let (v, _) = adapt_inner(ctx, positional, Some(*param_ty), is_value)?;
        out.push(v);
    }
    Some((Rc::new(Expr::Call { name: name.to_string(), args: out }), sig.return_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceTupleElement;

    fn ctx<'a>(registry: &'a mut VarRegistry, outer: &'a IndexMap<String, RefinementVar>, errors: &'a mut Vec<Diagnostic>) -> AdapterContext<'a> {
        AdapterContext {
            registry,
            scope_id: ScopeId(0),
            scope_name: "f".into(),
            outer_vars: outer,
            diagnostics: Diagnostics { errors: Some(errors), warnings: None },
            reparse: None,
        }
    }

    fn num(text: &str) -> SourceExpr {
        SourceExpr::new(SourceExprKind::Number { text: text.into(), is_integer: true, is_imaginary: false }, None)
    }

    fn name(n: &str) -> SourceExpr {
        SourceExpr::new(SourceExprKind::Name(n.into()), None)
    }

    #[test]
    fn integer_literal_adapts_to_number() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let result = adapt_expr(&mut c, &num("42"), RefinementType::Int, true).unwrap();
        assert_eq!(result.as_number(), Some(&BigInt::from(42)));
    }

    #[test]
    fn unary_minus_on_literal_folds_at_adapt_time() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let src = SourceExpr::new(
            SourceExprKind::UnaryOp { op: SourceUnaryOp::Minus, operand: Box::new(num("7")) },
            None,
        );
        let result = adapt_expr(&mut c, &src, RefinementType::Int, true).unwrap();
        assert!(matches!(result.as_ref(), Expr::Number(_)));
        assert_eq!(result.as_number(), Some(&BigInt::from(-7)));
    }

    #[test]
    fn fresh_name_is_registered_and_reused() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let first = adapt_expr(&mut c, &name("n"), RefinementType::Int, true).unwrap();
        let second = adapt_expr(&mut c, &name("n"), RefinementType::Int, false).unwrap();
        assert_eq!(first.as_var().unwrap().var_id(), second.as_var().unwrap().var_id());
        assert!(errors.is_empty());
    }

    #[test]
    fn reused_name_with_conflicting_type_is_rejected() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        adapt_expr(&mut c, &name("n"), RefinementType::Int, true).unwrap();
        let second = adapt_expr(&mut c, &name("n"), RefinementType::Str, true);
        assert!(second.is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn unknown_builtin_name_is_rejected() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let src = SourceExpr::new(SourceExprKind::Call { name: "bogus".into(), args: vec![] }, None);
        assert!(adapt_expr(&mut c, &src, RefinementType::IntTuple, true).is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let src = SourceExpr::new(
            SourceExprKind::Call {
                name: "len".into(),
                args: vec![SourceCallArg::Positional(name("t")), SourceCallArg::Positional(num("1"))],
            },
            None,
        );
        assert!(adapt_expr(&mut c, &src, RefinementType::Int, true).is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn keyword_argument_to_builtin_is_rejected() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let src = SourceExpr::new(
            SourceExprKind::Call {
                name: "len".into(),
                args: vec![SourceCallArg::Keyword("t".into(), name("t"))],
            },
            None,
        );
        assert!(adapt_expr(&mut c, &src, RefinementType::Int, true).is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn tuple_with_unpack_entry_adapts() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let src = SourceExpr::new(
            SourceExprKind::Tuple(vec![
                SourceTupleElement { value: num("1"), is_unpacked: false },
                SourceTupleElement { value: name("rest"), is_unpacked: true },
            ]),
            None,
        );
        let result = adapt_expr(&mut c, &src, RefinementType::IntTuple, true).unwrap();
        let entries = result.as_tuple().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].is_unpacked);
    }

    #[test]
    fn wildcard_name_bypasses_domain_check() {
        let mut registry = VarRegistry::new();
        let outer = IndexMap::new();
        let mut errors = Vec::new();
        let mut c = ctx(&mut registry, &outer, &mut errors);
        let result = adapt_expr(&mut c, &name("_"), RefinementType::Bool, true).unwrap();
        assert!(result.is_wildcard());
    }
}
