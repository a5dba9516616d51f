//! The refinement evaluator / simplifier (spec §4.4).
//!
//! [`simplify`] rewrites an expression to a normal form: wildcard absorption,
//! constant folding, sum normalization, comparison discharge via attached
//! variable conditions, and the eight built-in shape functions. It is built
//! on top of the same identity-preserving discipline as [`crate::transform`]
//! but isn't itself a [`crate::transform::Transformer`] impl, since several of
//! its rewrites (sum normalization, substitution via conditions) need to see
//! more than one child at a time.

use std::collections::HashSet;
use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::diagnostic::Diagnostics;
use crate::expr::{BinaryOperator, Expr, ExprRef, TupleEntry, UnaryOperator};
use crate::shape;
use crate::var::{VarId, VarRegistry};

/// Options threaded through a single top-level [`simplify`] call (spec §4.4
/// evaluator options `{replaceUnknownVars?, errors?, warnings?}`).
///
/// `in_progress` is the cycle-detection stack for variable substitution via
/// attached conditions (P3): create one `EvalOptions` per independent
/// evaluation rather than reusing it across unrelated expressions.
pub struct EvalOptions<'a> {
    pub replace_unknown_vars: bool,
    pub diagnostics: Diagnostics<'a>,
    in_progress: HashSet<VarId>,
}

impl<'a> EvalOptions<'a> {
    pub fn new(replace_unknown_vars: bool, diagnostics: Diagnostics<'a>) -> Self {
        Self {
            replace_unknown_vars,
            diagnostics,
            in_progress: HashSet::new(),
        }
    }
}

/// Simplifies `expr` to a normal form (spec §4.4). Returns the same [`ExprRef`]
/// when nothing changes, matching the transformer framework's identity
/// discipline (P2).
#[tracing::instrument(level = "debug", skip(registry, opts))]
pub fn simplify(expr: &ExprRef, registry: &VarRegistry, opts: &mut EvalOptions) -> ExprRef {
    match expr.as_ref() {
        Expr::Number(_) | Expr::Str(_) | Expr::Bytes(_) | Expr::Boolean(_) | Expr::Wildcard => expr.clone(),
        Expr::Var(v) => {
            let id = v.var_id();
            if opts.in_progress.contains(&id) {
                return expr.clone();
            }
            if let Some(replacement) = lookup_equivalence(&id, registry) {
                opts.in_progress.insert(id.clone());
                let result = simplify(&replacement, registry, opts);
                opts.in_progress.remove(&id);
                return result;
            }
            if opts.replace_unknown_vars && v.is_free() {
                return Expr::wildcard();
            }
            expr.clone()
        }
        Expr::UnaryOp { op, operand } => simplify_unary(*op, operand, expr, registry, opts),
        Expr::BinaryOp { op, left, right } => simplify_binary(*op, left, right, expr, registry, opts),
        Expr::Tuple(entries) => simplify_tuple(entries, expr, registry, opts),
        Expr::Call { name, args } => simplify_call(name, args, registry, opts),
    }
}

/// Finds a conjunct of shape `v == E` (or `E == v`) among `id`'s attached
/// conditions and returns `E` (spec §4.4 "Variable substitution during evaluation").
fn lookup_equivalence(id: &VarId, registry: &VarRegistry) -> Option<ExprRef> {
    for cond in registry.conditions(id) {
        for conjunct in conjuncts(cond) {
            if let Expr::BinaryOp {
                op: BinaryOperator::Eq,
                left,
                right,
            } = conjunct.as_ref()
            {
                if left.as_var().is_some_and(|v| &v.var_id() == id) {
                    return Some(right.clone());
                }
                if right.as_var().is_some_and(|v| &v.var_id() == id) {
                    return Some(left.clone());
                }
            }
        }
    }
    None
}

/// Splits `expr` into its top-level `and` conjuncts (a bare expression is its own single conjunct).
pub(crate) fn conjuncts(expr: &ExprRef) -> Vec<ExprRef> {
    match expr.as_ref() {
        Expr::BinaryOp {
            op: BinaryOperator::And,
            left,
            right,
        } => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        _ => vec![expr.clone()],
    }
}

fn simplify_unary(op: UnaryOperator, operand: &ExprRef, original: &ExprRef, registry: &VarRegistry, opts: &mut EvalOptions) -> ExprRef {
    let v = simplify(operand, registry, opts);
    if v.is_wildcard() {
        return Expr::wildcard();
    }
    let folded = match op {
        UnaryOperator::Plus => v.as_number().map(|n| Expr::number(n.clone())),
        UnaryOperator::Minus => v.as_number().map(|n| Expr::number(-n)),
        UnaryOperator::Not => v.as_bool_literal().map(|b| Expr::boolean(!b)),
    };
    folded.unwrap_or_else(|| {
        if Rc::ptr_eq(&v, operand) {
            original.clone()
        } else {
            Rc::new(Expr::UnaryOp { op, operand: v })
        }
    })
}

fn simplify_binary(op: BinaryOperator, left: &ExprRef, right: &ExprRef, original: &ExprRef, registry: &VarRegistry, opts: &mut EvalOptions) -> ExprRef {
    let l = simplify(left, registry, opts);
    let r = simplify(right, registry, opts);

    if op.is_logical() {
        let folded = match op {
            BinaryOperator::And => and_(&l, &r),
            BinaryOperator::Or => or_(&l, &r),
            _ => unreachable!("is_logical only matches And/Or"),
        };
        return folded.unwrap_or_else(|| rebuild_binary(op, left, right, &l, &r, original));
    }

    // Wildcard absorption for everything except and/or, which short-circuit on
    // literal True/False before it (spec §4.4 "Wildcard absorption").
    if l.is_wildcard() || r.is_wildcard() {
        return Expr::wildcard();
    }

    if op.is_comparison() {
        return simplify_comparison(op, &l, &r, registry);
    }

    match op {
        BinaryOperator::Add => {
            if let (Expr::Str(a), Expr::Str(b)) = (l.as_ref(), r.as_ref()) {
                return Rc::new(Expr::Str(format!("{a}{b}")));
            }
            if let (Expr::Bytes(a), Expr::Bytes(b)) = (l.as_ref(), r.as_ref()) {
                let mut out = a.clone();
                out.extend_from_slice(b);
                return Rc::new(Expr::Bytes(out));
            }
            sum_normalize(op, &l, &r)
        }
        BinaryOperator::Sub => sum_normalize(op, &l, &r),
        BinaryOperator::Mul => fold_mul(&l, &r),
        BinaryOperator::FloorDiv => fold_floordiv(&l, &r),
        BinaryOperator::Mod => fold_mod(&l, &r),
        _ => unreachable!("logical and comparison operators handled above"),
    }
}

fn rebuild_binary(op: BinaryOperator, orig_left: &ExprRef, orig_right: &ExprRef, l: &ExprRef, r: &ExprRef, original: &ExprRef) -> ExprRef {
    if Rc::ptr_eq(l, orig_left) && Rc::ptr_eq(r, orig_right) {
        original.clone()
    } else {
        Rc::new(Expr::BinaryOp {
            op,
            left: l.clone(),
            right: r.clone(),
        })
    }
}

/// `and` with short-circuiting on literal `True`/`False` before wildcard absorption
/// (spec §4.4: "if either side is False, return that; if either is True, return the other").
fn and_(l: &ExprRef, r: &ExprRef) -> Option<ExprRef> {
    if l.as_bool_literal() == Some(false) {
        return Some(l.clone());
    }
    if r.as_bool_literal() == Some(false) {
        return Some(r.clone());
    }
    if l.as_bool_literal() == Some(true) {
        return Some(r.clone());
    }
    if r.as_bool_literal() == Some(true) {
        return Some(l.clone());
    }
    if l.is_wildcard() || r.is_wildcard() {
        return Some(Expr::wildcard());
    }
    None
}

fn or_(l: &ExprRef, r: &ExprRef) -> Option<ExprRef> {
    if l.as_bool_literal() == Some(true) {
        return Some(l.clone());
    }
    if r.as_bool_literal() == Some(true) {
        return Some(r.clone());
    }
    if l.as_bool_literal() == Some(false) {
        return Some(r.clone());
    }
    if r.as_bool_literal() == Some(false) {
        return Some(l.clone());
    }
    if l.is_wildcard() || r.is_wildcard() {
        return Some(Expr::wildcard());
    }
    None
}

fn fold_mul(l: &ExprRef, r: &ExprRef) -> ExprRef {
    if let Some(n) = l.as_number() {
        if n.is_zero() {
            return Expr::number(0);
        }
        if n.is_one() {
            return r.clone();
        }
    }
    if let Some(n) = r.as_number() {
        if n.is_zero() {
            return Expr::number(0);
        }
        if n.is_one() {
            return l.clone();
        }
    }
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        return Expr::number(a * b);
    }
    Rc::new(Expr::BinaryOp {
        op: BinaryOperator::Mul,
        left: l.clone(),
        right: r.clone(),
    })
}

fn fold_floordiv(l: &ExprRef, r: &ExprRef) -> ExprRef {
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        if b.is_zero() {
            return Expr::wildcard();
        }
        return Expr::number(a.div_floor(b));
    }
    Rc::new(Expr::BinaryOp {
        op: BinaryOperator::FloorDiv,
        left: l.clone(),
        right: r.clone(),
    })
}

fn fold_mod(l: &ExprRef, r: &ExprRef) -> ExprRef {
    if let (Some(a), Some(b)) = (l.as_number(), r.as_number()) {
        if b.is_zero() {
            return Expr::wildcard();
        }
        return Expr::number(a.mod_floor(b));
    }
    Rc::new(Expr::BinaryOp {
        op: BinaryOperator::Mod,
        left: l.clone(),
        right: r.clone(),
    })
}

/// Addition used by `concat`'s summed dimension (spec §4.4 `concat`); exposed
/// so [`crate::shape`] doesn't need to duplicate wildcard/number handling.
pub(crate) fn fold_add_entries(l: &ExprRef, r: &ExprRef) -> ExprRef {
    if l.is_wildcard() || r.is_wildcard() {
        return Expr::wildcard();
    }
    sum_normalize(BinaryOperator::Add, l, r)
}

/// Flattens `left (op) right` into a signed list of summable terms (spec §4.4
/// "Sum normalization"): recurses through nested `+`/`-` and unary `+`/`-`,
/// tracking a running negate-bit, then treats anything else as an opaque term.
fn collect_terms(expr: &ExprRef, negate: bool, terms: &mut Vec<(bool, ExprRef)>) {
    match expr.as_ref() {
        Expr::BinaryOp {
            op: BinaryOperator::Add,
            left,
            right,
        } => {
            collect_terms(left, negate, terms);
            collect_terms(right, negate, terms);
        }
        Expr::BinaryOp {
            op: BinaryOperator::Sub,
            left,
            right,
        } => {
            collect_terms(left, negate, terms);
            collect_terms(right, !negate, terms);
        }
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            operand,
        } => collect_terms(operand, !negate, terms),
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            operand,
        } => collect_terms(operand, negate, terms),
        _ => terms.push((negate, expr.clone())),
    }
}

/// Merges numeric literals into a single total and cancels matching
/// non-numeric terms by net signed count, then re-folds the remainder into a
/// right-leaning `+`/`-` chain (spec §4.4; P6 "associativity/commutativity",
/// guaranteeing `a + 0 - a ≡ 0` under structural equality).
///
/// Term order is the first-seen order during the left-to-right flatten; this
/// is an explicit, documented tie-break (spec §9 Open Question on sum-term
/// ordering), not load-bearing for P6 since every other ordering normalizes
/// to the same multiset of surviving terms.
fn sum_normalize(op: BinaryOperator, left: &ExprRef, right: &ExprRef) -> ExprRef {
    let mut terms = Vec::new();
    collect_terms(left, false, &mut terms);
    collect_terms(right, op == BinaryOperator::Sub, &mut terms);

    if terms.iter().any(|(_, t)| t.is_wildcard()) {
        return Expr::wildcard();
    }

    let mut total = BigInt::zero();
    let mut groups: Vec<(ExprRef, i64)> = Vec::new();
    for (negate, term) in terms {
        if let Some(n) = term.as_number() {
            if negate {
                total -= n;
            } else {
                total += n;
            }
            continue;
        }
        let delta: i64 = if negate { -1 } else { 1 };
        if let Some(entry) = groups.iter_mut().find(|(t, _)| *t == term) {
            entry.1 += delta;
        } else {
            groups.push((term, delta));
        }
    }

    let mut signed_terms: Vec<(bool, ExprRef)> = Vec::new();
    for (term, count) in groups {
        if count == 0 {
            continue;
        }
        let negate = count < 0;
        for _ in 0..count.unsigned_abs() {
            signed_terms.push((negate, term.clone()));
        }
    }

    if signed_terms.is_empty() {
        return Expr::number(total);
    }

    let mut iter = signed_terms.into_iter();
    let (first_negate, first_term) = iter.next().expect("checked non-empty above");
    let mut acc = if first_negate {
        Rc::new(Expr::UnaryOp {
            op: UnaryOperator::Minus,
            operand: first_term,
        })
    } else {
        first_term
    };
    for (negate, term) in iter {
        acc = Rc::new(Expr::BinaryOp {
            op: if negate { BinaryOperator::Sub } else { BinaryOperator::Add },
            left: acc,
            right: term,
        });
    }
    if !total.is_zero() {
        let (chain_op, magnitude) = if total.is_negative() {
            (BinaryOperator::Sub, -total)
        } else {
            (BinaryOperator::Add, total)
        };
        acc = Rc::new(Expr::BinaryOp {
            op: chain_op,
            left: acc,
            right: Expr::number(magnitude),
        });
    }
    acc
}

fn simplify_comparison(op: BinaryOperator, l: &ExprRef, r: &ExprRef, registry: &VarRegistry) -> ExprRef {
    if let Some(b) = literal_compare(op, l, r) {
        return Expr::boolean(b);
    }
    if let Some(b) = discharge_via_conditions(op, l, r, registry) {
        return Expr::boolean(b);
    }
    if matches!(op, BinaryOperator::Le | BinaryOperator::Ge) && l == r {
        return Expr::boolean(true);
    }
    Rc::new(Expr::BinaryOp {
        op,
        left: l.clone(),
        right: r.clone(),
    })
}

fn literal_compare(op: BinaryOperator, l: &Expr, r: &Expr) -> Option<bool> {
    match op {
        BinaryOperator::Eq | BinaryOperator::NotEq => {
            let eq = match (l, r) {
                (Expr::Number(a), Expr::Number(b)) => a == b,
                (Expr::Str(a), Expr::Str(b)) => a == b,
                (Expr::Bytes(a), Expr::Bytes(b)) => a == b,
                (Expr::Boolean(a), Expr::Boolean(b)) => a == b,
                _ => return None,
            };
            Some(if op == BinaryOperator::Eq { eq } else { !eq })
        }
        BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => {
            let (Expr::Number(a), Expr::Number(b)) = (l, r) else {
                return None;
            };
            Some(match op {
                BinaryOperator::Lt => a < b,
                BinaryOperator::Le => a <= b,
                BinaryOperator::Gt => a > b,
                BinaryOperator::Ge => a >= b,
                _ => unreachable!(),
            })
        }
        _ => None,
    }
}

/// Consults the operands' attached variable conditions to discharge a
/// comparison without transitive chaining (spec §4.4 "Comparisons").
fn discharge_via_conditions(op: BinaryOperator, l: &ExprRef, r: &ExprRef, registry: &VarRegistry) -> Option<bool> {
    if let Some(v) = l.as_var() {
        if let Some(other) = r.as_number() {
            if let Some(result) = discharge_one_side(op, &v.var_id(), other, registry) {
                return Some(result);
            }
        }
    }
    if let Some(v) = r.as_var() {
        if let Some(other) = l.as_number() {
            if let Some(result) = discharge_one_side(op.inverted(), &v.var_id(), other, registry) {
                return Some(result);
            }
        }
    }
    None
}

fn discharge_one_side(op: BinaryOperator, var_id: &VarId, other: &BigInt, registry: &VarRegistry) -> Option<bool> {
    for cond in registry.conditions(var_id) {
        for conjunct in conjuncts(cond) {
            if let Expr::BinaryOp { op: cond_op, left, right } = conjunct.as_ref() {
                if left.as_var().is_some_and(|v| &v.var_id() == var_id) {
                    if let Some(cond_lit) = right.as_number() {
                        if let Some(result) = implies(*cond_op, cond_lit, op, other) {
                            return Some(result);
                        }
                    }
                }
            }
        }
    }
    None
}

/// Inequality family: direction (+1 for `>`/`>=`, -1 for `<`/`<=`) and strictness.
fn family(op: BinaryOperator) -> Option<(i8, bool)> {
    match op {
        BinaryOperator::Gt => Some((1, true)),
        BinaryOperator::Ge => Some((1, false)),
        BinaryOperator::Lt => Some((-1, true)),
        BinaryOperator::Le => Some((-1, false)),
        _ => None,
    }
}

/// Whether `v (cond_op) cond_lit` implies `v (want_op) want_lit`, for same-direction
/// inequality families only (no transitive chaining across distinct bounds, spec §4.4).
fn implies(cond_op: BinaryOperator, cond_lit: &BigInt, want_op: BinaryOperator, want_lit: &BigInt) -> Option<bool> {
    let (cond_dir, cond_strict) = family(cond_op)?;
    let (want_dir, want_strict) = family(want_op)?;
    if cond_dir != want_dir {
        return None;
    }
    let result = if cond_dir == 1 {
        match (cond_strict, want_strict) {
            (_, false) | (true, true) => cond_lit >= want_lit,
            (false, true) => cond_lit > want_lit,
        }
    } else {
        match (cond_strict, want_strict) {
            (_, false) | (true, true) => cond_lit <= want_lit,
            (false, true) => cond_lit < want_lit,
        }
    };
    Some(result)
}

fn simplify_tuple(entries: &[TupleEntry], original: &ExprRef, registry: &VarRegistry, opts: &mut EvalOptions) -> ExprRef {
    let mut changed = false;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let value = simplify(&entry.value, registry, opts);
        if !Rc::ptr_eq(&value, &entry.value) {
            changed = true;
        }
        if entry.is_unpacked {
            if let Some(inner) = value.as_tuple() {
                changed = true;
                out.extend(inner.iter().cloned());
                continue;
            }
        }
        out.push(TupleEntry {
            value,
            is_unpacked: entry.is_unpacked,
        });
    }
    if changed {
        Rc::new(Expr::Tuple(out))
    } else {
        original.clone()
    }
}

fn simplify_call(name: &str, args: &[ExprRef], registry: &VarRegistry, opts: &mut EvalOptions) -> ExprRef {
    let simplified: Vec<ExprRef> = args.iter().map(|a| simplify(a, registry, opts)).collect();
    let _span = tracing::trace_span!("shape_function", name, argc = simplified.len()).entered();
    match (name, simplified.as_slice()) {
        ("len", [t]) => shape::len(t),
        ("index", [t, i]) => shape::index(t, i, &mut opts.diagnostics),
        ("swap", [t, i, j]) => shape::swap(t, i, j, &mut opts.diagnostics),
        ("permute", [t, idx]) => shape::permute(t, idx, &mut opts.diagnostics),
        ("concat", [t1, t2, d]) => shape::concat(t1, t2, d, &mut opts.diagnostics),
        ("splice", [t1, i, n, t2]) => shape::splice(t1, i, n, t2, &mut opts.diagnostics),
        ("broadcast", [t1, t2]) => shape::broadcast(t1, t2, &mut opts.diagnostics),
        ("reshape", [src, dst]) => shape::reshape(src, dst, &mut opts.diagnostics),
        _ => Rc::new(Expr::Call {
            name: name.to_string(),
            args: simplified,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::RefinementType;
    use crate::var::{RefinementVar, ScopeId};
    use pretty_assertions::assert_eq;

    fn no_diagnostics<'a>() -> EvalOptions<'a> {
        EvalOptions::new(false, Diagnostics::none())
    }

    fn var(name: &str) -> RefinementVar {
        RefinementVar::new_free(name, ScopeId(0), "f", RefinementType::Int)
    }

    #[test]
    fn wildcard_absorbs_arithmetic() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Add,
            left: Expr::wildcard(),
            right: Expr::number(3),
        });
        assert!(simplify(&expr, &registry, &mut opts).is_wildcard());
    }

    #[test]
    fn and_short_circuits_before_wildcard() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::And,
            left: Expr::boolean(false),
            right: Expr::wildcard(),
        });
        assert_eq!(simplify(&expr, &registry, &mut opts).as_bool_literal(), Some(false));
    }

    #[test]
    fn floor_div_by_zero_is_wildcard_not_error() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::FloorDiv,
            left: Expr::number(7),
            right: Expr::number(0),
        });
        let result = simplify(&expr, &registry, &mut opts);
        assert!(result.is_wildcard());
        assert!(opts.diagnostics.errors.is_none() || opts.diagnostics.errors.as_deref().unwrap().is_empty());
    }

    #[test]
    fn sum_normalization_cancels_identical_terms() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let a = Rc::new(Expr::Var(var("a")));
        // a + 0 - a
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Sub,
            left: Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Add,
                left: a.clone(),
                right: Expr::number(0),
            }),
            right: a,
        });
        let result = simplify(&expr, &registry, &mut opts);
        assert_eq!(result.as_number(), Some(&BigInt::zero()));
    }

    #[test]
    fn sum_normalization_merges_across_nested_sums() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let a1 = Rc::new(Expr::Var(var("a")));
        let a2 = Rc::new(Expr::Var(var("a")));
        // (a + 2) + (3 - a)
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Add,
            left: Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Add,
                left: a1,
                right: Expr::number(2),
            }),
            right: Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Sub,
                left: Expr::number(3),
                right: a2,
            }),
        });
        let result = simplify(&expr, &registry, &mut opts);
        assert_eq!(result.as_number(), Some(&BigInt::from(5)));
    }

    #[test]
    fn comparison_discharged_by_stronger_condition() {
        let mut registry = VarRegistry::new();
        let n = var("n");
        let n_ref = Rc::new(Expr::Var(n.clone()));
        registry.set_conditions(
            n.var_id(),
            vec![Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Gt,
                left: n_ref.clone(),
                right: Expr::number(4),
            })],
        );
        let mut opts = no_diagnostics();
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Gt,
            left: n_ref,
            right: Expr::number(3),
        });
        assert_eq!(simplify(&expr, &registry, &mut opts).as_bool_literal(), Some(true));
    }

    #[test]
    fn comparison_is_not_transitively_chained() {
        // n has condition n > 4; asking whether n > 10 must NOT be discharged,
        // since 4 does not imply 10 (no chaining through unrelated bounds).
        let mut registry = VarRegistry::new();
        let n = var("n");
        let n_ref = Rc::new(Expr::Var(n.clone()));
        registry.set_conditions(
            n.var_id(),
            vec![Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Gt,
                left: n_ref.clone(),
                right: Expr::number(4),
            })],
        );
        let mut opts = no_diagnostics();
        let expr = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Gt,
            left: n_ref,
            right: Expr::number(10),
        });
        let result = simplify(&expr, &registry, &mut opts);
        assert!(matches!(result.as_ref(), Expr::BinaryOp { op: BinaryOperator::Gt, .. }));
    }

    #[test]
    fn variable_substituted_from_equality_condition() {
        let mut registry = VarRegistry::new();
        let v = var("v");
        let v_ref = Rc::new(Expr::Var(v.clone()));
        registry.set_conditions(
            v.var_id(),
            vec![Rc::new(Expr::BinaryOp {
                op: BinaryOperator::Eq,
                left: v_ref.clone(),
                right: Expr::number(9),
            })],
        );
        let mut opts = no_diagnostics();
        let result = simplify(&v_ref, &registry, &mut opts);
        assert_eq!(result.as_number(), Some(&BigInt::from(9)));
    }

    #[test]
    fn tuple_unpack_is_spliced_in_place() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let inner = Rc::new(Expr::Tuple(vec![TupleEntry::plain(Expr::number(1)), TupleEntry::plain(Expr::number(2))]));
        let expr = Rc::new(Expr::Tuple(vec![TupleEntry::unpacked(inner), TupleEntry::plain(Expr::number(3))]));
        let result = simplify(&expr, &registry, &mut opts);
        let entries = result.as_tuple().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].value.as_number(), Some(&BigInt::from(3)));
    }

    #[test]
    fn broadcast_aligns_from_the_right_and_accepts_ones() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let t1 = Rc::new(Expr::Tuple(vec![TupleEntry::plain(Expr::number(8)), TupleEntry::plain(Expr::number(1))]));
        let t2 = Rc::new(Expr::Tuple(vec![TupleEntry::plain(Expr::number(5))]));
        let expr = Rc::new(Expr::Call {
            name: "broadcast".into(),
            args: vec![t1, t2],
        });
        let result = simplify(&expr, &registry, &mut opts);
        let entries = result.as_tuple().expect("broadcast should resolve to a tuple");
        assert_eq!(entries[0].value.as_number(), Some(&BigInt::from(8)));
        assert_eq!(entries[1].value.as_number(), Some(&BigInt::from(5)));
    }

    #[test]
    fn reshape_infers_the_free_dimension() {
        let registry = VarRegistry::new();
        let mut opts = no_diagnostics();
        let src = Rc::new(Expr::Tuple(vec![
            TupleEntry::plain(Expr::number(2)),
            TupleEntry::plain(Expr::number(3)),
            TupleEntry::plain(Expr::number(4)),
        ]));
        let dst = Rc::new(Expr::Tuple(vec![TupleEntry::plain(Expr::number(6)), TupleEntry::plain(Expr::number(-1))]));
        let expr = Rc::new(Expr::Call {
            name: "reshape".into(),
            args: vec![src, dst],
        });
        let result = simplify(&expr, &registry, &mut opts);
        let entries = result.as_tuple().expect("reshape should resolve to a tuple");
        assert_eq!(entries[1].value.as_number(), Some(&BigInt::from(4)));
    }

    #[test]
    fn permute_reports_duplicate_index() {
        let mut errors = Vec::new();
        let registry = VarRegistry::new();
        let mut opts = EvalOptions::new(false, Diagnostics { errors: Some(&mut errors), warnings: None });
        let t = Rc::new(Expr::Tuple(vec![
            TupleEntry::plain(Expr::number(1)),
            TupleEntry::plain(Expr::number(2)),
            TupleEntry::plain(Expr::number(3)),
        ]));
        let idx = Rc::new(Expr::Tuple(vec![
            TupleEntry::plain(Expr::number(0)),
            TupleEntry::plain(Expr::number(2)),
            TupleEntry::plain(Expr::number(0)),
        ]));
        let expr = Rc::new(Expr::Call {
            name: "permute".into(),
            args: vec![t, idx],
        });
        let result = simplify(&expr, &registry, &mut opts);
        assert!(result.is_wildcard());
        assert_eq!(errors.len(), 1);
    }
}
