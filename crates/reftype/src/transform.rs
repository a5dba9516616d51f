//! Generic structural rewrite of refinement expressions (spec §4.1).
//!
//! [`Transformer::apply`] walks an expression, giving each variant a chance to
//! rewrite itself via the overridable `transform_*` hooks. Composite variants
//! rewrite their children first; if no hook fired and no child changed, the
//! original [`ExprRef`] is returned untouched (P2: "If a transform never
//! changes a subtree, it returns the same node reference").

use std::collections::HashSet;
use std::rc::Rc;

use crate::expr::{BinaryOperator, Expr, ExprRef, TupleEntry, UnaryOperator};
use crate::var::{RefinementVar, ScopeId, VarId};

/// Override only the hooks you care about; the rest default to "no change".
/// Hooks receive the already up-to-date node (children, if any, have already
/// been rewritten) and return `Some(replacement)` to substitute it, or `None`
/// to keep the rewritten-children node as-is.
pub trait Transformer {
    fn transform_number(&mut self, _n: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_str(&mut self, _n: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_bytes(&mut self, _n: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_boolean(&mut self, _n: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_wildcard(&mut self, _n: &ExprRef) -> Option<ExprRef> {
        None
    }
    /// Called instead of recursing for `Var` nodes; return `Some` to replace
    /// the variable itself (e.g. with a substitution), or do your own
    /// recursion internally (as `ApplySolvedVars` does).
    fn transform_var(&mut self, _v: &RefinementVar, _original: &ExprRef) -> Option<ExprRef> {
        None
    }
    /// Called after `operand` has already been rewritten.
    fn transform_unary_op(&mut self, _op: UnaryOperator, _operand: &ExprRef, _rewritten: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_binary_op(
        &mut self,
        _op: BinaryOperator,
        _left: &ExprRef,
        _right: &ExprRef,
        _rewritten: &ExprRef,
    ) -> Option<ExprRef> {
        None
    }
    fn transform_tuple(&mut self, _entries: &[TupleEntry], _rewritten: &ExprRef) -> Option<ExprRef> {
        None
    }
    fn transform_call(&mut self, _name: &str, _args: &[ExprRef], _rewritten: &ExprRef) -> Option<ExprRef> {
        None
    }

    /// Entry point: rewrite `expr` bottom-up, dispatching to the hooks above.
    fn apply(&mut self, expr: &ExprRef) -> ExprRef
    where
        Self: Sized,
    {
        apply(self, expr)
    }
}

/// Free function form so it can be called from within a hook implementation
/// (e.g. `ApplySolvedVars::transform_var`) without fighting the borrow checker
/// over `&mut self`.
pub fn apply<T: Transformer + ?Sized>(t: &mut T, expr: &ExprRef) -> ExprRef {
    match expr.as_ref() {
        Expr::Number(_) => t.transform_number(expr).unwrap_or_else(|| expr.clone()),
        Expr::Str(_) => t.transform_str(expr).unwrap_or_else(|| expr.clone()),
        Expr::Bytes(_) => t.transform_bytes(expr).unwrap_or_else(|| expr.clone()),
        Expr::Boolean(_) => t.transform_boolean(expr).unwrap_or_else(|| expr.clone()),
        Expr::Wildcard => t.transform_wildcard(expr).unwrap_or_else(|| expr.clone()),
        Expr::Var(v) => t.transform_var(v, expr).unwrap_or_else(|| expr.clone()),
        Expr::UnaryOp { op, operand } => {
            let new_operand = apply(t, operand);
            let rewritten = if Rc::ptr_eq(&new_operand, operand) {
                expr.clone()
            } else {
                Rc::new(Expr::UnaryOp {
                    op: *op,
                    operand: new_operand.clone(),
                })
            };
            t.transform_unary_op(*op, &new_operand, &rewritten).unwrap_or(rewritten)
        }
        Expr::BinaryOp { op, left, right } => {
            let new_left = apply(t, left);
            let new_right = apply(t, right);
            let rewritten = if Rc::ptr_eq(&new_left, left) && Rc::ptr_eq(&new_right, right) {
                expr.clone()
            } else {
                Rc::new(Expr::BinaryOp {
                    op: *op,
                    left: new_left.clone(),
                    right: new_right.clone(),
                })
            };
            t.transform_binary_op(*op, &new_left, &new_right, &rewritten).unwrap_or(rewritten)
        }
        Expr::Tuple(entries) => {
            let mut changed = false;
            let new_entries: Vec<TupleEntry> = entries
                .iter()
                .map(|entry| {
                    let new_value = apply(t, &entry.value);
                    if !Rc::ptr_eq(&new_value, &entry.value) {
                        changed = true;
                    }
                    TupleEntry {
                        value: new_value,
                        is_unpacked: entry.is_unpacked,
                    }
                })
                .collect();
            let rewritten = if changed { Rc::new(Expr::Tuple(new_entries.clone())) } else { expr.clone() };
            t.transform_tuple(&new_entries, &rewritten).unwrap_or(rewritten)
        }
        Expr::Call { name, args } => {
            let mut changed = false;
            let new_args: Vec<ExprRef> = args
                .iter()
                .map(|a| {
                    let new_a = apply(t, a);
                    if !Rc::ptr_eq(&new_a, a) {
                        changed = true;
                    }
                    new_a
                })
                .collect();
            let rewritten = if changed {
                Rc::new(Expr::Call {
                    name: name.clone(),
                    args: new_args.clone(),
                })
            } else {
                expr.clone()
            };
            t.transform_call(name, &new_args, &rewritten).unwrap_or(rewritten)
        }
    }
}

/// Toggles the bound bit to `true` for variables whose scope is in `scopes` (spec §4.1).
pub struct BoundTransform {
    pub scopes: HashSet<ScopeId>,
}

impl Transformer for BoundTransform {
    fn transform_var(&mut self, v: &RefinementVar, original: &ExprRef) -> Option<ExprRef> {
        if self.scopes.contains(&v.scope_id) && !v.bound {
            Some(Rc::new(Expr::Var(v.with_bound(true))))
        } else {
            let _ = original;
            None
        }
    }
}

/// Toggles the bound bit to `false` (free) for variables whose scope is in `scopes`.
pub struct FreeTransform {
    pub scopes: HashSet<ScopeId>,
}

impl Transformer for FreeTransform {
    fn transform_var(&mut self, v: &RefinementVar, _original: &ExprRef) -> Option<ExprRef> {
        if self.scopes.contains(&v.scope_id) && v.bound {
            Some(Rc::new(Expr::Var(v.with_bound(false))))
        } else {
            None
        }
    }
}

/// Collects the unique free variables reachable from `root` (spec §4.1 "`CollectFreeVars`").
///
/// Implemented as a plain recursive walk rather than a `Transformer` impl since
/// it never rewrites anything; using the transformer hooks here would force an
/// allocation-per-node just to observe, which the framework is designed to avoid.
pub fn collect_free_vars(root: &ExprRef, out: &mut indexmap::IndexSet<RefinementVar>) {
    match root.as_ref() {
        Expr::Var(v) => {
            if v.is_free() {
                out.insert(v.clone());
            }
        }
        Expr::UnaryOp { operand, .. } => collect_free_vars(operand, out),
        Expr::BinaryOp { left, right, .. } => {
            collect_free_vars(left, out);
            collect_free_vars(right, out);
        }
        Expr::Tuple(entries) => {
            for entry in entries {
                collect_free_vars(&entry.value, out);
            }
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_free_vars(arg, out);
            }
        }
        Expr::Number(_) | Expr::Str(_) | Expr::Bytes(_) | Expr::Boolean(_) | Expr::Wildcard => {}
    }
}

/// Replaces `Var(v)` by `map[v.id]` if present, optionally replacing any
/// remaining free variable with `Wildcard` (spec §4.1 `ApplySolvedVars`).
///
/// Cycle-safe: a variable id currently being substituted is pushed onto
/// `in_progress`; re-entering it returns the original `Var` node unchanged
/// (P3 "cycle safety").
pub struct ApplySolvedVars<'a> {
    pub map: &'a std::collections::HashMap<VarId, ExprRef>,
    pub replace_unsolved: bool,
    in_progress: HashSet<VarId>,
}

impl<'a> ApplySolvedVars<'a> {
    pub fn new(map: &'a std::collections::HashMap<VarId, ExprRef>, replace_unsolved: bool) -> Self {
        Self {
            map,
            replace_unsolved,
            in_progress: HashSet::new(),
        }
    }
}

impl Transformer for ApplySolvedVars<'_> {
    fn transform_var(&mut self, v: &RefinementVar, original: &ExprRef) -> Option<ExprRef> {
        let id = v.var_id();
        if self.in_progress.contains(&id) {
            return Some(original.clone());
        }
        if let Some(target) = self.map.get(&id) {
            self.in_progress.insert(id.clone());
            let result = apply(self, target);
            self.in_progress.remove(&id);
            return Some(result);
        }
        if self.replace_unsolved && v.is_free() {
            return Some(Expr::wildcard());
        }
        None
    }
}
