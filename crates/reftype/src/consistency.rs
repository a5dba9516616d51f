//! Consistency checker (spec §4.3): five rules run over a refinement's
//! preconditions and postconditions, plus the variable registry the parser
//! adapter built while parsing them. Produces the deduplicated list of scope
//! variables the rest of the pipeline operates over.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::eval::conjuncts;
use crate::refinement::TypeRefinement;
use crate::transform::collect_free_vars;
use crate::var::{RefinementVar, VarId, VarRegistry};

/// Outcome of [`check_consistency`]: the deduplicated scope variable list
/// consistency rule 4 (value coverage) and rule 5 (condition propagation)
/// leave behind.
pub struct ConsistencyReport {
    pub scope_vars: Vec<RefinementVar>,
}

/// Runs all five consistency rules and returns the resulting scope variable
/// list. Diagnostics are reported through `diagnostics`; a failing rule does
/// not stop the remaining rules from running (spec §7 "degrade, don't abort").
pub fn check_consistency(preconditions: &[TypeRefinement], postconditions: &[TypeRefinement], registry: &mut VarRegistry, diagnostics: &mut Diagnostics) -> ConsistencyReport {
    rule_precondition_value_shape(preconditions, diagnostics);
    rule_postcondition_condition_absence(postconditions, diagnostics);
    rule_cross_occurrence_type_agreement(registry, diagnostics);
    rule_value_coverage(registry, diagnostics);
    rule_propagate_conditions(preconditions, registry);

    let mut seen = IndexSet::new();
    let mut scope_vars = Vec::new();
    for v in registry.all_vars() {
        if seen.insert(v.var_id()) {
            scope_vars.push(v.clone());
        }
    }
    ConsistencyReport { scope_vars }
}

/// Rule 1: a precondition's value expression must be a bare literal,
/// variable, or wildcard with no condition attached (spec §4.3
/// "precondition-value-shape atoms").
fn rule_precondition_value_shape(preconditions: &[TypeRefinement], diagnostics: &mut Diagnostics) {
    for p in preconditions {
        if !p.is_precondition_atom() {
            diagnostics.report_error(Diagnostic::error(
                "refinement-precondition-shape",
                "a precondition's value expression must be a literal, variable, or wildcard with no condition",
            ));
        }
    }
}

/// Rule 2: a postcondition may not itself carry a condition expression
/// (spec §4.3 "postcondition-condition absence") — conditions describe
/// preconditions, not what a call is guaranteed to return.
fn rule_postcondition_condition_absence(postconditions: &[TypeRefinement], diagnostics: &mut Diagnostics) {
    for p in postconditions {
        if p.condition.is_some() {
            diagnostics.report_error(Diagnostic::error("refinement-postcondition-condition", "a postcondition may not carry a condition expression"));
        }
    }
}

/// Rule 3: every recorded occurrence must resolve back to a variable the
/// registry actually interned (spec §4.3 "cross-occurrence variable type
/// agreement") — type agreement itself is enforced at intern time by the
/// parser adapter, so this rule's remaining job is to catch an occurrence
/// recorded against an id nothing registered.
fn rule_cross_occurrence_type_agreement(registry: &VarRegistry, diagnostics: &mut Diagnostics) {
    for occurrence in registry.occurrences() {
        if registry.lookup(&occurrence.var_id).is_none() {
            diagnostics.report_error(Diagnostic::error(
                "refinement-unregistered-occurrence",
                format!("variable occurrence '{}' does not correspond to a registered variable", occurrence.var_id),
            ));
        }
    }
}

/// Rule 4: a variable referenced only from condition position, never from a
/// value position, is rejected (spec §4.3 "value-coverage").
fn rule_value_coverage(registry: &VarRegistry, diagnostics: &mut Diagnostics) {
    for var in registry.all_vars() {
        let id = var.var_id();
        if !registry.has_value_occurrence(&id) {
            diagnostics.report_error(Diagnostic::error(
                "refinement-missing-value-occurrence",
                format!("variable '{}' is referenced only in condition position, never as a value", var.name),
            ));
        }
    }
}

/// Rule 5: attaches each precondition's condition expression to every
/// variable it mentions, split into its top-level conjuncts, so the
/// evaluator can later discharge comparisons and substitute equalities
/// (spec §4.3 "condition propagation into the variable registry").
fn rule_propagate_conditions(preconditions: &[TypeRefinement], registry: &mut VarRegistry) {
    let mut by_var: HashMap<VarId, Vec<crate::expr::ExprRef>> = HashMap::new();
    for p in preconditions {
        let Some(cond) = &p.condition else { continue };
        for conjunct in conjuncts(cond) {
            let mut free = IndexSet::new();
            collect_free_vars(&conjunct, &mut free);
            for v in &free {
                by_var.entry(v.var_id()).or_default().push(conjunct.clone());
            }
        }
    }
    for (id, conds) in by_var {
        registry.set_conditions(id, conds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOperator, Expr, RefinementType};
    use crate::var::{RefinementVar, ScopeId};
    use std::rc::Rc;

    fn diags<'a>(errors: &'a mut Vec<Diagnostic>) -> Diagnostics<'a> {
        Diagnostics { errors: Some(errors), warnings: None }
    }

    #[test]
    fn postcondition_with_condition_is_rejected() {
        let mut errors = Vec::new();
        let mut registry = VarRegistry::new();
        let post = TypeRefinement {
            class: RefinementType::Int,
            value: Expr::number(1),
            is_enforced: true,
            condition: Some(Expr::boolean(true)),
        };
        check_consistency(&[], std::slice::from_ref(&post), &mut registry, &mut diags(&mut errors));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].template_id, "refinement-postcondition-condition");
    }

    #[test]
    fn non_atomic_precondition_value_is_rejected() {
        let mut errors = Vec::new();
        let mut registry = VarRegistry::new();
        let pre = TypeRefinement {
            class: RefinementType::Int,
            value: Rc::new(Expr::BinaryOp { op: BinaryOperator::Add, left: Expr::number(1), right: Expr::number(2) }),
            is_enforced: true,
            condition: None,
        };
        check_consistency(std::slice::from_ref(&pre), &[], &mut registry, &mut diags(&mut errors));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].template_id, "refinement-precondition-shape");
    }

    #[test]
    fn condition_only_variable_fails_value_coverage() {
        let mut errors = Vec::new();
        let mut registry = VarRegistry::new();
        let var = RefinementVar::new_free("n", ScopeId(0), "f", RefinementType::Int);
        registry.intern(var.clone());
        registry.record_occurrence(var.var_id(), None, crate::var::OccurrenceKind::Condition);
        check_consistency(&[], &[], &mut registry, &mut diags(&mut errors));
        assert!(errors.iter().any(|e| e.template_id == "refinement-missing-value-occurrence"));
    }

    #[test]
    fn conditions_propagate_to_every_mentioned_variable() {
        let mut errors = Vec::new();
        let mut registry = VarRegistry::new();
        let var = RefinementVar::new_free("n", ScopeId(0), "f", RefinementType::Int);
        let interned = registry.intern(var.clone());
        registry.record_occurrence(interned.var_id(), None, crate::var::OccurrenceKind::Value);
        let cond = Rc::new(Expr::BinaryOp {
            op: BinaryOperator::Gt,
            left: Rc::new(Expr::Var(interned.clone())),
            right: Expr::number(4),
        });
        let pre = TypeRefinement { class: RefinementType::Int, value: Rc::new(Expr::Var(interned.clone())), is_enforced: true, condition: Some(cond) };
        let report = check_consistency(std::slice::from_ref(&pre), &[], &mut registry, &mut diags(&mut errors));
        assert!(errors.is_empty());
        assert_eq!(report.scope_vars.len(), 1);
        assert_eq!(registry.conditions(&interned.var_id()).len(), 1);
    }
}
