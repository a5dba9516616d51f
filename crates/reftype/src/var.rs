//! Refinement-variable identity and the variable registry (spec §3, §4.2 "Variable registration").

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::expr::{ExprRef, RefinementType};
use crate::diagnostic::SourceRange;

/// Opaque identifier for a lexical scope a refinement variable is declared in
/// (a function signature, a class body, ...). The resolver that builds the
/// surrounding type checker is responsible for allocating these; `reftype`
/// only needs equality and a stable numeric identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical variable identifier, `"name@scopeId[*]"` (spec §3), used as the key
/// type for the [solution store](crate::solution) and the condition map below.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(String);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A refinement variable: identity `(name, scopeId, bound?)` plus its declared type
/// (spec §3 "Refinement variable"). Instances are immutable value types; toggling
/// bound/free state produces a *new* `RefinementVar` rather than mutating in place,
/// matching the immutable-expression-tree invariant (§3 "Lifecycle").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefinementVar {
    pub name: Arc<str>,
    pub scope_id: ScopeId,
    /// User-visible name of the enclosing scope, used in diagnostics.
    pub scope_name: Arc<str>,
    pub element_type: RefinementType,
    pub bound: bool,
}

impl RefinementVar {
    pub fn new_free(name: impl Into<Arc<str>>, scope_id: ScopeId, scope_name: impl Into<Arc<str>>, element_type: RefinementType) -> Self {
        Self {
            name: name.into(),
            scope_id,
            scope_name: scope_name.into(),
            element_type,
            bound: false,
        }
    }

    /// Returns the same variable identity with the bound bit flipped.
    #[must_use]
    pub fn with_bound(&self, bound: bool) -> Self {
        Self { bound, ..self.clone() }
    }

    pub fn var_id(&self) -> VarId {
        let marker = if self.bound { "[*]" } else { "" };
        VarId(format!("{}@{}{marker}", self.name, self.scope_id))
    }

    pub fn is_free(&self) -> bool {
        !self.bound
    }
}

/// Where a variable occurrence was seen: in a refinement's *value* expression,
/// or in its *condition* expression (spec §4.2, feeds consistency rule 4 "value coverage").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceKind {
    Value,
    Condition,
}

/// One recorded sighting of a variable name during parse-adapter processing.
#[derive(Debug, Clone)]
pub struct VarOccurrence {
    pub var_id: VarId,
    pub position: Option<SourceRange>,
    pub kind: OccurrenceKind,
}

/// Per-parse registry of refinement variables: identity interning, occurrence
/// tracking, and the post-hoc condition lists attached by the consistency
/// checker (spec §3 "list of associated conditions ... attached post-hoc").
///
/// Conditions live here rather than on `RefinementVar` itself so that the
/// expression tree stays immutable and cheaply shareable (§5); the evaluator
/// takes a `&VarRegistry` alongside the expression it simplifies.
#[derive(Debug, Default)]
pub struct VarRegistry {
    vars: IndexMap<VarId, RefinementVar>,
    occurrences: Vec<VarOccurrence>,
    conditions: IndexMap<VarId, Vec<ExprRef>>,
}

impl VarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a variable by its identity. If a variable with the same id was
    /// already registered, the existing entry is returned as-is; callers
    /// (the parser adapter) are responsible for checking type agreement
    /// before calling this again for the same name.
    pub fn intern(&mut self, var: RefinementVar) -> RefinementVar {
        let id = var.var_id();
        self.vars.entry(id).or_insert(var).clone()
    }

    pub fn lookup(&self, id: &VarId) -> Option<&RefinementVar> {
        self.vars.get(id)
    }

    pub fn record_occurrence(&mut self, var_id: VarId, position: Option<SourceRange>, kind: OccurrenceKind) {
        self.occurrences.push(VarOccurrence { var_id, position, kind });
    }

    pub fn occurrences(&self) -> &[VarOccurrence] {
        &self.occurrences
    }

    pub fn occurrences_of<'a>(&'a self, id: &'a VarId) -> impl Iterator<Item = &'a VarOccurrence> {
        self.occurrences.iter().filter(move |o| &o.var_id == id)
    }

    /// True if `id` was ever recorded in a *value* position (consistency rule 4).
    pub fn has_value_occurrence(&self, id: &VarId) -> bool {
        self.occurrences_of(id).any(|o| o.kind == OccurrenceKind::Value)
    }

    pub fn set_conditions(&mut self, id: VarId, conditions: Vec<ExprRef>) {
        self.conditions.insert(id, conditions);
    }

    pub fn conditions(&self, id: &VarId) -> &[ExprRef] {
        self.conditions.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn all_vars(&self) -> impl Iterator<Item = &RefinementVar> {
        self.vars.values()
    }
}

/// Rc-free, test-friendly constructor kept at module scope for ergonomics,
/// re-exported so that `VarRegistry::intern` paired with this reads naturally
/// in parser-adapter call sites.
pub fn free_var(name: &str, scope_id: ScopeId, scope_name: &str, element_type: RefinementType) -> RefinementVar {
    RefinementVar::new_free(name, scope_id, scope_name, element_type)
}
