//! Solution store (spec §4.5): an ordered, non-empty list of solution sets
//! mapping variable ids to an optional solved expression. The first set is
//! always "main"; setting a variable writes the value into every set.

use indexmap::IndexMap;
use thiserror::Error;

use crate::expr::ExprRef;
use crate::var::VarId;

/// A single solution set's entries: `None` means the variable is known but
/// not yet (or never) solved, distinct from the variable being absent.
pub type Solution = IndexMap<VarId, Option<ExprRef>>;

#[derive(Debug, Clone, Default)]
pub struct SolutionSet {
    pub name: Option<String>,
    entries: Solution,
}

impl SolutionSet {
    pub fn new(name: Option<String>) -> Self {
        Self { name, entries: Solution::new() }
    }

    pub fn get(&self, id: &VarId) -> Option<&ExprRef> {
        self.entries.get(id).and_then(|o| o.as_ref())
    }

    pub fn set(&mut self, id: VarId, value: Option<ExprRef>) {
        self.entries.insert(id, value);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&VarId, &Option<ExprRef>)> {
        self.entries.iter()
    }

    /// True if this set has no bindings at all, solved or otherwise.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolutionStoreError {
    #[error("solution set index {index} is out of range (store has {len} set(s))")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Always holds at least one set, the "main" set at index 0 (spec §4.5).
#[derive(Debug)]
pub struct SolutionStore {
    sets: Vec<SolutionSet>,
}

impl SolutionStore {
    pub fn new(main: SolutionSet) -> Self {
        Self { sets: vec![main] }
    }

    pub fn push(&mut self, set: SolutionSet) {
        self.sets.push(set);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// True if every solution set in the store carries no bindings (spec §4.5
    /// "is-empty: all sets empty").
    pub fn is_empty(&self) -> bool {
        self.sets.iter().all(SolutionSet::is_empty)
    }

    pub fn main(&self) -> &SolutionSet {
        &self.sets[0]
    }

    pub fn main_mut(&mut self) -> &mut SolutionSet {
        &mut self.sets[0]
    }

    pub fn get(&self, index: usize) -> Result<&SolutionSet, SolutionStoreError> {
        let len = self.sets.len();
        self.sets.get(index).ok_or(SolutionStoreError::IndexOutOfRange { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut SolutionSet, SolutionStoreError> {
        let len = self.sets.len();
        self.sets.get_mut(index).ok_or(SolutionStoreError::IndexOutOfRange { index, len })
    }

    /// Writes `value` for `id` into every solution set (spec §4.5 "setting a
    /// variable writes to every solution set").
    pub fn set_everywhere(&mut self, id: VarId, value: Option<ExprRef>) {
        for set in &mut self.sets {
            set.set(id.clone(), value.clone());
        }
    }

    pub fn sets(&self) -> &[SolutionSet] {
        &self.sets
    }
}
