//! Alias resolution walker (spec §4.7): follows a chain of re-export
//! declarations to the concrete declaration it ultimately names, tracking
//! cycle safety (P3/P4) and typed-vs-untyped package transitions along the
//! way. Module/file resolution and symbol binding themselves are out of
//! scope (spec §1 Non-goals); callers supply both through [`ImportLookup`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::declaration::{module_hash, AliasDeclaration, Declaration, DeclId, ImportLookup, LookupResult};

/// Visibility policy for the walk (spec §4.7 "resolveLocalNames" /
/// "allowExternallyHiddenAccess").
#[derive(Debug, Clone, Copy)]
pub struct AliasResolutionOptions {
    /// If false, the walker stops immediately and returns no resolution —
    /// used by callers that only want to resolve externally-visible aliases.
    pub resolve_local_names: bool,
    /// If false, a hop into a symbol marked externally hidden (a
    /// leading-underscore name, by this crate's convention) fails the walk.
    pub allow_externally_hidden_access: bool,
}

impl Default for AliasResolutionOptions {
    fn default() -> Self {
        Self {
            resolve_local_names: true,
            allow_externally_hidden_access: false,
        }
    }
}

/// Result of a completed walk: the concrete declaration at the end of the
/// chain, plus the typed-package transition bits accumulated along the way
/// (spec §4.7 "privatePyTypedImporter / privatePyTypedImported"). `None` in
/// `declaration` is the native-library sentinel of step 5, distinct from the
/// walk failing outright (the whole function then returns `None`, not
/// `Some(ResolvedAliasInfo { declaration: None, .. })`).
#[derive(Debug, Clone)]
pub struct ResolvedAliasInfo {
    pub declaration: Option<Declaration>,
    /// Whether the walk ever crossed a typed/untyped package boundary.
    pub saw_typed_transition: bool,
    /// The module of the declaration at the first typed/untyped transition,
    /// set only when that hop's import was itself a private (non-py.typed-importer)
    /// import (spec §4.7 step 10).
    pub private_pytyped_importer: Option<Arc<str>>,
    /// The module of the declaration the first time, after the initial
    /// transition, a hop's import is *not* marked private — i.e. a typed
    /// package re-exporting a name that passed through an untyped link
    /// further down the chain (spec §4.7 step 10).
    pub private_pytyped_imported: Option<Arc<str>>,
}

/// Selects which declaration on `symbol` the walk should follow next (spec
/// §4.7 steps 8-9): prefer typed declarations, falling back to all of them;
/// within that group, drop declarations inside an exception-suite unless
/// doing so would leave nothing; then take the last declaration not yet in
/// `visited`, or the last one overall if every candidate has been visited
/// (preserves overload ordering — the last overload wins).
fn select_declaration<'a>(symbol: &'a Symbol, visited: &HashSet<DeclId>) -> Option<&'a Declaration> {
    let typed: Vec<&Declaration> = symbol.declarations.iter().filter(|d| symbol.is_typed(d.id())).collect();
    let group: Vec<&Declaration> = if typed.is_empty() { symbol.declarations.iter().collect() } else { typed };

    let without_exception: Vec<&Declaration> = group.iter().copied().filter(|d| !symbol.is_in_exception_suite(d.id())).collect();
    let candidates = if without_exception.is_empty() { group } else { without_exception };

    candidates.iter().rev().find(|d| !visited.contains(&d.id())).copied().or_else(|| candidates.last().copied())
}

/// Walks `start`'s re-export chain to its concrete declaration (spec §4.7,
/// the resolver's 12-step algorithm). Returns `None` if the walk cannot
/// complete: a cycle, a missing symbol, or a policy rejection (spec §7
/// "degrade, don't abort" — callers see an absence, not a panic).
#[tracing::instrument(level = "debug", skip(lookup, options), fields(target = %start.target_module, symbol = start.target_name.as_deref().unwrap_or("<module>")))]
pub fn resolve_alias_declaration(start: &AliasDeclaration, lookup: &dyn ImportLookup, options: &AliasResolutionOptions) -> Option<ResolvedAliasInfo> {
    let mut visited: HashSet<DeclId> = HashSet::new();
    let mut current = start.clone();

    let mut saw_typed_transition = false;
    let mut private_pytyped_importer: Option<Arc<str>> = None;
    let mut private_pytyped_imported: Option<Arc<str>> = None;
    let mut prev_importer_pytyped: Option<bool> = None;

    loop {
        // Step 11/12: cycle detection by declaration identity (P3 "cycle
        // safety", P4 "alias-walker termination"). The self-import special
        // case of step 11 rescues a cycle that closes back on the chain's
        // own starting declaration, provided that declaration carries a
        // submodule fallback: follow the fallback instead of failing.
        if !visited.insert(current.id) {
            if current.id == start.id {
                if let Some(fallback) = current.submodule_fallback.clone() {
                    current = *fallback;
                    continue;
                }
            }
            return None;
        }

        // Step: `resolveLocalNames = false` only stops the walk at an alias
        // that itself introduces a user-chosen local name (`import x as y`);
        // a plain re-export keeps going (spec §4.7 step 2).
        if !options.resolve_local_names && current.uses_local_name {
            return Some(ResolvedAliasInfo {
                declaration: Some(Declaration::Alias(current.clone())),
                saw_typed_transition,
                private_pytyped_importer,
                private_pytyped_imported,
            });
        }

        // Step: self-import special case — `import pkg.pkg` (or a `from`
        // statement inside `pkg` importing `pkg` itself) binds the name to
        // the enclosing module, not to a symbol lookup within it.
        if current.target_name.is_none() && current.target_module.as_ref() == current.importer_module.as_ref() {
            return Some(ResolvedAliasInfo {
                declaration: Some(synthetic_module_decl(&current.target_module)),
                saw_typed_transition,
                private_pytyped_importer,
                private_pytyped_imported,
            });
        }

        // Step 10: typed/untyped package transition tracking. The first time
        // importer py-typed-ness differs from the previous hop's, record the
        // crossing declaration's module if that hop was itself a private
        // import; every hop after that first crossing that is *not* private
        // records the module of the first one that marks the import as
        // having reached a publicly re-exported name again.
        let importer_pytyped = lookup.is_module_pytyped(&current.importer_module);
        if let Some(prev) = prev_importer_pytyped {
            if prev != importer_pytyped && !saw_typed_transition {
                saw_typed_transition = true;
                if current.is_private_pytyped_import {
                    private_pytyped_importer = Some(current.importer_module.clone());
                }
            } else if saw_typed_transition && private_pytyped_imported.is_none() && !current.is_private_pytyped_import {
                private_pytyped_imported = Some(current.importer_module.clone());
            }
        }
        prev_importer_pytyped = Some(importer_pytyped);

        // Step: bare module import (`import pkg`) has no symbol to chase.
        let Some(target_name) = current.target_name.clone() else {
            return Some(ResolvedAliasInfo {
                declaration: Some(synthetic_module_decl(&current.target_module)),
                saw_typed_transition,
                private_pytyped_importer,
                private_pytyped_imported,
            });
        };

        // Step 4/5: symbol lookup in the target module, with submodule
        // fallback (spec §4.7 "a name that isn't a symbol in the package's
        // __init__ may still resolve as a submodule"). If that also misses:
        // follow the alias's own submodule-fallback declaration if it has
        // one; else, if it targets a native library, return the sentinel
        // (`declaration: None`) rather than failing; else the walk is
        // unresolved.
        let found = match lookup.lookup_symbol(&current.target_module, &target_name) {
            LookupResult::Found { symbol, is_externally_hidden } => {
                if is_externally_hidden && !options.allow_externally_hidden_access {
                    return None;
                }
                symbol
            }
            LookupResult::NotFound => match lookup.lookup_submodule(&current.target_module, &target_name) {
                LookupResult::Found { symbol, is_externally_hidden } => {
                    if is_externally_hidden && !options.allow_externally_hidden_access {
                        return None;
                    }
                    symbol
                }
                LookupResult::NotFound => {
                    if let Some(fallback) = current.submodule_fallback.clone() {
                        current = *fallback;
                        continue;
                    }
                    if current.is_native_lib {
                        return Some(ResolvedAliasInfo {
                            declaration: None,
                            saw_typed_transition,
                            private_pytyped_importer,
                            private_pytyped_imported,
                        });
                    }
                    return None;
                }
            },
        };

        // Step 8/9: pick the declaration to follow, then terminate on a
        // concrete declaration or keep following the chain.
        match select_declaration(&found, &visited)? {
            Declaration::Concrete { id, name } => {
                return Some(ResolvedAliasInfo {
                    declaration: Some(Declaration::Concrete { id: *id, name: name.clone() }),
                    saw_typed_transition,
                    private_pytyped_importer,
                    private_pytyped_imported,
                });
            }
            Declaration::Alias(next) => current = next.clone(),
        }
    }
}

fn synthetic_module_decl(module: &Arc<str>) -> Declaration {
    Declaration::Concrete { id: DeclId(module_hash(module)), name: module.clone() }
}
