//! Declaration and symbol model (spec §4.7 "Data Model"): the shapes the
//! alias resolver walks. Binding a name to a declaration and looking up a
//! symbol table by import path are the surrounding type checker's job
//! (spec §1 Non-goals "symbol binding"); this module only defines the
//! vocabulary [`crate::alias::resolve_alias_declaration`] operates on.

use std::sync::Arc;

/// Opaque identity for a declaration, used to detect re-export cycles by
/// identity rather than by value (spec §4.7 "visited declaration identity set").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `import x` / `from m import x` — re-exports another declaration.
    Alias,
    /// Anything that isn't itself a re-export: a class, function, variable, or module.
    Concrete,
}

/// An `import`/`from ... import ...` declaration: names the module it points
/// into, the symbol name being imported (`None` for a bare module import),
/// and whether the importing module is itself "py.typed" (spec §4.7
/// "privatePyTypedImporter / privatePyTypedImported").
#[derive(Debug, Clone)]
pub struct AliasDeclaration {
    pub id: DeclId,
    /// Dotted module path of the module the `import`/`from` statement lives in,
    /// needed for the self-import special case and typed-transition tracking
    /// (spec §4.7).
    pub importer_module: Arc<str>,
    /// Dotted module path this alias points into, e.g. `"pkg.sub"`.
    pub target_module: Arc<str>,
    /// `None` means "import the module object itself" rather than a symbol from it.
    pub target_name: Option<Arc<str>>,
    /// True if the *importing* module is not itself marked `py.typed`
    /// (spec §4.7 "isPrivatePyTypedImport").
    pub is_private_pytyped_import: bool,
    /// True if this import targets a submodule rather than a symbol
    /// (spec §4.7 "submodule fallback").
    pub is_submodule_import: bool,
    /// True when the alias introduced a user-chosen local name (`import x as y`),
    /// as opposed to a bare `import x` / `from m import x` (spec §3 "usesLocalName
    /// flag"). Gates step 2 of the walk: with `resolveLocalNames = false`, only
    /// *this* kind of alias stops the walk early; a plain re-export keeps going.
    pub uses_local_name: bool,
    /// True if this alias resolves into a native (extension) module rather
    /// than one backed by source. A missing symbol on such an alias resolves
    /// to the sentinel `{declaration: None, ...}` instead of failing the walk
    /// (spec §4.7 step 5 "isNativeLib").
    pub is_native_lib: bool,
    /// A secondary target to fall back to when the primary symbol lookup
    /// finds nothing, or when the chain cycles back onto this alias's own
    /// starting point (spec §3 "submodule-fallback alias"; spec §4.7 steps 5
    /// and 11).
    pub submodule_fallback: Option<Box<AliasDeclaration>>,
}

/// A declaration in the symbol table: either a re-export ([`AliasDeclaration`])
/// or something concrete the walk terminates on.
#[derive(Debug, Clone)]
pub enum Declaration {
    Alias(AliasDeclaration),
    Concrete { id: DeclId, name: Arc<str> },
}

impl Declaration {
    pub fn id(&self) -> DeclId {
        match self {
            Self::Alias(a) => a.id,
            Self::Concrete { id, .. } => *id,
        }
    }

    pub fn as_alias(&self) -> Option<&AliasDeclaration> {
        match self {
            Self::Alias(a) => Some(a),
            Self::Concrete { .. } => None,
        }
    }
}

/// One name binding: the name and the declaration(s) it's bound to. Pyright's
/// real symbol table tracks multiple declarations per name (conditional
/// branches, overloads); which one the alias walker should follow depends on
/// the visited set at the time, so the selection itself lives in
/// [`crate::alias::resolve_alias_declaration`] (spec §4.7 steps 8-9) rather
/// than on `Symbol`. This type only carries the two lookups that selection
/// needs: which declarations are *typed* and which sit inside an
/// exception-handling suite (spec §3 "a lookup for declarations with
/// explicit type annotations ... vs. all declarations").
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Arc<str>,
    pub declarations: Vec<Declaration>,
    /// Identities (from `declarations`) that carry an explicit type
    /// annotation. Empty means none do, which falls back to "all
    /// declarations" during selection (spec §4.7 step 8).
    pub typed_declarations: Vec<DeclId>,
    /// Identities (from `declarations`) that live inside an
    /// exception-handling suite — a fallback branch such as
    /// `try: import x \n except ImportError: import y as x` (spec §4.7 step
    /// 8 "remove declarations that are inside an exception-suite ... unless
    /// that would leave the set empty").
    pub exception_suite_declarations: Vec<DeclId>,
}

impl Symbol {
    pub fn is_typed(&self, id: DeclId) -> bool {
        self.typed_declarations.contains(&id)
    }

    pub fn is_in_exception_suite(&self, id: DeclId) -> bool {
        self.exception_suite_declarations.contains(&id)
    }
}

/// Outcome of a symbol or submodule lookup. Carries the resolved [`Symbol`]
/// itself (not just whether it exists) so the alias walker can keep
/// following its declarations (spec §4.7 steps 3-9); whether the name is
/// externally hidden feeds the `allowExternallyHiddenAccess` policy check.
#[derive(Debug, Clone)]
pub enum LookupResult {
    Found { symbol: Symbol, is_externally_hidden: bool },
    NotFound,
}

/// What a module lookup needs to answer when the walker crosses into a new
/// module (spec §1 Non-goals: module/file resolution itself is out of
/// scope — this trait is the seam callers implement over their own resolver).
pub trait ImportLookup {
    /// Is `module_path` itself marked `py.typed`?
    fn is_module_pytyped(&self, module_path: &str) -> bool;
    /// Look up `symbol_name` inside `module_path`.
    fn lookup_symbol(&self, module_path: &str, symbol_name: &str) -> LookupResult;
    /// Look up `module_path.submodule_name` as a submodule (spec §4.7 step
    /// "submodule fallback": a name that isn't a symbol in the package's
    /// `__init__` may still resolve as a submodule).
    fn lookup_submodule(&self, module_path: &str, submodule_name: &str) -> LookupResult;
}

/// In-memory symbol table keyed by `(module_path, name)`, the minimal shape
/// the alias resolver's tests and the CLI drive it with. A real type checker
/// backs [`ImportLookup`] with its own module graph instead.
#[derive(Debug, Default)]
pub struct SymbolTable {
    modules: std::collections::HashMap<Arc<str>, ModuleEntry>,
}

#[derive(Debug, Default)]
struct ModuleEntry {
    is_pytyped: bool,
    symbols: std::collections::HashMap<Arc<str>, Symbol>,
    submodules: std::collections::HashMap<Arc<str>, Arc<str>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_module(&mut self, path: impl Into<Arc<str>>, is_pytyped: bool) {
        self.modules.entry(path.into()).or_default().is_pytyped = is_pytyped;
    }

    pub fn declare_symbol(&mut self, module_path: impl Into<Arc<str>>, symbol: Symbol) {
        let entry = self.modules.entry(module_path.into()).or_default();
        entry.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn declare_submodule(&mut self, module_path: impl Into<Arc<str>>, submodule_name: impl Into<Arc<str>>, submodule_path: impl Into<Arc<str>>) {
        let entry = self.modules.entry(module_path.into()).or_default();
        entry.submodules.insert(submodule_name.into(), submodule_path.into());
    }

    pub fn symbol(&self, module_path: &str, name: &str) -> Option<&Symbol> {
        self.modules.get(module_path).and_then(|m| m.symbols.get(name))
    }
}

impl ImportLookup for SymbolTable {
    fn is_module_pytyped(&self, module_path: &str) -> bool {
        self.modules.get(module_path).is_some_and(|m| m.is_pytyped)
    }

    fn lookup_symbol(&self, module_path: &str, symbol_name: &str) -> LookupResult {
        match self.modules.get(module_path).and_then(|m| m.symbols.get(symbol_name)) {
            Some(symbol) => LookupResult::Found {
                symbol: symbol.clone(),
                is_externally_hidden: symbol_name.starts_with('_'),
            },
            None => LookupResult::NotFound,
        }
    }

    fn lookup_submodule(&self, module_path: &str, submodule_name: &str) -> LookupResult {
        match self.modules.get(module_path).and_then(|m| m.submodules.get(submodule_name)) {
            Some(submodule_path) => LookupResult::Found {
                symbol: Symbol {
                    name: submodule_name.into(),
                    declarations: vec![Declaration::Concrete {
                        id: DeclId(module_hash(submodule_path)),
                        name: submodule_path.clone(),
                    }],
                    typed_declarations: Vec::new(),
                    exception_suite_declarations: Vec::new(),
                },
                is_externally_hidden: false,
            },
            None => LookupResult::NotFound,
        }
    }
}

pub(crate) fn module_hash(path: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}
