//! Exercises the named scenarios from spec §8 (S1-S8) against the public API.

use std::rc::Rc;

use reftype::{simplify, AliasDeclaration, AliasResolutionOptions, BinaryOperator, DeclId, Declaration, Diagnostics, EvalOptions, Expr, RefinementType, ScopeId, Symbol, SymbolTable, TupleEntry, VarRegistry};

fn no_diagnostics<'a>() -> EvalOptions<'a> {
    EvalOptions::new(false, Diagnostics::none())
}

fn tuple(values: &[i64]) -> reftype::ExprRef {
    Rc::new(Expr::Tuple(values.iter().map(|&v| TupleEntry::plain(Expr::number(v))).collect()))
}

fn var(name: &str) -> reftype::RefinementVar {
    reftype::RefinementVar::new_free(name, ScopeId(0), "f", RefinementType::Int)
}

/// S1: broadcasting `(8, 1)` against `(5,)` right-aligns and accepts the `1`.
#[test]
fn s1_broadcast() {
    let registry = VarRegistry::new();
    let call = Rc::new(Expr::Call { name: "broadcast".into(), args: vec![tuple(&[8, 1]), tuple(&[5])] });
    let result = simplify(&call, &registry, &mut no_diagnostics());
    let entries = result.as_tuple().unwrap();
    assert_eq!(entries[0].value.as_number(), Some(&8.into()));
    assert_eq!(entries[1].value.as_number(), Some(&5.into()));
}

/// S2: reshaping `(2, 3, 4)` into `(6, -1)` infers the missing dimension as 4.
#[test]
fn s2_reshape_inference() {
    let registry = VarRegistry::new();
    let call = Rc::new(Expr::Call { name: "reshape".into(), args: vec![tuple(&[2, 3, 4]), tuple(&[6, -1])] });
    let result = simplify(&call, &registry, &mut no_diagnostics());
    let entries = result.as_tuple().unwrap();
    assert_eq!(entries[1].value.as_number(), Some(&4.into()));
}

/// S3: a negative index into a 3-tuple resolves from the end.
#[test]
fn s3_negative_index_resolution() {
    let mut errors = Vec::new();
    let registry = VarRegistry::new();
    let mut opts = EvalOptions::new(false, Diagnostics { errors: Some(&mut errors), warnings: None });
    let call = Rc::new(Expr::Call { name: "index".into(), args: vec![tuple(&[10, 20, 30]), Expr::number(-1)] });
    let result = simplify(&call, &registry, &mut opts);
    assert_eq!(result.as_number(), Some(&30.into()));
    assert!(errors.is_empty());
}

/// S4: permuting with a repeated index is rejected rather than silently
/// producing a wrong tuple.
#[test]
fn s4_permute_duplicate_detection() {
    let mut errors = Vec::new();
    let registry = VarRegistry::new();
    let mut opts = EvalOptions::new(false, Diagnostics { errors: Some(&mut errors), warnings: None });
    let call = Rc::new(Expr::Call { name: "permute".into(), args: vec![tuple(&[1, 2, 3]), tuple(&[1, 1, 0])] });
    let result = simplify(&call, &registry, &mut opts);
    assert!(result.is_wildcard());
    assert_eq!(errors.len(), 1);
}

/// S5: `(a + 2) - a` cancels the variable term, leaving just the constant.
#[test]
fn s5_sum_normalization_with_variables() {
    let registry = VarRegistry::new();
    let a1 = Rc::new(Expr::Var(var("a")));
    let a2 = Rc::new(Expr::Var(var("a")));
    let expr = Rc::new(Expr::BinaryOp {
        op: BinaryOperator::Sub,
        left: Rc::new(Expr::BinaryOp { op: BinaryOperator::Add, left: a1, right: Expr::number(2) }),
        right: a2,
    });
    let result = simplify(&expr, &registry, &mut no_diagnostics());
    assert_eq!(result.as_number(), Some(&2.into()));
}

/// S6: `n > 4` in scope discharges `n > 3` to `True` without chaining past it
/// to discharge `n > 10`.
#[test]
fn s6_comparison_discharged_by_condition() {
    let mut registry = VarRegistry::new();
    let n = var("n");
    let n_ref = Rc::new(Expr::Var(n.clone()));
    registry.set_conditions(n.var_id(), vec![Rc::new(Expr::BinaryOp { op: BinaryOperator::Gt, left: n_ref.clone(), right: Expr::number(4) })]);

    let weaker = Rc::new(Expr::BinaryOp { op: BinaryOperator::Gt, left: n_ref.clone(), right: Expr::number(3) });
    assert_eq!(simplify(&weaker, &registry, &mut no_diagnostics()).as_bool_literal(), Some(true));

    let unrelated = Rc::new(Expr::BinaryOp { op: BinaryOperator::Gt, left: n_ref, right: Expr::number(10) });
    let result = simplify(&unrelated, &registry, &mut no_diagnostics());
    assert!(result.as_bool_literal().is_none(), "n > 4 must not transitively discharge n > 10");
}

/// S7: `a` is an alias to `b`; `b` is an alias back to `a`; `a` also carries
/// a submodule-fallback declaration `M`. Resolving `a` must close the cycle
/// on `a` itself and then recurse into the fallback, returning `M`.
#[test]
fn s7_alias_chain_with_cycle_and_submodule_fallback() {
    let mut table = SymbolTable::new();
    table.declare_module("a", true);
    table.declare_module("b", true);
    table.declare_module("m_mod", true);
    table.declare_symbol(
        "m_mod",
        Symbol {
            name: "M".into(),
            declarations: vec![Declaration::Concrete { id: DeclId(50), name: "M".into() }],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );

    let fallback = AliasDeclaration {
        id: DeclId(999),
        importer_module: "a".into(),
        target_module: "m_mod".into(),
        target_name: Some("M".into()),
        is_private_pytyped_import: false,
        is_submodule_import: false,
        uses_local_name: false,
        is_native_lib: false,
        submodule_fallback: None,
    };

    let start = AliasDeclaration {
        id: DeclId(1),
        importer_module: "a".into(),
        target_module: "b".into(),
        target_name: Some("y".into()),
        is_private_pytyped_import: false,
        is_submodule_import: false,
        uses_local_name: false,
        is_native_lib: false,
        submodule_fallback: Some(Box::new(fallback)),
    };

    table.declare_symbol(
        "a",
        Symbol {
            name: "y".into(),
            declarations: vec![Declaration::Alias(start.clone())],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );
    table.declare_symbol(
        "b",
        Symbol {
            name: "y".into(),
            declarations: vec![Declaration::Alias(AliasDeclaration {
                id: DeclId(2),
                importer_module: "b".into(),
                target_module: "a".into(),
                target_name: Some("y".into()),
                is_private_pytyped_import: false,
                is_submodule_import: false,
                uses_local_name: false,
                is_native_lib: false,
                submodule_fallback: None,
            })],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );

    let resolved = reftype::resolve_alias_declaration(&start, &table, &AliasResolutionOptions::default()).unwrap();
    match resolved.declaration {
        Some(Declaration::Concrete { name, .. }) => assert_eq!(name.as_ref(), "M"),
        other => panic!("expected the submodule fallback's concrete declaration, got {other:?}"),
    }
}

/// S8: a chain `u -> t1_pkg -> t2_pkg -> t2_impl` where `u` is untyped,
/// `t1_pkg` is a typed package reached through a private typed import, and
/// `t2_pkg` re-exports onward without marking its own import private.
/// `privatePyTypedImporter` must equal `t1_pkg` (the first typed hop that was
/// itself private) and `privatePyTypedImported` must equal `t2_pkg` (the
/// first hop after that isn't private).
#[test]
fn s8_typed_package_transition_tracking() {
    let mut table = SymbolTable::new();
    table.declare_module("u", false);
    table.declare_module("t1_pkg", true);
    table.declare_module("t2_pkg", true);
    table.declare_module("t2_impl", true);
    table.declare_symbol(
        "t2_impl",
        Symbol {
            name: "Thing".into(),
            declarations: vec![Declaration::Concrete { id: DeclId(50), name: "Thing".into() }],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );
    table.declare_symbol(
        "t2_pkg",
        Symbol {
            name: "Thing".into(),
            declarations: vec![Declaration::Alias(AliasDeclaration {
                id: DeclId(3),
                importer_module: "t2_pkg".into(),
                target_module: "t2_impl".into(),
                target_name: Some("Thing".into()),
                is_private_pytyped_import: false,
                is_submodule_import: false,
                uses_local_name: false,
                is_native_lib: false,
                submodule_fallback: None,
            })],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );
    table.declare_symbol(
        "t1_pkg",
        Symbol {
            name: "Thing".into(),
            declarations: vec![Declaration::Alias(AliasDeclaration {
                id: DeclId(2),
                importer_module: "t1_pkg".into(),
                target_module: "t2_pkg".into(),
                target_name: Some("Thing".into()),
                is_private_pytyped_import: true,
                is_submodule_import: false,
                uses_local_name: false,
                is_native_lib: false,
                submodule_fallback: None,
            })],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );

    let start = AliasDeclaration {
        id: DeclId(1),
        importer_module: "u".into(),
        target_module: "t1_pkg".into(),
        target_name: Some("Thing".into()),
        is_private_pytyped_import: false,
        is_submodule_import: false,
        uses_local_name: false,
        is_native_lib: false,
        submodule_fallback: None,
    };
    let resolved = reftype::resolve_alias_declaration(&start, &table, &AliasResolutionOptions::default()).unwrap();
    assert!(resolved.saw_typed_transition);
    assert_eq!(resolved.private_pytyped_importer.as_deref(), Some("t1_pkg"));
    assert_eq!(resolved.private_pytyped_imported.as_deref(), Some("t2_pkg"));
    assert_eq!(resolved.declaration.unwrap().id(), DeclId(50));
}
