use std::process::ExitCode;
use std::{env, rc::Rc};

use reftype::{
    adapt_expr, simplify, AdapterContext, AliasDeclaration, AliasResolutionOptions, DeclId, Declaration, Diagnostics, EvalOptions, RefinementType, ScopeId,
    Symbol, SymbolTable, VarRegistry,
};
use reftype::source::{SourceBinaryOp, SourceExpr, SourceExprKind};

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("alias-demo") | None => run_alias_demo(),
        Some("eval-demo") => run_eval_demo(),
        Some(other) => {
            eprintln!("unknown subcommand: {other}\nusage: reftype [alias-demo|eval-demo]");
            ExitCode::FAILURE
        }
    }
}

/// Builds the value expression `n + 1` by hand (standing in for what a real
/// tokenizer and parser would hand the adapter), attaches `n > 3` as a
/// condition on `n`, and prints the simplified normal form.
fn run_eval_demo() -> ExitCode {
    let mut registry = VarRegistry::new();
    let outer = indexmap::IndexMap::new();
    let mut errors = Vec::new();
    let mut ctx = AdapterContext {
        registry: &mut registry,
        scope_id: ScopeId(0),
        scope_name: "demo".into(),
        outer_vars: &outer,
        diagnostics: Diagnostics { errors: Some(&mut errors), warnings: None },
        reparse: None,
    };

    let n = SourceExpr::new(SourceExprKind::Name("n".into()), None);
    let value_source = SourceExpr::new(
        SourceExprKind::BinaryOp {
            op: SourceBinaryOp::Add,
            left: Box::new(n.clone()),
            right: Box::new(SourceExpr::new(SourceExprKind::Number { text: "1".into(), is_integer: true, is_imaginary: false }, None)),
        },
        None,
    );

    let Some(value) = adapt_expr(&mut ctx, &value_source, RefinementType::Int, true) else {
        for err in &errors {
            eprintln!("error: {}", err.message);
        }
        return ExitCode::FAILURE;
    };

    // Attach `n > 3` as a condition by hand, the way the consistency checker
    // would after parsing a precondition.
    let n_ref = match value.as_ref() {
        reftype::Expr::BinaryOp { left, .. } => left.clone(),
        _ => unreachable!(),
    };
    if let Some(var) = n_ref.as_var() {
        registry.set_conditions(
            var.var_id(),
            vec![Rc::new(reftype::Expr::BinaryOp {
                op: reftype::BinaryOperator::Gt,
                left: n_ref.clone(),
                right: reftype::Expr::number(3),
            })],
        );
    }

    let mut opts = EvalOptions::new(false, Diagnostics::none());
    let simplified = simplify(&value, &registry, &mut opts);
    eprintln!("n + 1 simplified: {simplified:?}");
    ExitCode::SUCCESS
}

/// Builds a small re-export chain (`app` imports `Thing` from `pkg`, which
/// re-exports it from `pkg.impl`) and resolves it.
fn run_alias_demo() -> ExitCode {
    let mut table = SymbolTable::new();
    table.declare_module("pkg.impl", true);
    table.declare_module("pkg", true);
    table.declare_symbol(
        "pkg.impl",
        Symbol {
            name: "Thing".into(),
            declarations: vec![Declaration::Concrete { id: DeclId(99), name: "Thing".into() }],
            typed_declarations: Vec::new(),
            exception_suite_declarations: Vec::new(),
        },
    );
    table.declare_symbol(
        "pkg",
        Symbol {
            name: "Thing".into(),
            declarations: vec![Declaration::Alias(AliasDeclaration {
                id: DeclId(2),
                importer_module: "pkg".into(),
                target_module: "pkg.impl".into(),
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

    let start = AliasDeclaration {
        id: DeclId(1),
        importer_module: "app".into(),
        target_module: "pkg".into(),
        target_name: Some("Thing".into()),
        is_private_pytyped_import: false,
        is_submodule_import: false,
        uses_local_name: false,
        is_native_lib: false,
        submodule_fallback: None,
    };

    match reftype::resolve_alias_declaration(&start, &table, &AliasResolutionOptions::default()) {
        Some(resolved) => {
            eprintln!("resolved app.Thing -> {:?}", resolved.declaration);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("alias resolution failed");
            ExitCode::FAILURE
        }
    }
}

