//! End-to-end parse-to-execute tests against the incremental JIT session.

use finch_compiler::error::{CodegenError, Error};
use finch_compiler::lexer::tokenize;
use finch_compiler::parser::Parser;
use finch_compiler::session::{Session, UnitOutcome};
use inkwell::context::Context;

fn run(session: &mut Session, source: &str) -> Vec<Result<UnitOutcome, Error>> {
    let mut parser = Parser::new(tokenize(source));
    let mut outcomes = Vec::new();
    while let Some(unit) = parser.next_unit().expect("parse error") {
        outcomes.push(session.handle_unit(unit));
    }
    outcomes
}

fn eval(session: &mut Session, source: &str) -> f64 {
    match run(session, source).pop().expect("no unit") {
        Ok(UnitOutcome::Value(value)) => value,
        other => panic!("expected a value, got {:?}", other),
    }
}

#[test]
fn precedence_drives_evaluation() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    assert_eq!(eval(&mut session, "2 + 3 * 4;"), 14.0);
    assert_eq!(eval(&mut session, "(2 + 3) * 4;"), 20.0);
    assert_eq!(eval(&mut session, "2 + 3 * 4 + 5 * 6;"), 44.0);
    assert_eq!(eval(&mut session, "2 + 4 / 4 + 5 * 6;"), 33.0);
}

#[test]
fn subtraction_associates_left() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    assert_eq!(eval(&mut session, "2 - 3 - 4;"), -5.0);
}

#[test]
fn comparison_yields_zero_or_one() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    assert_eq!(eval(&mut session, "1 < 2;"), 1.0);
    assert_eq!(eval(&mut session, "2 < 1;"), 0.0);
}

#[test]
fn conditional_selects_a_branch() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    assert_eq!(eval(&mut session, "if 1 then 10 else 20;"), 10.0);
    assert_eq!(eval(&mut session, "if 0 then 10 else 20;"), 20.0);
    // any nonzero condition counts as true
    assert_eq!(eval(&mut session, "if 0.5 then 10 else 20;"), 10.0);
}

#[test]
fn defined_functions_are_callable_across_units() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "def add(a b) a + b;");
    assert_eq!(eval(&mut session, "add(2, 3);"), 5.0);
    assert_eq!(eval(&mut session, "add(add(1, 2), 4);"), 7.0);
}

#[test]
fn recursion_works_within_a_definition() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(
        &mut session,
        "def fib(n) if n < 2 then n else fib(n - 1) + fib(n - 2);",
    );
    assert_eq!(eval(&mut session, "fib(10);"), 55.0);
}

#[test]
fn conditional_composes_with_calls() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "def min(a b) if a < b then a else b;");
    assert_eq!(eval(&mut session, "min(3, 7);"), 3.0);
    assert_eq!(eval(&mut session, "min(9, 4);"), 4.0);
}

#[test]
fn redefinition_is_newest_wins() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "def f(x) x + 1;");
    assert_eq!(eval(&mut session, "f(3);"), 4.0);

    run(&mut session, "def f(x) x + 2;");
    assert_eq!(eval(&mut session, "f(3);"), 5.0);
}

#[test]
fn forward_references_lower_without_a_body() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    let outcomes = run(&mut session, "extern foo(); def bar() foo();");
    assert!(matches!(
        outcomes[0],
        Ok(UnitOutcome::Declared(ref name)) if name == "foo"
    ));
    assert!(matches!(
        outcomes[1],
        Ok(UnitOutcome::Defined(ref name)) if name == "bar"
    ));
}

#[test]
fn arity_mismatch_fails_without_executing() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "extern g(a b);");
    let outcome = run(&mut session, "g(1);").pop().expect("no unit");
    assert!(matches!(
        outcome,
        Err(Error::Codegen(CodegenError::ArityMismatch {
            expected: 2,
            found: 1,
            ..
        }))
    ));
}

#[test]
fn unknown_names_are_lowering_errors() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    let var = run(&mut session, "x + 1;").pop().expect("no unit");
    assert!(matches!(
        var,
        Err(Error::Codegen(CodegenError::UndefinedVariable { .. }))
    ));

    let call = run(&mut session, "nope(1);").pop().expect("no unit");
    assert!(matches!(
        call,
        Err(Error::Codegen(CodegenError::UnknownFunction { .. }))
    ));
}

#[test]
fn failed_units_do_not_poison_the_session() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    let bad = run(&mut session, "def broken(x) x + missing;")
        .pop()
        .expect("no unit");
    assert!(bad.is_err());

    // the same name can be defined cleanly afterwards
    run(&mut session, "def broken(x) x + 1;");
    assert_eq!(eval(&mut session, "broken(1);"), 2.0);
}

#[test]
fn loop_evaluates_to_zero_and_terminates() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    assert_eq!(eval(&mut session, "for i = 1, i < 4 in i * 2;"), 0.0);
    assert_eq!(eval(&mut session, "for i = 0, i < 10, 2 in i;"), 0.0);
}

#[test]
fn loop_variable_shadows_and_restores_outer_binding() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    // after the loop, `i` must mean the parameter again
    run(&mut session, "def f(i) (for i = 0, i < 3 in 1) + i;");
    assert_eq!(eval(&mut session, "f(42);"), 42.0);
}

#[test]
fn loop_variable_is_not_visible_outside_the_loop() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    let outcome = run(&mut session, "def g(x) (for i = 0, i < 3 in 1) + i;")
        .pop()
        .expect("no unit");
    assert!(matches!(
        outcome,
        Err(Error::Codegen(CodegenError::UndefinedVariable { ref name })) if name == "i"
    ));
}

#[test]
fn step_expression_sees_the_induction_variable() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    // step doubles the variable each iteration (1, 2, 4, 8, 16), so it terminates
    assert_eq!(eval(&mut session, "for i = 1, i < 10, i in 0;"), 0.0);
}

#[test]
fn native_putchard_is_reachable() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "extern putchard(code);");
    assert_eq!(eval(&mut session, "putchard(65);"), 0.0);
    assert_eq!(eval(&mut session, "putchard(10) + 7;"), 7.0);
}

#[test]
fn functions_compose_across_many_units() {
    let context = Context::create();
    let mut session = Session::new(&context).unwrap();

    run(&mut session, "def double(x) x * 2;");
    run(&mut session, "def quad(x) double(double(x));");
    assert_eq!(eval(&mut session, "quad(3);"), 12.0);

    // redefining the inner function changes the composed result
    run(&mut session, "def double(x) x * 3;");
    assert_eq!(eval(&mut session, "quad(3);"), 27.0);
}
