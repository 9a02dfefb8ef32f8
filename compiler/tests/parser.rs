//! Parser shape, precedence, failure, and round-trip tests.

use finch_compiler::ast::{BinaryOp, Expr, TopLevel};
use finch_compiler::lexer::tokenize;
use finch_compiler::parser::{parse_source, Parser};

fn parse_expr(source: &str) -> Expr {
    let mut units = parse_source(source).expect("parse failed");
    assert_eq!(units.len(), 1, "expected exactly one unit");
    match units.remove(0) {
        TopLevel::Expression(expr) => expr,
        other => panic!("expected expression, got {:?}", other),
    }
}

fn num(value: f64) -> Box<Expr> {
    Box::new(Expr::Number(value))
}

fn bin(op: BinaryOp, left: Box<Expr>, right: Box<Expr>) -> Box<Expr> {
    Box::new(Expr::Binary { op, left, right })
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
        parse_expr("2 + 3 * 4"),
        *bin(BinaryOp::Add, num(2.0), bin(BinaryOp::Mul, num(3.0), num(4.0)))
    );
}

#[test]
fn parentheses_override_precedence() {
    assert_eq!(
        parse_expr("(2 + 3) * 4"),
        *bin(BinaryOp::Mul, bin(BinaryOp::Add, num(2.0), num(3.0)), num(4.0))
    );
}

#[test]
fn subtraction_is_left_associative() {
    assert_eq!(
        parse_expr("2 - 3 - 4"),
        *bin(
            BinaryOp::Sub,
            bin(BinaryOp::Sub, num(2.0), num(3.0)),
            num(4.0)
        )
    );
}

#[test]
fn comparison_binds_loosest() {
    assert_eq!(
        parse_expr("1 + 2 < 4"),
        *bin(BinaryOp::Lt, bin(BinaryOp::Add, num(1.0), num(2.0)), num(4.0))
    );
}

#[test]
fn division_shares_multiplication_precedence() {
    // (2 + (4 / 4)) + (5 * 6)
    assert_eq!(
        parse_expr("2 + 4 / 4 + 5 * 6"),
        *bin(
            BinaryOp::Add,
            bin(
                BinaryOp::Add,
                num(2.0),
                bin(BinaryOp::Div, num(4.0), num(4.0))
            ),
            bin(BinaryOp::Mul, num(5.0), num(6.0))
        )
    );
}

#[test]
fn identifier_without_parens_is_a_variable() {
    assert_eq!(parse_expr("x"), Expr::Variable("x".to_string()));
}

#[test]
fn identifier_with_parens_is_a_call() {
    assert_eq!(
        parse_expr("f(1, x + 2)"),
        Expr::Call {
            callee: "f".to_string(),
            args: vec![
                Expr::Number(1.0),
                *bin(BinaryOp::Add, Box::new(Expr::Variable("x".to_string())), num(2.0)),
            ],
        }
    );
}

#[test]
fn conditional_requires_all_three_branches() {
    assert_eq!(
        parse_expr("if 1 then 10 else 20"),
        Expr::If {
            cond: num(1.0),
            then_branch: num(10.0),
            else_branch: num(20.0),
        }
    );

    assert!(parse_source("if 1 then 10").is_err());
    assert!(parse_source("if 1 10 else 20").is_err());
}

#[test]
fn for_loop_with_and_without_step() {
    assert_eq!(
        parse_expr("for i = 1, i < 10, 2 in i"),
        Expr::For {
            var: "i".to_string(),
            start: num(1.0),
            end: bin(
                BinaryOp::Lt,
                Box::new(Expr::Variable("i".to_string())),
                num(10.0)
            ),
            step: Some(num(2.0)),
            body: Box::new(Expr::Variable("i".to_string())),
        }
    );

    let without_step = parse_expr("for i = 1, i < 10 in i");
    match without_step {
        Expr::For { step, .. } => assert!(step.is_none()),
        other => panic!("expected for loop, got {:?}", other),
    }
}

#[test]
fn prototype_params_are_whitespace_separated() {
    let units = parse_source("def f(a b c) a + b + c").expect("parse failed");
    match &units[0] {
        TopLevel::Definition(def) => {
            assert_eq!(def.proto.name, "f");
            assert_eq!(def.proto.params, vec!["a", "b", "c"]);
        }
        other => panic!("expected definition, got {:?}", other),
    }
}

#[test]
fn extern_declares_a_prototype() {
    let units = parse_source("extern sin(x)").expect("parse failed");
    match &units[0] {
        TopLevel::Extern(proto) => {
            assert_eq!(proto.name, "sin");
            assert_eq!(proto.params, vec!["x"]);
        }
        other => panic!("expected extern, got {:?}", other),
    }
}

#[test]
fn semicolons_separate_units() {
    let units = parse_source("1 + 2; def f(x) x; extern g();").expect("parse failed");
    assert_eq!(units.len(), 3);
}

#[test]
fn structural_mismatches_abort_the_unit() {
    assert!(parse_source("(1 + 2").is_err());
    assert!(parse_source("for i 0, 10 in i").is_err());
    assert!(parse_source("for i = 0, 10 then i").is_err());
    assert!(parse_source("def (x) x").is_err());
    assert!(parse_source("def f(x x").is_err());
    assert!(parse_source("1 @ 2").is_err());
}

#[test]
fn parsing_resumes_after_a_bad_unit() {
    let mut parser = Parser::new(tokenize("if 1 then 2; 3 + 4;"));

    let err = parser.next_unit();
    assert!(err.is_err());
    parser.synchronize();

    let unit = parser.next_unit().expect("second unit should parse");
    assert_eq!(
        unit,
        Some(TopLevel::Expression(*bin(BinaryOp::Add, num(3.0), num(4.0))))
    );
    assert_eq!(parser.next_unit().expect("end of input"), None);
}

#[test]
fn pretty_printing_round_trips() {
    let sources = [
        "2 + 3 * 4",
        "(2 + 3) * 4",
        "2 - 3 - 4",
        "1 + 2 < 4 * 5",
        "2 + 4 / 4 + 5 * 6",
        "if x < 2 then x * 3 else f(x, 1)",
        "for i = 1, i < 10, 2 in putchard(i)",
        "for i = 1, i < n in i * i + 1",
        "f(g(1), h(2, x) + 3)",
        "if 1 then if 0 then 1 else 2 else 3",
        "(for i = 0, i < 3 in 1) + x",
        "def f(a b) if a < b then a else b",
        "extern putchard(code)",
        "def loop_sum(n) for i = 0, i < n in putchard(i)",
    ];

    for source in sources {
        let first = parse_source(source).unwrap_or_else(|e| panic!("{:?} on {:?}", e, source));
        let printed = first
            .iter()
            .map(|unit| unit.to_string())
            .collect::<Vec<_>>()
            .join(";\n");
        let second = parse_source(&printed)
            .unwrap_or_else(|e| panic!("{:?} on reprinted {:?}", e, printed));
        assert_eq!(first, second, "round trip changed the AST for {:?}", source);
    }
}
