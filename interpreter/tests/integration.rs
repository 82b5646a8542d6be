use std::collections::HashMap;

use interpreter::{Interpreter, RuntimeError, RuntimeValue};
use stencil::{Copier, CopyError, PatternSet};

fn copier() -> Copier<Interpreter> {
    Copier::new(PatternSet::conventional().expect("patterns"), Interpreter::new())
}

fn globals(pairs: &[(&str, RuntimeValue)]) -> HashMap<String, RuntimeValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn run(template: &str, pairs: &[(&str, RuntimeValue)]) -> String {
    copier()
        .copy_text(template, &globals(pairs))
        .expect("copy failed")
}

fn run_err(template: &str) -> CopyError {
    copier()
        .copy_text(template, &HashMap::new())
        .expect_err("copy should fail")
}

/// Runtime error carried inside a copy failure.
fn runtime(err: &CopyError) -> &RuntimeError {
    let source = match err {
        CopyError::Expression { source, .. } | CopyError::Statement { source, .. } => source,
        other => panic!("no runtime error in {other}"),
    };
    source.downcast_ref::<RuntimeError>().expect("runtime error")
}

const DEMO: &str = "\
A first, plain line -- no expressions in it at all.
A second line, with expressions in it: `x` and `x*2`.
# x += 1   # statement lines are removed from the output
# x += \\
#\\    1     # a continuation line
The value of x is now `x`.
#> if x>23:  # start of a compound statement
This is a line that will only be copied if x is greater than 23.
#= else:     # a clause
Otherwise, this one is copied instead.
#<           # end of the compound statement
#> for i in range(3):
  Value `i` times x is `i*x`.
#<
The end.
";

#[test]
fn demo_with_large_x() {
    let out = run(DEMO, &[("x", RuntimeValue::from(23i64))]);
    assert_eq!(
        out,
        "\
A first, plain line -- no expressions in it at all.
A second line, with expressions in it: 23 and 46.
The value of x is now 25.
This is a line that will only be copied if x is greater than 23.
  Value 0 times x is 0.
  Value 1 times x is 25.
  Value 2 times x is 50.
The end.
"
    );
}

#[test]
fn demo_with_small_x() {
    let out = run(DEMO, &[("x", RuntimeValue::from(10i64))]);
    assert!(out.contains("x is now 12."));
    assert!(out.contains("Otherwise, this one is copied instead.\n"));
    assert!(!out.contains("only be copied"));
    assert!(out.contains("Value 2 times x is 24."));
}

#[test]
fn statements_do_not_leak_into_globals() {
    let globals = globals(&[("x", RuntimeValue::from(1i64))]);
    let out = copier().copy_text("# x = x + 1\n`x`\n", &globals).unwrap();
    assert_eq!(out, "2\n");
    assert_eq!(globals["x"], RuntimeValue::Number(1.0));
}

#[test]
fn elif_chains() {
    let template = "\
#> if n < 0:
negative
#= elif n == 0:
zero
#= else:
positive
#<
";
    assert_eq!(run(template, &[("n", RuntimeValue::from(-4i64))]), "negative\n");
    assert_eq!(run(template, &[("n", RuntimeValue::from(0i64))]), "zero\n");
    assert_eq!(run(template, &[("n", RuntimeValue::from(9i64))]), "positive\n");
}

#[test]
fn loop_else_runs_after_the_loop() {
    let template = "\
#> for name in files:
- `name.upper()`
#= else:
`len(files)` files
#<
";
    let files = RuntimeValue::from(vec!["a.txt", "b.txt"]);
    assert_eq!(run(template, &[("files", files)]), "- A.TXT\n- B.TXT\n2 files\n");
}

#[test]
fn while_loops_and_tuple_targets() {
    let template = "\
# i = 0; pairs = []
#> while i < 3:
# i += 1
#<
#> for k, v in sorted({'b': 2, 'a': 1}.items()):
`k`=`v`
#<
i=`i`
";
    assert_eq!(run(template, &[]), "a=1\nb=2\ni=3\n");
}

#[test]
fn runaway_while_hits_the_iteration_limit() {
    let copier = Copier::new(
        PatternSet::conventional().unwrap(),
        Interpreter::new().with_max_iterations(10),
    );
    let err = copier
        .copy_text("#> while True:\n#<\n", &HashMap::new())
        .unwrap_err();
    assert!(matches!(err, CopyError::Statement { ref lines, .. } if *lines == (0..2)));
    assert_eq!(runtime(&err), &RuntimeError::IterationLimit(10));
}

#[test]
fn range_steps_up_to_the_integer_limit() {
    let out = run("#> for i in range(0, 9*10**18, 4*10**18):\n`i`\n#<\n", &[]);
    assert_eq!(out.lines().count(), 3);
    assert!(out.starts_with("0\n"));
}

#[test]
fn oversized_values_fail_the_copy() {
    let err = run_err("#> for i in range(10**12):\n`i`\n#<\n");
    assert!(matches!(err, CopyError::Statement { ref lines, .. } if *lines == (0..3)));
    assert!(matches!(runtime(&err), RuntimeError::SizeLimit { .. }));

    let err = run_err("`'ab' * 10**19`\n");
    assert!(matches!(err, CopyError::Expression { line: 0, .. }));
    assert!(matches!(runtime(&err), RuntimeError::IntegerOverflow(_)));

    let err = run_err("`'ab' * 10**7`\n");
    assert!(matches!(runtime(&err), RuntimeError::SizeLimit { .. }));
}

#[test]
fn nested_loops_share_the_namespace() {
    let template = "\
# total = 0
#> for row in range(2):
#> for col in range(3):
# total += row * col
#<
#<
`total`
";
    assert_eq!(run(template, &[]), "3\n");
}

#[test]
fn string_formatting_and_methods() {
    let template = "`'%s has %d items' % (name.title(), len(items))`\n`', '.join(items)`\n";
    let out = run(
        template,
        &[
            ("name", RuntimeValue::from("the list")),
            ("items", RuntimeValue::from(vec!["x", "y"])),
        ],
    );
    assert_eq!(out, "The List has 2 items\nx, y\n");
}

#[test]
fn undefined_name_in_expression() {
    let err = run_err("ok\nvalue: `nope`\n");
    match &err {
        CopyError::Expression { line, expression, .. } => {
            assert_eq!(*line, 1);
            assert_eq!(expression, "nope");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runtime(&err), &RuntimeError::UndefinedVariable("nope".into()));
}

#[test]
fn syntax_error_in_statement() {
    let err = run_err("# x = = 1\n");
    assert!(matches!(runtime(&err), RuntimeError::Syntax { .. }));
}

#[test]
fn misplaced_clauses_are_rejected() {
    let err = run_err("#> for i in range(2):\nx\n#= elif i:\ny\n#<\n");
    assert!(matches!(runtime(&err), RuntimeError::UnsupportedCompound(_)));
    let err = run_err("#> else:\nx\n#<\n");
    assert!(matches!(runtime(&err), RuntimeError::UnsupportedCompound(_)));
}

#[test]
fn error_handler_recovers_expressions() {
    let copier = copier().with_error_handler(|expression, _| Some(format!("<{expression}?>")));
    let out = copier.copy_text("a `b` c\n", &HashMap::new()).unwrap();
    assert_eq!(out, "a <b?> c\n");
}

#[test]
fn native_functions_can_read_files() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("note.txt"), "hello from disk\n").unwrap();
    let base = dir.path().to_path_buf();
    let read = RuntimeValue::function("read", move |args| {
        let [RuntimeValue::String(name)] = args else {
            return Err(RuntimeError::Custom("read() takes one file name".into()));
        };
        std::fs::read_to_string(base.join(name))
            .map(|text| RuntimeValue::String(text.trim_end().to_string()))
            .map_err(|e| RuntimeError::IoError(e.to_string()))
    });
    let out = run("[`read('note.txt')`]\n", &[("read", read)]);
    assert_eq!(out, "[hello from disk]\n");
}
