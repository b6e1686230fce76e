//! End-to-end tests: source in, printed output and errors out.

use pretty_assertions::assert_eq;

use crate::error::{LoxError, RuntimeError};

use super::{InterpretResult, Value, Vm};

fn vm() -> Vm<Vec<u8>> {
    Vm::with_output(Vec::new())
}

fn output(vm: &Vm<Vec<u8>>) -> String {
    String::from_utf8_lossy(vm.output()).into_owned()
}

/// Run a program that must succeed and return what it printed.
fn run(source: &str) -> String {
    let mut vm = vm();
    if let Err(err) = vm.run_source(source) {
        panic!("program failed: {}", err);
    }
    assert_eq!(vm.stack_len(), 0, "stack not balanced after program");
    output(&vm)
}

/// Run a program that must fail at runtime. Returns the printed output and
/// the error.
fn run_err(source: &str) -> (String, RuntimeError) {
    let mut vm = vm();
    match vm.run_source(source) {
        Err(LoxError::Runtime(err)) => {
            assert_eq!(vm.stack_len(), 0, "stack not reset after runtime error");
            (output(&vm), err)
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_arithmetic() {
    assert_eq!(run("print 1 + 2;"), "3\n");
    assert_eq!(run("print (1 + 2) * 3 - 4 / 2;"), "7\n");
    assert_eq!(run("print -(3 - 5);"), "2\n");
    assert_eq!(run("print 10 / 4;"), "2.5\n");
    assert_eq!(run("print 1 - 2 - 3;"), "-4\n");
}

#[test]
fn test_comparison_and_equality() {
    assert_eq!(
        run("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 4; print 1 == 1; print 1 != 1;"),
        "true\ntrue\nfalse\nfalse\ntrue\nfalse\n"
    );
    assert_eq!(run("print nil == false; print \"a\" == \"a\";"), "false\ntrue\n");
}

#[test]
fn test_not_and_falsiness() {
    assert_eq!(run("print !nil; print !0; print !!\"\";"), "true\nfalse\ntrue\n");
}

#[test]
fn test_string_concatenation_is_interned() {
    let mut vm = vm();
    vm.run_source("var x = \"a\" + \"b\"; print x; var y = \"ab\";")
        .expect("runs");
    assert_eq!(output(&vm), "ab\n");

    let (Some(Value::Obj(x)), Some(Value::Obj(y))) = (vm.global("x"), vm.global("y")) else {
        panic!("globals should be strings");
    };
    assert_eq!(x, y);
    assert_eq!(vm.heap().string(x).as_str(), "ab");
}

#[test]
fn test_concatenation_reuses_existing_string() {
    let mut vm = vm();
    vm.run_source("var s = \"ab\";").expect("runs");
    let before = vm.heap().object_count();
    vm.run_source("var t = \"a\" + \"b\";").expect("runs");
    // Only "t", "a" and "b" are new; the concatenation finds "ab".
    assert_eq!(vm.heap().object_count(), before + 3);
}

#[test]
fn test_global_variables() {
    assert_eq!(run("var a = 1; var b = 2; print a + b;"), "3\n");
    assert_eq!(run("var a; print a;"), "nil\n");
    assert_eq!(run("var a = 1; a = a + 1; print a;"), "2\n");
    assert_eq!(run("var a = 1; var a = 2; print a;"), "2\n");
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(run("var a; var b; a = b = 3; print a; print b;"), "3\n3\n");
}

#[test]
fn test_nested_shadowing() {
    let source = "
        var a = 1;
        {
            var a = 2;
            print a;
        }
        print a;
    ";
    assert_eq!(run(source), "2\n1\n");
}

#[test]
fn test_locals_in_nested_blocks() {
    let source = "
        {
            var a = \"outer\";
            {
                var b = a + \" inner\";
                print b;
                a = \"changed\";
            }
            print a;
        }
    ";
    assert_eq!(run(source), "outer inner\nchanged\n");
}

#[test]
fn test_if_else() {
    assert_eq!(run("if (true) print 1; else print 2;"), "1\n");
    assert_eq!(run("if (nil) print 1; else print 2;"), "2\n");
    assert_eq!(run("if (false) print 1; print 3;"), "3\n");
}

#[test]
fn test_logical_operators_short_circuit() {
    assert_eq!(run("print nil or \"yes\";"), "yes\n");
    assert_eq!(run("print 1 or 2;"), "1\n");
    assert_eq!(run("print nil and 2;"), "nil\n");
    assert_eq!(run("print 1 and 2;"), "2\n");
    // The right operand would fail if it were evaluated.
    assert_eq!(run("print false and -nil;"), "false\n");
    assert_eq!(run("print true or -nil;"), "true\n");
}

#[test]
fn test_while_loop() {
    let source = "
        var i = 0;
        while (i < 3) {
            print i;
            i = i + 1;
        }
    ";
    assert_eq!(run(source), "0\n1\n2\n");
}

#[test]
fn test_for_loop() {
    assert_eq!(
        run("for (var i = 0; i < 5; i = i + 1) print i;"),
        "0\n1\n2\n3\n4\n"
    );
}

#[test]
fn test_for_loop_without_clauses() {
    let source = "
        var i = 0;
        for (; i < 2;) {
            print i;
            i = i + 1;
        }
    ";
    assert_eq!(run(source), "0\n1\n");
}

#[test]
fn test_for_loop_variable_is_scoped() {
    let mut vm = vm();
    vm.run_source("for (var i = 0; i < 1; i = i + 1) {}").expect("runs");
    assert_eq!(vm.global("i"), None);
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_fibonacci_loop() {
    let source = "
        var a = 0;
        var b = 1;
        for (var i = 0; i < 10; i = i + 1) {
            var next = a + b;
            a = b;
            b = next;
        }
        print a;
    ";
    assert_eq!(run(source), "55\n");
}

#[test]
fn test_type_error_reports_line() {
    let (out, err) = run_err("print 0;\nprint 1 + \"a\";");
    assert_eq!(out, "0\n");
    assert_eq!(
        LoxError::from(err).to_string(),
        "Operands must be two numbers or two strings.\n[line 2] in script"
    );
}

#[test]
fn test_undefined_variable_after_output() {
    let (out, err) = run_err("print \"before\";\nprint y;");
    assert_eq!(out, "before\n");
    assert!(matches!(err, RuntimeError::UndefinedVariable { ref name, line: 2 } if name == "y"));
}

#[test]
fn test_assignment_to_undefined_global_does_not_define_it() {
    let mut vm = vm();
    let err = vm.run_source("z = 1;").expect_err("undefined");
    assert_eq!(err.to_string(), "Undefined variable 'z'.\n[line 1] in script");
    assert_eq!(vm.global("z"), None);
}

#[test]
fn test_operand_type_errors() {
    assert_eq!(run_err("print -\"a\";").1.to_string(), "Operand must be a number.");
    assert_eq!(run_err("print 1 < nil;").1.to_string(), "Operands must be numbers.");
    assert_eq!(run_err("print \"a\" * 2;").1.to_string(), "Operands must be numbers.");
}

#[test]
fn test_full_stack_overflows_on_next_push() {
    let mut source = String::from("{");
    for i in 0..256 {
        source.push_str(&format!("var v{};", i));
    }
    source.push_str("print 1; }");
    let (out, err) = run_err(&source);
    assert_eq!(out, "");
    assert!(matches!(err, RuntimeError::StackOverflow { .. }));
}

#[test]
fn test_deep_nesting_fails_to_compile_without_crashing() {
    let source = format!("print {}1{};", "(".repeat(200_000), ")".repeat(200_000));
    let mut vm = vm();
    assert_eq!(vm.interpret(&source), InterpretResult::CompileError);
    assert_eq!(output(&vm), "");
}

#[test]
fn test_compile_error_runs_nothing() {
    let mut vm = vm();
    let result = vm.run_source("print 1;\nprint ;\nvar 2;");
    let Err(LoxError::Compile(errors)) = result else {
        panic!("expected compile errors");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(output(&vm), "");
}

#[test]
fn test_interpret_results() {
    let mut vm = vm();
    assert_eq!(vm.interpret("var a = 1;"), InterpretResult::Ok);
    assert_eq!(vm.interpret("a = ;"), InterpretResult::CompileError);
    assert_eq!(vm.interpret("print b;"), InterpretResult::RuntimeError);
}

#[test]
fn test_globals_persist_across_runs() {
    let mut vm = vm();
    vm.run_source("var count = 1;").expect("runs");
    vm.run_source("count = count + 1;").expect("runs");
    vm.run_source("print count;").expect("runs");
    assert_eq!(output(&vm), "2\n");
}

#[test]
fn test_vm_recovers_after_runtime_error() {
    let mut vm = vm();
    assert!(vm.run_source("{ var a = 1; print a + nil; }").is_err());
    assert_eq!(vm.stack_len(), 0);
    vm.run_source("{ var b = 2; print b; }").expect("runs");
    assert_eq!(output(&vm), "2\n");
}

#[test]
fn test_free_resets_vm() {
    let mut vm = vm();
    vm.run_source("var a = \"text\";").expect("runs");
    assert!(vm.heap().object_count() > 0);

    vm.free();
    assert_eq!(vm.heap().object_count(), 0);
    assert_eq!(vm.global("a"), None);

    vm.run_source("var a = 3; print a;").expect("runs after free");
    assert_eq!(output(&vm), "3\n");
}

#[test]
fn test_independent_vms() {
    let mut first = vm();
    let mut second = vm();
    first.run_source("var shared = 1;").expect("runs");
    assert!(second.run_source("print shared;").is_err());
    assert_eq!(first.global("shared"), Some(Value::Number(1.0)));
}

#[test]
fn test_comments_and_multiline_strings() {
    let source = "// a comment\nprint \"one\ntwo\"; /* block */ print 3;";
    assert_eq!(run(source), "one\ntwo\n3\n");
}
