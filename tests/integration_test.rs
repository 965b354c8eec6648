// ABOUTME: End-to-end tests driving the scan -> parse -> resolve -> interpret pipeline

use lox_interpreter::error::ErrorSink;
use lox_interpreter::interpreter::Interpreter;
use lox_interpreter::{parser, resolver, scanner};

fn run(source: &str) -> (bool, bool) {
    let sink = ErrorSink::new();
    let tokens = scanner::scan(source, &sink);
    let statements = parser::parse(&tokens, &sink);
    if sink.had_static_error() {
        return (true, false);
    }
    let locals = resolver::resolve(&statements, &sink);
    if sink.had_static_error() {
        return (true, false);
    }
    let interpreter = Interpreter::new(locals);
    let runtime_ok = interpreter.interpret(&statements).is_ok();
    (sink.had_static_error(), runtime_ok)
}

#[test]
fn closure_keeps_its_own_copy_of_a_captured_local() {
    let source = r#"
        fun makeCounter() {
            var a = 0;
            fun inner() {
                a = a + 1;
                return a;
            }
            return inner;
        }
        var c1 = makeCounter();
        var c2 = makeCounter();
        if (c1() != 1) print "fail c1 first";
        if (c1() != 2) print "fail c1 second";
        if (c2() != 1) print "fail c2 independent";
    "#;
    let (had_static, ran_ok) = run(source);
    assert!(!had_static);
    assert!(ran_ok);
}

#[test]
fn single_inheritance_dispatches_to_overriding_method() {
    let source = r#"
        class Animal {
            speak() { return "..."; }
        }
        class Dog < Animal {
            speak() { return "Woof"; }
        }
        class Cat < Animal {}

        var d = Dog();
        var c = Cat();
        if (d.speak() != "Woof") print "dog override broken";
        if (c.speak() != "...") print "cat inheritance broken";
    "#;
    let (had_static, ran_ok) = run(source);
    assert!(!had_static);
    assert!(ran_ok);
}

#[test]
fn bare_return_in_initializer_yields_the_instance_not_nil() {
    let source = r#"
        class Box {
            init(value) {
                this.value = value;
                return;
            }
        }
        var b = Box(42);
        if (b.value != 42) print "init state lost";
    "#;
    let (had_static, ran_ok) = run(source);
    assert!(!had_static);
    assert!(ran_ok);
}

#[test]
fn returning_a_value_from_an_initializer_is_a_static_error() {
    let (had_static, _) = run("class A { init() { return 1; } }");
    assert!(had_static);
}

#[test]
fn adding_a_string_and_a_number_is_a_runtime_type_error() {
    let sink = ErrorSink::new();
    let tokens = scanner::scan("print \"a\" + 1;", &sink);
    let statements = parser::parse(&tokens, &sink);
    assert!(!sink.had_static_error());
    let locals = resolver::resolve(&statements, &sink);
    assert!(!sink.had_static_error());
    let err = Interpreter::new(locals).interpret(&statements).unwrap_err();
    assert_eq!(err.message, "Operands must be two numbers or two strings.");
    assert_eq!(err.line, 1);
}

#[test]
fn assigning_an_undeclared_global_is_a_runtime_error() {
    let (had_static, ran_ok) = run("x = 1;");
    assert!(!had_static);
    assert!(!ran_ok);
}

#[test]
fn super_call_reaches_the_parent_implementation() {
    let source = r#"
        class A {
            greet() { return "A"; }
        }
        class B < A {
            greet() {
                return super.greet() + "B";
            }
        }
        var b = B();
        if (b.greet() != "AB") print "super dispatch broken";
    "#;
    let (had_static, ran_ok) = run(source);
    assert!(!had_static);
    assert!(ran_ok);
}

#[test]
fn for_loop_desugaring_still_scopes_the_loop_variable() {
    let source = r#"
        var total = 0;
        for (var i = 0; i < 5; i = i + 1) {
            total = total + i;
        }
        if (total != 10) print "for-loop desugaring produced the wrong total";
    "#;
    let (had_static, ran_ok) = run(source);
    assert!(!had_static);
    assert!(ran_ok);
}
