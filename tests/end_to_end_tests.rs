// ABOUTME: End-to-end scenarios exercising the full scan/parse/resolve/interpret pipeline
use lox::error::Diagnostics;
use lox::interpreter::Interpreter;
use lox::output::SharedBuffer;

fn run(source: &str) -> (String, Diagnostics) {
    let buffer = SharedBuffer::new();
    let mut interpreter = Interpreter::with_writer(Box::new(buffer.clone()));
    let mut diagnostics = Diagnostics::new();
    lox::run(source, &mut interpreter, &mut diagnostics);
    (buffer.contents(), diagnostics)
}

#[test]
fn arithmetic_and_print() {
    let (stdout, diagnostics) = run("print (1 + 2) * 3 - 4 / 2;");
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "7\n");
}

#[test]
fn closures_keep_independent_state_per_call_site() {
    let (stdout, diagnostics) = run(
        r#"
        fun makeCounter() {
            var count = 0;
            fun increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        "#,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "1\n2\n1\n");
}

#[test]
fn classes_fields_and_methods() {
    let (stdout, diagnostics) = run(
        r#"
        class Counter {
            init() { this.count = 0; }
            increment() {
                this.count = this.count + 1;
                return this.count;
            }
        }
        var c = Counter();
        print c.increment();
        print c.increment();
        "#,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "1\n2\n");
}

#[test]
fn initializer_return_is_always_the_instance() {
    let (stdout, diagnostics) = run(
        r#"
        class Thing {
            init() { this.name = "widget"; }
        }
        print Thing().name;
        "#,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "widget\n");
}

#[test]
fn single_inheritance_with_super_call() {
    let (stdout, diagnostics) = run(
        r#"
        class Animal {
            speak() { print "..."; }
        }
        class Dog < Animal {
            speak() {
                super.speak();
                print "Woof";
            }
        }
        Dog().speak();
        "#,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "...\nWoof\n");
}

#[test]
fn runtime_type_error_halts_execution_and_reports_line() {
    let (stdout, diagnostics) = run(
        r#"
        print "before";
        print 1 + nil;
        print "after";
        "#,
    );
    assert_eq!(stdout, "before\n");
    assert!(diagnostics.had_runtime_error());
    let rendered: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
    assert!(rendered.iter().any(|line| line.contains("line 3")));
}

#[test]
fn static_resolve_error_prevents_interpretation() {
    let (stdout, diagnostics) = run("fun f() { return; } class C { init() { return 1; } }");
    assert_eq!(stdout, "");
    assert!(diagnostics.had_error());
    assert!(!diagnostics.had_runtime_error());
}

#[test]
fn while_loop_with_fibonacci() {
    let (stdout, diagnostics) = run(
        r#"
        var a = 0;
        var b = 1;
        var i = 0;
        while (i < 6) {
            print a;
            var next = a + b;
            a = b;
            b = next;
            i = i + 1;
        }
        "#,
    );
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "0\n1\n1\n2\n3\n5\n");
}

#[test]
fn native_clock_is_callable_with_zero_arity() {
    let (stdout, diagnostics) = run("print clock() >= 0;");
    assert!(diagnostics.is_empty());
    assert_eq!(stdout, "true\n");
}
