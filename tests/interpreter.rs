use pretty_assertions::assert_eq;

use rox::error::LoxError;
use rox::value::Value;
use rox::{Diagnostics, Lox};

fn run(source: &str) -> (String, Result<(), Diagnostics>) {
    let mut lox = Lox::with_output(Vec::new());
    let result = lox.run(source);
    let output = String::from_utf8(lox.into_output()).unwrap();

    (output, result)
}

fn output_of(source: &str) -> String {
    let (output, result) = run(source);

    if let Err(diagnostics) = result {
        panic!("program failed: {}\noutput so far:\n{}", diagnostics, output);
    }

    output
}

/// Turns a condition into printable text; `print` only accepts nil, numbers
/// and strings.  Kept on one line so it shifts no line numbers.
const SHOW: &str = "fun show(v) { if (v) return \"true\"; return \"false\"; } ";

fn shown_output_of(source: &str) -> String {
    output_of(&format!("{}{}", SHOW, source))
}

/// Runs a program expected to fail at runtime; returns (output, error text).
fn runtime_error(source: &str) -> (String, String) {
    let (output, result) = run(source);

    let diagnostics = result.expect_err("expected a runtime error");
    assert!(diagnostics.is_runtime(), "not a runtime error: {}", diagnostics);
    assert!(matches!(
        diagnostics.errors()[0],
        LoxError::Runtime { .. }
    ));

    (output, diagnostics.to_string())
}

#[test]
fn arithmetic_and_concatenation() {
    assert_eq!(
        output_of("print 1 + 2; print \"a\" + \"b\"; print 7 / 2; print 2 * 3 - 10;"),
        "3\nab\n3.5\n-4\n"
    );
}

#[test]
fn adding_number_and_string_is_a_type_error() {
    let (_, error) = runtime_error("print 1 + \"a\";");
    assert_eq!(error, "Operands must be two numbers or two strings.\n[line 1]");
}

#[test]
fn subtraction_never_coerces_strings() {
    let (_, error) = runtime_error("\n\"2\" - 1;");
    assert_eq!(error, "Operands must be numbers.\n[line 2]");
}

#[test]
fn comparison_requires_numbers() {
    let (_, error) = runtime_error("print 1 < \"2\";");
    assert_eq!(error, "Operands must be numbers.\n[line 1]");
}

#[test]
fn unary_operators() {
    assert_eq!(
        shown_output_of("print -(3); print show(!nil); print show(!0); print show(!!\"\");"),
        "-3\ntrue\nfalse\ntrue\n"
    );

    let (_, error) = runtime_error("print -\"x\";");
    assert_eq!(error, "Operand must be a number.\n[line 1]");
}

#[test]
fn equality_has_no_coercion() {
    assert_eq!(
        shown_output_of(
            "print show(1 == 1); print show(1 == \"1\"); print show(nil == false); \
             print show(nil == nil); print show(\"a\" != \"a\"); print show(0 == false);"
        ),
        "true\nfalse\nfalse\ntrue\nfalse\nfalse\n"
    );
}

#[test]
fn number_rendering() {
    assert_eq!(
        shown_output_of("print 10; print 2.50; print show(0.1 + 0.2 == 0.3); print 1 / 0;"),
        "10\n2.5\nfalse\ninf\n"
    );
}

#[test]
fn logical_operators_short_circuit() {
    let source = r#"
        var calls = 0;
        fun touch() { calls = calls + 1; return true; }
        print show(false and touch());
        print show(true or touch());
        print nil or "fallback";
        print 1 and 2;
        print calls;
    "#;

    assert_eq!(shown_output_of(source), "false\ntrue\nfallback\n2\n0\n");
}

#[test]
fn inner_declaration_initializes_from_outer() {
    assert_eq!(output_of("var a = 1; { var a = a + 1; print a; }"), "2\n");
    assert_eq!(
        output_of("{ var a = 1; { var a = a + 1; print a; } print a; }"),
        "2\n1\n"
    );
    assert_eq!(
        output_of("fun f(a) { { var a = a * 2; return a; } } print f(21);"),
        "42\n"
    );
}

#[test]
fn initializer_reading_its_own_unshadowed_local_is_rejected() {
    let (output, result) = run("print 0;\n{ var fresh = fresh; }");

    assert_eq!(output, "");
    assert_eq!(
        result.unwrap_err().to_string(),
        "[line 2] Error at 'fresh': Can't read local variable in its own initializer."
    );
}

#[test]
fn nearest_declaration_wins_across_loop_iterations() {
    let source = r#"
        var x = "outer";
        var i = 0;
        while (i < 3) {
          var x = i;
          { var x = x * 10; print x; }
          print x;
          i = i + 1;
        }
        print x;
    "#;

    assert_eq!(output_of(source), "0\n0\n10\n1\n20\n2\nouter\n");
}

#[test]
fn undefined_variable_read_and_assignment() {
    let (_, error) = runtime_error("print nope;");
    assert_eq!(error, "Undefined variable 'nope'.\n[line 1]");

    let (_, error) = runtime_error("{ nope = 1; }");
    assert_eq!(error, "Undefined variable 'nope'.\n[line 1]");
}

#[test]
fn uninitialized_variable_is_nil() {
    assert_eq!(output_of("var a; print a;"), "nil\n");
}

#[test]
fn for_loop_with_closure_free_body() {
    assert_eq!(
        output_of("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn if_else_truthiness() {
    assert_eq!(
        output_of("if (0) print \"zero\"; else print \"no\"; if (nil) print 1; else print 2;"),
        "zero\n2\n"
    );
}

#[test]
fn recursion_and_return() {
    let source = r#"
        fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); }
        print fib(15);
    "#;

    assert_eq!(output_of(source), "610\n");
}

#[test]
fn function_without_return_yields_nil() {
    assert_eq!(output_of("fun f() {} print f();"), "nil\n");
}

#[test]
fn return_unwinds_out_of_loops() {
    let source = r#"
        fun find() {
          var i = 0;
          while (true) {
            if (i == 4) return i;
            i = i + 1;
          }
        }
        print find();
    "#;
    assert_eq!(output_of(source), "4\n");
}

#[test]
fn closures_have_independent_state() {
    let source = r#"
        fun makeCounter() {
          var count = 0;
          fun inc() { count = count + 1; return count; }
          return inc;
        }
        var a = makeCounter();
        var b = makeCounter();
        print a();
        print a();
        print b();
        print a();
    "#;

    assert_eq!(output_of(source), "1\n2\n1\n3\n");
}

#[test]
fn closure_outlives_loop_scope() {
    let source = r#"
        var keep1; var keep2;
        for (var i = 1; i <= 2; i = i + 1) {
          var j = i * 100;
          fun get() { return j; }
          if (i == 1) keep1 = get; else keep2 = get;
        }
        print keep1();
        print keep2();
    "#;

    assert_eq!(output_of(source), "100\n200\n");
}

#[test]
fn arity_mismatch() {
    let (_, error) = runtime_error("fun f(a, b) {}\nf(1);");
    assert_eq!(error, "Expected 2 arguments but got 1.\n[line 2]");
}

#[test]
fn calling_a_non_callable() {
    let (_, error) = runtime_error("\"text\"();");
    assert_eq!(error, "Can only call functions and classes.\n[line 1]");
}

#[test]
fn clock_is_a_native_number() {
    assert_eq!(
        shown_output_of("var t = clock(); print show(t > 0);"),
        "true\n"
    );
}

#[test]
fn printing_booleans_is_a_runtime_error() {
    let (output, error) = runtime_error("print \"before\";\nprint true;");

    assert_eq!(output, "before\n");
    assert_eq!(error, "Invalid value type 'boolean'.\n[line 2]");

    let (_, error) = runtime_error("print 1 < 2;");
    assert_eq!(error, "Invalid value type 'boolean'.\n[line 1]");
}

#[test]
fn printing_callables_and_instances_is_a_runtime_error() {
    let (_, error) = runtime_error("print clock;");
    assert_eq!(error, "Invalid value type 'function'.\n[line 1]");

    let (_, error) = runtime_error("fun hello() {}\nprint hello;");
    assert_eq!(error, "Invalid value type 'function'.\n[line 2]");

    let (_, error) = runtime_error("class Point {}\nprint Point;");
    assert_eq!(error, "Invalid value type 'class'.\n[line 2]");

    let (output, error) = runtime_error("class Point {}\nvar p = Point();\nprint 1;\nprint p;");
    assert_eq!(output, "1\n");
    assert_eq!(error, "Invalid value type 'instance'.\n[line 4]");
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    let mut lox = Lox::with_output(Vec::new());

    let diagnostics = lox.run("fun f(n) { return f(n + 1); }\nf(0);").unwrap_err();
    assert!(diagnostics.is_runtime());
    assert_eq!(diagnostics.to_string(), "Stack overflow.\n[line 1]");

    // the failed run unwound every frame, so the full depth is available again
    lox.run("fun down(n) { if (n == 0) return 0; return down(n - 1); }\nprint down(100);")
        .unwrap();
    assert_eq!(String::from_utf8_lossy(lox.output()), "0\n");
}

#[test]
fn runaway_initializer_recursion_is_a_runtime_error() {
    let (_, error) = runtime_error("class A {\n  init() { A(); }\n}\nA();");
    assert_eq!(error, "Stack overflow.\n[line 2]");
}

#[test]
fn method_calls_give_back_their_scopes() {
    let mut lox = Lox::with_output(Vec::new());

    lox.run("class Counter { init() { this.n = 0; } bump() { this.n = this.n + 1; } }\nvar c = Counter();")
        .unwrap();
    let before = lox.interpreter_mut().environment_count();

    lox.run("for (var i = 0; i < 50; i = i + 1) { c.bump(); Counter().bump(); }")
        .unwrap();
    lox.run("print c.n;").unwrap();

    assert_eq!(lox.interpreter_mut().environment_count(), before);
    assert_eq!(String::from_utf8_lossy(lox.output()), "50\n");
}

#[test]
fn stored_bound_method_keeps_its_scope() {
    let mut lox = Lox::with_output(Vec::new());

    lox.run("class A { init(v) { this.v = v; } get() { return this.v; } }\nvar g = A(7).get;")
        .unwrap();
    lox.run("for (var i = 0; i < 3; i = i + 1) A(i).get();").unwrap();
    lox.run("print g();").unwrap();

    assert_eq!(String::from_utf8_lossy(lox.output()), "7\n");
}

#[test]
fn subclass_without_methods_allocates_no_scope() {
    let mut lox = Lox::with_output(Vec::new());

    lox.run("class A { m() { return 1; } }").unwrap();
    let before = lox.interpreter_mut().environment_count();

    lox.run("class B < A {}\nclass C < B {}\nprint C().m();").unwrap();

    assert_eq!(lox.interpreter_mut().environment_count(), before);
    assert_eq!(String::from_utf8_lossy(lox.output()), "1\n");
}

#[test]
fn instances_fields_and_methods() {
    let source = r#"
        class Point {
          init(x, y) { this.x = x; this.y = y; }
          sum() { return this.x + this.y; }
        }
        var p = Point(1, 2);
        print p.sum();
        p.x = 10;
        print p.sum();
    "#;

    assert_eq!(output_of(source), "3\n12\n");
}

#[test]
fn fields_are_per_instance() {
    let source = r#"
        class Box {}
        var a = Box();
        var b = Box();
        a.v = 1;
        b.v = 2;
        print a.v;
        print b.v;
        print show(a == b);
        print show(a == a);
    "#;

    assert_eq!(shown_output_of(source), "1\n2\nfalse\ntrue\n");
}

#[test]
fn bound_method_remembers_its_instance() {
    let source = r#"
        class Person {
          init(name) { this.name = name; }
          greet() { return "hi " + this.name; }
        }
        var g = Person("ann").greet;
        var bob = Person("bob");
        bob.greet2 = g;
        print g();
        print bob.greet2();
    "#;

    assert_eq!(output_of(source), "hi ann\nhi ann\n");
}

#[test]
fn initializer_returns_instance() {
    let source = r#"
        class A { init() { this.n = 1; } }
        var a = A();
        print show(a.init() == a);
        print a.n;
    "#;

    assert_eq!(shown_output_of(source), "true\n1\n");
}

#[test]
fn class_arity_follows_initializer() {
    let (_, error) = runtime_error("class A { init(x) {} }\nA();");
    assert_eq!(error, "Expected 1 arguments but got 0.\n[line 2]");

    let (_, error) = runtime_error("class B {}\nB(1);");
    assert_eq!(error, "Expected 0 arguments but got 1.\n[line 2]");
}

#[test]
fn undefined_property() {
    let (_, error) = runtime_error("class A {}\nprint A().missing;");
    assert_eq!(error, "Undefined property 'missing'.\n[line 2]");
}

#[test]
fn property_access_on_non_instance() {
    let (_, error) = runtime_error("var s = \"str\";\nprint s.length;");
    assert_eq!(error, "Only instances have properties.\n[line 2]");

    let (_, error) = runtime_error("var n = 1;\nn.field = 2;");
    assert_eq!(error, "Only instances have fields.\n[line 2]");
}

#[test]
fn inherited_methods_and_initializer() {
    let source = r#"
        class Animal {
          init(name) { this.name = name; }
          speak() { return this.name + " makes a sound"; }
        }
        class Dog < Animal {}
        print Dog("rex").speak();
    "#;

    assert_eq!(output_of(source), "rex makes a sound\n");
}

#[test]
fn super_calls_superclass_version() {
    let source = r#"
        class Base { greet() { return "base"; } }
        class Sub < Base {
          greet() { return super.greet(); }
        }
        print Sub().greet();
    "#;

    assert_eq!(output_of(source), "base\n");
}

#[test]
fn super_is_lexical_not_dynamic() {
    let source = r#"
        class A { method() { return "A"; } }
        class B < A {
          method() { return "B"; }
          test() { return super.method(); }
        }
        class C < B {}
        print C().test();
    "#;

    assert_eq!(output_of(source), "A\n");
}

#[test]
fn super_skips_intermediate_override() {
    let source = r#"
        class A { name() { return "A"; } describe() { return "I am " + this.name(); } }
        class B < A { name() { return "B"; } describe() { return super.describe() + "!"; } }
        class C < B { name() { return "C"; } }
        print C().describe();
    "#;

    // `this` stays the C instance, so the dynamically dispatched name() is C's.
    assert_eq!(output_of(source), "I am C!\n");
}

#[test]
fn superclass_must_be_a_class() {
    let (_, error) = runtime_error("var NotClass = 1;\nclass A < NotClass {}");
    assert_eq!(error, "Superclass must be a class.\n[line 2]");
}

#[test]
fn instance_referencing_itself() {
    assert_eq!(
        shown_output_of("class Node {}\nvar n = Node();\nn.me = n;\nprint show(n.me.me == n);"),
        "true\n"
    );
}

#[test]
fn runtime_error_keeps_earlier_output() {
    let (output, error) = runtime_error("print 1;\nprint 2;\nprint -nil;\nprint 4;");

    assert_eq!(output, "1\n2\n");
    assert_eq!(error, "Operand must be a number.\n[line 3]");
}

#[test]
fn syntax_errors_prevent_execution() {
    let (output, result) = run("print 1;\nprint (;\nvar = 2;");

    assert_eq!(output, "");

    let diagnostics = result.unwrap_err();
    assert!(!diagnostics.is_runtime());
    assert_eq!(
        diagnostics.to_string(),
        "[line 2] Error at ';': Expected expression\n\
         [line 3] Error at '=': Expected variable name"
    );
}

#[test]
fn lexical_and_syntax_errors_are_reported_together() {
    let (output, result) = run("print @;\nprint 1");

    assert_eq!(output, "");

    let errors: Vec<String> = result
        .unwrap_err()
        .errors()
        .iter()
        .map(|e| e.to_string())
        .collect();

    assert_eq!(
        errors,
        vec![
            "[line 1] Error: Unexpected character: @",
            "[line 1] Error at ';': Expected expression",
            "[line 2] Error at end: Expected ';' after value",
        ]
    );
}

#[test]
fn session_keeps_globals_between_runs() {
    let mut lox = Lox::with_output(Vec::new());

    lox.run("var counter = 0; fun bump() { counter = counter + 1; return counter; }")
        .unwrap();
    lox.run("bump(); bump();").unwrap();

    // a failing run does not disturb what is already defined
    assert!(lox.run("print undefinedThing;").is_err());

    lox.run("print bump();").unwrap();

    assert!(matches!(lox.global("counter"), Some(Value::Number(n)) if n == 3.0));
    assert_eq!(String::from_utf8_lossy(lox.output()), "3\n");
}

#[test]
fn session_closures_survive_later_runs() {
    let mut lox = Lox::with_output(Vec::new());

    lox.run(
        "fun make() { var n = 0; fun f() { n = n + 1; return n; } return f; }\nvar c = make();",
    )
    .unwrap();
    lox.run("{ var x = 1; var y = 2; print c(); }").unwrap();
    lox.run("print c();").unwrap();

    assert_eq!(String::from_utf8_lossy(lox.output()), "1\n2\n");
}
