use pretty_assertions::assert_eq;

use uscheme::eval::Interp;
use uscheme::printer::print;

/// Evaluate a program and render the value of its last expression.
fn run(interp: &mut Interp, source: &str) -> String {
    let id = interp.eval_str(source).expect("source reads cleanly");
    print(interp, id)
}

#[test]
fn literal_values_round_through_the_printer() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "()"), "()");
    assert_eq!(run(&mut interp, "#t"), "#t");
    assert_eq!(run(&mut interp, "#f"), "#f");
    assert_eq!(run(&mut interp, "11"), "11");
    assert_eq!(run(&mut interp, "-3.1415"), "-3.141500");
    assert_eq!(run(&mut interp, "\"The Hobbit rules!\""), "\"The Hobbit rules!\"");
    assert_eq!(run(&mut interp, "'(1 2 3)"), "(1 2 3)");
    assert_eq!(run(&mut interp, "'(1 (2 3) 4)"), "(1 (2 3) 4)");
    assert_eq!(run(&mut interp, "(cons 1 2)"), "(1 . 2)");
}

#[test]
fn arithmetic_nests_and_promotes() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "(+ 3 4)"), "7");
    assert_eq!(run(&mut interp, "(* 2 (+ 3 (* 5 4)) (+ (* 5 2) 6))"), "736");
    assert_eq!(run(&mut interp, "(/ 24 4)"), "6");
    assert_eq!(run(&mut interp, "(/ 24 5)"), "4.800000");
    assert_eq!(run(&mut interp, "(/ 1 0)"), "()");
}

#[test]
fn conditionals_demand_the_true_singleton() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "(if (= 7 11) \"Crazy!\" \"Sane\")"), "\"Sane\"");
    assert_eq!(run(&mut interp, "(if (< 7 11) \"Sane\" \"Crazy!\")"), "\"Sane\"");
    // Non-boolean tests are not truthy; only #t itself selects the
    // then-branch.
    assert_eq!(run(&mut interp, "(if 1 \"y\" \"n\")"), "\"n\"");
    assert_eq!(run(&mut interp, "(if \"\" \"y\" \"n\")"), "\"n\"");
}

#[test]
fn recursive_definitions_work_through_the_global_scope() {
    let mut interp = Interp::new();
    run(
        &mut interp,
        "(define fact (lambda (n) (if (< n 2) 1 (* n (fact (- n 1))))))",
    );
    assert_eq!(run(&mut interp, "(fact 10)"), "3628800");
    assert_eq!(run(&mut interp, "(fact 0)"), "1");
}

#[test]
fn closures_capture_their_definition_scope() {
    let mut interp = Interp::new();
    run(&mut interp, "(define g (lambda (x) (lambda () x)))");
    assert_eq!(run(&mut interp, "((g 5))"), "5");
    run(&mut interp, "(define x 99)");
    assert_eq!(run(&mut interp, "((g 5))"), "5");
}

#[test]
fn parameters_shadow_globals_without_clobbering_them() {
    let mut interp = Interp::new();
    run(&mut interp, "(define x 99)");
    run(&mut interp, "(define f (lambda (x) (+ x 1)))");
    assert_eq!(run(&mut interp, "(f 5)"), "6");
    assert_eq!(run(&mut interp, "x"), "99");
}

#[test]
fn counters_keep_state_across_collections() {
    let mut interp = Interp::new();
    run(
        &mut interp,
        "(define make-counter (lambda (n) (lambda () (set! n (+ n 1)) n)))",
    );
    run(&mut interp, "(define a (make-counter 0))");
    run(&mut interp, "(define b (make-counter 100))");

    // Collect between every call, the way the binary does between
    // top-level expressions. Captured scopes must survive.
    interp.collect();
    assert_eq!(run(&mut interp, "(a)"), "1");
    interp.collect();
    assert_eq!(run(&mut interp, "(a)"), "2");
    interp.collect();
    assert_eq!(run(&mut interp, "(b)"), "101");
    interp.collect();
    assert_eq!(run(&mut interp, "(a)"), "3");
    assert_eq!(run(&mut interp, "(b)"), "102");
}

#[test]
fn set_of_an_undefined_name_never_creates_a_binding() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "(set! ghost 1)"), "()");
    // Still undefined afterwards: a second attempt behaves identically.
    assert_eq!(run(&mut interp, "(set! ghost 1)"), "()");
    assert_eq!(run(&mut interp, "ghost"), "()");
}

#[test]
fn runtime_failures_yield_nil_and_execution_continues() {
    let mut interp = Interp::new();
    run(&mut interp, "(define f (lambda (a b) (+ a b)))");
    assert_eq!(run(&mut interp, "(f 1)"), "()");
    assert_eq!(run(&mut interp, "(car 5)"), "()");
    assert_eq!(run(&mut interp, "(+ 1 \"nope\")"), "()");
    assert_eq!(run(&mut interp, "(\"not-a-proc\" 1)"), "()");
    // The interpreter is still healthy.
    assert_eq!(run(&mut interp, "(f 20 22)"), "42");
}

#[test]
fn deeply_recursive_programs_fit_the_native_stack() {
    let mut interp = Interp::new();
    run(
        &mut interp,
        "(define sum (lambda (n) (if (< n 1) 0 (+ n (sum (- n 1))))))",
    );
    assert_eq!(run(&mut interp, "(sum 1000)"), "500500");
}

#[test]
fn a_small_program_with_collections_between_each_form() {
    let mut interp = Interp::new();
    let program = [
        ("(define square (lambda (n) (* n n)))", "<*CODE*>"),
        ("(define total 0)", "0"),
        ("(set! total (+ total (square 3)))", "9"),
        ("(set! total (+ total (square 4)))", "25"),
        ("(if (= total 25) \"right\" \"wrong\")", "\"right\""),
    ];
    for (source, expected) in program {
        assert_eq!(run(&mut interp, source), expected, "{source}");
        interp.collect();
    }
}
