use gosh::prelude::*;
use gosh::Gosh;
use pretty_assertions::assert_eq;

fn run(source: &str) -> Result<Vec<Value>, Error> {
    Gosh::new().run("test", source)
}

macro_rules! assert_values {
    ($source:expr, [$($expected:expr),*]) => {
        let res = run($source);
        assert!(res.is_ok(), "{:?}", res);
        assert_eq!(res.unwrap(), vec![$(Value::from($expected)),*]);
    };
}

#[test]
fn arithmetic() {
    assert_values!("3 + 4 * 2", [11]);
}

#[test]
fn string_concat() {
    assert_values!(r#""foo" + "bar""#, ["foobar"]);
}

#[test]
fn closure_capture() {
    assert_values!("make := func(n) { return func(){ return n } }; f := make(5); f()", [5]);
}

#[test]
fn type_error_leaves_variable_unchanged() {
    let mut gosh = Gosh::new();
    let res = gosh.run("test", "x := 1; x := \"a\"");

    match res {
        Err(Error::Runtime(RuntimeError::TypeMismatch { name, from, to, .. })) => {
            assert_eq!((name.as_str(), from, to), ("x", "int64", "string"));
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
    assert_eq!(gosh.run("test", "x").unwrap(), vec![Value::Int(1)]);
}

#[test]
fn loop_with_break() {
    assert_values!("v := while true { break }", [false]);
}

#[test]
fn unbound_variable() {
    let res = run("zzz");
    assert!(
        matches!(&res, Err(Error::Runtime(RuntimeError::UndefinedVariable { name, .. })) if name == "zzz"),
        "{res:?}"
    );
    assert_eq!(
        res.unwrap_err().to_string(),
        "1:1: attempt to access undefined variable zzz"
    );
}

#[test]
fn short_circuit_skips_side_effects() {
    let source = r#"
calls := 0
effect := func() { extern calls; calls += 1; return true }
a := false && effect()
b := true || effect()
a, b, calls
"#;
    assert_values!(source, [false, true, 0]);
}

#[test]
fn short_circuit_returns_left_operand() {
    assert_values!("nil && 1", [Value::Nil]);
    assert_values!("0 || 1", [0]);
}

#[test]
fn closure_shares_state_between_calls() {
    let source = r#"
x := 1
f := func() { extern x; x := x + 1; return x }
f()
f(), x
"#;
    assert_values!(source, [3, 3]);
}

#[test]
fn closures_over_the_same_cell_see_each_other() {
    let source = r#"
pair := func() {
    n := 0
    inc := func() { extern n; n += 1 }
    get := func() { return n }
    return inc, get
}
inc, get := pair()
inc(); inc()
get()
"#;
    assert_values!(source, [2]);
}

#[test]
fn return_unwinds_to_the_call_site() {
    let source = r#"
visited := 0
f := func() {
    extern visited
    while true {
        visited += 1
        if visited == 3 {
            return "done", visited
        }
    }
    visited := 100
    return "unreachable"
}
f()
"#;
    assert_values!(source, ["done", 3]);
}

#[test]
fn free_variables_follow_the_body() {
    let tokens = Scanner::new("g := func(a) { f := func(b) { return a + b + c } }").scan_tokens().unwrap();
    let program = analyze(Parser::new(tokens).parse().unwrap()).unwrap();

    let f = program.functions()[1].borrow();
    let free = f.free_variables().into_iter().collect::<Vec<_>>();
    assert_eq!(free, vec!["a", "c"]);
    assert_eq!(f.missing_bindings(), vec!["c"]);
}

#[test]
fn static_errors_come_before_side_effects() {
    let mut gosh = Gosh::new();
    let res = gosh.run("test", "x := 1\nbreak");
    assert!(matches!(res, Err(Error::Compile(CompileError::OutsideLoop { .. }))));
    assert_eq!(res.unwrap_err().exit_code(), 65);
    assert!(gosh.globals().borrow().value("x").is_err());
}

#[test]
fn runtime_errors_exit_with_70() {
    assert_eq!(run("1 / 0").unwrap_err().exit_code(), 70);
}

#[test]
fn parse_errors_carry_positions() {
    let err = run("x := (1 + 2").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.to_string(), "1:12: Expect ')' after expression, at ';'");
}

#[test]
fn functions_render_their_signature() {
    assert_eq!(
        run("func(a, b)[out] { }").unwrap()[0].to_string(),
        "func(a, b)[out]{...}"
    );
}
