use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::environment::Scope;
use crate::func::Function;
use crate::interpreter::Evaluator;
use crate::token::Position;
use crate::value::Value;

fn native(parameters: &[&str], body: Evaluator) -> Value {
    Value::Function(Rc::new(Function {
        parameters: parameters.iter().map(|p| p.to_string()).collect(),
        channels: vec![],
        locals: vec![],
        body,
        captured: Scope::new().as_shared(),
    }))
}

/// `print(value)` writes the value and a newline to stdout.
pub fn print() -> Value {
    native(
        &["value"],
        Rc::new(|scope| {
            let value = scope.borrow().value("value").map_err(|e| e.at(Position::default()))?;
            println!("{value}");
            Ok(vec![])
        }),
    )
}

/// `clock()` returns seconds since the Unix epoch.
pub fn clock() -> Value {
    native(
        &[],
        Rc::new(|_| {
            let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            Ok(vec![Value::Float(since_epoch.as_millis() as f64 / 1000.0)])
        }),
    )
}

pub fn install(globals: &mut Scope) {
    // A fresh scope holds neither name, so these sets cannot fail.
    for (name, value) in [("print", print()), ("clock", clock())] {
        let _ = globals.set(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_a_float_after_the_epoch() {
        let Value::Function(clock) = clock() else { panic!("clock is not a function") };
        let result = clock.call(vec![], &Scope::new().as_shared(), Position::default()).unwrap();
        assert!(matches!(result.as_slice(), [Value::Float(secs)] if *secs > 0.0));
    }

    #[test]
    fn print_takes_one_argument() {
        let Value::Function(print) = print() else { panic!("print is not a function") };
        assert_eq!(print.to_string(), "func(value)[]{...}");
        assert_eq!(print.call(vec![Value::Int(1)], &Scope::new().as_shared(), Position::default()), Ok(vec![]));
        assert!(print.call(vec![], &Scope::new().as_shared(), Position::default()).is_err());
    }

    #[test]
    fn installs_into_globals() {
        let mut globals = Scope::new();
        install(&mut globals);
        assert!(globals.contains("print"));
        assert!(globals.contains("clock"));
    }
}
