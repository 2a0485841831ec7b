//! User-defined callables and the native bindings seeded into the globals.
//!
//! A [`Function`] pairs a function declaration with the environment that was
//! active when the declaration was evaluated — the closure. That captured
//! reference is fixed at definition time and never updated, which is what
//! turns lexical scoping into working closures: the function body can read
//! and mutate variables from its defining scope long after the defining
//! frame has returned.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::environment::Environment;
use crate::interpreter::{IResult, InterpretError, Interpreter};
use crate::stmt::Stmt;
use crate::token::Token;
use crate::value::Value;

/// A user-defined function: declaration plus defining environment.
#[derive(Debug)]
pub struct Function {
    name: Token,
    params: Vec<Token>,
    body: Rc<Stmt>,
    closure: Rc<RefCell<Environment>>,
}

impl Function {
    pub fn new(
        name: Token,
        params: Vec<Token>,
        body: Rc<Stmt>,
        closure: Rc<RefCell<Environment>>,
    ) -> Self {
        Self {
            name,
            params,
            body,
            closure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Invoke the function with already-evaluated arguments.
    ///
    /// The call frame's enclosing scope is the *captured* defining
    /// environment, not the caller's — calling through the caller's scope
    /// would give dynamic scoping. Parameters are bound positionally in the
    /// frame; the body (a block) then runs against the frame, so body
    /// locals live one scope below the parameters. The return signal is
    /// caught here and nowhere else; falling off the end yields nil.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Value]) -> IResult<Value> {
        debug!("Calling function '{}'", self.name.lexeme);

        let frame = Rc::new(RefCell::new(Environment::with_enclosing(
            self.closure.clone(),
        )));

        for (param, argument) in self.params.iter().zip(arguments.iter()) {
            debug!("Binding parameter '{}' to {}", param.lexeme, argument);

            frame.borrow_mut().define(&param.lexeme, argument.clone());
        }

        match interpreter.execute_with_env(&self.body, frame) {
            Ok(()) => {
                info!("Function '{}' fell off the end, returning nil", self.name.lexeme);

                Ok(Value::Nil)
            }

            Err(InterpretError::ReturnSignal(value)) => {
                info!("Function '{}' returned: {}", self.name.lexeme, value);

                Ok(value)
            }

            Err(e) => Err(e),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}

/// The `clock` native: arity 0, wall-clock seconds as an `f64`.
pub fn clock() -> Value {
    Value::NativeFunction {
        name: "clock".to_string(),
        arity: 0,
        func: |_args: &[Value]| {
            debug!("Calling native function 'clock'");

            let timestamp: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;

            Ok(Value::Number(timestamp))
        },
    }
}
