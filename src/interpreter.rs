use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error; // for custom errors

use crate::callable::{self, Function};
use crate::environment::Environment;
use crate::error::{RuntimeError, SharedErrorSink};
use crate::expr::{Expr, ExprId};
use crate::stmt::Stmt;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-local outcome of evaluating a node: either a genuine runtime error,
/// or the `return` control signal on its way to the nearest function-call
/// boundary. Blocks and loops propagate both untouched; only
/// [`Function::call`] interprets `ReturnSignal` as "done, yield this value".
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Return signal with value: {0}")]
    ReturnSignal(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

/// The tree-walking evaluator.
///
/// Holds the global scope, the mutable "current scope" reference that
/// advances as blocks and calls are entered and exited, and the distance
/// map fed by the external resolver. One logical thread of control per
/// instance; evaluation is strictly synchronous.
pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Rc<RefCell<dyn Write>>,
    error_sink: Option<SharedErrorSink>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter and seeds native functions such as `clock`.
    pub fn new() -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define("clock", callable::clock());

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output: Rc::new(RefCell::new(io::stdout())),
            error_sink: None,
        }
    }

    /// Redirect `print` output, e.g. into a buffer under test.
    pub fn with_output(mut self, output: Rc<RefCell<dyn Write>>) -> Self {
        self.output = output;
        self
    }

    /// Install a host-supplied sink for runtime error reports. Without one,
    /// reports fall back to stderr.
    pub fn with_error_sink(mut self, error_sink: SharedErrorSink) -> Self {
        self.error_sink = Some(error_sink);
        self
    }

    /// Record a lexical distance for a variable occurrence. Called by the
    /// external resolver before interpretation begins; occurrences without
    /// an entry resolve against the globals directly.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        debug!("Resolved {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program").
    ///
    /// Errors are isolated at top-level-statement granularity: a failing
    /// statement is reported to the error sink and execution resumes with
    /// the next statement.
    pub fn interpret(&mut self, statements: &[Stmt]) {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(InterpretError::Runtime(error)) => self.report(&error),

                // A return signal can only reach here if the resolver let a
                // top-level `return` through; that is an internal bug.
                Err(InterpretError::ReturnSignal(_)) => {
                    panic!("resolver inconsistency: return outside of any function")
                }
            }
        }

        info!("Interpretation completed");
    }

    fn report(&self, error: &RuntimeError) {
        debug!("Runtime error: {}", error);

        match &self.error_sink {
            Some(sink) => sink.borrow_mut().runtime_error(error),
            None => eprintln!("{}", error),
        }
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                debug!("Evaluating expression statement");
                let _ = self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                debug!("Evaluating print statement");
                let value = self.evaluate(expr)?;
                writeln!(self.output.borrow_mut(), "{}", value).map_err(RuntimeError::from)?;
                info!("Printed value: {}", value);
                Ok(())
            }

            Stmt::Var(name, initializer) => {
                debug!("Defining variable '{}'", name.lexeme);
                let value = if let Some(expr) = initializer {
                    self.evaluate(expr)?
                } else {
                    Value::Nil
                };
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, value.clone());
                info!("Variable '{}' defined with value: {}", name.lexeme, value);
                Ok(())
            }

            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());
                let child = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));
                self.execute_block(statements, child)
            }

            Stmt::If(condition, then_branch, else_branch) => {
                debug!("Evaluating if condition");
                let condition = self.evaluate(condition)?;
                if is_truthy(&condition) {
                    self.execute(then_branch)?;
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)?;
                }
                Ok(())
            }

            Stmt::While(condition, body) => {
                debug!("Entering while loop");
                while is_truthy(&self.evaluate(condition)?) {
                    self.execute(body)?;
                }
                info!("Exited while loop");
                Ok(())
            }

            Stmt::Function(name, params, body) => {
                debug!("Defining function '{}'", name.lexeme);
                // The environment current right now is the closure.
                let function = Function::new(
                    name.clone(),
                    params.clone(),
                    body.clone(),
                    self.environment.clone(),
                );
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Function(Rc::new(function)));
                info!(
                    "Function '{}' defined with {} parameters",
                    name.lexeme,
                    params.len()
                );
                Ok(())
            }

            Stmt::Return(expr) => {
                debug!("Executing return statement");
                let value = match expr {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                Err(InterpretError::ReturnSignal(value))
            }
        }
    }

    /// Executes statements against `environment`, restoring the previous
    /// scope on every exit path — normal completion, a return signal, or an
    /// error.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> IResult<()> {
        let previous = self.environment.clone();
        self.environment = environment;

        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                self.environment = previous;
                return Err(interrupt);
            }
        }

        self.environment = previous;
        info!("Exited block");
        Ok(())
    }

    /// Executes a single statement against `environment` (a call frame),
    /// with the same restore-on-every-exit-path discipline as
    /// [`Interpreter::execute_block`].
    pub(crate) fn execute_with_env(
        &mut self,
        stmt: &Stmt,
        environment: Rc<RefCell<Environment>>,
    ) -> IResult<()> {
        let previous = self.environment.clone();
        self.environment = environment;

        let result = self.execute(stmt);

        self.environment = previous;
        result
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        let value = match expr {
            Expr::Literal(literal) => Value::from(literal),

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary(op, operand) => self.evaluate_unary(op, operand)?,

            Expr::Binary(left, op, right) => self.evaluate_binary(left, op, right)?,

            Expr::Logical(left, op, right) => self.evaluate_logical(left, op, right)?,

            Expr::Variable(id, name) => self.lookup_variable(*id, name)?,

            Expr::Assign(id, name, value_expr) => {
                let value = self.evaluate(value_expr)?;
                if let Some(&distance) = self.locals.get(id) {
                    debug!(
                        "Assigning '{}' at distance {}: {}",
                        name.lexeme, distance, value
                    );
                    self.environment
                        .borrow_mut()
                        .assign_at(distance, name, value.clone());
                } else {
                    debug!("Assigning global '{}': {}", name.lexeme, value);
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }
                value
            }

            Expr::Call(callee_expr, paren, arguments) => {
                debug!("Evaluating function call");
                let callee = self.evaluate(callee_expr)?;

                if !matches!(callee, Value::Function(_) | Value::NativeFunction { .. }) {
                    return Err(RuntimeError::NotCallable {
                        paren: paren.clone(),
                    }
                    .into());
                }

                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                self.invoke_callable(&callee, paren, &args)?
            }
        };

        debug!("Expression evaluated to: {}", value);
        Ok(value)
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, op: &Token, operand: &Expr) -> IResult<Value> {
        debug!("Evaluating unary operation: {}", op.lexeme);
        let right = self.evaluate(operand)?;

        match op.token_type {
            TokenType::MINUS => {
                if let Value::Number(n) = right {
                    Ok(Value::Number(-n))
                } else {
                    Err(RuntimeError::type_mismatch(op, "Operand must be a number.").into())
                }
            }

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&right))),

            _ => Err(RuntimeError::type_mismatch(op, "Invalid unary operator.").into()),
        }
    }

    /// Evaluates a binary expression. Arithmetic follows IEEE-754 double
    /// semantics, including division by zero yielding infinity or NaN.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> IResult<Value> {
        debug!("Evaluating binary operation: {}", op.lexeme);
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(RuntimeError::type_mismatch(
                    op,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = check_number_operands(op, &left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => Err(RuntimeError::type_mismatch(op, "Invalid binary operator.").into()),
        }
    }

    /// Short-circuiting `and` / `or`. The returned value is the original
    /// operand, not a coerced boolean; truthiness decides the branch only.
    fn evaluate_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> IResult<Value> {
        debug!("Evaluating logical operation: {}", op.lexeme);
        let left_val = self.evaluate(left)?;

        if op.token_type == TokenType::OR {
            if is_truthy(&left_val) {
                return Ok(left_val);
            }
        } else if !is_truthy(&left_val) {
            return Ok(left_val);
        }

        self.evaluate(right)
    }

    /// Two-tier variable lookup: chain-relative addressing for statically
    /// resolved locals, globals for everything else.
    fn lookup_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        if let Some(&distance) = self.locals.get(&id) {
            debug!("Variable '{}' read at distance {}", name.lexeme, distance);
            Ok(self.environment.borrow().get_at(distance, &name.lexeme))
        } else {
            debug!("Variable '{}' read from globals", name.lexeme);
            Ok(self.globals.borrow().get(name)?)
        }
    }

    /// Invokes a callable (native or user-defined function).
    fn invoke_callable(
        &mut self,
        callee: &Value,
        paren: &Token,
        arguments: &[Value],
    ) -> IResult<Value> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                debug!("Calling native function '{}'", name);
                if arguments.len() != *arity {
                    return Err(RuntimeError::ArityMismatch {
                        paren: paren.clone(),
                        expected: *arity,
                        got: arguments.len(),
                    }
                    .into());
                }
                let result = func(arguments).map_err(|message| RuntimeError::NativeCall {
                    paren: paren.clone(),
                    message,
                })?;
                info!("Native function '{}' returned: {}", name, result);
                Ok(result)
            }

            Value::Function(function) => {
                if arguments.len() != function.arity() {
                    return Err(RuntimeError::ArityMismatch {
                        paren: paren.clone(),
                        expected: function.arity(),
                        got: arguments.len(),
                    }
                    .into());
                }
                function.call(self, arguments)
            }

            _ => Err(RuntimeError::NotCallable {
                paren: paren.clone(),
            }
            .into()),
        }
    }
}

/// Only `nil` and `false` are falsy; every other value (including zero and
/// the empty string) is truthy.
fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Bool(false))
}

fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

fn check_number_operands(
    op: &Token,
    left: &Value,
    right: &Value,
) -> Result<(f64, f64), RuntimeError> {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        Ok((*a, *b))
    } else {
        Err(RuntimeError::type_mismatch(op, "Operands must be numbers."))
    }
}
