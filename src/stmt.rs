use std::rc::Rc;

use crate::expr::Expr;
use crate::token::Token;

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var(Token, Option<Expr>),

    Block(Vec<Stmt>),

    If(Expr, Box<Stmt>, Option<Box<Stmt>>),

    While(Expr, Box<Stmt>),

    // name, parameters, body; the body is shared with any callable built
    // from this declaration
    Function(Token, Vec<Token>, Rc<Stmt>),

    Return(Option<Expr>),
}
