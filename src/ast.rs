use std::fmt;

use crate::stack::ensure_sufficient_stack;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Let(String, Expression),
    Return(Option<Expression>),
    ExpressionStmt(Expression),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Ident(String),
    /// Parsed value and the source text it was written as.
    IntLiteral(i64, String),
    Boolean(bool),
    PrefixExpr(Prefix, Box<Expression>),
    InfixExpr(Infix, Box<Expression>, Box<Expression>),
    IfExpr(Box<Expression>, Block, Option<Block>),
    FnLiteral(Vec<String>, Block),
    Call(Box<Expression>, Vec<Expression>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    Minus,
    Bang,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Infix {
    Eq,
    NotEq,
    Lt,
    Gt,
    Plus,
    Minus,
    Slash,
    Asterisk,
}

/// Borrowed view over any node of the tree.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Program(&'a Program),
    Statement(&'a Statement),
    Block(&'a Block),
    Expression(&'a Expression),
}

impl Prefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minus => "-",
            Self::Bang => "!",
        }
    }
}

impl Infix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Slash => "/",
            Self::Asterisk => "*",
        }
    }
}

impl Program {
    pub fn token_literal(&self) -> String {
        self.statements
            .first()
            .map(Statement::token_literal)
            .unwrap_or_default()
    }
}

impl Block {
    pub fn token_literal(&self) -> String {
        String::from("{")
    }
}

impl Statement {
    pub fn token_literal(&self) -> String {
        match self {
            Self::Let(_, _) => String::from("let"),
            Self::Return(_) => String::from("return"),
            Self::ExpressionStmt(expr) => expr.token_literal(),
        }
    }
}

impl Expression {
    /// Integer literal written in canonical decimal form.
    pub fn int(value: i64) -> Self {
        Self::IntLiteral(value, value.to_string())
    }

    /// Literal text of the token that starts (or, for infix forms, defines)
    /// this expression.
    pub fn token_literal(&self) -> String {
        match self {
            Self::Ident(name) => name.clone(),
            Self::IntLiteral(_, literal) => literal.clone(),
            Self::Boolean(value) => value.to_string(),
            Self::PrefixExpr(op, _) => op.as_str().to_string(),
            Self::InfixExpr(op, _, _) => op.as_str().to_string(),
            Self::IfExpr(_, _, _) => String::from("if"),
            Self::FnLiteral(_, _) => String::from("fn"),
            Self::Call(_, _) => String::from("("),
        }
    }
}

impl Node<'_> {
    pub fn token_literal(&self) -> String {
        match self {
            Self::Program(program) => program.token_literal(),
            Self::Statement(statement) => statement.token_literal(),
            Self::Block(block) => block.token_literal(),
            Self::Expression(expr) => expr.token_literal(),
        }
    }
}

impl<'a> From<&'a Program> for Node<'a> {
    fn from(program: &'a Program) -> Self {
        Self::Program(program)
    }
}

impl<'a> From<&'a Statement> for Node<'a> {
    fn from(statement: &'a Statement) -> Self {
        Self::Statement(statement)
    }
}

impl<'a> From<&'a Block> for Node<'a> {
    fn from(block: &'a Block) -> Self {
        Self::Block(block)
    }
}

impl<'a> From<&'a Expression> for Node<'a> {
    fn from(expr: &'a Expression) -> Self {
        Self::Expression(expr)
    }
}

// Non-final expression statements get a `;` so that `a; (-b)` does not
// re-parse as the call `a((-b))`.
fn write_statements(f: &mut fmt::Formatter<'_>, statements: &[Statement]) -> fmt::Result {
    for (i, statement) in statements.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{statement}")?;
        let is_last = i + 1 == statements.len();
        if !is_last && matches!(statement, Statement::ExpressionStmt(_)) {
            f.write_str(";")?;
        }
    }
    Ok(())
}

fn write_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statements(f, &self.statements)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return f.write_str("{ }");
        }
        ensure_sufficient_stack(|| {
            f.write_str("{ ")?;
            write_statements(f, &self.statements)?;
            f.write_str(" }")
        })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Let(name, value) => write!(f, "let {name} = {value};"),
            Self::Return(Some(value)) => write!(f, "return {value};"),
            Self::Return(None) => f.write_str("return;"),
            Self::ExpressionStmt(expr) => write!(f, "{expr}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Self::Ident(name) => f.write_str(name),
            Self::IntLiteral(_, literal) => f.write_str(literal),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::PrefixExpr(op, right) => write!(f, "({}{right})", op.as_str()),
            Self::InfixExpr(op, left, right) => write!(f, "({left} {} {right})", op.as_str()),
            Self::IfExpr(condition, consequence, alternative) => {
                write!(f, "if ({condition}) {consequence}")?;
                if let Some(alternative) = alternative {
                    write!(f, " else {alternative}")?;
                }
                Ok(())
            }
            Self::FnLiteral(parameters, body) => {
                f.write_str("fn(")?;
                write_separated(f, parameters)?;
                write!(f, ") {body}")
            }
            Self::Call(function, arguments) => {
                write!(f, "{function}(")?;
                write_separated(f, arguments)?;
                f.write_str(")")
            }
        })
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Program(program) => fmt::Display::fmt(program, f),
            Self::Statement(statement) => fmt::Display::fmt(statement, f),
            Self::Block(block) => fmt::Display::fmt(block, f),
            Self::Expression(expr) => fmt::Display::fmt(expr, f),
        }
    }
}
