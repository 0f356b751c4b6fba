use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::ast::{Block, Expression, Infix, Node, Prefix, Program, Statement};
use crate::config::{Config, TypeErrorPolicy};
use crate::object::environment::Environment;
use crate::object::{Object, NULL};
use crate::stack::ensure_sufficient_stack;

/// Evaluates `node` in a fresh global environment with the default config.
pub fn evaluate<'a>(node: impl Into<Node<'a>>) -> Object {
    Evaluator::new().eval(node)
}

/// Tree-walking evaluator.
///
/// Bindings made by `let` persist in the evaluator's environment across calls
/// to [`Evaluator::eval`], so one evaluator can back an interactive session.
pub struct Evaluator {
    environment: Rc<RefCell<Environment>>,
    config: Config,
    depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::new_with_env(Environment::new(), config)
    }

    pub fn new_with_env(environment: Environment, config: Config) -> Self {
        Self {
            environment: Rc::new(RefCell::new(environment)),
            config,
            depth: 0,
        }
    }

    pub fn environment(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.environment)
    }

    /// Drops every global binding.
    ///
    /// A closure bound by `let` holds the environment it is stored in, so a
    /// global environment with function bindings is never freed on its own.
    pub fn reset(&mut self) {
        self.environment.borrow_mut().clear();
    }

    pub fn eval<'a>(&mut self, node: impl Into<Node<'a>>) -> Object {
        match node.into() {
            Node::Program(program) => self.eval_program(program),
            Node::Statement(statement) => unwrap_return_value(self.eval_statement(statement)),
            Node::Block(block) => unwrap_return_value(self.eval_block(block)),
            Node::Expression(expr) => self.eval_expr(expr),
        }
    }

    pub fn eval_program(&mut self, program: &Program) -> Object {
        let mut result = NULL;
        for statement in &program.statements {
            result = self.eval_statement(statement);

            match result {
                Object::ReturnValue(obj) => return *obj,
                Object::Error(_) => return result,
                _ => {}
            }
        }

        result
    }

    // Unlike `eval_program`, a block hands `ReturnValue` up still wrapped so
    // every enclosing block stops too.
    fn eval_block(&mut self, block: &Block) -> Object {
        ensure_sufficient_stack(|| {
            let mut result = NULL;
            for statement in &block.statements {
                result = self.eval_statement(statement);

                if matches!(result, Object::ReturnValue(_) | Object::Error(_)) {
                    return result;
                }
            }

            result
        })
    }

    fn eval_statement(&mut self, statement: &Statement) -> Object {
        match statement {
            Statement::ExpressionStmt(expr) => self.eval_expr(expr),
            Statement::Let(ident, expr) => {
                let val = self.eval_expr(expr);
                if val.is_error() {
                    return val;
                }
                self.environment.borrow_mut().set(ident.clone(), val);
                NULL
            }
            Statement::Return(Some(expr)) => {
                let val = self.eval_expr(expr);
                if val.is_error() {
                    return val;
                }
                Object::ReturnValue(Box::new(val))
            }
            Statement::Return(None) => Object::ReturnValue(Box::new(NULL)),
        }
    }

    fn eval_expr(&mut self, expr: &Expression) -> Object {
        ensure_sufficient_stack(|| match expr {
            Expression::IntLiteral(num, _) => Object::Integer(*num),
            Expression::Boolean(value) => Object::from(*value),
            Expression::Ident(ident) => self.eval_ident(ident),
            Expression::PrefixExpr(op, right) => {
                let right = self.eval_expr(right);
                if right.is_error() {
                    return right;
                }
                self.eval_prefix_expression(*op, right)
            }
            Expression::InfixExpr(op, left, right) => {
                let left = self.eval_expr(left);
                if left.is_error() {
                    return left;
                }
                let right = self.eval_expr(right);
                if right.is_error() {
                    return right;
                }
                self.eval_infix_expression(*op, left, right)
            }
            Expression::IfExpr(condition, consequence, alternative) => {
                self.eval_if_expression(condition, consequence, alternative.as_ref())
            }
            Expression::FnLiteral(parameters, body) => Object::Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: Rc::clone(&self.environment),
            },
            Expression::Call(function, arguments) => {
                self.eval_call_expression(function, arguments)
            }
        })
    }

    fn eval_ident(&self, ident: &str) -> Object {
        self.environment
            .borrow()
            .get(ident)
            .unwrap_or_else(|| Object::Error(format!("identifier not found: {ident}")))
    }

    fn type_error(&self, message: String) -> Object {
        match self.config.type_errors {
            TypeErrorPolicy::Error => Object::Error(message),
            TypeErrorPolicy::Null => NULL,
        }
    }

    fn eval_prefix_expression(&self, op: Prefix, right: Object) -> Object {
        match op {
            Prefix::Bang => Object::from(!right.is_truthy()),
            Prefix::Minus => match right {
                Object::Integer(num) => Object::Integer(num.wrapping_neg()),
                obj => self.type_error(format!("unknown operator: -{}", obj.type_name())),
            },
        }
    }

    fn eval_infix_expression(&self, op: Infix, left: Object, right: Object) -> Object {
        if let (Object::Integer(l), Object::Integer(r)) = (&left, &right) {
            return self.eval_integer_infix_expression(op, *l, *r);
        }

        match op {
            Infix::Eq => Object::from(left == right),
            Infix::NotEq => Object::from(left != right),
            _ if left.type_name() != right.type_name() => self.type_error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                op.as_str(),
                right.type_name()
            )),
            _ => self.type_error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                op.as_str(),
                right.type_name()
            )),
        }
    }

    fn eval_integer_infix_expression(&self, op: Infix, left: i64, right: i64) -> Object {
        match op {
            Infix::Eq => Object::from(left == right),
            Infix::NotEq => Object::from(left != right),
            Infix::Lt => Object::from(left < right),
            Infix::Gt => Object::from(left > right),
            Infix::Plus => Object::Integer(left.wrapping_add(right)),
            Infix::Minus => Object::Integer(left.wrapping_sub(right)),
            Infix::Asterisk => Object::Integer(left.wrapping_mul(right)),
            Infix::Slash if right == 0 => Object::Error(format!("division by zero: {left} / 0")),
            Infix::Slash => Object::Integer(left.wrapping_div(right)),
        }
    }

    fn eval_if_expression(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Object {
        let condition = self.eval_expr(condition);
        if condition.is_error() {
            return condition;
        }

        if condition.is_truthy() {
            self.eval_block(consequence)
        } else if let Some(alternative) = alternative {
            self.eval_block(alternative)
        } else {
            NULL
        }
    }

    fn eval_call_expression(&mut self, function: &Expression, args: &[Expression]) -> Object {
        let function = self.eval_expr(function);
        if function.is_error() {
            return function;
        }

        match self.eval_expressions(args) {
            Ok(args) => self.apply_function(function, args),
            Err(err) => err,
        }
    }

    /// Evaluates left to right, stopping at the first error object.
    fn eval_expressions(&mut self, exprs: &[Expression]) -> Result<Vec<Object>, Object> {
        let mut result = Vec::with_capacity(exprs.len());

        for expr in exprs {
            let evaluated = self.eval_expr(expr);
            if evaluated.is_error() {
                return Err(evaluated);
            }
            result.push(evaluated);
        }

        Ok(result)
    }

    fn apply_function(&mut self, function: Object, args: Vec<Object>) -> Object {
        let (parameters, body, env) = match function {
            Object::Function {
                parameters,
                body,
                env,
            } => (parameters, body, env),
            other => return Object::Error(format!("not a function: {}", other.type_name())),
        };

        if parameters.len() != args.len() {
            return Object::Error(format!(
                "wrong number of arguments: want={}, got={}",
                parameters.len(),
                args.len()
            ));
        }

        if self.depth >= self.config.max_call_depth {
            warn!(depth = self.depth, "call depth limit reached");
            return Object::Error(format!(
                "maximum call depth of {} exceeded",
                self.config.max_call_depth
            ));
        }

        debug!(arity = parameters.len(), depth = self.depth, "applying function");

        let extended_env = extend_function_env(env, &parameters, args);
        let outer = std::mem::replace(
            &mut self.environment,
            Rc::new(RefCell::new(extended_env)),
        );
        self.depth += 1;

        let evaluated = self.eval_block(&body);

        self.depth -= 1;
        self.environment = outer;

        unwrap_return_value(evaluated)
    }
}

fn extend_function_env(
    outer: Rc<RefCell<Environment>>,
    parameters: &[String],
    args: Vec<Object>,
) -> Environment {
    let mut environment = Environment::new_enclosed_environment(outer);

    for (param, arg) in parameters.iter().zip(args) {
        environment.set(param.clone(), arg);
    }

    environment
}

fn unwrap_return_value(obj: Object) -> Object {
    match obj {
        Object::ReturnValue(v) => *v,
        obj => obj,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::object::{FALSE, TRUE};
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Program {
        let mut parser = Parser::new(Lexer::new(input));
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "parser errors for {input:?}: {:?}",
            parser.errors()
        );
        program
    }

    fn test_eval(input: &str) -> Object {
        evaluate(&parse(input))
    }

    fn test_eval_lenient(input: &str) -> Object {
        Evaluator::with_config(Config::lenient()).eval(&parse(input))
    }

    fn run_table(tests: Vec<(&str, Object)>) {
        for (input, expected) in tests {
            assert_eq!(test_eval(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_eval_integer_expression() {
        run_table(vec![
            ("5", Object::Integer(5)),
            ("10", Object::Integer(10)),
            ("5 + 5 + 5 + 5 - 10", Object::Integer(10)),
            ("2 * 2 * 2 * 2 * 2", Object::Integer(32)),
            ("-50 + 100 + -50", Object::Integer(0)),
            ("5 * 2 + 10", Object::Integer(20)),
            ("5 + 2 * 10", Object::Integer(25)),
            ("5 + 5 * 2", Object::Integer(15)),
            ("(5 + 5) * 2", Object::Integer(20)),
            ("20 + 2 * -10", Object::Integer(0)),
            ("50 / 2 * 2 + 10", Object::Integer(60)),
            ("2 * (5 + 10)", Object::Integer(30)),
            ("3 * 3 * 3 + 10", Object::Integer(37)),
            ("3 * (3 * 3) + 10", Object::Integer(37)),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", Object::Integer(50)),
            ("7 / 2", Object::Integer(3)),
            ("-7 / 2", Object::Integer(-3)),
        ]);
    }

    #[test]
    fn test_integer_overflow_wraps() {
        run_table(vec![
            ("9223372036854775807 + 1", Object::Integer(i64::MIN)),
            ("-9223372036854775807 - 2", Object::Integer(i64::MAX)),
            ("(-9223372036854775807 - 1) / -1", Object::Integer(i64::MIN)),
        ]);
    }

    #[test]
    fn test_division_by_zero() {
        let expected = Object::Error(String::from("division by zero: 5 / 0"));
        assert_eq!(test_eval("5 / 0; 10"), expected);
        assert_eq!(test_eval_lenient("5 / (2 - 2)"), expected);
    }

    #[test]
    fn test_eval_boolean_expression() {
        run_table(vec![
            ("true", TRUE),
            ("false", FALSE),
            ("1 < 2", TRUE),
            ("1 > 2", FALSE),
            ("1 < 1", FALSE),
            ("1 > 1", FALSE),
            ("1 == 1", TRUE),
            ("1 != 1", FALSE),
            ("1 == 2", FALSE),
            ("1 != 2", TRUE),
            ("true == true", TRUE),
            ("false == false", TRUE),
            ("true == false", FALSE),
            ("true != false", TRUE),
            ("false != true", TRUE),
            ("(1 < 2) == true", TRUE),
            ("(1 < 2) == false", FALSE),
            ("(1 > 2) == true", FALSE),
            ("(1 > 2) == false", TRUE),
            ("1 == true", FALSE),
            ("1 != true", TRUE),
            ("if (false) { 1 } == if (false) { 2 }", TRUE),
        ]);
    }

    #[test]
    fn test_bang_operator() {
        run_table(vec![
            ("!true", FALSE),
            ("!false", TRUE),
            ("!5", FALSE),
            ("!0", FALSE),
            ("!!true", TRUE),
            ("!!false", FALSE),
            ("!!5", TRUE),
            ("!if (false) { 1 }", TRUE),
        ]);
    }

    #[test]
    fn test_minus_operator() {
        run_table(vec![
            ("5", Object::Integer(5)),
            ("10", Object::Integer(10)),
            ("-5", Object::Integer(-5)),
            ("-10", Object::Integer(-10)),
            ("--10", Object::Integer(10)),
        ]);
    }

    #[test]
    fn test_if_else_expression() {
        run_table(vec![
            ("if (true) { 10 }", Object::Integer(10)),
            ("if (false) { 10 }", NULL),
            ("if (1) { 10 }", Object::Integer(10)),
            ("if (1 < 2) { 10 }", Object::Integer(10)),
            ("if (1 > 2) { 10 }", NULL),
            ("if (1 > 2) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1 < 2) { 10 } else { 20 }", Object::Integer(10)),
            ("if (1 < 2) { }", NULL),
            ("if (1 < 2) { 1; 2; 3 }", Object::Integer(3)),
        ]);
    }

    #[test]
    fn test_return_statements() {
        run_table(vec![
            ("return 10;", Object::Integer(10)),
            ("return 10; 9;", Object::Integer(10)),
            ("return 2 * 5; 9;", Object::Integer(10)),
            ("9; return 2 * 5; 9;", Object::Integer(10)),
            ("return; 9;", NULL),
            (
                "if (10 > 1) {
                    if (10 > 1) {
                        return 10;
                    }
                return 1;
                }",
                Object::Integer(10),
            ),
        ]);
    }

    #[test]
    fn test_error_handling() {
        let tests = vec![
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            ("true < false", "unknown operator: BOOLEAN < BOOLEAN"),
            (
                "if (10 > 1) { true + false }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            (
                "if (10 > 1) {
                    if (10 > 1) {
                        return true + false;
                    }
                    return 1;
                }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("-(true + 1) * 3", "type mismatch: BOOLEAN + INTEGER"),
            ("if (-true) { 1 } else { 2 }", "unknown operator: -BOOLEAN"),
            ("foobar", "identifier not found: foobar"),
            ("let x = y; x", "identifier not found: y"),
            ("5(1)", "not a function: INTEGER"),
            ("fn(x) { x }(1, 2)", "wrong number of arguments: want=1, got=2"),
            ("fn(a, b) { a }(1, -false)", "unknown operator: -BOOLEAN"),
        ];

        for (input, message) in tests {
            assert_eq!(
                test_eval(input),
                Object::Error(String::from(message)),
                "input: {input}"
            );
        }
    }

    #[test]
    fn test_lenient_type_errors_yield_null() {
        let tests = vec![
            ("-true", NULL),
            ("5 + true", NULL),
            ("true + false; 5", Object::Integer(5)),
            ("-(true + 1)", NULL),
            ("if (true > false) { 1 } else { 2 }", Object::Integer(2)),
            ("1 == true", FALSE),
            ("foobar", Object::Error(String::from("identifier not found: foobar"))),
        ];

        for (input, expected) in tests {
            assert_eq!(test_eval_lenient(input), expected, "input: {input}");
        }
    }

    #[test]
    fn test_let_statements() {
        run_table(vec![
            ("let a = 5; a;", Object::Integer(5)),
            ("let a = 5 * 5; a;", Object::Integer(25)),
            ("let a = 5; let b = a; b;", Object::Integer(5)),
            (
                "let a = 5; let b = a; let c = a + b + 5; c;",
                Object::Integer(15),
            ),
            ("let a = 5;", NULL),
            ("let a = 1; let a = a + 1; a", Object::Integer(2)),
        ]);
    }

    #[test]
    fn test_function_object() {
        let evaluated = test_eval("fn(x) { x + 2; };");
        let Object::Function {
            parameters, body, ..
        } = evaluated
        else {
            panic!("expected function, got {evaluated:?}");
        };

        assert_eq!(parameters, vec![String::from("x")]);
        assert_eq!(body.to_string(), "{ (x + 2) }");
    }

    #[test]
    fn test_function_application() {
        run_table(vec![
            (
                "let identity = fn(x) { x; }; identity(5);",
                Object::Integer(5),
            ),
            (
                "let identity = fn(x) { return x; }; identity(5);",
                Object::Integer(5),
            ),
            (
                "let double = fn(x) { x * 2; }; double(5);",
                Object::Integer(10),
            ),
            (
                "let add = fn(x, y) { x + y; }; add(5, 5);",
                Object::Integer(10),
            ),
            (
                "let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));",
                Object::Integer(20),
            ),
            ("fn(x) { x; }(5)", Object::Integer(5)),
            ("fn() { }()", NULL),
            ("fn() { return; 1 }()", NULL),
        ]);
    }

    #[test]
    fn test_return_stops_only_the_function() {
        run_table(vec![(
            "let f = fn() { return 1; 2 }; f() + 10",
            Object::Integer(11),
        )]);
    }

    #[test]
    fn test_closures() {
        run_table(vec![(
            "let newAdder = fn(x) {
                    fn(y) { x + y };
                };
                let addTwo = newAdder(2);
                addTwo(2);",
            Object::Integer(4),
        )]);
    }

    #[test]
    fn test_parameters_shadow_outer_bindings() {
        run_table(vec![(
            "let x = 10; let f = fn(x) { x * 2 }; f(1) + x",
            Object::Integer(12),
        )]);
    }

    #[test]
    fn test_recursive_function() {
        run_table(vec![(
            "let fib = fn(n) { if (n < 2) { n } else { fib(n - 1) + fib(n - 2) } }; fib(10)",
            Object::Integer(55),
        )]);
    }

    #[test]
    fn test_call_depth_limit() {
        let program = parse("let f = fn(n) { f(n + 1) }; f(0)");
        let mut evaluator = Evaluator::with_config(Config::default().with_max_call_depth(20));

        assert_eq!(
            evaluator.eval(&program),
            Object::Error(String::from("maximum call depth of 20 exceeded"))
        );

        // The evaluator is usable again after giving up.
        assert_eq!(evaluator.eval(&parse("f")).type_name(), "FUNCTION");
    }

    #[test]
    fn test_reset_releases_recursive_functions() {
        let mut evaluator = Evaluator::new();
        evaluator.eval(&parse("let f = fn(n) { if (n < 1) { 0 } else { f(n - 1) } }; f(3)"));
        let global = Rc::downgrade(&evaluator.environment());

        evaluator.reset();
        assert!(evaluator.environment().borrow().get("f").is_none());
        drop(evaluator);

        assert!(global.upgrade().is_none());
    }

    #[test]
    fn test_session_keeps_bindings() {
        let mut evaluator = Evaluator::new();
        assert_eq!(evaluator.eval(&parse("let a = 2;")), NULL);
        assert_eq!(evaluator.eval(&parse("a * 21")), Object::Integer(42));
        assert!(evaluator.environment().borrow().get("a").is_some());
    }

    #[test]
    fn test_eval_individual_nodes() {
        let program = parse("return 7; if (true) { 3 }");

        assert_eq!(evaluate(&program.statements[0]), Object::Integer(7));

        let Statement::ExpressionStmt(expr) = &program.statements[1] else {
            panic!("expected expression statement");
        };
        assert_eq!(evaluate(expr), Object::Integer(3));

        let Expression::IfExpr(_, consequence, _) = expr else {
            panic!("expected if expression");
        };
        assert_eq!(evaluate(consequence), Object::Integer(3));
    }

    #[test]
    fn test_empty_program_is_null() {
        assert_eq!(test_eval(""), NULL);
    }

    #[test]
    fn test_boolean_results_are_canonical() {
        let mut evaluator = Evaluator::new();
        let first = evaluator.eval(&parse("true"));
        let second = evaluator.eval(&parse("1 < 2"));

        assert_eq!(first, TRUE);
        assert_eq!(first, second);
    }
}
