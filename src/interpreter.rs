// ABOUTME: Tree-walking evaluator executing the resolved statement/expression trees

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::value::{LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Non-local control-flow signal produced by a `return` statement. Kept
/// separate from `RuntimeError` since a `return` is normal control flow, not
/// a failure, and must unwind only as far as the nearest function call.
enum Flow {
    Return(Value),
}

type EvalResult = Result<Value, RuntimeError>;

/// Wraps `RuntimeError` so statement execution can propagate either an
/// error or a `return` signal through the same `?`-friendly type.
enum Signal {
    Error(RuntimeError),
    Flow(Flow),
}

impl From<RuntimeError> for Signal {
    fn from(err: RuntimeError) -> Self {
        Signal::Error(err)
    }
}

impl From<Flow> for Signal {
    fn from(flow: Flow) -> Self {
        Signal::Flow(flow)
    }
}

type StmtResult = Result<(), Signal>;

pub struct Interpreter {
    globals: Rc<Environment>,
    environment: RefCell<Rc<Environment>>,
    locals: HashMap<ExprId, usize>,
}

impl Interpreter {
    pub fn new(locals: HashMap<ExprId, usize>) -> Self {
        Self::with_globals(Self::new_globals(), locals)
    }

    /// Build an interpreter sharing an already-initialized global
    /// environment. Used by the REPL, where each line is scanned, parsed and
    /// resolved independently but variable state must persist across lines.
    pub fn with_globals(globals: Rc<Environment>, locals: HashMap<ExprId, usize>) -> Self {
        Interpreter {
            environment: RefCell::new(Rc::clone(&globals)),
            globals,
            locals,
        }
    }

    pub fn new_globals() -> Rc<Environment> {
        let globals = Environment::new();
        globals.define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args| {
                    let now = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .expect("system clock before the Unix epoch");
                    Ok(Value::Number(now.as_secs_f64()))
                },
            })),
        );
        globals
    }

    pub fn globals(&self) -> Rc<Environment> {
        Rc::clone(&self.globals)
    }

    pub fn interpret(&self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(Signal::Error(err)) => return Err(err),
                Err(Signal::Flow(Flow::Return(_))) => {
                    unreachable!("resolver rejects 'return' outside a function")
                }
            }
        }
        Ok(())
    }

    fn execute(&self, stmt: &Stmt) -> StmtResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                println!("{value}");
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow().define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::Block(statements) => {
                let enclosing = Rc::clone(&self.environment.borrow());
                let block_env = Environment::with_enclosing(&enclosing);
                self.execute_block(statements, block_env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Function(decl) => {
                let function = Value::Function(Rc::new(LoxFunction {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(&self.environment.borrow()),
                    is_initializer: false,
                }));
                self.environment.borrow().define(decl.name.lexeme.clone(), function);
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Flow::Return(value).into())
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    fn execute_class(
        &self,
        name: &crate::token::Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> StmtResult {
        let superclass_value = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Class(class) => Some(class),
                    _ => return Err(RuntimeError::at(superclass_name_token(expr), "Superclass must be a class.").into()),
                }
            }
            None => None,
        };

        self.environment.borrow().define(name.lexeme.clone(), Value::Nil);

        let method_env = match &superclass_value {
            Some(superclass) => {
                let env = Environment::with_enclosing(&self.environment.borrow());
                env.define("super", Value::Class(Rc::clone(superclass)));
                env
            }
            None => Rc::clone(&self.environment.borrow()),
        };

        let mut method_map = HashMap::new();
        for method in methods {
            let function = Rc::new(LoxFunction {
                declaration: Rc::clone(method),
                closure: Rc::clone(&method_env),
                is_initializer: method.name.lexeme == "init",
            });
            method_map.insert(method.name.lexeme.clone(), function);
        }

        let class = Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_map,
        });

        self.environment.borrow().define(name.lexeme.clone(), Value::Class(class));

        Ok(())
    }

    fn execute_block(&self, statements: &[Stmt], block_env: Rc<Environment>) -> StmtResult {
        let previous = self.environment.replace(block_env);
        let result = (|| {
            for stmt in statements {
                self.execute(stmt)?;
            }
            Ok(())
        })();
        self.environment.replace(previous);
        result
    }

    fn evaluate(&self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(value) => Ok(literal_value(value)),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Variable { id, name } => self.lookup_variable(*id, name),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&depth) => self.environment.borrow().assign_at(depth, &name.lexeme, value.clone()),
                    None => self.globals.assign_global(&name.lexeme, value.clone(), name.line)?,
                }
                Ok(value)
            }
            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),
            Expr::Binary { left, operator, right } => self.evaluate_binary(left, operator, right),
            Expr::Logical { left, operator, right } => self.evaluate_logical(left, operator, right),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),
            Expr::Get { object, name } => self.evaluate_get(object, name),
            Expr::Set { object, name, value } => self.evaluate_set(object, name, value),
            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),
            Expr::Super { id, keyword, method } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &crate::token::Token) -> EvalResult {
        match self.locals.get(&id) {
            Some(&depth) => Ok(self.environment.borrow().get_at(depth, &name.lexeme)),
            None => self.globals.get_global(&name.lexeme, name.line),
        }
    }

    fn evaluate_unary(&self, operator: &crate::token::Token, right: &Expr) -> EvalResult {
        let right = self.evaluate(right)?;
        match operator.kind {
            crate::token::TokenKind::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::at(operator, "Operand must be a number.")),
            },
            crate::token::TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
            _ => unreachable!("parser only produces '-' and '!' as unary operators"),
        }
    }

    fn evaluate_binary(&self, left: &Expr, operator: &crate::token::Token, right: &Expr) -> EvalResult {
        use crate::token::TokenKind::*;

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.kind {
            Minus | Slash | Star | Greater | GreaterEqual | Less | LessEqual => {
                let (l, r) = match (&left, &right) {
                    (Value::Number(l), Value::Number(r)) => (*l, *r),
                    _ => return Err(RuntimeError::at(operator, "Operands must be numbers.")),
                };
                Ok(match operator.kind {
                    Minus => Value::Number(l - r),
                    Slash => Value::Number(l / r),
                    Star => Value::Number(l * r),
                    Greater => Value::Bool(l > r),
                    GreaterEqual => Value::Bool(l >= r),
                    Less => Value::Bool(l < r),
                    LessEqual => Value::Bool(l <= r),
                    _ => unreachable!(),
                })
            }
            Plus => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::String(l), Value::String(r)) => Ok(Value::String(Rc::from(format!("{l}{r}")))),
                _ => Err(RuntimeError::at(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },
            BangEqual => Ok(Value::Bool(!left.is_equal(&right))),
            EqualEqual => Ok(Value::Bool(left.is_equal(&right))),
            _ => unreachable!("parser only produces arithmetic/comparison/equality operators here"),
        }
    }

    fn evaluate_logical(&self, left: &Expr, operator: &crate::token::Token, right: &Expr) -> EvalResult {
        let left = self.evaluate(left)?;
        let is_or = operator.kind == crate::token::TokenKind::Or;

        if is_or && left.is_truthy() {
            return Ok(left);
        }
        if !is_or && !left.is_truthy() {
            return Ok(left);
        }
        self.evaluate(right)
    }

    fn evaluate_call(&self, callee: &Expr, paren: &crate::token::Token, arguments: &[Expr]) -> EvalResult {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            args.push(self.evaluate(arg)?);
        }

        match callee {
            Value::Function(function) => self.call_function(&function, args, paren),
            Value::NativeFunction(native) => {
                if args.len() != native.arity {
                    return Err(RuntimeError::at(
                        paren,
                        format!("Expected {} arguments but got {}.", native.arity, args.len()),
                    ));
                }
                (native.func)(&args)
            }
            Value::Class(class) => self.instantiate(&class, args, paren),
            _ => Err(RuntimeError::at(paren, "Can only call functions and classes.")),
        }
    }

    fn call_function(&self, function: &Rc<LoxFunction>, args: Vec<Value>, paren: &crate::token::Token) -> EvalResult {
        if args.len() != function.arity() {
            return Err(RuntimeError::at(
                paren,
                format!("Expected {} arguments but got {}.", function.arity(), args.len()),
            ));
        }

        let call_env = Environment::with_enclosing(&function.closure);
        for (param, arg) in function.declaration.params.iter().zip(args) {
            call_env.define(param.lexeme.clone(), arg);
        }

        match self.execute_block(&function.declaration.body, call_env) {
            Ok(()) => {
                if function.is_initializer {
                    Ok(function.closure.get_at(0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }
            Err(Signal::Flow(Flow::Return(value))) => {
                if function.is_initializer {
                    Ok(function.closure.get_at(0, "this"))
                } else {
                    Ok(value)
                }
            }
            Err(Signal::Error(err)) => Err(err),
        }
    }

    fn instantiate(&self, class: &Rc<LoxClass>, args: Vec<Value>, paren: &crate::token::Token) -> EvalResult {
        let arity = class.arity();
        if args.len() != arity {
            return Err(RuntimeError::at(
                paren,
                format!("Expected {arity} arguments but got {}.", args.len()),
            ));
        }

        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));
        if let Some(init) = class.find_method("init") {
            let bound = init.bind(&instance);
            self.call_function(&bound, args, paren)?;
        }

        Ok(Value::Instance(instance))
    }

    fn evaluate_get(&self, object: &Expr, name: &crate::token::Token) -> EvalResult {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.borrow().fields.get(&name.lexeme).cloned() {
                    return Ok(value);
                }
                let class = Rc::clone(&instance.borrow().class);
                if let Some(method) = class.find_method(&name.lexeme) {
                    return Ok(Value::Function(method.bind(&instance)));
                }
                Err(RuntimeError::at(name, format!("Undefined property '{}'.", name.lexeme)))
            }
            _ => Err(RuntimeError::at(name, "Only instances have properties.")),
        }
    }

    fn evaluate_set(&self, object: &Expr, name: &crate::token::Token, value: &Expr) -> EvalResult {
        let object = self.evaluate(object)?;
        let instance = match object {
            Value::Instance(instance) => instance,
            _ => return Err(RuntimeError::at(name, "Only instances have fields.")),
        };
        let value = self.evaluate(value)?;
        instance.borrow_mut().fields.insert(name.lexeme.clone(), value.clone());
        Ok(value)
    }

    fn evaluate_super(&self, id: ExprId, keyword: &crate::token::Token, method: &crate::token::Token) -> EvalResult {
        let depth = *self
            .locals
            .get(&id)
            .expect("resolver always resolves 'super' to a local depth");
        let superclass = match self.environment.borrow().get_at(depth, "super") {
            Value::Class(class) => class,
            _ => unreachable!("'super' always resolves to a class value"),
        };
        // `this` is defined one scope closer than `super`.
        let instance = match self.environment.borrow().get_at(depth - 1, "this") {
            Value::Instance(instance) => instance,
            _ => unreachable!("'this' always resolves to an instance value"),
        };

        superclass
            .find_method(&method.lexeme)
            .map(|m| Value::Function(m.bind(&instance)))
            .ok_or_else(|| RuntimeError::at(method, format!("Undefined property '{}'.", method.lexeme)))
    }
}

fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::String(Rc::clone(s)),
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Nil => Value::Nil,
    }
}

fn superclass_name_token(expr: &Expr) -> &crate::token::Token {
    match expr {
        Expr::Variable { name, .. } => name,
        _ => unreachable!("parser only builds superclass expressions as Variable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::scanner::scan;
    use crate::error::ErrorSink;

    fn run(source: &str) -> Result<(), RuntimeError> {
        let sink = ErrorSink::new();
        let tokens = scan(source, &sink);
        let stmts = parse(&tokens, &sink);
        let locals = resolve(&stmts, &sink);
        assert!(!sink.had_static_error(), "unexpected static errors");
        Interpreter::new(locals).interpret(&stmts)
    }

    #[test]
    fn arithmetic_and_print_do_not_error() {
        assert!(run("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn closures_capture_outer_locals() {
        let source = r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn single_inheritance_method_dispatch() {
        let source = r#"
            class Animal {
                speak() { return "..."; }
            }
            class Dog < Animal {
                speak() { return "Woof"; }
            }
            var d = Dog();
            print d.speak();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn bare_return_in_initializer_yields_instance() {
        let source = r#"
            class Box {
                init(value) {
                    this.value = value;
                    return;
                }
            }
            var b = Box(5);
            print b.value;
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn adding_string_and_number_is_a_runtime_error() {
        let err = run("print \"a\" + 1;").unwrap_err();
        assert_eq!(err.message, "Operands must be two numbers or two strings.");
    }

    #[test]
    fn assigning_to_undeclared_global_is_runtime_error() {
        assert!(run("x = 1;").is_err());
    }
}
