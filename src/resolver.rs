// ABOUTME: Static lexical-scope pass computing the hop-count table the evaluator relies on

use crate::ast::{Expr, ExprId, Stmt};
use crate::error::ErrorSink;
use crate::token::Token;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Walks the AST once, building a `ExprId -> depth` table that records how
/// many enclosing scopes a resolved variable reference must hop through at
/// runtime. Also performs the static checks that don't need a second pass:
/// `return` outside a function, `this`/`super` outside a class, and
/// duplicate local declarations.
pub struct Resolver<'a> {
    sink: &'a ErrorSink,
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Resolver<'a> {
    pub fn new(sink: &'a ErrorSink) -> Self {
        Resolver {
            sink,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_statements(statements);
        self.locals
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.sink
                    .error_at(name, "Already a variable with this name in this scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, depth);
                return;
            }
        }
        // Not found in any scope: treat as global, resolved at runtime
        // through the environment's own map.
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.sink.error_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.sink
                            .error_at(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<crate::ast::FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(Expr::Variable { name: super_name, .. }) = superclass {
            if super_name.lexeme == name.lexeme {
                self.sink.error_at(super_name, "A class can't inherit from itself.");
            }
        }

        if let Some(superclass_expr) = superclass {
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass_expr);
            self.begin_scope();
            self.scopes.last_mut().unwrap().insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().insert("this".to_string(), true);

        for method in methods {
            let function_type = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(&method.params, &method.body, function_type);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], function_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.sink
                            .error_at(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.sink.error_at(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(*id, keyword);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.sink.error_at(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.sink
                            .error_at(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword);
            }
        }
    }
}

pub fn resolve(statements: &[Stmt], sink: &ErrorSink) -> HashMap<ExprId, usize> {
    Resolver::new(sink).resolve(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scanner::scan;

    fn resolve_source(source: &str) -> (HashMap<ExprId, usize>, ErrorSink) {
        let sink = ErrorSink::new();
        let tokens = scan(source, &sink);
        let stmts = parse(&tokens, &sink);
        let locals = resolve(&stmts, &sink);
        (locals, sink)
    }

    #[test]
    fn closure_resolves_outer_local_at_one_hop() {
        let (locals, sink) = resolve_source(
            "fun makeCounter() { var a = 0; fun inner() { a = a + 1; return a; } return inner; }",
        );
        assert!(!sink.had_static_error());
        assert!(locals.values().any(|&depth| depth == 1));
    }

    #[test]
    fn return_outside_function_is_static_error() {
        let (_, sink) = resolve_source("return 1;");
        assert!(sink.had_static_error());
    }

    #[test]
    fn return_value_in_initializer_is_static_error() {
        let (_, sink) = resolve_source("class A { init() { return 1; } }");
        assert!(sink.had_static_error());
    }

    #[test]
    fn this_outside_class_is_static_error() {
        let (_, sink) = resolve_source("print this;");
        assert!(sink.had_static_error());
    }

    #[test]
    fn class_inheriting_itself_is_static_error() {
        let (_, sink) = resolve_source("class A < A {}");
        assert!(sink.had_static_error());
    }

    #[test]
    fn duplicate_local_declaration_is_static_error() {
        let (_, sink) = resolve_source("{ var a = 1; var a = 2; }");
        assert!(sink.had_static_error());
    }

    #[test]
    fn two_references_to_same_local_do_not_collapse_hop_table_entries() {
        let (locals, sink) = resolve_source("fun f() { var a = 1; print a; print a; }");
        assert!(!sink.had_static_error());
        assert_eq!(locals.len(), 2);
    }
}
