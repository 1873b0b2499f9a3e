//! Free-identifier analysis
//!
//! Collects the root names an expression reads from its environment, in
//! first-occurrence order. Function parameters and `let`/`const`/`var`
//! declarations are local; non-computed member names and object keys are
//! not identifiers at all.

use crate::ast::{Ast, AstNodeKind, ExprId, FunctionBody, MemberProperty, Program, PropertyKey, TemplatePart};

/// Free identifiers of `program`
pub(crate) fn free_identifiers(program: &Program) -> Vec<String> {
    let mut collector = Collector {
        ast: &program.ast,
        bound: vec![declared(&program.ast, &program.body)],
        found: Vec::new(),
    };
    for &stmt in &program.body {
        collector.visit(stmt);
    }
    collector.found
}

/// Names declared directly in `body` (nested blocks included, functions not)
fn declared(ast: &Ast, body: &[ExprId]) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending: Vec<ExprId> = body.to_vec();
    while let Some(id) = pending.pop() {
        match &ast[id].kind {
            AstNodeKind::VariableDeclaration { declarations, .. } => {
                names.extend(declarations.iter().map(|d| d.name.to_string()));
            }
            AstNodeKind::BlockStatement { body } => pending.extend(body),
            AstNodeKind::IfStatement { consequent, alternate, .. } => {
                pending.push(*consequent);
                pending.extend(alternate);
            }
            _ => {}
        }
    }
    names
}

struct Collector<'a> {
    ast: &'a Ast,
    /// One frame of local names per enclosing function (plus the program)
    bound: Vec<Vec<String>>,
    found: Vec<String>,
}

impl Collector<'_> {
    fn is_bound(&self, name: &str) -> bool {
        self.bound.iter().any(|frame| frame.iter().any(|n| n == name))
    }

    fn visit_all(&mut self, ids: &[ExprId]) {
        for &id in ids {
            self.visit(id);
        }
    }

    fn visit(&mut self, id: ExprId) {
        let ast = self.ast;
        match &ast[id].kind {
            AstNodeKind::Identifier { name } => {
                if !self.is_bound(name) && !self.found.iter().any(|n| **n == **name) {
                    self.found.push(name.to_string());
                }
            }
            AstNodeKind::Literal { .. } | AstNodeKind::ThisExpression | AstNodeKind::EmptyStatement => {}
            AstNodeKind::ExpressionStatement { expr } => self.visit(*expr),
            AstNodeKind::BlockStatement { body } => self.visit_all(body),
            AstNodeKind::ReturnStatement { argument } => {
                if let Some(argument) = argument {
                    self.visit(*argument);
                }
            }
            AstNodeKind::IfStatement { test, consequent, alternate } => {
                self.visit(*test);
                self.visit(*consequent);
                if let Some(alternate) = alternate {
                    self.visit(*alternate);
                }
            }
            AstNodeKind::VariableDeclaration { declarations, .. } => {
                for declarator in declarations {
                    if let Some(init) = declarator.init {
                        self.visit(init);
                    }
                }
            }
            AstNodeKind::TemplateLiteral { parts } => {
                for part in parts {
                    if let TemplatePart::Expr(expr) = part {
                        self.visit(*expr);
                    }
                }
            }
            AstNodeKind::ArrayExpression { elements } => self.visit_all(elements),
            AstNodeKind::ObjectExpression { properties } => {
                for property in properties {
                    if let PropertyKey::Computed(key) = &property.key {
                        self.visit(*key);
                    }
                    self.visit(property.value);
                }
            }
            AstNodeKind::FunctionExpression { params, body, .. } => {
                let mut frame: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                match body {
                    FunctionBody::Expression(expr) => {
                        self.bound.push(frame);
                        self.visit(*expr);
                    }
                    FunctionBody::Block(stmts) => {
                        frame.extend(declared(ast, stmts));
                        self.bound.push(frame);
                        self.visit_all(stmts);
                    }
                }
                self.bound.pop();
            }
            AstNodeKind::UnaryExpression { argument, .. } | AstNodeKind::UpdateExpression { argument, .. } => {
                self.visit(*argument);
            }
            AstNodeKind::BinaryExpression { left, right, .. } | AstNodeKind::LogicalExpression { left, right, .. } => {
                self.visit(*left);
                self.visit(*right);
            }
            AstNodeKind::AssignmentExpression { target, value, .. } => {
                self.visit(*target);
                self.visit(*value);
            }
            AstNodeKind::ConditionalExpression { test, consequent, alternate } => {
                self.visit(*test);
                self.visit(*consequent);
                self.visit(*alternate);
            }
            AstNodeKind::CallExpression { callee, arguments, .. } => {
                self.visit(*callee);
                self.visit_all(arguments);
            }
            AstNodeKind::MemberExpression { object, property, .. } => {
                self.visit(*object);
                if let MemberProperty::Computed(key) = property {
                    self.visit(*key);
                }
            }
        }
    }
}
