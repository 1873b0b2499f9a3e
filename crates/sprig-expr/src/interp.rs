//! Tree-walking interpreter
//!
//! Evaluates a parsed [`Program`] against a [`Scope`]. Functions created
//! by an expression capture the program and their defining scope.

use std::rc::Rc;

use sprig_reactive::{EvalContext, EvalError, Scope, Value};

use crate::ast::{
    AstNodeKind, BinaryOp, ExprId, FunctionBody, LiteralValue, LogicalOp, MemberProperty,
    Program, PropertyKey, TemplatePart, UnaryOp, UpdateOp,
};
use crate::builtins;

/// Statement outcome
enum Completion {
    Normal(Value),
    Return(Value),
}

/// Result of a member or call link in an optional chain
enum Chain {
    /// `?.` met `undefined`/`null`; the whole chain yields `undefined`
    Short,
    Done { value: Value },
}

pub(crate) struct Interpreter<'p> {
    program: &'p Rc<Program>,
    ctx: &'p EvalContext,
}

impl<'p> Interpreter<'p> {
    pub(crate) fn new(program: &'p Rc<Program>, ctx: &'p EvalContext) -> Self {
        Self { program, ctx }
    }

    /// Run the program body in a fresh local frame chained to `scope`.
    /// Yields the value of the last statement, or the `return` value.
    pub(crate) fn run(&self, scope: &Scope) -> Result<Value, EvalError> {
        let frame = Scope::locals(Vec::<(String, Value)>::new(), Some(scope));
        match self.exec_block(&self.program.body, &frame)? {
            Completion::Normal(value) | Completion::Return(value) => Ok(value),
        }
    }

    fn kind(&self, id: ExprId) -> &'p AstNodeKind {
        let program: &'p Program = self.program;
        &program.ast[id].kind
    }

    // === Statements ===

    fn exec_block(&self, body: &[ExprId], scope: &Scope) -> Result<Completion, EvalError> {
        let mut last = Value::Undefined;
        for &stmt in body {
            match self.exec(stmt, scope)? {
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal(value) => {
                    if !matches!(
                        self.kind(stmt),
                        AstNodeKind::EmptyStatement | AstNodeKind::VariableDeclaration { .. }
                    ) {
                        last = value;
                    }
                }
            }
        }
        Ok(Completion::Normal(last))
    }

    fn exec(&self, id: ExprId, scope: &Scope) -> Result<Completion, EvalError> {
        match self.kind(id) {
            AstNodeKind::ExpressionStatement { expr } => Ok(Completion::Normal(self.eval(*expr, scope)?)),
            AstNodeKind::BlockStatement { body } => self.exec_block(body, scope),
            AstNodeKind::EmptyStatement => Ok(Completion::Normal(Value::Undefined)),
            AstNodeKind::ReturnStatement { argument } => {
                let value = match argument {
                    Some(expr) => self.eval(*expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            AstNodeKind::IfStatement { test, consequent, alternate } => {
                if self.eval(*test, scope)?.is_truthy() {
                    self.exec(*consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(*alternate, scope)
                } else {
                    Ok(Completion::Normal(Value::Undefined))
                }
            }
            AstNodeKind::VariableDeclaration { declarations, .. } => {
                for declarator in declarations {
                    let value = match declarator.init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    scope.define(&declarator.name, value);
                }
                Ok(Completion::Normal(Value::Undefined))
            }
            _ => Ok(Completion::Normal(self.eval(id, scope)?)),
        }
    }

    // === Expressions ===

    fn eval(&self, id: ExprId, scope: &Scope) -> Result<Value, EvalError> {
        match self.kind(id) {
            AstNodeKind::Identifier { name } => self.lookup(name, scope),
            AstNodeKind::Literal { value } => Ok(match value {
                LiteralValue::Undefined => Value::Undefined,
                LiteralValue::Null => Value::Null,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::string(s),
            }),
            AstNodeKind::TemplateLiteral { parts } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&self.eval(*expr, scope)?.display_string()),
                    }
                }
                Ok(Value::from(out))
            }
            AstNodeKind::ArrayExpression { elements } => {
                let items = elements
                    .iter()
                    .map(|e| self.eval(*e, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(items))
            }
            AstNodeKind::ObjectExpression { properties } => {
                let mut entries = Vec::with_capacity(properties.len());
                for property in properties {
                    let key = match &property.key {
                        PropertyKey::Named(name) => name.to_string(),
                        PropertyKey::Computed(expr) => self.eval(*expr, scope)?.display_string(),
                    };
                    entries.push((key, self.eval(property.value, scope)?));
                }
                Ok(Value::record(entries))
            }
            AstNodeKind::FunctionExpression { name, params, body, is_arrow } => {
                Ok(self.make_function(name.as_deref(), params, body, *is_arrow, scope))
            }
            AstNodeKind::UnaryExpression { operator, argument } => {
                if *operator == UnaryOp::Typeof {
                    // `typeof missing` is "undefined", not a reference error
                    if let AstNodeKind::Identifier { name } = self.kind(*argument) {
                        let value = self.lookup(name, scope).unwrap_or_default();
                        return Ok(Value::string(value.type_of()));
                    }
                }
                let value = self.eval(*argument, scope)?;
                Ok(match operator {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Typeof => Value::string(value.type_of()),
                })
            }
            AstNodeKind::UpdateExpression { operator, argument, prefix } => {
                let old = self.eval(*argument, scope)?.to_number();
                let new = match operator {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.assign(*argument, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            AstNodeKind::BinaryExpression { operator, left, right } => {
                let left = self.eval(*left, scope)?;
                let right = self.eval(*right, scope)?;
                Ok(binary(*operator, &left, &right))
            }
            AstNodeKind::LogicalExpression { operator, left, right } => {
                let left = self.eval(*left, scope)?;
                let short_circuit = match operator {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::NullishCoalescing => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(*right, scope)
                }
            }
            AstNodeKind::AssignmentExpression { operator, target, value } => {
                let value = match operator.binary() {
                    None => self.eval(*value, scope)?,
                    Some(op) => {
                        let current = self.eval(*target, scope)?;
                        binary(op, &current, &self.eval(*value, scope)?)
                    }
                };
                self.assign(*target, value.clone(), scope)?;
                Ok(value)
            }
            AstNodeKind::ConditionalExpression { test, consequent, alternate } => {
                if self.eval(*test, scope)?.is_truthy() {
                    self.eval(*consequent, scope)
                } else {
                    self.eval(*alternate, scope)
                }
            }
            AstNodeKind::MemberExpression { .. } | AstNodeKind::CallExpression { .. } => {
                match self.chain(id, scope)? {
                    Chain::Short => Ok(Value::Undefined),
                    Chain::Done { value } => Ok(value),
                }
            }
            AstNodeKind::ThisExpression => Ok(scope
                .lookup("this")
                .or_else(|| scope.nearest_state().map(Value::Observable))
                .unwrap_or_default()),
            _ => Err(EvalError::Syntax("statement used as an expression".into())),
        }
    }

    /// Resolve an identifier: scope chain, then the context handles, then
    /// the built-in globals.
    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value, EvalError> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value);
        }
        match name {
            "$event" => Ok(self.ctx.event.clone().unwrap_or_default()),
            "$el" => Ok(self.ctx.element.clone().unwrap_or_default()),
            _ => builtins::global(name).ok_or_else(|| EvalError::Reference(name.to_string())),
        }
    }

    fn assign(&self, target: ExprId, value: Value, scope: &Scope) -> Result<(), EvalError> {
        match self.kind(target) {
            AstNodeKind::Identifier { name } => {
                scope.assign(name, value);
                Ok(())
            }
            AstNodeKind::MemberExpression { object, property, .. } => {
                let object = self.eval(*object, scope)?;
                let key = self.property_key(property, scope)?;
                object.set_property(&key, value)
            }
            _ => Err(EvalError::Syntax("invalid assignment target".into())),
        }
    }

    fn property_key(&self, property: &MemberProperty, scope: &Scope) -> Result<String, EvalError> {
        Ok(match property {
            MemberProperty::Named(name) => name.to_string(),
            MemberProperty::Computed(expr) => self.eval(*expr, scope)?.display_string(),
        })
    }

    /// Evaluate the object of a chain link; `None` when an inner `?.`
    /// short-circuited.
    fn chain_base(&self, id: ExprId, scope: &Scope) -> Result<Option<Value>, EvalError> {
        match self.kind(id) {
            AstNodeKind::MemberExpression { .. } | AstNodeKind::CallExpression { .. } => {
                Ok(match self.chain(id, scope)? {
                    Chain::Short => None,
                    Chain::Done { value } => Some(value),
                })
            }
            _ => self.eval(id, scope).map(Some),
        }
    }

    fn chain(&self, id: ExprId, scope: &Scope) -> Result<Chain, EvalError> {
        match self.kind(id) {
            AstNodeKind::MemberExpression { object, property, optional } => {
                let Some(base) = self.chain_base(*object, scope)? else {
                    return Ok(Chain::Short);
                };
                if *optional && base.is_nullish() {
                    return Ok(Chain::Short);
                }
                let key = self.property_key(property, scope)?;
                Ok(Chain::Done { value: base.get_property(&key)? })
            }
            AstNodeKind::CallExpression { callee, arguments, optional } => {
                let (this, function, label) = match self.kind(*callee) {
                    AstNodeKind::MemberExpression { object, property, optional: member_optional } => {
                        let Some(base) = self.chain_base(*object, scope)? else {
                            return Ok(Chain::Short);
                        };
                        if *member_optional && base.is_nullish() {
                            return Ok(Chain::Short);
                        }
                        let key = self.property_key(property, scope)?;
                        if let Some(method) = builtins::method(&base, &key) {
                            let args = self.eval_args(arguments, scope)?;
                            return Ok(Chain::Done { value: method(&base, &args)? });
                        }
                        let function = base.get_property(&key)?;
                        (base, function, key)
                    }
                    AstNodeKind::Identifier { name } => {
                        let function = self.lookup(name, scope)?;
                        // Bare calls see the state that defines them as `this`
                        let this = scope.defining_state(name).map(Value::Observable).unwrap_or_default();
                        (this, function, name.to_string())
                    }
                    _ => {
                        let Some(function) = self.chain_base(*callee, scope)? else {
                            return Ok(Chain::Short);
                        };
                        (Value::Undefined, function, "expression".to_string())
                    }
                };
                if *optional && function.is_nullish() {
                    return Ok(Chain::Short);
                }
                let Value::Function(function) = function else {
                    return Err(EvalError::Type(format!("{label} is not a function")));
                };
                let args = self.eval_args(arguments, scope)?;
                Ok(Chain::Done { value: function.call(&this, &args)? })
            }
            _ => Ok(Chain::Done { value: self.eval(id, scope)? }),
        }
    }

    fn eval_args(&self, arguments: &[ExprId], scope: &Scope) -> Result<Vec<Value>, EvalError> {
        arguments.iter().map(|a| self.eval(*a, scope)).collect()
    }

    fn make_function(
        &self,
        name: Option<&str>,
        params: &[Box<str>],
        body: &FunctionBody,
        is_arrow: bool,
        scope: &Scope,
    ) -> Value {
        let program = Rc::clone(self.program);
        let ctx = self.ctx.clone();
        let closure = scope.clone();
        let params = params.to_vec();
        let body = body.clone();

        Value::function(name.unwrap_or("anonymous"), move |this, args| {
            let mut bindings: Vec<(String, Value)> = params
                .iter()
                .enumerate()
                .map(|(i, p)| (p.to_string(), args.get(i).cloned().unwrap_or_default()))
                .collect();
            if !is_arrow {
                bindings.push(("this".to_string(), this.clone()));
            }
            let frame = Scope::locals(bindings, Some(&closure));
            let interp = Interpreter::new(&program, &ctx);
            match &body {
                FunctionBody::Expression(expr) => interp.eval(*expr, &frame),
                FunctionBody::Block(stmts) => match interp.exec_block(stmts, &frame)? {
                    Completion::Return(value) => Ok(value),
                    Completion::Normal(_) => Ok(Value::Undefined),
                },
            }
        })
    }
}

/// Objects concatenate as strings under `+`
fn is_string_like(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Record(_) | Value::List(_) | Value::Observable(_) | Value::Function(_) | Value::Handle(_)
    )
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if is_string_like(left) || is_string_like(right) {
                Value::from(left.display_string() + &right.display_string())
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::LessThan => compare(left, right, |o| o.is_lt()),
        BinaryOp::LessThanEq => compare(left, right, |o| o.is_le()),
        BinaryOp::GreaterThan => compare(left, right, |o| o.is_gt()),
        BinaryOp::GreaterThanEq => compare(left, right, |o| o.is_ge()),
        BinaryOp::Equal => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEqual => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEqual => Value::Bool(left.same(right)),
        BinaryOp::StrictNotEqual => Value::Bool(!left.same(right)),
    }
}

/// Relational comparison: strings compare lexically, everything else
/// numerically (NaN compares false).
fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.is_some_and(test))
}
