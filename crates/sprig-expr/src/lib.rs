//! Sprig Expr - reference expression evaluator
//!
//! A small JavaScript-flavoured language for directive values:
//!
//! - [`lexer`]: source → tokens (template literals included)
//! - [`parser`]: tokens → arena [`ast::Program`]
//! - interpreter and built-ins: programs → [`Value`]s against a [`Scope`]
//! - free-identifier analysis for dependency registration
//!
//! [`ScriptEvaluator`] implements [`sprig_reactive::Evaluator`] and caches
//! parsed programs per source text.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

mod analysis;
mod builtins;
mod interp;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sprig_reactive::{EvalContext, EvalError, Evaluator, Scope, Value};

use ast::Program;
use interp::Interpreter;
pub use parser::{ParseError, Parser};

/// How a source text is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Mode {
    /// Exactly one expression
    Expression,
    /// Statement list
    Statements,
}

type ParseResult = Result<Rc<Program>, ParseError>;

/// Evaluator backed by the built-in interpreter
#[derive(Default)]
pub struct ScriptEvaluator {
    cache: RefCell<HashMap<(Mode, String), ParseResult>>,
}

impl ScriptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached parse results
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    fn parse(&self, source: &str, mode: Mode) -> ParseResult {
        let key = (mode, source.to_string());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let parser = Parser::new(source);
        let result = match mode {
            Mode::Expression => parser.parse_single(),
            Mode::Statements => parser.parse_program(),
        }
        .map(Rc::new);
        if let Err(err) = &result {
            tracing::debug!(source, error = %err, "parse failed");
        }
        self.cache.borrow_mut().insert(key, result.clone());
        result
    }

    fn run(&self, source: &str, mode: Mode, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
        let program = self
            .parse(source, mode)
            .map_err(|e| EvalError::Syntax(e.to_string()))?;
        Interpreter::new(&program, ctx).run(scope)
    }
}

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, expr: &str, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
        self.run(expr, Mode::Expression, scope, ctx)
    }

    fn execute(&self, statements: &str, scope: &Scope, ctx: &EvalContext) -> Result<Value, EvalError> {
        self.run(statements, Mode::Statements, scope, ctx)
    }

    fn free_identifiers(&self, expr: &str) -> Vec<String> {
        // A leading `{` reads as an object literal in expression mode and
        // as a block in statement mode; try the expression reading first.
        self.parse(expr, Mode::Expression)
            .or_else(|_| self.parse(expr, Mode::Statements))
            .map(|program| analysis::free_identifiers(&program))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_reactive::Observable;

    fn state(json: serde_json::Value) -> (Observable, Scope) {
        let obs = Observable::new(Value::from_json(&json)).unwrap();
        let scope = Scope::with_state(obs.clone(), None);
        (obs, scope)
    }

    fn eval(source: &str, scope: &Scope) -> Value {
        ScriptEvaluator::new()
            .evaluate(source, scope, &EvalContext::default())
            .unwrap()
    }

    #[test]
    fn test_arithmetic_and_strings() {
        let scope = Scope::root();
        assert_eq!(eval("1 + 2 * 3", &scope).to_number(), 7.0);
        assert_eq!(eval("'a' + 1", &scope).as_str(), Some("a1"));
        assert_eq!(eval("`n=${1 + 1}`", &scope).as_str(), Some("n=2"));
        assert_eq!(eval("7 % 4 === 3 ? 'yes' : 'no'", &scope).as_str(), Some("yes"));
        assert!(eval("'b' > 'a' && 2 >= 2", &scope).is_truthy());
        assert!(eval("null == undefined && null !== undefined", &scope).is_truthy());
        assert_eq!(eval("typeof missing", &scope).as_str(), Some("undefined"));
    }

    #[test]
    fn test_scope_reads_and_writes() {
        let (obs, scope) = state(serde_json::json!({"count": 1, "user": {"name": "ana"}}));
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();

        assert_eq!(evaluator.evaluate("user.name.toUpperCase()", &scope, &ctx).unwrap().as_str(), Some("ANA"));
        evaluator.execute("count++; count += 10; user.name = 'ivo'", &scope, &ctx).unwrap();
        assert_eq!(obs.get("count").to_number(), 12.0);
        assert_eq!(obs.get("user").get_property("name").unwrap().as_str(), Some("ivo"));
    }

    #[test]
    fn test_absence_and_reference_errors() {
        let (_, scope) = state(serde_json::json!({"user": null}));
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();

        let err = evaluator.evaluate("user.name", &scope, &ctx).unwrap_err();
        assert!(err.is_absence());
        assert!(evaluator.evaluate("user?.name.first", &scope, &ctx).unwrap().is_undefined());
        assert!(matches!(evaluator.evaluate("nope()", &scope, &ctx), Err(EvalError::Reference(_))));
        assert!(matches!(evaluator.evaluate("user(", &scope, &ctx), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_methods_see_their_state_as_this() {
        let (obs, scope) = state(serde_json::json!({"open": false}));
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();
        let toggle = evaluator
            .evaluate("function () { this.open = !this.open }", &scope, &ctx)
            .unwrap();
        obs.set("toggle", toggle);

        evaluator.execute("toggle()", &scope, &ctx).unwrap();
        assert!(obs.get("open").same(&Value::Bool(true)));
    }

    #[test]
    fn test_execute_returns_last_value() {
        let scope = Scope::root();
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();
        let value = evaluator.execute("let a = 2; let b = 3; a * b", &scope, &ctx).unwrap();
        assert_eq!(value.to_number(), 6.0);
        let value = evaluator.execute("if (true) { return 'early' } 'late'", &scope, &ctx).unwrap();
        assert_eq!(value.as_str(), Some("early"));
        // `let` bindings stay in the per-run frame
        assert!(!scope.has("a"));
    }

    #[test]
    fn test_list_mutation_through_observable() {
        let (obs, scope) = state(serde_json::json!({"items": [3, 1, 2]}));
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();
        evaluator
            .execute("items.push(4); items.sort((a, b) => b - a)", &scope, &ctx)
            .unwrap();
        assert_eq!(obs.get("items").display_string(), "4,3,2,1");
        let doubled = evaluator.evaluate("items.map(x => x * 2).join('-')", &scope, &ctx).unwrap();
        assert_eq!(doubled.as_str(), Some("8-6-4-2"));
    }

    #[test]
    fn test_context_handles() {
        let scope = Scope::root();
        let ctx = EvalContext::for_element(Value::string("el")).with_event(Value::record([(
            "key".to_string(),
            Value::string("Enter"),
        )]));
        let evaluator = ScriptEvaluator::new();
        assert_eq!(evaluator.evaluate("$event.key", &scope, &ctx).unwrap().as_str(), Some("Enter"));
        assert_eq!(evaluator.evaluate("$el", &scope, &ctx).unwrap().as_str(), Some("el"));
    }

    #[test]
    fn test_parse_cache() {
        let scope = Scope::root();
        let evaluator = ScriptEvaluator::new();
        let ctx = EvalContext::default();
        for _ in 0..3 {
            evaluator.evaluate("1 + 1", &scope, &ctx).unwrap();
        }
        assert_eq!(evaluator.cached(), 1);
        assert_eq!(evaluator.free_identifiers("{ open: isOpen }"), vec!["isOpen"]);
    }
}
