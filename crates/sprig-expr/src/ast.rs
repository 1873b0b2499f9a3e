//! Abstract Syntax Tree
//!
//! Arena of expression and statement nodes. Nodes refer to each other by
//! [`ExprId`]; a parsed [`Program`] owns its arena.

use std::ops::Index;

use crate::token::Span;

/// AST Node ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// Abstract Syntax Tree container
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: AstNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: ExprId) -> Option<&AstNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn span(&self, id: ExprId) -> Span {
        self.get(id).map(|n| n.span).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Index<ExprId> for Ast {
    type Output = AstNode;

    fn index(&self, id: ExprId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }
}

/// A parsed statement list (or a single expression statement)
#[derive(Debug)]
pub struct Program {
    pub ast: Ast,
    pub body: Vec<ExprId>,
}

/// AST Node
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: AstNodeKind,
    pub span: Span,
}

impl AstNode {
    pub fn new(kind: AstNodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// AST Node kinds
#[derive(Debug, Clone)]
pub enum AstNodeKind {
    // Statements
    ExpressionStatement { expr: ExprId },
    BlockStatement { body: Vec<ExprId> },
    EmptyStatement,
    ReturnStatement { argument: Option<ExprId> },
    IfStatement { test: ExprId, consequent: ExprId, alternate: Option<ExprId> },
    VariableDeclaration { kind: VarKind, declarations: Vec<Declarator> },

    // Expressions
    Identifier { name: Box<str> },
    Literal { value: LiteralValue },
    TemplateLiteral { parts: Vec<TemplatePart> },
    ArrayExpression { elements: Vec<ExprId> },
    ObjectExpression { properties: Vec<Property> },
    FunctionExpression { name: Option<Box<str>>, params: Vec<Box<str>>, body: FunctionBody, is_arrow: bool },
    UnaryExpression { operator: UnaryOp, argument: ExprId },
    UpdateExpression { operator: UpdateOp, argument: ExprId, prefix: bool },
    BinaryExpression { operator: BinaryOp, left: ExprId, right: ExprId },
    LogicalExpression { operator: LogicalOp, left: ExprId, right: ExprId },
    AssignmentExpression { operator: AssignOp, target: ExprId, value: ExprId },
    ConditionalExpression { test: ExprId, consequent: ExprId, alternate: ExprId },
    CallExpression { callee: ExprId, arguments: Vec<ExprId>, optional: bool },
    MemberExpression { object: ExprId, property: MemberProperty, optional: bool },
    ThisExpression,
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub name: Box<str>,
    pub init: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(Box<str>),
    Expr(ExprId),
}

/// Object literal entry. Shorthand entries hold an `Identifier` value.
#[derive(Debug, Clone)]
pub struct Property {
    pub key: PropertyKey,
    pub value: ExprId,
    pub shorthand: bool,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Named(Box<str>),
    Computed(ExprId),
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Named(Box<str>),
    Computed(ExprId),
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Expression(ExprId),
    Block(Vec<ExprId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind { Var, Let, Const }

#[derive(Debug, Clone)]
pub enum LiteralValue { Undefined, Null, Bool(bool), Number(f64), String(Box<str>) }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp { Minus, Plus, Not, Typeof }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp { Increment, Decrement }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add, Sub, Mul, Div, Mod, LessThan, LessThanEq, GreaterThan, GreaterThanEq,
    Equal, NotEqual, StrictEqual, StrictNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp { And, Or, NullishCoalescing }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp { Assign, AddAssign, SubAssign, MulAssign, DivAssign, ModAssign }

impl AssignOp {
    /// The arithmetic applied by a compound assignment
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
        }
    }
}
