//! Top-level declarations and the expression/statement surface

use kes_intern::Symbol;
use kes_span::Span;

/// Binary operators
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
}

/// An expression
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A name reference
    Name {
        /// Referenced name
        name: Symbol,
        /// Source location
        span: Span,
    },
    /// An integer literal
    Int {
        /// Literal value
        value: i64,
        /// Source location
        span: Span,
    },
    /// A string literal
    Str {
        /// Literal value without quotes
        value: String,
        /// Source location
        span: Span,
    },
    /// A call expression
    Call {
        /// Callee expression
        callee: Box<Expr>,
        /// Argument expressions
        args: Vec<Expr>,
        /// Source location
        span: Span,
    },
    /// A binary operation
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
        /// Source location
        span: Span,
    },
    /// Placeholder produced during error recovery
    Error {
        /// Source location of the unparsable input
        span: Span,
    },
}

impl Expr {
    /// Source location of the expression
    pub fn span(&self) -> Span {
        match self {
            Self::Name { span, .. }
            | Self::Int { span, .. }
            | Self::Str { span, .. }
            | Self::Call { span, .. }
            | Self::Binary { span, .. }
            | Self::Error { span } => *span,
        }
    }
}

/// A statement inside a function body or at the top level of the main file
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `let name = expr;`
    Let {
        /// Bound name
        name: Symbol,
        /// Initializer
        value: Expr,
        /// Source location
        span: Span,
    },
    /// `expr;`
    Expr {
        /// The evaluated expression
        value: Expr,
        /// Source location
        span: Span,
    },
}

impl Stmt {
    /// Source location of the statement
    pub fn span(&self) -> Span {
        match self {
            Self::Let { span, .. } | Self::Expr { span, .. } => *span,
        }
    }
}

/// A brace-delimited statement block
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Statements in order
    pub stmts: Vec<Stmt>,
    /// Span covering the braces
    pub span: Span,
}

/// A function body, possibly deferred by the delayed-parsing policy
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// Fully parsed body
    Parsed(Block),
    /// Deferred body; the span covers the braces and is realized later
    Delayed(Span),
}

/// A function parameter
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: Symbol,
    /// Source location
    pub span: Span,
}

/// A top-level declaration
#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    /// `import name;`
    Import {
        /// Imported module name
        name: Symbol,
        /// Source location
        span: Span,
    },
    /// `fn name(params) { ... }`
    Function {
        /// Function name
        name: Symbol,
        /// Parameters
        params: Vec<Param>,
        /// Body, parsed or deferred
        body: Body,
        /// Source location of the whole declaration
        span: Span,
    },
    /// Top-level `let name = expr;` (main file only)
    Binding {
        /// Bound name
        name: Symbol,
        /// Initializer
        value: Expr,
        /// Source location
        span: Span,
    },
    /// Top-level `expr;` (main file only)
    Expression {
        /// The evaluated expression
        value: Expr,
        /// Source location
        span: Span,
    },
}

impl Decl {
    /// The name the declaration introduces, if it introduces one
    pub fn name(&self) -> Option<Symbol> {
        match self {
            Self::Function { name, .. } | Self::Binding { name, .. } => Some(*name),
            Self::Import { .. } | Self::Expression { .. } => None,
        }
    }

    /// Source location of the declaration
    pub fn span(&self) -> Span {
        match self {
            Self::Import { span, .. }
            | Self::Function { span, .. }
            | Self::Binding { span, .. }
            | Self::Expression { span, .. } => *span,
        }
    }
}
