use super::expr::Expr;
use crate::kit::lexer::Coordinate;

/// Parsed source file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub statements: Vec<Stmt>,
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    /// Position of the first token of the statement (decorators excluded)
    pub position: Coordinate,
}

impl Stmt {
    pub fn line(&self) -> usize {
        self.position.line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `expr;`
    Expr(Expr),
    /// `var name = expr;`
    VarDecl { name: String, initializer: Expr },
    /// `target = value;` where target is a name, member or index
    Assign { target: Expr, value: Expr },
    Function(FunctionDef),
    Class(ClassDef),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    While { condition: Expr, body: Vec<Stmt> },
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        error_name: String,
        handler: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Yield(Option<Expr>),
    Raise(Expr),
    Break,
    Continue,
    Pass,
    /// `import a.b.c [as x];`
    Import {
        path: Vec<String>,
        alias: Option<String>,
    },
    /// `from a.b import x, y;`
    FromImport { path: Vec<String>, names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    /// Outermost first, as written
    pub decorators: Vec<Expr>,
    pub is_async: bool,
    /// The body (not a nested definition) contains `yield`
    pub is_generator: bool,
    /// Position of the `fn` keyword, or of `async` for coroutine functions
    pub keyword: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    pub keyword: Coordinate,
}
