use std::fmt;

/// One parsed top-level unit.
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevel {
    Definition(FunctionDef),
    Extern(Prototype),
    Expression(Expr),
}

/// A function signature: name plus ordered parameter names, no body.
#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub proto: Prototype,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    For {
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        step: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Lt => '<',
        }
    }
}

// Canonical rendering: composite expressions are always parenthesized, so
// re-parsing the printed form rebuilds the same tree regardless of the
// precedence that originally produced it.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{}", v),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "(if {} then {} else {})", cond, then_branch, else_branch),
            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => {
                write!(f, "(for {} = {}, {}", var, start, end)?;
                if let Some(step) = step {
                    write!(f, ", {}", step)?;
                }
                write!(f, " in {})", body)
            }
            Expr::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(" "))
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def {} {}", self.proto, self.body)
    }
}

impl fmt::Display for TopLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopLevel::Definition(def) => write!(f, "{}", def),
            TopLevel::Extern(proto) => write!(f, "extern {}", proto),
            TopLevel::Expression(expr) => write!(f, "{}", expr),
        }
    }
}
