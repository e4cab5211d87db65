//! Observable expressions accepted on the command line.
//!
//! An observable is declared as `name=operand` or `name=lhs<op>rhs` with `op` one of
//! `+ - * /`. Operands are names, looked up in this order: an observable declared
//! earlier, a static source, a source. Operations are element-wise; division by zero
//! yields `NaN`.

use std::{collections::BTreeMap, str::FromStr};

use ndarray::{ArrayD, Zip};
use rootstrap_engine::{Bootstrapper, CallbackError, ContextError, EdgesSpec, IterationContext};
use rootstrap_stats::numeric;

/// Error in an observable, source or static declaration.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ExprError {
    #[display("expected 'name=value', got '{input}'")]
    NotAnAssignment { input: String },
    #[display("missing operand in '{input}'")]
    MissingOperand { input: String },
    #[display("only one operator is supported, got '{input}'")]
    TooManyOperators { input: String },
    #[display("'{name}' is neither an earlier observable, a static source nor a source")]
    UnknownOperand { name: String },
    #[display("cannot apply '{op}' to shapes {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: BinaryOp,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
}

/// A `name=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

impl FromStr for Assignment {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let not_an_assignment = || ExprError::NotAnAssignment {
            input: s.to_owned(),
        };
        let (name, value) = s.split_once('=').ok_or_else(not_an_assignment)?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(not_an_assignment());
        }
        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum BinaryOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
}

impl BinaryOp {
    const ALL: [Self; 4] = [Self::Add, Self::Sub, Self::Mul, Self::Div];

    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => numeric::checked_ratio(lhs, rhs),
        }
    }
}

/// Right-hand side of an observable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Operand(String),
    Binary {
        op: BinaryOp,
        lhs: String,
        rhs: String,
    },
}

impl FromStr for Expr {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let missing = || ExprError::MissingOperand {
            input: s.to_owned(),
        };
        let mut ops = s.match_indices(|c| BinaryOp::ALL.iter().any(|op| op.symbol() == c));
        let Some((index, symbol)) = ops.next() else {
            return Ok(Self::Operand(s.trim().to_owned()));
        };
        if ops.next().is_some() {
            return Err(ExprError::TooManyOperators {
                input: s.to_owned(),
            });
        }
        let op = BinaryOp::ALL
            .into_iter()
            .find(|op| symbol.starts_with(op.symbol()))
            .ok_or_else(missing)?;
        let (lhs, rhs) = (s[..index].trim(), s[index + symbol.len()..].trim());
        if lhs.is_empty() || rhs.is_empty() {
            return Err(missing());
        }
        Ok(Self::Binary {
            op,
            lhs: lhs.to_owned(),
            rhs: rhs.to_owned(),
        })
    }
}

/// A parsed `name=expr` observable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableDef {
    pub name: String,
    pub expr: Expr,
}

impl FromStr for ObservableDef {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Assignment { name, value } = s.parse()?;
        Ok(Self {
            name,
            expr: value.parse()?,
        })
    }
}

/// A name resolved against the engine's registries.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Observable(String),
    Static(String),
    Source(String),
}

impl Operand {
    fn resolve(name: &str, bs: &Bootstrapper) -> Result<Self, ExprError> {
        if bs.observable_edges(name).is_some() {
            Ok(Self::Observable(name.to_owned()))
        } else if bs.static_value(name).is_some() {
            Ok(Self::Static(name.to_owned()))
        } else if bs.source(name).is_some() {
            Ok(Self::Source(name.to_owned()))
        } else {
            Err(ExprError::UnknownOperand {
                name: name.to_owned(),
            })
        }
    }

    /// Edges of the operand; statics borrow the edges of the source they integrate.
    fn edges(&self, bs: &Bootstrapper, static_sources: &BTreeMap<String, String>) -> EdgesSpec {
        match self {
            Self::Observable(name) => bs
                .observable_edges(name)
                .cloned()
                .map_or_else(|| EdgesSpec::source(name), EdgesSpec::from),
            Self::Static(name) => match static_sources.get(name) {
                Some(source) => EdgesSpec::source(source),
                None => EdgesSpec::source(name),
            },
            Self::Source(name) => EdgesSpec::source(name),
        }
    }

    fn eval(&self, ctx: &IterationContext<'_>) -> Result<ArrayD<f64>, ContextError> {
        match self {
            Self::Observable(name) => ctx.observable(name).cloned(),
            Self::Static(name) => ctx.static_value(name).cloned(),
            Self::Source(name) => ctx.values(name),
        }
    }
}

/// An observable expression bound to the engine, ready to be evaluated every iteration.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    lhs: Operand,
    rhs: Option<(BinaryOp, Operand)>,
}

impl ObservableDef {
    /// Resolves the operands against everything registered so far.
    ///
    /// The observable takes the edges of its first operand.
    pub fn compile(
        &self,
        bs: &Bootstrapper,
        static_sources: &BTreeMap<String, String>,
    ) -> Result<(EdgesSpec, CompiledExpr), ExprError> {
        let compiled = match &self.expr {
            Expr::Operand(name) => CompiledExpr {
                lhs: Operand::resolve(name, bs)?,
                rhs: None,
            },
            Expr::Binary { op, lhs, rhs } => CompiledExpr {
                lhs: Operand::resolve(lhs, bs)?,
                rhs: Some((*op, Operand::resolve(rhs, bs)?)),
            },
        };
        Ok((compiled.lhs.edges(bs, static_sources), compiled))
    }
}

impl CompiledExpr {
    pub fn eval(&self, ctx: &IterationContext<'_>) -> Result<ArrayD<f64>, CallbackError> {
        let lhs = self.lhs.eval(ctx)?;
        let Some((op, rhs)) = &self.rhs else {
            return Ok(lhs);
        };
        let rhs = rhs.eval(ctx)?;
        Ok(apply(*op, &lhs, &rhs)?)
    }
}

fn apply(op: BinaryOp, lhs: &ArrayD<f64>, rhs: &ArrayD<f64>) -> Result<ArrayD<f64>, ExprError> {
    if lhs.shape() != rhs.shape() {
        return Err(ExprError::ShapeMismatch {
            op,
            lhs: lhs.shape().to_vec(),
            rhs: rhs.shape().to_vec(),
        });
    }
    Ok(Zip::from(lhs).and(rhs).map_collect(|&a, &b| op.apply(a, b)))
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;
    use rootstrap_engine::{Edges, Extracted, ResampleSeed, reader::MemoryReader};

    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            "proton = proton_dist".parse::<Assignment>().unwrap(),
            Assignment {
                name: "proton".to_owned(),
                value: "proton_dist".to_owned(),
            }
        );
        for bad in ["proton", "=x", "x=", " = "] {
            assert!(matches!(
                bad.parse::<Assignment>(),
                Err(ExprError::NotAnAssignment { .. })
            ));
        }
    }

    #[test]
    fn test_parse_observable() {
        let def: ObservableDef = "ratio=proton/pion".parse().unwrap();
        assert_eq!(def.name, "ratio");
        assert_eq!(
            def.expr,
            Expr::Binary {
                op: BinaryOp::Div,
                lhs: "proton".to_owned(),
                rhs: "pion".to_owned(),
            }
        );

        let def: ObservableDef = "yield = proton".parse().unwrap();
        assert_eq!(def.expr, Expr::Operand("proton".to_owned()));

        assert!(matches!(
            "x=a+b+c".parse::<ObservableDef>(),
            Err(ExprError::TooManyOperators { .. })
        ));
        assert!(matches!(
            "x=a*".parse::<ObservableDef>(),
            Err(ExprError::MissingOperand { .. })
        ));
    }

    #[test]
    fn test_apply_elementwise() {
        let a = arr1(&[2.0, 4.0]).into_dyn();
        let b = arr1(&[1.0, 0.0]).into_dyn();
        assert_eq!(
            apply(BinaryOp::Add, &a, &b).unwrap(),
            arr1(&[3.0, 4.0]).into_dyn()
        );
        assert_eq!(
            apply(BinaryOp::Sub, &a, &b).unwrap(),
            arr1(&[1.0, 4.0]).into_dyn()
        );
        assert_eq!(
            apply(BinaryOp::Mul, &a, &b).unwrap(),
            arr1(&[2.0, 0.0]).into_dyn()
        );

        let ratio = apply(BinaryOp::Div, &a, &b).unwrap();
        assert_eq!(ratio[[0]], 2.0);
        assert!(ratio[[1]].is_nan());

        let short = arr1(&[1.0]).into_dyn();
        assert!(matches!(
            apply(BinaryOp::Add, &a, &short),
            Err(ExprError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_compile_resolution_order() {
        let mut reader = MemoryReader::new();
        for content in [1.0, 2.0] {
            reader.push_file([(
                "proton_dist".to_owned(),
                Extracted::new(
                    arr1(&[content, content]).into_dyn(),
                    Edges::new(vec![vec![0.0, 0.5, 1.0]]),
                ),
            )]);
        }
        let mut bs = Bootstrapper::with_seed(reader, ResampleSeed::from_u128(3));
        bs.register_source("proton", "proton_dist").unwrap();
        bs.register_static_source("total", |ctx| Ok(ctx.integrated_sample("proton")?))
            .unwrap();
        let statics = BTreeMap::from([("total".to_owned(), "proton".to_owned())]);

        let def: ObservableDef = "norm=proton/total".parse().unwrap();
        let (edges, compiled) = def.compile(&bs, &statics).unwrap();
        assert!(matches!(&edges, EdgesSpec::Source(name) if name == "proton"));
        assert_eq!(compiled.lhs, Operand::Source("proton".to_owned()));
        assert_eq!(
            compiled.rhs,
            Some((BinaryOp::Div, Operand::Static("total".to_owned())))
        );
        bs.register_observable("norm", edges, move |ctx| compiled.eval(ctx))
            .unwrap();

        let def: ObservableDef = "again=norm*total".parse().unwrap();
        let (edges, compiled) = def.compile(&bs, &statics).unwrap();
        assert!(
            matches!(&edges, EdgesSpec::Explicit(e) if e == &Edges::new(vec![vec![0.0, 0.5, 1.0]]))
        );
        assert_eq!(compiled.lhs, Operand::Observable("norm".to_owned()));

        let def: ObservableDef = "bad=kaon".parse().unwrap();
        assert!(matches!(
            def.compile(&bs, &statics),
            Err(ExprError::UnknownOperand { name }) if name == "kaon"
        ));
    }
}
