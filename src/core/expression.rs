//! Structured raster algebra
//!
//! Expressions are kept as a small tree and only rendered to the
//! `r.mapcalc` text syntax at the engine boundary. Engines evaluate the
//! tree directly against their layers.

use crate::types::{RasterGrid, RasterValue, ToarError, ToarResult};
use ndarray::{Array2, Zip};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 3,
        }
    }

    /// Division by zero yields a null (NaN) cell, as in r.mapcalc
    pub fn apply(self, lhs: RasterValue, rhs: RasterValue) -> RasterValue {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div if rhs == 0.0 => RasterValue::NAN,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Unary functions; trigonometric arguments are in degrees (r.mapcalc convention)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Cos,
}

impl Function {
    fn name(self) -> &'static str {
        match self {
            Function::Cos => "cos",
        }
    }

    pub fn apply(self, value: RasterValue) -> RasterValue {
        match self {
            Function::Cos => crate::core::radiometry::zenith_cosine(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Raster(String),
    Const(RasterValue),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    pub fn raster(name: impl Into<String>) -> Self {
        Expr::Raster(name.into())
    }

    pub fn constant(value: RasterValue) -> Self {
        Expr::Const(value)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }

    pub fn div(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }

    pub fn pow(self, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Pow, self, rhs)
    }

    pub fn cos(self) -> Self {
        Expr::Call(Function::Cos, Box::new(self))
    }

    /// Names of all raster layers referenced by the expression, in order of appearance
    pub fn rasters(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_rasters(&mut names);
        names
    }

    fn collect_rasters<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Raster(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Const(_) => {}
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_rasters(names);
                rhs.collect_rasters(names);
            }
            Expr::Call(_, arg) => arg.collect_rasters(names),
        }
    }

    /// Evaluate for a single cell, with raster references resolved to scalars
    pub fn evaluate_scalar<F>(&self, resolve: &F) -> ToarResult<RasterValue>
    where
        F: Fn(&str) -> ToarResult<RasterValue>,
    {
        match self {
            Expr::Raster(name) => resolve(name),
            Expr::Const(value) => Ok(*value),
            Expr::Binary(op, lhs, rhs) => {
                Ok(op.apply(lhs.evaluate_scalar(resolve)?, rhs.evaluate_scalar(resolve)?))
            }
            Expr::Call(func, arg) => Ok(func.apply(arg.evaluate_scalar(resolve)?)),
        }
    }

    /// Evaluate over whole grids of the given shape
    pub fn evaluate<'a, F>(&self, shape: (usize, usize), resolve: &F) -> ToarResult<RasterGrid>
    where
        F: Fn(&str) -> ToarResult<&'a RasterGrid>,
    {
        match self.evaluate_value(shape, resolve)? {
            Value::Scalar(v) => Ok(Array2::from_elem(shape, v)),
            Value::Grid(grid) => Ok(grid),
        }
    }

    fn evaluate_value<'a, F>(&self, shape: (usize, usize), resolve: &F) -> ToarResult<Value>
    where
        F: Fn(&str) -> ToarResult<&'a RasterGrid>,
    {
        match self {
            Expr::Raster(name) => {
                let grid = resolve(name)?;
                if grid.dim() != shape {
                    return Err(ToarError::RegionMismatch {
                        layer: name.clone(),
                        expected: shape,
                        actual: grid.dim(),
                    });
                }
                Ok(Value::Grid(grid.clone()))
            }
            Expr::Const(value) => Ok(Value::Scalar(*value)),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate_value(shape, resolve)?;
                let rhs = rhs.evaluate_value(shape, resolve)?;
                Ok(combine(*op, lhs, rhs))
            }
            Expr::Call(func, arg) => Ok(match arg.evaluate_value(shape, resolve)? {
                Value::Scalar(v) => Value::Scalar(func.apply(v)),
                Value::Grid(grid) => Value::Grid(map_grid(grid, |v| func.apply(v))),
            }),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, _, _) => op.precedence(),
            _ => u8::MAX,
        }
    }
}

enum Value {
    Scalar(RasterValue),
    Grid(RasterGrid),
}

fn combine(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    match (lhs, rhs) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(op.apply(a, b)),
        (Value::Grid(a), Value::Scalar(b)) => Value::Grid(map_grid(a, |x| op.apply(x, b))),
        (Value::Scalar(a), Value::Grid(b)) => Value::Grid(map_grid(b, |x| op.apply(a, x))),
        (Value::Grid(a), Value::Grid(b)) => Value::Grid(zip_grids(&a, &b, |x, y| op.apply(x, y))),
    }
}

#[cfg(feature = "parallel")]
fn map_grid<F>(mut grid: RasterGrid, f: F) -> RasterGrid
where
    F: Fn(RasterValue) -> RasterValue + Sync + Send,
{
    grid.par_mapv_inplace(f);
    grid
}

#[cfg(not(feature = "parallel"))]
fn map_grid<F>(mut grid: RasterGrid, f: F) -> RasterGrid
where
    F: Fn(RasterValue) -> RasterValue + Sync + Send,
{
    grid.mapv_inplace(f);
    grid
}

#[cfg(feature = "parallel")]
fn zip_grids<F>(a: &RasterGrid, b: &RasterGrid, f: F) -> RasterGrid
where
    F: Fn(RasterValue, RasterValue) -> RasterValue + Sync + Send,
{
    Zip::from(a).and(b).par_map_collect(|&x, &y| f(x, y))
}

#[cfg(not(feature = "parallel"))]
fn zip_grids<F>(a: &RasterGrid, b: &RasterGrid, f: F) -> RasterGrid
where
    F: Fn(RasterValue, RasterValue) -> RasterValue + Sync + Send,
{
    Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Raster(name) => write!(f, "{}", name),
            Expr::Const(value) => write!(f, "{}", value),
            Expr::Call(func, arg) => write!(f, "{}({})", func.name(), arg),
            Expr::Binary(op, lhs, rhs) => {
                let prec = op.precedence();
                // Left-associative, except `^` which binds right
                let (lhs_parens, rhs_parens) = if *op == BinaryOp::Pow {
                    (lhs.precedence() <= prec, rhs.precedence() < prec)
                } else {
                    (lhs.precedence() < prec, rhs.precedence() <= prec)
                };
                write_operand(f, lhs, lhs_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs, rhs_parens)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// `destination = expression`, the unit of work handed to a raster engine
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub destination: String,
    pub expression: Expr,
}

impl Assignment {
    pub fn new(destination: impl Into<String>, expression: Expr) -> Self {
        Self {
            destination: destination.into(),
            expression,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.destination, self.expression)
    }
}
