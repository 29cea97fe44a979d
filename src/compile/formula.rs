//! The formula seam.
//!
//! Formula columns carry a parsed [`FormulaNode`] tree. The compilers treat
//! formula compilation as a black box behind [`FormulaCompiler`];
//! [`DefaultFormulaCompiler`] covers arithmetic, comparison, concatenation and
//! a small function library.

pub use crate::meta::FormulaNode;

use crate::error::{QueryError, QueryResult};
use crate::meta::Model;
use crate::sql::dialect::SqlDialect;
use crate::sql::{case_when, func, lit_null, raw_sql, BinaryOperator, Expr, ExprExt};

use super::context::CompileContext;
use super::{literal, value};

/// Compiles a formula tree into a SQL expression over `alias`.
pub trait FormulaCompiler: Send + Sync {
    fn compile(
        &self,
        node: &FormulaNode,
        model: &Model,
        alias: &str,
        ctx: &mut CompileContext<'_>,
    ) -> QueryResult<Expr>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormulaCompiler;

/// Functions rendered by name with their arguments unchanged.
const PASS_THROUGH: &[&str] = &["CONCAT", "UPPER", "LOWER", "LEN", "TRIM", "ROUND", "ABS", "COALESCE"];

impl DefaultFormulaCompiler {
    fn binary_op(op: &str) -> Option<BinaryOperator> {
        Some(match op {
            "+" => BinaryOperator::Plus,
            "-" => BinaryOperator::Minus,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "%" => BinaryOperator::Mod,
            "&" => BinaryOperator::Concat,
            "=" | "==" => BinaryOperator::Eq,
            "!=" | "<>" => BinaryOperator::Ne,
            "<" => BinaryOperator::Lt,
            ">" => BinaryOperator::Gt,
            "<=" => BinaryOperator::Lte,
            ">=" => BinaryOperator::Gte,
            "&&" => BinaryOperator::And,
            "||" => BinaryOperator::Or,
            _ => return None,
        })
    }

    fn compile_call(
        &self,
        name: &str,
        args: &[FormulaNode],
        model: &Model,
        alias: &str,
        ctx: &mut CompileContext<'_>,
    ) -> QueryResult<Expr> {
        let upper = name.to_ascii_uppercase();
        let mut compiled = Vec::with_capacity(args.len());
        for arg in args {
            compiled.push(self.compile(arg, model, alias, ctx)?);
        }

        match upper.as_str() {
            "IF" => {
                let mut it = compiled.into_iter();
                let (Some(cond), Some(then)) = (it.next(), it.next()) else {
                    return Err(QueryError::formula(name, "IF needs a condition and a value"));
                };
                Ok(case_when(vec![(cond, then)], it.next()))
            }
            "NOW" => Ok(raw_sql("CURRENT_TIMESTAMP")),
            known if PASS_THROUGH.contains(&known) => {
                let rendered = ctx.dialect.remap_function(known).unwrap_or(known);
                Ok(func(rendered, compiled))
            }
            _ if ctx.validate_formula => {
                Err(QueryError::formula(name, format!("unknown function '{name}'")))
            }
            _ => Ok(func(&upper, compiled)),
        }
    }
}

impl FormulaCompiler for DefaultFormulaCompiler {
    fn compile(
        &self,
        node: &FormulaNode,
        model: &Model,
        alias: &str,
        ctx: &mut CompileContext<'_>,
    ) -> QueryResult<Expr> {
        match node {
            FormulaNode::Literal { value } => Ok(literal(value)),
            FormulaNode::Column { id } => {
                let catalog = ctx.catalog;
                let resolved = catalog
                    .model(&model.id)
                    .and_then(|m| m.column(id).map(|c| (m, c)));
                match resolved {
                    Some((model, column)) => {
                        ctx.nested(id, |ctx| value::column_value(column, model, alias, ctx))
                    }
                    None if ctx.validate_formula => Err(QueryError::formula(
                        id,
                        format!("column '{id}' not found in model '{}'", model.id),
                    )),
                    None => Ok(lit_null()),
                }
            }
            FormulaNode::Binary { op, left, right } => {
                let operator = Self::binary_op(op)
                    .ok_or_else(|| QueryError::formula(op, format!("unknown operator '{op}'")))?;
                let left = self.compile(left, model, alias, ctx)?;
                let right = self.compile(right, model, alias, ctx)?;
                Ok(left.binary(operator, right))
            }
            FormulaNode::Call { name, args } => self.compile_call(name, args, model, alias, ctx),
        }
    }
}
