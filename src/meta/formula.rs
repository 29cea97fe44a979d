//! Parsed formula trees as stored in column options.

use serde::{Deserialize, Serialize};

/// A node of a parsed formula.
///
/// ```json
/// {"type": "call", "name": "CONCAT", "args": [
///     {"type": "column", "id": "cl_first"},
///     {"type": "literal", "value": " "},
///     {"type": "column", "id": "cl_last"}
/// ]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaNode {
    /// Reference to another column of the same model, by id.
    Column { id: String },
    /// A JSON scalar literal.
    Literal { value: serde_json::Value },
    /// Infix operator: `+ - * / & = != < > <= >=`.
    Binary {
        op: String,
        left: Box<FormulaNode>,
        right: Box<FormulaNode>,
    },
    /// Function call.
    Call { name: String, args: Vec<FormulaNode> },
}

impl FormulaNode {
    pub fn column(id: &str) -> Self {
        FormulaNode::Column { id: id.into() }
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        FormulaNode::Literal {
            value: value.into(),
        }
    }

    pub fn binary(op: &str, left: FormulaNode, right: FormulaNode) -> Self {
        FormulaNode::Binary {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: &str, args: Vec<FormulaNode>) -> Self {
        FormulaNode::Call {
            name: name.into(),
            args,
        }
    }

    /// True for a bare literal; ordering by it is a no-op.
    pub fn is_constant(&self) -> bool {
        matches!(self, FormulaNode::Literal { .. })
    }

    /// Ids of every column the formula reads.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FormulaNode::Column { id } => out.push(id),
            FormulaNode::Literal { .. } => {}
            FormulaNode::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            FormulaNode::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}
