use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::compile::Strictness;
use crate::error::{QueryError, QueryResult};
use crate::meta::{ComparisonOp, ComparisonSubOp, Filter, LogicalOp, Model};

/// Connector between two terms: `~and`, `~or`, `~not`.
static CONNECTOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^~(and|or|not)").unwrap());

/// Parse a where-string into filters for `model`.
///
/// Unknown fields are an error in strict mode; in lenient mode they become
/// leaves without a column, which compile to nothing. The error is
/// `InvalidFilter` rather than `FieldNotFound`: a where-string names fields
/// by user text, so a miss is a malformed request, while `FieldNotFound`
/// is kept for stored filters whose column id no longer resolves.
pub fn parse_where(input: &str, model: &Model, strictness: Strictness) -> QueryResult<Vec<Filter>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = WhereParser {
        input,
        pos: 0,
        model,
        strict: strictness == Strictness::Strict,
    };
    let filters = parser.terms()?;
    if parser.pos < input.len() {
        return Err(parser.error("unexpected ')'"));
    }
    Ok(filters)
}

struct WhereParser<'s, 'm> {
    input: &'s str,
    pos: usize,
    model: &'m Model,
    strict: bool,
}

impl<'s, 'm> WhereParser<'s, 'm> {
    fn rest(&self) -> &'s str {
        &self.input[self.pos..]
    }

    fn error(&self, message: &str) -> QueryError {
        QueryError::InvalidFilter(format!("{message} at offset {} in '{}'", self.pos, self.input))
    }

    /// A sequence of terms up to the end of input or an unmatched `)`.
    fn terms(&mut self) -> QueryResult<Vec<Filter>> {
        let mut filters = Vec::new();
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() || rest.starts_with(')') {
                return Ok(filters);
            }

            let connector = match CONNECTOR.captures(rest) {
                Some(caps) => {
                    let op = match &caps[1] {
                        "and" => LogicalOp::And,
                        "or" => LogicalOp::Or,
                        _ => LogicalOp::Not,
                    };
                    self.pos += caps[0].len();
                    Some(op)
                }
                None if filters.is_empty() => None,
                None => return Err(self.error("expected ~and, ~or or ~not")),
            };

            self.skip_whitespace();
            if !self.rest().starts_with('(') {
                return Err(self.error("expected '('"));
            }
            self.pos += 1;

            let term = if self.rest().trim_start().starts_with('(') {
                let children = self.terms()?;
                Filter::group(connector.unwrap_or(LogicalOp::And), children)
            } else {
                let body = self.leaf_body()?;
                self.leaf(body)?
                    .with_logical_op(connector.unwrap_or(LogicalOp::And))
            };

            if !self.rest().starts_with(')') {
                return Err(self.error("unbalanced brackets"));
            }
            self.pos += 1;
            filters.push(term);
        }
    }

    /// Text of a leaf up to its closing bracket. Brackets inside the value
    /// must balance.
    fn leaf_body(&mut self) -> QueryResult<&'s str> {
        let start = self.pos;
        let mut depth = 0usize;
        for (offset, ch) in self.rest().char_indices() {
            match ch {
                '(' => depth += 1,
                ')' if depth == 0 => {
                    self.pos = start + offset;
                    return Ok(&self.input[start..self.pos]);
                }
                ')' => depth -= 1,
                _ => {}
            }
        }
        self.pos = self.input.len();
        Err(self.error("unbalanced brackets"))
    }

    fn leaf(&self, body: &str) -> QueryResult<Filter> {
        let mut parts = body.splitn(3, ',');
        let field = parts.next().unwrap_or_default().trim();
        let op_text = parts
            .next()
            .map(str::trim)
            .ok_or_else(|| self.error(&format!("missing operator for '{field}'")))?;
        let raw_value = parts.next();

        // `is,blank` style spellings of the blank operators
        let (op, raw_value) = match (op_text, raw_value.map(str::trim)) {
            ("is", Some("blank")) => (ComparisonOp::Blank, None),
            ("is", Some("notblank")) => (ComparisonOp::NotBlank, None),
            _ => (
                op_text
                    .parse::<ComparisonOp>()
                    .map_err(QueryError::InvalidFilter)?,
                raw_value,
            ),
        };

        let Some(column) = self.model.column_by_alias(field) else {
            if self.strict {
                return Err(QueryError::InvalidFilter(format!(
                    "field '{field}' not found in model '{}'",
                    self.model.title
                )));
            }
            return Ok(Filter {
                comparison_op: Some(op),
                ..Default::default()
            });
        };

        let mut filter = Filter {
            fk_column_id: Some(column.id.clone()),
            comparison_op: Some(op),
            ..Default::default()
        };

        let mut value_text = raw_value;
        if column.uidt.is_date() {
            if let Some(text) = raw_value {
                let (head, tail) = match text.split_once(',') {
                    Some((head, tail)) => (head.trim(), Some(tail)),
                    None => (text.trim(), None),
                };
                if let Ok(sub_op) = head.parse::<ComparisonSubOp>() {
                    filter.comparison_sub_op = Some(sub_op);
                    value_text = tail;
                }
            }
        }

        filter.value = match value_text {
            None => Value::Null,
            Some(text) if op == ComparisonOp::In => Value::Array(
                text.split(',')
                    .map(|item| Value::String(item.trim().to_string()))
                    .collect(),
            ),
            Some(text) => Value::String(text.to_string()),
        };
        Ok(filter)
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::{orders, shop};
    use serde_json::json;

    fn parse(input: &str) -> QueryResult<Vec<Filter>> {
        let catalog = shop();
        parse_where(input, orders(&catalog), Strictness::Strict)
    }

    #[test]
    fn test_single_leaf() {
        let filters = parse("(amount,gt,100)").unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].fk_column_id.as_deref(), Some("or_amount"));
        assert_eq!(filters[0].comparison_op, Some(ComparisonOp::Gt));
        assert_eq!(filters[0].value, json!("100"));
        assert_eq!(filters[0].logical_op, Some(LogicalOp::And));
    }

    #[test]
    fn test_connectors_and_unary() {
        let filters = parse("(title,eq,Mug)~or(paid,checked)~not(amount,blank)").unwrap();
        let ops: Vec<_> = filters.iter().map(|f| f.logical_op).collect();
        assert_eq!(
            ops,
            vec![Some(LogicalOp::And), Some(LogicalOp::Or), Some(LogicalOp::Not)]
        );
        assert_eq!(filters[1].value, Value::Null);
    }

    #[test]
    fn test_nested_group() {
        let filters = parse("(amount,gt,1)~or((title,eq,a)~and(title,eq,b))").unwrap();
        assert_eq!(filters.len(), 2);
        let group = &filters[1];
        assert!(group.is_group);
        assert_eq!(group.logical_op, Some(LogicalOp::Or));
        assert_eq!(group.children.len(), 2);
        assert_eq!(group.children[1].value, json!("b"));
    }

    #[test]
    fn test_blank_aliases() {
        for input in ["(title,is,blank)", "(title,isblank)", "(title,is_blank)"] {
            assert_eq!(parse(input).unwrap()[0].comparison_op, Some(ComparisonOp::Blank));
        }
        for input in ["(title,is,notblank)", "(title,isnotblank)", "(title,is_not_blank)"] {
            assert_eq!(
                parse(input).unwrap()[0].comparison_op,
                Some(ComparisonOp::NotBlank)
            );
        }
    }

    #[test]
    fn test_date_sub_op() {
        let filters = parse("(order_date,eq,daysAgo,3)").unwrap();
        assert_eq!(filters[0].comparison_sub_op, Some(ComparisonSubOp::DaysAgo));
        assert_eq!(filters[0].value, json!("3"));

        let filters = parse("(order_date,eq,today)").unwrap();
        assert_eq!(filters[0].comparison_sub_op, Some(ComparisonSubOp::Today));
        assert_eq!(filters[0].value, Value::Null);
    }

    #[test]
    fn test_in_splits_values() {
        let filters = parse("(amount,in,1, 2,3)").unwrap();
        assert_eq!(filters[0].value, json!(["1", "2", "3"]));
    }

    #[test]
    fn test_value_keeps_commas_and_brackets() {
        let filters = parse("(title,like,a,b (c))").unwrap();
        assert_eq!(filters[0].value, json!("a,b (c)"));
    }

    #[test]
    fn test_unbalanced_brackets() {
        for input in ["(amount,gt,1", "(amount,gt,1))", "((amount,gt,1)"] {
            assert!(
                matches!(parse(input), Err(QueryError::InvalidFilter(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn test_unknown_field_and_operator() {
        assert!(matches!(
            parse("(nope,eq,1)"),
            Err(QueryError::InvalidFilter(_))
        ));
        assert!(matches!(
            parse("(amount,bigger,1)"),
            Err(QueryError::InvalidFilter(_))
        ));

        let catalog = shop();
        let lenient = parse_where("(nope,eq,1)", orders(&catalog), Strictness::Lenient).unwrap();
        assert_eq!(lenient[0].fk_column_id, None);
    }
}
