use crate::compile::Strictness;
use crate::error::{QueryError, QueryResult};
use crate::meta::{Model, Sort, SortDirection};

/// Parse `-amount,+title,status` into sorts. A leading `-` sorts descending.
///
/// Unknown fields are `FieldNotFound` in strict mode and dropped otherwise.
pub fn parse_sort(input: &str, model: &Model, strictness: Strictness) -> QueryResult<Vec<Sort>> {
    let mut sorts = Vec::new();
    for term in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (direction, field) = match term.strip_prefix('-') {
            Some(field) => (SortDirection::Desc, field),
            None => (SortDirection::Asc, term.strip_prefix('+').unwrap_or(term)),
        };
        match model.column_by_alias(field.trim()) {
            Some(column) => sorts.push(Sort {
                fk_column_id: column.id.clone(),
                direction,
            }),
            None if strictness == Strictness::Strict => {
                return Err(QueryError::field_not_found(field.trim()))
            }
            None => {}
        }
    }
    Ok(sorts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::{orders, shop};

    #[test]
    fn test_directions() {
        let catalog = shop();
        let sorts = parse_sort("-amount, +title,or_status", orders(&catalog), Strictness::Strict)
            .unwrap();
        assert_eq!(
            sorts,
            vec![Sort::desc("or_amount"), Sort::asc("or_title"), Sort::asc("or_status")]
        );
    }

    #[test]
    fn test_unknown_field() {
        let catalog = shop();
        let model = orders(&catalog);
        assert_eq!(
            parse_sort("-gone,amount", model, Strictness::Lenient).unwrap(),
            vec![Sort::asc("or_amount")]
        );
        assert_eq!(
            parse_sort("-gone", model, Strictness::Strict),
            Err(QueryError::field_not_found("gone"))
        );
    }

    #[test]
    fn test_empty_input() {
        let catalog = shop();
        assert!(parse_sort(" ", orders(&catalog), Strictness::Strict)
            .unwrap()
            .is_empty());
    }
}
