use crate::meta::BaseUser;
use crate::sql::{func, lit_str, Expr};

/// Replace every base user id inside `field` with the user's display label.
///
/// Longer ids are replaced first so an id that prefixes another cannot
/// corrupt it.
pub(crate) fn display_names(field: Expr, users: &[BaseUser]) -> Expr {
    let mut ordered: Vec<&BaseUser> = users.iter().collect();
    ordered.sort_by(|a, b| b.id.len().cmp(&a.id.len()).then_with(|| a.id.cmp(&b.id)));
    ordered.into_iter().fold(field, |acc, user| {
        func("REPLACE", vec![acc, lit_str(&user.id), lit_str(user.label())])
    })
}
