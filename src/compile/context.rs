//! Per-compilation state threaded through every compiler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::formula::{DefaultFormulaCompiler, FormulaCompiler};
use crate::error::{QueryError, QueryResult};
use crate::meta::{BaseUser, Catalog};
use crate::sql::Dialect;
use crate::types::{registry, TypeRegistry};

/// Default bound on relation/lookup nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// How unresolvable filter and sort terms are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Fail the whole compilation.
    Strict,
    /// Drop the offending term and keep going.
    #[default]
    Lenient,
}

/// Hands out join aliases `__nc0`, `__nc1`, ... for one compilation.
#[derive(Debug, Default)]
pub struct AliasCounter {
    next: usize,
}

impl AliasCounter {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> String {
        let alias = format!("__nc{}", self.next);
        self.next += 1;
        alias
    }

    pub fn allocated(&self) -> usize {
        self.next
    }
}

/// Everything a compiler needs besides its input.
///
/// Created per compilation and never shared: it owns the alias counter.
///
/// ```ignore
/// let mut ctx = CompileContext::new(&catalog)
///     .with_dialect(Dialect::MySql)
///     .with_strictness(Strictness::Strict);
/// let base = ctx.next_alias();
/// ```
pub struct CompileContext<'a> {
    pub catalog: &'a Catalog,
    pub dialect: Dialect,
    pub strictness: Strictness,
    pub max_depth: usize,
    /// Ask the formula compiler to reject unknown functions and dangling references.
    pub validate_formula: bool,
    pub formula: &'a dyn FormulaCompiler,
    pub users: &'a [BaseUser],
    pub types: &'a TypeRegistry,
    /// Reference instant for relative date filters.
    pub now: DateTime<Utc>,
    aliases: AliasCounter,
    depth: usize,
}

impl<'a> CompileContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            dialect: Dialect::default(),
            strictness: Strictness::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            validate_formula: false,
            formula: &DefaultFormulaCompiler,
            users: &[],
            types: registry(),
            now: Utc::now(),
            aliases: AliasCounter::new(),
            depth: 0,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_formula_validation(mut self, validate: bool) -> Self {
        self.validate_formula = validate;
        self
    }

    pub fn with_formula_compiler(mut self, formula: &'a dyn FormulaCompiler) -> Self {
        self.formula = formula;
        self
    }

    pub fn with_users(mut self, users: &'a [BaseUser]) -> Self {
        self.users = users;
        self
    }

    pub fn with_type_registry(mut self, types: &'a TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn next_alias(&mut self) -> String {
        self.aliases.next()
    }

    pub fn aliases_allocated(&self) -> usize {
        self.aliases.allocated()
    }

    pub fn is_strict(&self) -> bool {
        self.strictness == Strictness::Strict
    }

    /// Run `f` one nesting level deeper, failing once `max_depth` is exceeded.
    pub fn nested<T>(
        &mut self,
        column_id: &str,
        f: impl FnOnce(&mut Self) -> QueryResult<T>,
    ) -> QueryResult<T> {
        if self.depth >= self.max_depth {
            return Err(QueryError::DepthExceeded {
                column: column_id.to_string(),
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Apply the strictness policy to the result of compiling one term.
    ///
    /// `Ok(None)` means the term was skipped.
    pub fn recover<T>(&self, result: QueryResult<T>, term: &str) -> QueryResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if !self.is_strict() && err.is_recoverable() => {
                warn!(term, error = %err, "skipping unresolvable term");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn log_aliases(&self, what: &str) {
        debug!(what, aliases = self.aliases.allocated(), "compiled");
    }
}
