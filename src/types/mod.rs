//! Type registry: per-type value normalization.
//!
//! Every logical column type may register a [`TypeHandler`] that converts
//! between what a user types, what the column stores and what is displayed.
//! Lookups never fail; unregistered types get the identity handler.
//!
//! ```ignore
//! use gridql::types::registry;
//!
//! let handler = registry().get_handler(column.uidt);
//! let stored = handler.serialize_value(&json!("1,234"), &column);
//! ```

mod checkbox;
mod date;
mod duration;
mod number;

pub use checkbox::CheckboxHandler;
pub use date::{parse_date, parse_datetime, DateHandler, DateTimeHandler};
pub use duration::DurationHandler;
pub use number::{
    CurrencyHandler, DecimalHandler, NumberHandler, PercentHandler, RatingHandler, YearHandler,
};

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::meta::{Column, UiType};

/// Value conversions for one logical type.
///
/// Implementations never fail: input that cannot be interpreted becomes
/// `Value::Null`.
pub trait TypeHandler: Send + Sync {
    /// User-facing value to the canonical stored value.
    fn serialize_value(&self, value: &Value, column: &Column) -> Value;

    /// Stored value to the display value.
    fn parse_value(&self, value: &Value, column: &Column) -> Value;

    /// Stored value as plain text; `""` for null.
    fn parse_plain_cell_value(&self, value: &Value, column: &Column) -> String {
        plain_text(&self.parse_value(value, column))
    }
}

/// Render a JSON value as bare text.
pub(crate) fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pass-through handler for types without special rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityHandler;

impl TypeHandler for IdentityHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        value.clone()
    }

    fn parse_value(&self, value: &Value, _column: &Column) -> Value {
        value.clone()
    }
}

/// Handlers keyed by logical type.
pub struct TypeRegistry {
    handlers: HashMap<UiType, Box<dyn TypeHandler>>,
    fallback: IdentityHandler,
}

impl TypeRegistry {
    /// A registry with no handlers; every type resolves to the identity handler.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: IdentityHandler,
        }
    }

    /// The built-in handler set.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(UiType::Number, NumberHandler);
        registry.register(UiType::Decimal, DecimalHandler);
        registry.register(UiType::Currency, CurrencyHandler);
        registry.register(UiType::Percent, PercentHandler);
        registry.register(UiType::Rating, RatingHandler);
        registry.register(UiType::Year, YearHandler);
        registry.register(UiType::Duration, DurationHandler);
        registry.register(UiType::Checkbox, CheckboxHandler);
        registry.register(UiType::Date, DateHandler);
        registry.register(UiType::DateTime, DateTimeHandler);
        registry.register(UiType::CreatedTime, DateTimeHandler);
        registry.register(UiType::LastModifiedTime, DateTimeHandler);
        registry
    }

    pub fn register(&mut self, uidt: UiType, handler: impl TypeHandler + 'static) {
        self.handlers.insert(uidt, Box::new(handler));
    }

    pub fn has_handler(&self, uidt: UiType) -> bool {
        self.handlers.contains_key(&uidt)
    }

    pub fn get_handler(&self, uidt: UiType) -> &dyn TypeHandler {
        match self.handlers.get(&uidt) {
            Some(handler) => handler.as_ref(),
            None => &self.fallback,
        }
    }

    /// Stored value of `column` to its display value.
    pub fn parse_value(&self, value: &Value, column: &Column) -> Value {
        self.get_handler(column.uidt).parse_value(value, column)
    }

    /// Normalize a filter value for comparison against `column`.
    pub fn normalize(&self, value: &Value, column: &Column) -> Value {
        self.get_handler(column.uidt).serialize_value(value, column)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

static STANDARD: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::standard);

/// The process-wide standard registry.
pub fn registry() -> &'static TypeRegistry {
    &STANDARD
}
