use serde_json::{Map, Value};

/// Arguments accepted by every validator kind.
///
/// Kinds ignore the arguments that do not apply to them: `strict` is only read
/// by `Object`, `normalize` only by `Email`, `one_of` only by `String`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    /// Accept `null` / a missing key. Inside an object a missing optional
    /// value removes the key from the output.
    pub opt: bool,
    /// Inclusive lower bound (string length, number value, or date).
    pub min: Option<Value>,
    /// Inclusive upper bound (string length, number value, or date).
    pub max: Option<Value>,
    /// Allowed string values.
    pub one_of: Option<Vec<Value>>,
    /// Value substituted when the key is missing or null inside an object.
    pub default: Option<Value>,
    /// Reject unknown object keys. Objects default to strict.
    pub strict: Option<bool>,
    /// Lowercase email addresses. Defaults to true.
    pub normalize: Option<bool>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional() -> Self {
        Self {
            opt: true,
            ..Self::default()
        }
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    pub(crate) fn is_normalizing(&self) -> bool {
        self.normalize.unwrap_or(true)
    }

    /// Write the non-default arguments into a schema document.
    pub(crate) fn describe(&self, doc: &mut Map<String, Value>) {
        doc.insert("opt".to_string(), Value::Bool(self.opt));
        if let Some(min) = &self.min {
            doc.insert("min".to_string(), min.clone());
        }
        if let Some(max) = &self.max {
            doc.insert("max".to_string(), max.clone());
        }
        if let Some(values) = &self.one_of {
            doc.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(default) = &self.default {
            doc.insert("default".to_string(), default.clone());
        }
        if let Some(strict) = self.strict {
            doc.insert("strict".to_string(), Value::Bool(strict));
        }
        if let Some(normalize) = self.normalize {
            doc.insert("normalize".to_string(), Value::Bool(normalize));
        }
    }
}
