//! Validator combinators for RPC payloads.
//!
//! A [`Validator`] is an immutable tree of kinds (`Object`, `String`,
//! `Number`, ...) with arguments. Validating returns a new value: coerced,
//! defaulted, renamed and stripped of deleted optional keys. Input is never
//! modified.
//!
//! ```
//! use htrpc_schema::{number, object, string};
//! use serde_json::json;
//!
//! let schema = object([("name as catName", string()), ("age", number().opt())]);
//! let out = schema.validate(&json!({"name": "Pixel", "age": "3"})).unwrap();
//! assert_eq!(out, json!({"catName": "Pixel", "age": 3}));
//! ```

pub mod args;
mod email;
pub mod error;
mod parsers;
pub mod registry;
pub mod validator;

pub use args::Args;
pub use error::{Result, SchemaError};
pub use registry::{CustomValidator, ValidatorRegistry};
pub use validator::{
    any, array, boolean, date, email, number, object, string, Children, CustomKind, Field, Kind,
    Validator, ROOT_PATH, WILDCARD,
};
