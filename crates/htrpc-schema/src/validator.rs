use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::args::Args;
use crate::error::{Result, SchemaError};
use crate::parsers;
use crate::registry::{CustomValidator, ValidatorRegistry};

/// Top-level path used in failure messages.
pub const ROOT_PATH: &str = "schema";

/// Key of the object child applied to unknown keys of a non-strict object.
pub const WILDCARD: &str = "*";

/// The shape a validator checks.
#[derive(Clone)]
pub enum Kind {
    Object,
    String,
    Number,
    Boolean,
    Date,
    Array,
    Email,
    Any,
    Custom(CustomKind),
}

/// A validator kind resolved from a [`ValidatorRegistry`].
#[derive(Clone)]
pub struct CustomKind {
    pub(crate) name: String,
    pub(crate) validator: Arc<dyn CustomValidator>,
}

impl Kind {
    /// Resolve a built-in kind by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "Object" => Some(Self::Object),
            "String" => Some(Self::String),
            "Number" => Some(Self::Number),
            "Boolean" => Some(Self::Boolean),
            "Date" => Some(Self::Date),
            "Array" => Some(Self::Array),
            "Email" => Some(Self::Email),
            "Any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Object => "Object",
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Array => "Array",
            Self::Email => "Email",
            Self::Any => "Any",
            Self::Custom(custom) => &custom.name,
        }
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(custom) => f.debug_tuple("Custom").field(&custom.name).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// A declared object child: `"key"` or `"key as alias"`.
#[derive(Debug, Clone)]
pub struct Field {
    declared: String,
    key: String,
    alias: Option<String>,
    validator: Validator,
}

impl Field {
    pub fn new(declared: impl Into<String>, validator: Validator) -> Self {
        let declared = declared.into();
        let bits: Vec<&str> = declared.split(' ').collect();
        let (key, alias) = match bits.as_slice() {
            [key, "as", alias] => (key.to_string(), Some(alias.to_string())),
            _ => (declared.clone(), None),
        };
        Self {
            declared,
            key,
            alias,
            validator,
        }
    }

    /// The key as written in the schema.
    pub fn declared(&self) -> &str {
        &self.declared
    }

    /// The key matched against input data.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The key written to the output object.
    pub fn output_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.key)
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub(crate) fn is_wildcard(&self) -> bool {
        self.key == WILDCARD
    }
}

/// Child validators of a node.
#[derive(Debug, Clone, Default)]
pub enum Children {
    #[default]
    None,
    /// Candidate element validators, tried in order.
    Array(Vec<Validator>),
    /// Named fields in declaration order.
    Object(Vec<Field>),
}

impl Children {
    pub fn fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Validator)>,
        K: Into<String>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(declared, validator)| Field::new(declared, validator))
                .collect(),
        )
    }

    pub fn items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Validator>,
    {
        Self::Array(items.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) args: Args,
    pub(crate) children: Children,
}

/// An immutable validator node. Cloning is cheap and shares the node.
#[derive(Debug, Clone)]
pub struct Validator {
    node: Arc<Node>,
}

impl Validator {
    /// Build a validator from arguments alone.
    pub fn with_args(kind: Kind, args: Args) -> Self {
        Self::from_node(Node {
            kind,
            args,
            children: Children::None,
        })
    }

    /// Build a validator from child validators alone, with default arguments.
    pub fn with_children(kind: Kind, children: Children) -> Result<Self> {
        Self::new(kind, Args::default(), children)
    }

    /// Build a validator from arguments and child validators.
    ///
    /// Fails when the children do not fit the kind: fields belong to
    /// `Object`, items to `Array`, and scalar kinds take none.
    pub fn new(kind: Kind, args: Args, children: Children) -> Result<Self> {
        let fits = match (&kind, &children) {
            (_, Children::None) => true,
            (Kind::Object, Children::Object(_)) => true,
            (Kind::Array, Children::Array(_)) => true,
            (Kind::Custom(_), _) => true,
            _ => false,
        };
        if !fits {
            return Err(SchemaError::Malformed(format!(
                "{} does not take {} children",
                kind.name(),
                match children {
                    Children::Array(_) => "item",
                    _ => "field",
                }
            )));
        }
        Ok(Self::from_node(Node {
            kind,
            args,
            children,
        }))
    }

    /// Build a validator by kind name, resolving built-ins first and then the
    /// installed process-wide registry.
    pub fn named(name: &str, args: Args) -> Result<Self> {
        if let Some(kind) = Kind::builtin(name) {
            return Ok(Self::with_args(kind, args));
        }
        match ValidatorRegistry::global() {
            Some(registry) => registry.validator(name, args),
            None => Err(SchemaError::UnknownValidator(name.to_string())),
        }
    }

    /// Build a custom validator from the installed process-wide registry.
    pub fn custom(name: &str, args: Args) -> Result<Self> {
        let registry = ValidatorRegistry::global()
            .ok_or_else(|| SchemaError::UnknownValidator(name.to_string()))?;
        if Kind::builtin(name).is_some() || !registry.contains(name) {
            return Err(SchemaError::UnknownValidator(name.to_string()));
        }
        registry.validator(name, args)
    }

    fn from_node(node: Node) -> Self {
        Self {
            node: Arc::new(node),
        }
    }

    fn map_args(mut self, apply: impl FnOnce(&mut Args)) -> Self {
        apply(&mut Arc::make_mut(&mut self.node).args);
        self
    }

    /// Mark the value optional.
    pub fn opt(self) -> Self {
        self.map_args(|args| args.opt = true)
    }

    pub fn min(self, min: impl Into<Value>) -> Self {
        let min = min.into();
        self.map_args(|args| args.min = Some(min))
    }

    pub fn max(self, max: impl Into<Value>) -> Self {
        let max = max.into();
        self.map_args(|args| args.max = Some(max))
    }

    /// Restrict a string to a fixed set of values.
    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.map_args(|args| args.one_of = Some(values))
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.map_args(|args| args.default = Some(value))
    }

    pub fn strict(self, strict: bool) -> Self {
        self.map_args(|args| args.strict = Some(strict))
    }

    pub fn normalize(self, normalize: bool) -> Self {
        self.map_args(|args| args.normalize = Some(normalize))
    }

    pub fn kind(&self) -> &Kind {
        &self.node.kind
    }

    pub fn args(&self) -> &Args {
        &self.node.args
    }

    pub fn children(&self) -> &Children {
        &self.node.children
    }

    /// Validate a top-level value, reporting failures under the `schema` path.
    pub fn validate(&self, data: &Value) -> Result<Value> {
        self.validate_at(data, ROOT_PATH)
    }

    /// Validate a top-level value, reporting failures under `path`.
    ///
    /// An optional validator given `null` yields `null`.
    pub fn validate_at(&self, data: &Value, path: &str) -> Result<Value> {
        match self.parse(data, path)? {
            Parsed::Value(value) => Ok(value),
            Parsed::Delete => Ok(Value::Null),
        }
    }

    pub(crate) fn parse(&self, data: &Value, path: &str) -> Result<Parsed> {
        parsers::parse(&self.node, data, path)
    }

    /// Describe the validator as a JSON document.
    pub fn document(&self) -> Result<Value> {
        let node = &self.node;
        let mut doc = Map::new();
        doc.insert("type".to_string(), Value::String(node.kind.name().to_string()));
        node.args.describe(&mut doc);

        if let Kind::Custom(custom) = &node.kind {
            match custom.validator.document(&node.args) {
                Some(Value::Object(extra)) => doc.extend(extra),
                Some(other) => {
                    doc.insert("doc".to_string(), other);
                }
                None => return Err(SchemaError::NotDocumentable(custom.name.clone())),
            }
        }

        match &node.children {
            Children::None => {}
            Children::Array(items) => {
                let items = items
                    .iter()
                    .map(Validator::document)
                    .collect::<Result<Vec<_>>>()?;
                doc.insert("items".to_string(), Value::Array(items));
            }
            Children::Object(fields) => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.declared.clone(), field.validator.document()?);
                }
                doc.insert("properties".to_string(), Value::Object(properties));
            }
        }

        Ok(Value::Object(doc))
    }
}

/// Result of parsing one value: either a value or a request to drop the
/// enclosing object key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Parsed {
    Value(Value),
    Delete,
}

/// `Object` validator over the given fields.
pub fn object<I, K>(fields: I) -> Validator
where
    I: IntoIterator<Item = (K, Validator)>,
    K: Into<String>,
{
    Validator::from_node(Node {
        kind: Kind::Object,
        args: Args::default(),
        children: Children::fields(fields),
    })
}

/// `Array` validator whose elements must match one of `items`.
pub fn array<I>(items: I) -> Validator
where
    I: IntoIterator<Item = Validator>,
{
    Validator::from_node(Node {
        kind: Kind::Array,
        args: Args::default(),
        children: Children::items(items),
    })
}

pub fn string() -> Validator {
    Validator::with_args(Kind::String, Args::default())
}

pub fn number() -> Validator {
    Validator::with_args(Kind::Number, Args::default())
}

pub fn boolean() -> Validator {
    Validator::with_args(Kind::Boolean, Args::default())
}

pub fn date() -> Validator {
    Validator::with_args(Kind::Date, Args::default())
}

pub fn email() -> Validator {
    Validator::with_args(Kind::Email, Args::default())
}

pub fn any() -> Validator {
    Validator::with_args(Kind::Any, Args::default())
}
