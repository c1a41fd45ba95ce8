use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::args::Args;
use crate::email::is_email;
use crate::error::{Result, SchemaError};
use crate::validator::{Children, Field, Kind, Node, Parsed};

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(crate) fn parse(node: &Node, data: &Value, path: &str) -> Result<Parsed> {
    if data.is_null() {
        if node.args.opt {
            return Ok(Parsed::Delete);
        }
        return Err(SchemaError::invalid(required_message(&node.kind)));
    }

    let value = match &node.kind {
        Kind::Object => return parse_object(node, data, path),
        Kind::Array => parse_array(node, data, path)?,
        Kind::String => parse_string(&node.args, data)?,
        Kind::Number => parse_number(&node.args, data)?,
        Kind::Boolean => Value::Bool(is_truthy(data)),
        Kind::Date => parse_date(&node.args, data)?,
        Kind::Email => parse_email(&node.args, data)?,
        Kind::Any => data.clone(),
        Kind::Custom(custom) => custom.validator.parse(&node.args, data, path)?,
    };
    Ok(Parsed::Value(value))
}

fn required_message(kind: &Kind) -> String {
    match kind {
        Kind::Email => "required Email address".to_string(),
        Kind::Any => "required value".to_string(),
        other => format!("required {}", other.name()),
    }
}

fn parse_object(node: &Node, data: &Value, path: &str) -> Result<Parsed> {
    let input = data.as_object().ok_or_else(|| {
        SchemaError::invalid(format!("must be an object, received {}", type_name(data)))
    })?;
    let fields: &[Field] = match &node.children {
        Children::Object(fields) => fields,
        _ => &[],
    };
    let strict = node.args.is_strict();
    let wildcard = fields.iter().find(|field| field.is_wildcard());

    let mut out = Map::new();
    let mut seen = HashSet::new();

    for (key, value) in input {
        seen.insert(key.as_str());
        match lookup(fields, key) {
            Some(field) => {
                let value = match (&field.validator().args().default, value) {
                    (Some(default), Value::Null) => default,
                    _ => value,
                };
                parse_field(&mut out, field.output_key(), field, value, path)?;
            }
            None if strict => {
                return Err(SchemaError::invalid(format!(
                    "{key} is not specified in {path}"
                )));
            }
            None => match wildcard {
                Some(star) => {
                    let child_path = format!("{path}.{}", star.key());
                    let parsed = star
                        .validator()
                        .parse(value, &child_path)
                        .map_err(|err| wrap_child(&child_path, err))?;
                    store(&mut out, key, parsed);
                }
                None => {
                    out.insert(key.clone(), value.clone());
                }
            },
        }
    }

    for field in fields {
        if field.is_wildcard() || seen.contains(field.key()) {
            continue;
        }
        let missing = field
            .validator()
            .args()
            .default
            .clone()
            .unwrap_or(Value::Null);
        parse_field(&mut out, field.output_key(), field, &missing, path)?;
    }

    Ok(Parsed::Value(Value::Object(out)))
}

fn lookup<'a>(fields: &'a [Field], key: &str) -> Option<&'a Field> {
    fields
        .iter()
        .find(|field| !field.is_wildcard() && field.key() == key)
}

fn parse_field(
    out: &mut Map<String, Value>,
    output_key: &str,
    field: &Field,
    value: &Value,
    path: &str,
) -> Result<()> {
    let child_path = format!("{path}.{output_key}");
    let parsed = field
        .validator()
        .parse(value, &child_path)
        .map_err(|err| wrap_child(&child_path, err))?;
    store(out, output_key, parsed);
    Ok(())
}

fn store(out: &mut Map<String, Value>, key: &str, parsed: Parsed) {
    match parsed {
        Parsed::Value(value) => {
            out.insert(key.to_string(), value);
        }
        Parsed::Delete => {
            out.remove(key);
        }
    }
}

fn wrap_child(child_path: &str, err: SchemaError) -> SchemaError {
    match err {
        SchemaError::Invalid(message) => {
            SchemaError::invalid(format!("Failed to parse {child_path}: {message}"))
        }
        other => other,
    }
}

fn parse_array(node: &Node, data: &Value, path: &str) -> Result<Value> {
    let elements = data.as_array().ok_or_else(|| {
        SchemaError::invalid(format!("required Array, received {}", type_name(data)))
    })?;
    let items: &[crate::Validator] = match &node.children {
        Children::Array(items) => items,
        _ => &[],
    };

    let mut out = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        let element_path = format!("{path}[{index}]");
        let matched = items
            .iter()
            .find_map(|item| item.parse(element, &element_path).ok());
        match matched {
            Some(Parsed::Value(value)) => out.push(value),
            Some(Parsed::Delete) => out.push(Value::Null),
            None => {
                return Err(SchemaError::invalid(format!(
                    "No matching validator for {element_path}"
                )));
            }
        }
    }
    Ok(Value::Array(out))
}

fn parse_string(args: &Args, data: &Value) -> Result<Value> {
    let text = data.as_str().ok_or_else(|| {
        SchemaError::invalid(format!(
            "required String, received {}, {data}",
            type_name(data)
        ))
    })?;
    let length = text.chars().count() as f64;

    if let Some(min) = numeric_bound(&args.min, "min")? {
        if length < min {
            return Err(SchemaError::invalid(format!(
                "string length must be at least {min}"
            )));
        }
    }
    if let Some(max) = numeric_bound(&args.max, "max")? {
        if length > max {
            return Err(SchemaError::invalid(format!(
                "string length must be less than or equal to {max}"
            )));
        }
    }
    if let Some(allowed) = &args.one_of {
        if !allowed.iter().any(|candidate| candidate.as_str() == Some(text)) {
            let listed: Vec<String> = allowed
                .iter()
                .map(|candidate| match candidate {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect();
            return Err(SchemaError::invalid(format!(
                "string does not match enum: {}",
                listed.join(",")
            )));
        }
    }
    Ok(data.clone())
}

fn parse_number(args: &Args, data: &Value) -> Result<Value> {
    let number = to_number(data).ok_or_else(|| {
        SchemaError::invalid(format!("required Number, received {}", type_name(data)))
    })?;

    if let Some(min) = numeric_bound(&args.min, "min")? {
        if number < min {
            return Err(SchemaError::invalid(format!(
                "must be greater than or equal to {min}"
            )));
        }
    }
    if let Some(max) = numeric_bound(&args.max, "max")? {
        if number > max {
            return Err(SchemaError::invalid(format!(
                "must be less than or equal to {max}"
            )));
        }
    }
    Ok(number_value(number))
}

fn parse_date(args: &Args, data: &Value) -> Result<Value> {
    let date = to_date(data).ok_or_else(|| {
        SchemaError::invalid(format!(
            "required date or Date compatible string, received ({}) {data}",
            type_name(data)
        ))
    })?;

    if let Some(min) = date_bound(&args.min, "min")? {
        if date.timestamp_millis() < min.timestamp_millis() {
            return Err(SchemaError::invalid(format!(
                "must be on or after {}",
                format_date(&min)
            )));
        }
    }
    if let Some(max) = date_bound(&args.max, "max")? {
        if date.timestamp_millis() > max.timestamp_millis() {
            return Err(SchemaError::invalid(format!(
                "must be less than or equal to {}",
                format_date(&max)
            )));
        }
    }
    Ok(Value::String(format_date(&date)))
}

fn parse_email(args: &Args, data: &Value) -> Result<Value> {
    let text = data.as_str().ok_or_else(|| {
        SchemaError::invalid(format!(
            "required String Email, received {}, {data}",
            type_name(data)
        ))
    })?;
    let mut address = text.trim().to_string();
    if args.is_normalizing() {
        address = address.to_lowercase();
    }
    if !is_email(&address) {
        return Err(SchemaError::invalid(format!("Invalid Email: {address}")));
    }
    Ok(Value::String(address))
}

/// Numeric cast: numbers pass, booleans map to 0/1, strings are trimmed and
/// parsed (an empty string is 0). Anything else, or a non-finite result, is
/// not a number.
pub(crate) fn to_number(data: &Value) -> Option<f64> {
    let number = match data {
        Value::Number(number) => number.as_f64()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().ok()?
            }
        }
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Value::from(number as i64);
    }
    Number::from_f64(number).map_or(Value::Null, Value::Number)
}

fn numeric_bound(bound: &Option<Value>, name: &str) -> Result<Option<f64>> {
    match bound {
        None => Ok(None),
        Some(value) => to_number(value)
            .map(Some)
            .ok_or_else(|| SchemaError::Malformed(format!("{name} bound {value} is not a number"))),
    }
}

fn date_bound(bound: &Option<Value>, name: &str) -> Result<Option<DateTime<Utc>>> {
    match bound {
        None => Ok(None),
        Some(value) => to_date(value)
            .map(Some)
            .ok_or_else(|| SchemaError::Malformed(format!("{name} bound {value} is not a date"))),
    }
}

/// Date construction from epoch milliseconds or a date string.
pub(crate) fn to_date(data: &Value) -> Option<DateTime<Utc>> {
    match data {
        Value::Number(number) => {
            let millis = number.as_f64()?;
            if !millis.is_finite() {
                return None;
            }
            DateTime::from_timestamp_millis(millis.trunc() as i64)
        }
        Value::String(text) => parse_date_str(text.trim()),
        _ => None,
    }
}

fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn is_truthy(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn type_name(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
