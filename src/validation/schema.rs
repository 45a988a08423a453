//! Declarative parameter shapes and the validator that applies them
use super::error::{FailureReason, FieldError, ValidationError};
use super::raw::RawParameters;
use bon::Builder;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use std::marker::PhantomData;

/// The declared type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    /// A signed 64-bit integer. Numeric strings are parsed.
    Integer,
    /// A finite float. Numeric strings are parsed.
    Float,
    /// `true`/`false`, or one of the strings `true`, `false`, `1`, `0`.
    Boolean,
    /// A string drawn from a fixed set of values.
    Enum(Vec<&'static str>),
    /// A list of values. A single value is accepted as a one-element list.
    Array(Box<FieldType>),
    /// A nested set of fields.
    Object(Shape),
}

impl FieldType {
    pub fn array_of(element: FieldType) -> Self {
        FieldType::Array(Box::new(element))
    }

    fn name(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array(_) => "array",
            FieldType::Object(_) => "object",
        }
    }
}

/// Whether a field has to be supplied.
#[derive(Debug, Clone, Default)]
pub enum Presence {
    #[default]
    Required,
    /// Absent values become `null`.
    Optional,
    /// Absent values take this value.
    Default(Value),
}

/// A constraint checked once the field has the declared type.
#[derive(Debug, Clone)]
pub enum Refinement {
    /// Minimum characters for strings, minimum items for arrays.
    MinLength(usize),
    /// Maximum characters for strings, maximum items for arrays.
    MaxLength(usize),
    /// Lower bound for numbers. On arrays it applies to every element.
    Min(f64),
    /// Upper bound for numbers. On arrays it applies to every element.
    Max(f64),
    /// The whole string must match. Anchor the expression if partial matches are not wanted.
    /// On arrays it applies to every element.
    Pattern(Regex),
    /// Strings must contain a non-whitespace character, arrays at least one item.
    NonEmpty,
}

impl Refinement {
    fn name(&self) -> &'static str {
        match self {
            Refinement::MinLength(_) => "min_length",
            Refinement::MaxLength(_) => "max_length",
            Refinement::Min(_) => "min",
            Refinement::Max(_) => "max",
            Refinement::Pattern(_) => "pattern",
            Refinement::NonEmpty => "non_empty",
        }
    }

    fn applies_to_elements(&self) -> bool {
        matches!(self, Refinement::Min(_) | Refinement::Max(_) | Refinement::Pattern(_))
    }
}

/// A single declared field.
#[derive(Debug, Clone, Builder)]
pub struct Field {
    #[builder(into)]
    name: String,
    ty: FieldType,
    #[builder(default)]
    presence: Presence,
    #[builder(default)]
    refinements: Vec<Refinement>,
}

impl Field {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Field::builder().name(name).ty(ty).build()
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Field::builder()
            .name(name)
            .ty(ty)
            .presence(Presence::Optional)
            .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn refinements(&self) -> &[Refinement] {
        &self.refinements
    }
}

/// An ordered set of fields, either open (extra keys ignored) or closed (extra keys rejected).
#[derive(Debug, Clone, Default)]
pub struct Shape {
    fields: Vec<Field>,
    closed: bool,
}

impl Shape {
    pub fn open() -> Self {
        Self {
            fields: Vec::new(),
            closed: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            fields: Vec::new(),
            closed: true,
        }
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// The describe/validate capability pair every parameter schema offers.
pub trait ParameterSchema {
    type Output;

    /// The declared shape, for documentation and error reporting.
    fn describe(&self) -> &Shape;

    /// Parses `raw` into `Output`, reporting every failing field.
    fn validate(&self, raw: &RawParameters) -> Result<Self::Output, ValidationError>;
}

/// A shape bound to the Rust type it produces.
///
/// The coerced parameters are deserialized into `T` with serde, so `T`'s field names must match
/// the shape's field names.
#[derive(Debug, Clone)]
pub struct Schema<T> {
    shape: Shape,
    _target: PhantomData<fn() -> T>,
}

impl<T> Schema<T> {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            _target: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ParameterSchema for Schema<T> {
    type Output = T;

    fn describe(&self) -> &Shape {
        &self.shape
    }

    fn validate(&self, raw: &RawParameters) -> Result<T, ValidationError> {
        let coerced = coerce(&self.shape, raw)?;
        serde_json::from_value(Value::Object(coerced)).map_err(|e| {
            ValidationError::single(
                "$",
                FailureReason::SchemaMismatch {
                    message: e.to_string(),
                },
            )
        })
    }
}

/// Applies `shape` to `raw` and returns the coerced JSON object.
pub fn coerce(shape: &Shape, raw: &RawParameters) -> Result<Map<String, Value>, ValidationError> {
    let mut errors = Vec::new();
    let output = check_object(shape, "", raw.as_map(), &mut errors);
    match ValidationError::from_errors(errors) {
        Some(error) => Err(error),
        None => Ok(output),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_object(
    shape: &Shape,
    prefix: &str,
    input: &Map<String, Value>,
    errors: &mut Vec<FieldError>,
) -> Map<String, Value> {
    let mut output = Map::new();

    for field in &shape.fields {
        let path = join(prefix, &field.name);
        let value = input.get(&field.name).filter(|v| !v.is_null());
        let checked = match (value, &field.presence) {
            (Some(value), _) => check_field(&path, &field.ty, &field.refinements, value, errors),
            (None, Presence::Required) => {
                errors.push(FieldError::new(path, FailureReason::Missing));
                None
            }
            (None, Presence::Optional) => Some(Value::Null),
            (None, Presence::Default(default)) => Some(default.clone()),
        };
        if let Some(checked) = checked {
            output.insert(field.name.clone(), checked);
        }
    }

    if shape.closed {
        for key in input.keys() {
            if shape.get(key).is_none() {
                errors.push(FieldError::new(join(prefix, key), FailureReason::Unexpected));
            }
        }
    }

    output
}

fn check_field(
    path: &str,
    ty: &FieldType,
    refinements: &[Refinement],
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let before = errors.len();
    let typed = check_type(path, ty, value, errors)?;
    for refinement in refinements {
        apply_refinement(path, refinement, &typed, errors);
    }
    (errors.len() == before).then_some(typed)
}

/// Bounds and patterns on an array constrain each element; lengths constrain the array itself.
fn apply_refinement(
    path: &str,
    refinement: &Refinement,
    value: &Value,
    errors: &mut Vec<FieldError>,
) {
    if let Value::Array(items) = value
        && refinement.applies_to_elements()
    {
        for (i, item) in items.iter().enumerate() {
            apply_refinement(&format!("{path}[{i}]"), refinement, item, errors);
        }
        return;
    }
    if let Err(reason) = refine(refinement, value) {
        errors.push(FieldError::new(path, reason));
    }
}

fn wrong_type(path: &str, ty: &FieldType, value: &Value, errors: &mut Vec<FieldError>) {
    errors.push(FieldError::new(
        path,
        FailureReason::WrongType {
            expected: ty.name(),
            found: kind(value),
        },
    ));
}

fn check_type(
    path: &str,
    ty: &FieldType,
    value: &Value,
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let typed = match (ty, value) {
        (FieldType::String, Value::String(_)) => Some(value.clone()),
        (FieldType::Integer, Value::Number(n)) => n.as_i64().map(Value::from),
        (FieldType::Integer, Value::String(s)) => s.parse::<i64>().ok().map(Value::from),
        (FieldType::Float, Value::Number(n)) => {
            n.as_f64().and_then(Number::from_f64).map(Value::Number)
        }
        (FieldType::Float, Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (FieldType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldType::Enum(allowed), Value::String(s)) => {
            if allowed.contains(&s.as_str()) {
                Some(value.clone())
            } else {
                errors.push(FieldError::new(
                    path,
                    FailureReason::Refinement {
                        message: format!("must be one of: {}", allowed.join(", ")),
                    },
                ));
                return None;
            }
        }
        (FieldType::Array(element), Value::Array(items)) => {
            return check_items(path, element, items, errors);
        }
        (FieldType::Array(element), single) if !matches!(single, Value::Object(_)) => {
            return check_items(path, element, std::slice::from_ref(single), errors);
        }
        (FieldType::Object(shape), Value::Object(map)) => {
            let before = errors.len();
            let output = check_object(shape, path, map, errors);
            return (errors.len() == before).then_some(Value::Object(output));
        }
        _ => None,
    };

    if typed.is_none() {
        wrong_type(path, ty, value, errors);
    }
    typed
}

fn check_items(
    path: &str,
    element: &FieldType,
    items: &[Value],
    errors: &mut Vec<FieldError>,
) -> Option<Value> {
    let before = errors.len();
    let checked: Vec<Value> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| check_type(&format!("{path}[{i}]"), element, item, errors))
        .collect();
    (errors.len() == before).then_some(Value::Array(checked))
}

fn refine(refinement: &Refinement, value: &Value) -> Result<(), FailureReason> {
    let failure = match (refinement, value) {
        (Refinement::MinLength(min), Value::String(s)) => {
            (s.chars().count() < *min).then(|| format!("must be at least {min} characters"))
        }
        (Refinement::MaxLength(max), Value::String(s)) => {
            (s.chars().count() > *max).then(|| format!("must be at most {max} characters"))
        }
        (Refinement::MinLength(min), Value::Array(items)) => {
            (items.len() < *min).then(|| format!("must contain at least {min} items"))
        }
        (Refinement::MaxLength(max), Value::Array(items)) => {
            (items.len() > *max).then(|| format!("must contain at most {max} items"))
        }
        (Refinement::Min(min), Value::Number(n)) => {
            let below = n.as_f64().is_some_and(|n| n < *min);
            below.then(|| format!("must be greater than or equal to {min}"))
        }
        (Refinement::Max(max), Value::Number(n)) => {
            let above = n.as_f64().is_some_and(|n| n > *max);
            above.then(|| format!("must be less than or equal to {max}"))
        }
        (Refinement::Pattern(regex), Value::String(s)) => {
            (!regex.is_match(s)).then(|| format!("must match pattern `{}`", regex.as_str()))
        }
        (Refinement::NonEmpty, Value::String(s)) => {
            s.trim().is_empty().then(|| "must not be empty".to_owned())
        }
        (Refinement::NonEmpty, Value::Array(items)) => {
            items.is_empty().then(|| "must not be empty".to_owned())
        }
        (refinement, value) => {
            return Err(FailureReason::SchemaMismatch {
                message: format!("{} does not apply to a {}", refinement.name(), kind(value)),
            });
        }
    };
    match failure {
        Some(message) => Err(FailureReason::Refinement { message }),
        None => Ok(()),
    }
}
