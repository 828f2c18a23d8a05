//! Value encoding for metric rows
//!
//! Every metric is stored as two strings: a dotted namespace key and a
//! textual value. Metric payloads arrive as self-describing JSON values,
//! which are first classified into the closed [`MetricValue`] enum and then
//! rendered.
//!
//! ## Rendering rules
//!
//! - Integers use their decimal formatting
//! - Floats use the shortest digits that round-trip, switching to exponent
//!   form (`1e-07`, `1.5e+300`) below `1e-4` and from `1e6` on
//! - Booleans become `"1"` / `"0"`
//! - Strings are stored unchanged
//! - Homogeneous numeric or string arrays are joined with `", "` (no brackets, no quotes)
//!
//! Everything else (maps, nulls, nested or mixed arrays, boolean arrays) is
//! rejected with [`UnsupportedType`].

use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::NamespaceElement;

/// Separator between elements of an array value
pub const VALUE_SEPARATOR: &str = ", ";

/// Separator between namespace segments
pub const NAMESPACE_SEPARATOR: &str = ".";

/// Decimal exponents in `[FLOAT_MIN_EXP, FLOAT_MAX_EXP)` are written out in full
const FLOAT_MIN_EXP: i32 = -4;
const FLOAT_MAX_EXP: i32 = 6;

const SUPPORTED_TYPES: &str = "bool, int, uint, float, string, []int, []uint, []float, []string";

/// A metric value rejected by the encoder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unsupported type {type_name} (currently supported data types: {})",
    SUPPORTED_TYPES
)]
pub struct UnsupportedType {
    /// Runtime type name of the offending value (e.g. `map`, `array<mixed>`)
    pub type_name: String,
}

impl UnsupportedType {
    fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

/// The closed set of value shapes that can be stored
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    IntSeq(Vec<i64>),
    UIntSeq(Vec<u64>),
    FloatSeq(Vec<f64>),
    StrSeq(Vec<String>),
}

impl MetricValue {
    /// Render the value the way it is written to `value_column`
    pub fn encode(&self) -> String {
        match self {
            MetricValue::Int(v) => v.to_string(),
            MetricValue::UInt(v) => v.to_string(),
            MetricValue::Float(v) => format_float(*v),
            MetricValue::Bool(true) => "1".to_string(),
            MetricValue::Bool(false) => "0".to_string(),
            MetricValue::Str(s) => s.clone(),
            MetricValue::IntSeq(values) => join(values),
            MetricValue::UIntSeq(values) => join(values),
            MetricValue::FloatSeq(values) => values
                .iter()
                .map(|v| format_float(*v))
                .collect::<Vec<_>>()
                .join(VALUE_SEPARATOR),
            MetricValue::StrSeq(values) => values.join(VALUE_SEPARATOR),
        }
    }

    /// Short name of the variant
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Int(_) => "int",
            MetricValue::UInt(_) => "uint",
            MetricValue::Float(_) => "float",
            MetricValue::Bool(_) => "bool",
            MetricValue::Str(_) => "string",
            MetricValue::IntSeq(_) => "[]int",
            MetricValue::UIntSeq(_) => "[]uint",
            MetricValue::FloatSeq(_) => "[]float",
            MetricValue::StrSeq(_) => "[]string",
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Shortest round-trip rendering of a float
///
/// Large and small magnitudes use exponent form with a signed, at least
/// two-digit exponent, which also keeps every finite value well below the
/// width of `value_column`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return value.to_string();
    }

    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (FLOAT_MIN_EXP..FLOAT_MAX_EXP).contains(&exponent) {
        value.to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(VALUE_SEPARATOR)
}

impl TryFrom<&Value> for MetricValue {
    type Error = UnsupportedType;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Err(UnsupportedType::new("null")),
            Value::Bool(b) => Ok(MetricValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(MetricValue::Int(v))
                } else if let Some(v) = n.as_u64() {
                    Ok(MetricValue::UInt(v))
                } else {
                    n.as_f64()
                        .map(MetricValue::Float)
                        .ok_or_else(|| UnsupportedType::new("number"))
                }
            }
            Value::String(s) => Ok(MetricValue::Str(s.clone())),
            Value::Array(items) => classify_array(items),
            Value::Object(_) => Err(UnsupportedType::new("map")),
        }
    }
}

/// Classify a JSON array into one of the homogeneous sequence variants
fn classify_array(items: &[Value]) -> Result<MetricValue, UnsupportedType> {
    if items.iter().all(Value::is_string) {
        // also covers the empty array
        let strings = items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect();
        return Ok(MetricValue::StrSeq(strings));
    }

    if items.iter().all(Value::is_number) {
        if let Some(ints) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
            return Ok(MetricValue::IntSeq(ints));
        }
        if let Some(uints) = items.iter().map(Value::as_u64).collect::<Option<Vec<_>>>() {
            return Ok(MetricValue::UIntSeq(uints));
        }
        if let Some(floats) = items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
            return Ok(MetricValue::FloatSeq(floats));
        }
    }

    let element = if items.iter().all(Value::is_boolean) {
        "bool"
    } else if items.iter().all(Value::is_array) {
        "array"
    } else if items.iter().all(Value::is_object) {
        "map"
    } else if items.iter().all(Value::is_null) {
        "null"
    } else {
        "mixed"
    };
    Err(UnsupportedType::new(format!("array<{element}>")))
}

/// Encode a dynamically typed metric value into its stored string form
pub fn encode(value: &Value) -> Result<String, UnsupportedType> {
    MetricValue::try_from(value).map(|v| {
        trace!(kind = v.type_name(), "encoding value");
        v.encode()
    })
}

/// Join namespace segments with `.`
pub fn encode_namespace<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(NAMESPACE_SEPARATOR)
}

/// Join the values of namespace elements with `.`
pub fn namespace_key(namespace: &[NamespaceElement]) -> String {
    encode_namespace(
        &namespace
            .iter()
            .map(|element| element.value.as_str())
            .collect::<Vec<_>>(),
    )
}
