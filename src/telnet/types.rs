//! Typed entities parsed out of the debug console's textual output
//!
//! All of these are plain value types with no back-reference to the
//! pipeline; they serialize to JSON for machine-readable CLI output.

use serde::Serialize;

/// A single frame of a backtrace, innermost first as the console emits them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub frame_id: i64,
    pub function_identifier: String,
    pub file_path: String,
    pub line_number: u32,
}

/// One entry of the `threads` listing
///
/// The selected thread (marked with `*` by the console) is sorted to the
/// front of the returned list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub thread_id: i64,
    pub is_selected: bool,
    pub file_path: String,
    pub line_number: u32,
    pub line_contents: String,
}

/// Coarse classification of an evaluated value, derived from its reported
/// type name; decides whether the value gets recursive child expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighLevelType {
    Primitive,
    Array,
    Function,
    Object,
}

impl std::fmt::Display for HighLevelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive => write!(f, "primitive"),
            Self::Array => write!(f, "array"),
            Self::Function => write!(f, "function"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Primitive type inferred from a value's textual shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimitiveType {
    Invalid,
    Boolean,
    String,
    Integer,
    Float,
}

impl PrimitiveType {
    /// Type name as reported in an [`EvaluateContainer`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Boolean => "Boolean",
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Float => "Float",
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of evaluating an expression on the device
///
/// A recursive tree: `children` holds the entries of an object or array
/// dump. Each child carries an `evaluate_name` path (`expr.field` or
/// `expr[index]`) so callers can expand it with another evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateContainer {
    pub name: String,
    pub evaluate_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub high_level_type: HighLevelType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EvaluateContainer>,
}
