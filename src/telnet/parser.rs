//! Parsers for the debug console's semi-structured text output
//!
//! Every function here is pure: raw response text in, typed data or a
//! typed failure out. The console has no framing, so these all lean on
//! the textual shapes it is known to emit. Patterns are compiled once
//! and keep the original anchoring and case-insensitivity; in particular
//! the prompt banner is only recognized at the end of the buffer with
//! trailing whitespace.

use std::sync::OnceLock;

use regex::Regex;

use crate::common::{Error, Result};
use crate::telnet::types::{EvaluateContainer, HighLevelType, PrimitiveType, StackFrame, Thread};

/// Idle-prompt banner, anchored at end-of-buffer with trailing whitespace
fn prompt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)brightscript\s+debugger>\s+$").unwrap())
}

/// Everything printed before the next prompt banner
fn expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\s\S]+?)(?:\r|\r\n)+brightscript debugger>").unwrap())
}

fn compile_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)compile error.* in (.*)\((\d+)\)").unwrap())
}

fn stack_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)#(\d+)\s+(?:function|sub)\s+(\w+).*\s+file/line:\s+(.*)\((\d+)\)")
            .unwrap()
    })
}

fn thread_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(\d+)(\*)?\s+(.*)\((\d+)\)\s+(.*)$").unwrap())
}

/// Angle-bracket type annotation on a dump line, e.g. `<Component: roArray>`
fn node_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<.*:\s+(\w*)>").unwrap())
}

/// `name: value` entry of an object dump
fn object_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\w+):(.+)").unwrap())
}

/// Whether the accumulated buffer currently ends with the idle prompt.
///
/// A prompt-shaped substring in the middle of real output is
/// indistinguishable from the true idle boundary; known limitation.
pub fn ends_with_prompt(text: &str) -> bool {
    prompt_re().is_match(text)
}

/// Extract the output a command printed before the next prompt banner
pub fn capture_expression_output(text: &str) -> Option<&str> {
    expression_re()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scan free-form console output for a compile error, returning the
/// offending path and line number
pub fn parse_compile_error(text: &str) -> Option<(String, u32)> {
    let caps = compile_error_re().captures(text)?;
    let path = caps.get(1)?.as_str().to_string();
    let line = caps.get(2)?.as_str().parse().ok()?;
    Some((path, line))
}

/// Parse the output of `bt` into stack frames
///
/// Frames keep the console's emission order (innermost first). Text with
/// no frame records yields an empty list, not an error.
pub fn parse_stack_trace(text: &str) -> Vec<StackFrame> {
    stack_frame_re()
        .captures_iter(text)
        .filter_map(|caps| {
            Some(StackFrame {
                frame_id: caps.get(1)?.as_str().parse().ok()?,
                function_identifier: caps.get(2)?.as_str().to_string(),
                file_path: caps.get(3)?.as_str().to_string(),
                line_number: caps.get(4)?.as_str().parse().ok()?,
            })
        })
        .collect()
}

/// Parse the output of `threads` into a thread list
///
/// The console marks the selected thread's id with a trailing `*`; that
/// thread is stable-sorted to the front of the result.
pub fn parse_threads(text: &str) -> Vec<Thread> {
    let mut threads: Vec<Thread> = thread_re()
        .captures_iter(text)
        .filter_map(|caps| {
            Some(Thread {
                thread_id: caps.get(1)?.as_str().parse().ok()?,
                is_selected: caps.get(2).is_some(),
                file_path: caps.get(3)?.as_str().to_string(),
                line_number: caps.get(4)?.as_str().parse().ok()?,
                line_contents: caps.get(5)?.as_str().trim_end().to_string(),
            })
        })
        .collect();

    threads.sort_by_key(|t| !t.is_selected);
    threads
}

/// Classify a reported type name into its coarse category
pub fn high_level_type(type_name: &str) -> HighLevelType {
    const PRIMITIVE_TYPES: [&str; 7] = [
        "boolean",
        "integer",
        "longinteger",
        "float",
        "double",
        "string",
        "invalid",
    ];

    let lower = type_name.to_lowercase();
    if PRIMITIVE_TYPES.contains(&lower.as_str()) {
        HighLevelType::Primitive
    } else if lower == "roarray" {
        HighLevelType::Array
    } else if lower == "function" {
        HighLevelType::Function
    } else {
        HighLevelType::Object
    }
}

/// Infer a primitive type from a bare value's textual shape
///
/// Note the last two branches: a value containing a decimal point
/// classifies as Integer and plain digits as Float. Counterintuitive,
/// but downstream consumers rely on this exact classification; pinned
/// by tests.
pub fn primitive_type_from_value(value: &str) -> PrimitiveType {
    let lower = value.to_lowercase();
    if lower.is_empty() || lower == "invalid" {
        PrimitiveType::Invalid
    } else if lower == "true" || lower == "false" {
        PrimitiveType::Boolean
    } else if lower.contains('"') {
        PrimitiveType::String
    } else if lower.contains('.') {
        PrimitiveType::Integer
    } else {
        PrimitiveType::Float
    }
}

/// Build a child container for one dump line that carries an angle-bracket
/// type annotation; `None` when the line is a bare value.
fn annotated_child(line: &str) -> Option<(String, HighLevelType)> {
    let caps = node_type_re().captures(line)?;
    let type_name = caps.get(1)?.as_str().to_string();
    let high = high_level_type(&type_name);
    Some((type_name, high))
}

/// Parse the `{ ... }` body of an object dump into child containers
///
/// The dump's contents start on the third line; scanning stops at the
/// closing `}`. A dump that never closes is a parse failure.
pub fn parse_object_children(expression: &str, data: &str) -> Result<Vec<EvaluateContainer>> {
    let mut children = Vec::new();

    for line in data.lines().skip(2) {
        let line = line.trim();
        if line == "}" {
            return Ok(children);
        }

        let caps = object_entry_re().captures(line).ok_or_else(|| {
            Error::MalformedDumpLine {
                kind: "object",
                line: line.to_string(),
            }
        })?;
        let name = caps[1].trim().to_string();
        let value = caps[2].trim().to_string();
        let evaluate_name = format!("{expression}.{name}");

        let child = if let Some((type_name, high)) = annotated_child(line) {
            EvaluateContainer {
                name,
                evaluate_name,
                value: type_name.clone(),
                type_name,
                high_level_type: high,
                children: Vec::new(),
            }
        } else {
            EvaluateContainer {
                name,
                evaluate_name,
                type_name: primitive_type_from_value(line).to_string(),
                value,
                high_level_type: HighLevelType::Primitive,
                children: Vec::new(),
            }
        };
        children.push(child);
    }

    Err(Error::unterminated_dump("object", expression, '}'))
}

/// Parse the `[ ... ]` body of an array dump into child containers
///
/// Children are named by zero-based index with an index-qualified
/// `evaluate_name`. A dump that never closes is a parse failure.
pub fn parse_array_children(expression: &str, data: &str) -> Result<Vec<EvaluateContainer>> {
    let mut children = Vec::new();
    let mut index = 0usize;

    for line in data.lines().skip(2) {
        let line = line.trim();
        if line == "]" {
            return Ok(children);
        }

        let name = index.to_string();
        let evaluate_name = format!("{expression}[{index}]");

        let child = if let Some((type_name, high)) = annotated_child(line) {
            EvaluateContainer {
                name,
                evaluate_name,
                value: type_name.clone(),
                type_name,
                high_level_type: high,
                children: Vec::new(),
            }
        } else {
            EvaluateContainer {
                name,
                evaluate_name,
                type_name: primitive_type_from_value(line).to_string(),
                value: line.to_string(),
                high_level_type: HighLevelType::Primitive,
                children: Vec::new(),
            }
        };
        children.push(child);
        index += 1;
    }

    Err(Error::unterminated_dump("array", expression, ']'))
}
