//! The XPath subset understood by value references.
//!
//! Supported: relative location paths made of `/`-separated child steps
//! (`name`, `prefix:name`), an optional 1-based positional predicate on a
//! child step (`name[2]`), a final attribute step (`@gml:id`) and the
//! context step `.`. Everything else (absolute paths, `//`, axes, wildcards,
//! general predicates, functions) is rejected with
//! [`ErrorKind::InvalidPath`].

use std::collections::BTreeMap;

use crate::common::QualifiedName;
use crate::errors::{ErrorKind, GeoFilterError, GeoFilterResult};

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn is_ncname(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_name_start(c) => chars.all(is_name_char),
        _ => false,
    }
}

/// One step of a parsed property path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `.`
    Context,
    /// `name` or `name[position]`, position is 1-based
    Child {
        name: QualifiedName,
        position: Option<usize>,
    },
    /// `@name`, only valid as the last step
    Attribute(QualifiedName),
}

/// Resolves `prefix:local` (or `local`) against the namespace bindings.
///
/// Returns `None` if the text is not a qualified name. An unbound prefix is
/// kept on the name without a namespace.
pub(crate) fn parse_qname(text: &str, bindings: &BTreeMap<String, String>) -> Option<QualifiedName> {
    let text = text.trim();
    let (prefix, local) = match text.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, text),
    };
    if !is_ncname(local) || !prefix.map(is_ncname).unwrap_or(true) {
        return None;
    }
    match prefix {
        Some(prefix) => {
            let namespace = bindings.get(prefix).map(String::as_str);
            Some(QualifiedName::new(namespace, local, Some(prefix)))
        }
        None => {
            // the default namespace is bound to the empty prefix
            let namespace = bindings.get("").map(String::as_str);
            Some(QualifiedName::new(namespace, local, None))
        }
    }
}

fn invalid(text: &str, reason: &str) -> GeoFilterError {
    log::error!("Unsupported property path '{}': {}", text, reason);
    GeoFilterError::new(
        &format!("Unsupported property path '{}': {}", text, reason),
        ErrorKind::InvalidPath,
    )
}

/// Parses `text` into steps.
pub(crate) fn parse_path(
    text: &str,
    bindings: &BTreeMap<String, String>,
) -> GeoFilterResult<Vec<PathStep>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid(text, "empty path"));
    }
    if trimmed.starts_with('/') {
        return Err(invalid(text, "absolute paths are not supported"));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    let last = segments.len() - 1;
    let mut steps = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(invalid(text, "empty step"));
        }
        if segment == "." {
            steps.push(PathStep::Context);
            continue;
        }
        if let Some(attribute) = segment.strip_prefix('@') {
            if i != last {
                return Err(invalid(text, "attribute step must be the last step"));
            }
            let name = parse_qname(attribute, bindings)
                .ok_or_else(|| invalid(text, "malformed attribute name"))?;
            steps.push(PathStep::Attribute(name));
            continue;
        }

        let (name_text, predicate) = match segment.split_once('[') {
            Some((name, rest)) => {
                let predicate = rest
                    .strip_suffix(']')
                    .ok_or_else(|| invalid(text, "unterminated predicate"))?;
                (name, Some(predicate.trim()))
            }
            None => (segment, None),
        };
        let name = parse_qname(name_text, bindings)
            .ok_or_else(|| invalid(text, "malformed step name"))?;
        let position = match predicate {
            Some(predicate) => {
                let position: usize = predicate
                    .parse()
                    .map_err(|_| invalid(text, "only positional predicates are supported"))?;
                if position == 0 {
                    return Err(invalid(text, "positions start at 1"));
                }
                Some(position)
            }
            None => None,
        };
        steps.push(PathStep::Child { name, position });
    }
    Ok(steps)
}
