//! # Shader Interface Reflection
//!
//! The core treats shader source as opaque text, but a device still has to
//! map attribute and uniform names to slots. This module scans WGSL for the
//! pieces of a shader's interface that matter here:
//!
//! - vertex inputs: `@location(n) name: type` parameters of the `@vertex`
//!   function, including members of a struct parameter
//! - uniforms: `@group(0) @binding(n) var<uniform> name: type;`
//!
//! It also performs the cheap structural checks (stage marker present,
//! delimiters balanced) a device runs before handing source to a real
//! compiler.

use crate::gfx::device::ShaderKind;

/// Names and slots exposed by one shader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderInterface {
    /// Vertex inputs as `(name, location)`; empty for fragment shaders
    pub inputs: Vec<(String, u32)>,
    /// Group 0 uniforms as `(name, binding)`
    pub uniforms: Vec<(String, u32)>,
}

impl ShaderInterface {
    pub fn input(&self, name: &str) -> Option<u32> {
        self.inputs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, loc)| *loc)
    }

    pub fn uniform(&self, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, binding)| *binding)
    }
}

/// Checks `source` structurally and extracts its interface.
///
/// The error string is a compiler-style diagnostic (`line N: ...`).
pub fn reflect(kind: ShaderKind, source: &str) -> Result<ShaderInterface, String> {
    let code = strip_comments(source);
    check_delimiters(&code)?;

    let marker = match kind {
        ShaderKind::Vertex => "@vertex",
        ShaderKind::Fragment => "@fragment",
    };
    let Some(entry) = code.find(marker) else {
        return Err(format!("error: no {marker} entry point in {kind} shader"));
    };

    let inputs = match kind {
        ShaderKind::Vertex => vertex_inputs(&code, entry)?,
        ShaderKind::Fragment => Vec::new(),
    };

    Ok(ShaderInterface {
        inputs,
        uniforms: uniforms(&code),
    })
}

/// Replaces `//` and `/* */` comments with spaces, keeping newlines so line
/// numbers stay meaningful.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut block_depth = 0usize;
    let mut line_comment = false;

    while let Some(c) = chars.next() {
        if line_comment {
            if c == '\n' {
                line_comment = false;
                out.push('\n');
            } else {
                out.push(' ');
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('/', Some('*')) => {
                chars.next();
                block_depth += 1;
                out.push_str("  ");
            }
            ('*', Some('/')) if block_depth > 0 => {
                chars.next();
                block_depth -= 1;
                out.push_str("  ");
            }
            ('/', Some('/')) if block_depth == 0 => {
                chars.next();
                line_comment = true;
                out.push_str("  ");
            }
            ('\n', _) => out.push('\n'),
            _ if block_depth > 0 => out.push(' '),
            _ => out.push(c),
        }
    }

    out
}

fn check_delimiters(code: &str) -> Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();

    for (line_idx, line) in code.lines().enumerate() {
        let line_no = line_idx + 1;
        for c in line.chars() {
            match c {
                '{' | '(' | '[' => stack.push((c, line_no)),
                '}' | ')' | ']' => {
                    let open = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((o, _)) if o == open => {}
                        Some((o, opened)) => {
                            return Err(format!(
                                "line {line_no}: expected closing for '{o}' opened on line {opened}, found '{c}'"
                            ));
                        }
                        None => return Err(format!("line {line_no}: unexpected '{c}'")),
                    }
                }
                _ => {}
            }
        }
    }

    match stack.pop() {
        Some((open, line_no)) => Err(format!("line {line_no}: unclosed '{open}'")),
        None => Ok(()),
    }
}

/// Parses the integer argument of the first `attr(` in `text`, e.g. `@location(`.
fn attribute_arg(text: &str, attr: &str) -> Option<u32> {
    let start = text.find(attr)? + attr.len();
    let end = start + text[start..].find(')')?;
    text[start..end].trim().parse().ok()
}

/// The identifier directly before the first `:` in a declaration.
fn declared_name(decl: &str) -> Option<String> {
    let before = &decl[..decl.find(':')?];
    let name = before.split_whitespace().last()?;
    // Attribute arguments end in ')'; a bare name never does
    if name.ends_with(')') {
        return None;
    }
    Some(name.to_string())
}

/// Splits on commas that are not nested inside `()`, `<>`, `[]` or `{}`.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' | '[' | '{' => depth += 1,
            ')' | '>' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Byte range of the contents between the `open` at `from` and its match.
fn enclosed(code: &str, from: usize, open: char, close: char) -> Option<(usize, usize)> {
    let start = from + code[from..].find(open)? + 1;
    let mut depth = 1;
    for (i, c) in code[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((start, start + i));
            }
        }
    }
    None
}

fn located_members(decls: &[&str]) -> Vec<(String, u32)> {
    decls
        .iter()
        .filter(|d| !d.contains("@builtin"))
        .filter_map(|d| Some((declared_name(d)?, attribute_arg(d, "@location(")?)))
        .collect()
}

fn vertex_inputs(code: &str, entry: usize) -> Result<Vec<(String, u32)>, String> {
    let fn_at = code[entry..]
        .find("fn ")
        .map(|i| entry + i)
        .ok_or_else(|| "error: @vertex is not followed by a function".to_string())?;
    let (start, end) = enclosed(code, fn_at, '(', ')')
        .ok_or_else(|| "error: malformed @vertex parameter list".to_string())?;

    let mut inputs = Vec::new();
    for param in split_top_level(&code[start..end]) {
        if param.contains("@location(") {
            inputs.extend(located_members(&[param]));
        } else if !param.contains("@builtin") {
            // A struct parameter contributes its located members
            let ty = param
                .split(':')
                .nth(1)
                .map(str::trim)
                .unwrap_or_default();
            inputs.extend(struct_members(code, ty));
        }
    }

    Ok(inputs)
}

fn struct_members(code: &str, ty: &str) -> Vec<(String, u32)> {
    if ty.is_empty() {
        return Vec::new();
    }

    let mut search = 0;
    while let Some(pos) = code[search..].find("struct ") {
        let at = search + pos;
        let after = &code[at + "struct ".len()..];
        let name: String = after
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();

        if name == ty {
            return match enclosed(code, at, '{', '}') {
                Some((start, end)) => located_members(&split_top_level(&code[start..end])),
                None => Vec::new(),
            };
        }
        search = at + "struct ".len();
    }

    Vec::new()
}

fn uniforms(code: &str) -> Vec<(String, u32)> {
    const MARKER: &str = "var<uniform>";
    let mut found = Vec::new();
    let mut search = 0;

    while let Some(pos) = code[search..].find(MARKER) {
        let at = search + pos;
        // Attributes of this declaration sit between the previous one and the marker
        let decl_start = code[..at].rfind([';', '}']).map(|i| i + 1).unwrap_or(0);
        let prefix = &code[decl_start..at];

        let group = attribute_arg(prefix, "@group(").unwrap_or(0);
        let binding = attribute_arg(prefix, "@binding(");
        let rest = &code[at + MARKER.len()..];
        let name = declared_name(rest.split(';').next().unwrap_or_default());

        if let (0, Some(binding), Some(name)) = (group, binding, name) {
            found.push((name, binding));
        }
        search = at + MARKER.len();
    }

    found
}
