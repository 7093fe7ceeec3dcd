//! Bibliography parser and entry store.
//!
//! Parses `@type{key, field = value, ...}` entries into an ordered,
//! loss-free store. Each entry keeps its raw source slice plus the byte
//! span of the key inside it, so a rename splices text without otherwise
//! reformatting the entry. Field values tolerate nested braces, quoted
//! strings and multi-line content; unknown field names are preserved
//! verbatim. The only unrecoverable input is an entry whose body never
//! closes, reported with the byte offset of the offending `@`.

use crate::{Error, Result};
use std::ops::Range;

/// One field of an entry, name and raw value with the outer braces or
/// quotes removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// A single bibliography entry.
///
/// The raw source slice runs from the entry's `@` up to the next entry (or
/// end of input), so comments following an entry survive a rewrite.
#[derive(Debug, Clone)]
pub struct Entry {
    entry_type: String,
    key: String,
    fields: Vec<Field>,
    raw: String,
    key_span: Range<usize>,
}

impl Entry {
    /// Work category, e.g. `article` or `inproceedings`, as written.
    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    /// The citation key, as written (possibly empty on malformed input).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All fields in source order, duplicates included.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First field with the given name, compared case-insensitively.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// The entry's raw source text, including any trailing comments.
    pub fn source(&self) -> &str {
        &self.raw
    }

    /// Replaces the key, splicing the raw text at the recorded span so the
    /// rest of the entry stays byte-identical.
    pub fn set_key(&mut self, new_key: &str) {
        self.raw.replace_range(self.key_span.clone(), new_key);
        self.key_span = self.key_span.start..self.key_span.start + new_key.len();
        self.key = new_key.to_string();
    }
}

/// Ordered entry store built fresh from one bibliography source.
///
/// Insertion order is authoritative: it is the first-occurrence-wins
/// tie-break for duplicate grouping and the output order of a rewrite.
#[derive(Debug, Clone)]
pub struct Bibliography {
    /// Text before the first entry, preserved on rewrite.
    pub preamble: String,
    pub entries: Vec<Entry>,
}

impl Bibliography {
    /// Parses bibliography source into the ordered entry store.
    ///
    /// `@string`, `@preamble` and `@comment` directives are not entries:
    /// their bodies are skipped structurally and their text stays attached
    /// to the surrounding raw slices, so they survive a rewrite untouched.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parsed = Vec::new();
        let mut cursor = 0;
        while let Some(start) = next_entry_start(source, cursor) {
            let entry = parse_entry_at(source, start)?;
            cursor = start + entry.close + 1;
            if is_directive(&entry.entry_type) {
                continue;
            }
            parsed.push((start, entry));
        }

        let preamble = match parsed.first() {
            Some((first_start, _)) => source[..*first_start].to_string(),
            None => source.to_string(),
        };

        let starts: Vec<usize> = parsed.iter().map(|(s, _)| *s).collect();
        let mut entries = Vec::with_capacity(parsed.len());
        for (i, (start, entry)) in parsed.into_iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(source.len());
            entries.push(Entry {
                entry_type: entry.entry_type,
                key: entry.key,
                fields: entry.fields,
                raw: source[start..end].trim_end().to_string(),
                key_span: entry.key_span,
            });
        }

        Ok(Bibliography { preamble, entries })
    }

    /// Renders the store back to bibliography source: preamble, then
    /// entries in order separated by blank lines.
    pub fn render(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.entries.len() + 1);
        let preamble = self.preamble.trim_end();
        if !preamble.is_empty() {
            parts.push(preamble);
        }
        parts.extend(self.entries.iter().map(Entry::source));
        if parts.is_empty() {
            return String::new();
        }
        let mut out = parts.join("\n\n");
        out.push('\n');
        out
    }
}

/// Header and body of one entry, spans relative to the entry start.
struct ParsedEntry {
    entry_type: String,
    key: String,
    key_span: Range<usize>,
    fields: Vec<Field>,
    /// Offset of the closing brace, relative to the entry start.
    close: usize,
}

fn is_directive(entry_type: &str) -> bool {
    entry_type.eq_ignore_ascii_case("string")
        || entry_type.eq_ignore_ascii_case("preamble")
        || entry_type.eq_ignore_ascii_case("comment")
}

/// Finds the next `@type{` header at or after `from`.
///
/// Scanning resumes past each parsed entry body, so an `@` inside a field
/// value (a braced URL or email) is never mistaken for a header.
fn next_entry_start(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'@' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_alphanumeric() {
                j += 1;
            }
            if j > i + 1 {
                let mut k = j;
                while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                if k < bytes.len() && bytes[k] == b'{' {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn parse_entry_at(source: &str, start: usize) -> Result<ParsedEntry> {
    let bytes = source.as_bytes();

    // Header: @type { key
    let mut i = start + 1;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    let entry_type = source[start + 1..i].to_string();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    // next_entry_start guarantees the opening brace
    let open = i;
    i += 1;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let key_start = i;
    while i < bytes.len() && !matches!(bytes[i], b',' | b'{' | b'}') {
        i += 1;
    }
    let key = source[key_start..i].trim_end().to_string();
    let key_span = (key_start - start)..(key_start - start + key.len());

    // Body: balanced braces from the opening one
    let mut depth = 1usize;
    let mut close = None;
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(pos);
                    break;
                }
            }
            _ => {}
        }
        pos += 1;
    }
    let close = close.ok_or_else(|| Error::Parse {
        offset: start,
        message: format!("unterminated entry '{}'", key),
    })?;

    let fields = if i < close && bytes[i] == b',' {
        parse_fields(&source[i + 1..close])
    } else {
        Vec::new()
    };

    Ok(ParsedEntry {
        entry_type,
        key,
        key_span,
        fields,
        close: close - start,
    })
}

/// Parses `name = value` pairs from an entry body.
///
/// Values come in three shapes: braced (nesting allowed), quoted (braces
/// tracked so a brace-enclosed quote does not terminate the value), and
/// plain (up to the next comma or newline). Malformed stretches are
/// skipped byte-by-byte rather than failing the entry.
fn parse_fields(body: &str) -> Vec<Field> {
    let bytes = body.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let name_start = i;
        while i < bytes.len()
            && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'-')
        {
            i += 1;
        }
        if i == name_start {
            i += 1;
            continue;
        }
        let name = body[name_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let value = match bytes[i] {
            b'{' => {
                let mut depth = 1usize;
                let start = i + 1;
                i += 1;
                while i < bytes.len() && depth > 0 {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                let end = if depth == 0 { i - 1 } else { bytes.len() };
                body[start..end].trim().to_string()
            }
            b'"' => {
                let mut depth = 0usize;
                let start = i + 1;
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'{' => depth += 1,
                        b'}' => depth = depth.saturating_sub(1),
                        b'"' if depth == 0 => break,
                        _ => {}
                    }
                    i += 1;
                }
                let end = i.min(bytes.len());
                if i < bytes.len() {
                    i += 1;
                }
                body[start..end].trim().to_string()
            }
            _ => {
                let start = i;
                while i < bytes.len() && !matches!(bytes[i], b',' | b'\n') {
                    i += 1;
                }
                body[start..i].trim().to_string()
            }
        };

        fields.push(Field { name, value });
    }

    fields
}
