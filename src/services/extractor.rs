//! Code extraction from free-form assistant replies.
//!
//! A pure function of the text: no side effects, no state. Fenced regions are
//! collected in document order and concatenated under the assumption that
//! they form one program (later regions may depend on names defined earlier).

use std::collections::HashSet;

/// Result of scanning one assistant reply for a code unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The assembled code unit; empty when `found` is false, and possibly
    /// empty even when `found` is true (an empty fenced region).
    pub code: String,

    /// Whether at least one closed fenced region was present.
    pub found: bool,

    /// Ambiguities worth telling the model about, such as duplicate
    /// top-level definitions across concatenated regions.
    pub warnings: Vec<String>,
}

/// Extract zero or one code unit from an assistant reply.
///
/// Fences open on a line whose leading (optionally indented) run of
/// backticks is three or more; the info string after the fence is ignored.
/// A region closes at the first subsequent fence line at least as wide as
/// the opening fence - nested fence markers are not supported. An unclosed
/// fence contributes nothing.
pub fn extract_code(text: &str) -> Extraction {
    let mut regions: Vec<String> = Vec::new();
    let mut current: Option<(usize, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        let width = trimmed.chars().take_while(|&c| c == '`').count();

        match current.as_mut() {
            None => {
                if width >= 3 {
                    current = Some((width, Vec::new()));
                }
            }
            Some((open_width, body)) => {
                // A closing marker is a fence line at least as wide as the
                // opener, with nothing but the info-less fence on it.
                if width >= *open_width && trimmed[width..].trim().is_empty() {
                    regions.push(body.join("\n"));
                    current = None;
                } else {
                    body.push(line);
                }
            }
        }
    }

    if regions.is_empty() {
        return Extraction {
            code: String::new(),
            found: false,
            warnings: Vec::new(),
        };
    }

    let code = regions.join("\n\n");
    let warnings = duplicate_definitions(&code);

    Extraction {
        code,
        found: true,
        warnings,
    }
}

/// Flag duplicate top-level `def`/`class` names in the assembled unit.
///
/// Conflicting duplicate definitions are an extraction-time ambiguity to
/// surface, not silently resolve.
fn duplicate_definitions(code: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut warnings = Vec::new();

    for line in code.lines() {
        let Some(name) = top_level_definition(line) else {
            continue;
        };
        if !seen.insert(name.to_string()) {
            warnings.push(format!(
                "duplicate top-level definition `{name}` across code regions"
            ));
        }
    }

    warnings
}

fn top_level_definition(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("def ")
        .or_else(|| line.strip_prefix("class "))?;
    let name_len = rest
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(rest.len(), |(i, _)| i);
    if name_len == 0 {
        return None;
    }
    Some(&rest[..name_len])
}
