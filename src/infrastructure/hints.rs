//! Hint corpus loader.
//!
//! Loads the markdown reference snippets injected into generation prompts:
//! files are read in sorted order under a character budget, the file that
//! crosses the budget is truncated if meaningful space remains, and a
//! manifest records what happened to each file for inspection via the
//! `hints` CLI command.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::domain::models::HintsConfig;

/// Minimum leftover budget worth filling with a truncated file.
const MIN_TRUNCATION_CHARS: usize = 1000;

/// What happened to one hint file during loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintStatus {
    /// Fully included.
    Included,
    /// Partially included; the budget ran out mid-file.
    Truncated,
    /// Not included at all.
    Skipped,
    /// Unreadable.
    Error,
}

/// Manifest entry for one hint file.
#[derive(Debug, Clone, Serialize)]
pub struct HintEntry {
    /// File name within the corpus directory.
    pub file: String,
    /// Loading status.
    pub status: HintStatus,
    /// Characters contributed to the corpus.
    pub chars: usize,
}

/// The combined hint corpus plus its loading manifest.
#[derive(Debug, Clone, Default)]
pub struct HintCorpus {
    /// Concatenated markdown content, one `## <stem>` section per file.
    pub content: String,
    /// Per-file manifest in load order.
    pub manifest: Vec<HintEntry>,
    /// True when the character budget cut loading short.
    pub stopped_early: bool,
}

impl HintCorpus {
    /// True when no usable content was loaded.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Total characters loaded.
    pub fn total_chars(&self) -> usize {
        self.manifest.iter().map(|e| e.chars).sum()
    }
}

/// Load the hint corpus described by `config`.
///
/// A missing or empty directory yields an empty corpus, not an error; hints
/// are an enrichment, never a prerequisite.
pub fn load(config: &HintsConfig) -> HintCorpus {
    if !config.enabled {
        return HintCorpus::default();
    }
    load_dir(&config.directory, config.max_chars)
}

fn load_dir(directory: &Path, max_chars: usize) -> HintCorpus {
    let mut corpus = HintCorpus::default();

    let Ok(entries) = std::fs::read_dir(directory) else {
        warn!(directory = %directory.display(), "hint directory not readable, continuing without hints");
        return corpus;
    };

    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();

    let mut sections: Vec<String> = Vec::new();
    let mut total = 0usize;

    for path in files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!(file = %file_name, error = %err, "could not read hint file");
                corpus.manifest.push(HintEntry {
                    file: file_name,
                    status: HintStatus::Error,
                    chars: 0,
                });
                continue;
            }
        };

        let section = format!("\n\n## {stem}\n\n{text}\n");

        if total + section.len() > max_chars {
            let remaining = max_chars - total;
            if remaining > MIN_TRUNCATION_CHARS {
                let cut = floor_char_boundary(&text, remaining.saturating_sub(100));
                let block = format!("\n\n## {stem}\n\n{}\n\n... (truncated)\n", &text[..cut]);
                let chars = block.len();
                sections.push(block);
                corpus.manifest.push(HintEntry {
                    file: file_name,
                    status: HintStatus::Truncated,
                    chars,
                });
            } else {
                corpus.manifest.push(HintEntry {
                    file: file_name,
                    status: HintStatus::Skipped,
                    chars: 0,
                });
            }
            corpus.stopped_early = true;
            break;
        }

        total += section.len();
        corpus.manifest.push(HintEntry {
            file: file_name,
            status: HintStatus::Included,
            chars: section.len(),
        });
        sections.push(section);
    }

    corpus.content = sections.join("");
    corpus
}

/// Largest index `<= at` that lands on a char boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    let mut index = at;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
