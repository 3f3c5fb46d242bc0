//! Markdown ingestion: directory walk and overlapping chunking.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use vigil_common::Result;

/// Split `text` into chunks of at most `chunk_size` characters, with roughly
/// `overlap` characters repeated between neighbours.
///
/// Cuts prefer a paragraph break, then a line break, then whitespace, as long
/// as the cut lands in the second half of the window.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            find_break(&chars[start..hard_end]).map_or(hard_end, |b| start + b)
        };

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

fn find_break(window: &[char]) -> Option<usize> {
    let min = window.len() / 2;
    let last_in_tail = |pred: &dyn Fn(usize) -> bool| (min..window.len()).rev().find(|&i| pred(i));

    last_in_tail(&|i| i > 0 && window[i] == '\n' && window[i - 1] == '\n')
        .or_else(|| last_in_tail(&|i| window[i] == '\n'))
        .or_else(|| last_in_tail(&|i| window[i].is_whitespace()))
        .map(|i| i + 1)
}

/// Read every `*.md` file under `dir`, returning `(relative path, contents)`
/// sorted by path.
pub fn load_markdown(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut files = Vec::new();
    collect_markdown(dir, &mut files)?;
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read_to_string(&path)?;
        let rel = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        debug!(document = %rel, chars = content.len(), "Loaded playbook document");
        documents.push((rel, content));
    }
    Ok(documents)
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}
