//! Corpus loading: scan a directory tree and turn matching files into
//! [`Document`]s.
//!
//! Files are matched against the configured include/exclude globs and
//! visited in sorted relative-path order, so document IDs and downstream
//! chunk order are stable across runs on the same tree. Markdown and plain
//! text are read as UTF-8 (lossily, so a stray invalid byte does not sink
//! the file); PDFs go through `pdf-extract`. A file that fails to read is
//! logged and skipped rather than aborting the whole load.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{RagError, Result};
use crate::models::{Document, SourceInfo};

/// Load all matching documents under the configured corpus directory.
///
/// Fails with [`RagError::NotFound`] if the directory does not exist and
/// [`RagError::EmptyCorpus`] if nothing readable matched the globs.
pub fn load_corpus(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = config.dir.as_path();
    if !root.is_dir() {
        return Err(RagError::NotFound(root.to_path_buf()));
    }

    let include = build_globset(&config.include_globs)?;
    let exclude = build_globset(&config.exclude_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                eprintln!("warning: skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        if include.is_match(&rel) && !exclude.is_match(&rel) {
            paths.push(rel);
        }
    }
    paths.sort();

    let mut documents = Vec::new();
    for rel in paths {
        let abs = root.join(&rel);
        match load_file(&abs, &rel) {
            Ok(doc) => documents.push(doc),
            Err(e) => eprintln!("warning: skipping {}: {e}", rel.display()),
        }
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus(root.to_path_buf()));
    }
    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::Configuration(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::Configuration(format!("failed to build glob set: {e}")))
}

fn load_file(abs: &Path, rel: &Path) -> Result<Document> {
    let extension = abs
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let (text, content_type) = match extension.as_str() {
        "pdf" => {
            let text = pdf_extract::extract_text(abs).map_err(|e| RagError::Provider {
                provider: "pdf-extract".to_string(),
                message: format!("failed to extract text from {}: {e}", rel.display()),
            })?;
            (text, "application/pdf".to_string())
        }
        "md" => (read_text(abs, rel)?, "text/markdown".to_string()),
        _ => (read_text(abs, rel)?, "text/plain".to_string()),
    };

    let metadata = std::fs::metadata(abs).map_err(|e| {
        RagError::Configuration(format!("failed to stat {}: {e}", rel.display()))
    })?;
    let modified_at = metadata
        .modified()
        .map(chrono::DateTime::from)
        .unwrap_or_else(|_| chrono::Utc::now());

    let title = abs
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("untitled")
        .to_string();

    Ok(Document {
        id: document_id(rel),
        text,
        source: SourceInfo {
            path: rel.to_string_lossy().to_string(),
            title,
            content_type,
            modified_at,
        },
    })
}

fn read_text(abs: &Path, rel: &Path) -> Result<String> {
    let bytes = std::fs::read(abs).map_err(|e| {
        RagError::Configuration(format!("failed to read {}: {e}", rel.display()))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Stable document ID derived from the relative path.
///
/// A content hash would change the ID on every edit, which would orphan
/// persisted chunk IDs; the path is the identity that matters here.
fn document_id(rel: &Path) -> String {
    let digest = Sha256::digest(rel.to_string_lossy().as_bytes());
    // First 16 hex chars are plenty for corpus-sized collections.
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus_config(dir: &Path) -> CorpusConfig {
        CorpusConfig { dir: dir.to_path_buf(), ..CorpusConfig::default() }
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = load_corpus(&corpus_config(Path::new("/nonexistent/corpus"))).unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn empty_directory_is_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_corpus(&corpus_config(dir.path())).unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
    }

    #[test]
    fn non_matching_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("binary.bin"), b"\x00\x01").unwrap();
        let err = load_corpus(&corpus_config(dir.path())).unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
    }

    #[test]
    fn loads_text_and_markdown_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "beta document").unwrap();
        fs::write(dir.path().join("a.md"), "# alpha document").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "gamma document").unwrap();

        let docs = load_corpus(&corpus_config(dir.path())).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].source.path, "a.md");
        assert_eq!(docs[0].source.content_type, "text/markdown");
        assert_eq!(docs[1].source.path, "b.txt");
        assert_eq!(docs[2].source.path, "sub/c.txt");
        assert_eq!(docs[1].text, "beta document");
    }

    #[test]
    fn document_ids_are_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("note.txt"), "some text").unwrap();

        let first = load_corpus(&corpus_config(dir.path())).unwrap();
        fs::write(dir.path().join("note.txt"), "edited text").unwrap();
        let second = load_corpus(&corpus_config(dir.path())).unwrap();

        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn exclude_globs_filter_matches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "kept").unwrap();
        fs::write(dir.path().join("drop.txt"), "dropped").unwrap();

        let mut config = corpus_config(dir.path());
        config.exclude_globs = vec!["drop.txt".to_string()];
        let docs = load_corpus(&config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source.path, "keep.txt");
    }
}
