pub mod passage;
pub mod reader;
pub mod splitter;

pub use passage::Passage;
pub use reader::FileReader;
pub use splitter::{PassageSplitter, SplitMode, SplitterConfig};

use anyhow::Result;
use std::path::Path;

/// Split raw text into passages using the default line-per-passage rule
pub fn split_text(text: &str, source: &str) -> Vec<Passage> {
    PassageSplitter::default().split(text, source)
}

/// Read a single file and split it into passages
pub async fn ingest_file(file_path: &Path, splitter: &PassageSplitter) -> Result<Vec<Passage>> {
    let content = FileReader::read_file(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();

    Ok(splitter.split(&content, &path_str))
}

/// Read a directory tree; passage indexes are renumbered across all files
pub async fn ingest_directory(dir_path: &Path, splitter: &PassageSplitter) -> Result<Vec<Passage>> {
    let files = FileReader::read_directory(dir_path).await?;

    let mut all_passages = Vec::new();

    for (path, content) in files {
        for passage in splitter.split(&content, &path) {
            all_passages.push(Passage::new(all_passages.len(), passage.text, passage.source));
        }
    }

    Ok(all_passages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_indexes_are_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo").unwrap();
        std::fs::write(dir.path().join("b.txt"), "three").unwrap();

        let passages = ingest_directory(dir.path(), &PassageSplitter::default())
            .await
            .unwrap();

        let indexes: Vec<usize> = passages.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(passages[2].text, "three");
        assert!(passages[2].source.ends_with("b.txt"));
    }
}
