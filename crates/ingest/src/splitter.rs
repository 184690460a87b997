use crate::passage::Passage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// Every non-blank line is a passage.
    #[default]
    Lines,
    /// Blank-line separated paragraphs.
    Paragraphs,
}

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub mode: SplitMode,
    /// Passages shorter than this (after trimming) are dropped.
    pub min_chars: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            mode: SplitMode::Lines,
            min_chars: 1,
        }
    }
}

pub struct PassageSplitter {
    config: SplitterConfig,
}

impl PassageSplitter {
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, text: &str, source: &str) -> Vec<Passage> {
        let pieces: Vec<&str> = match self.config.mode {
            SplitMode::Lines => text.lines().collect(),
            SplitMode::Paragraphs => Self::split_by_paragraphs(text),
        };

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|piece| piece.chars().count() >= self.config.min_chars.max(1))
            .enumerate()
            .map(|(index, piece)| Passage::new(index, piece.to_string(), source.to_string()))
            .collect()
    }

    fn split_by_paragraphs(text: &str) -> Vec<&str> {
        if text.contains("\r\n") {
            text.split("\r\n\r\n").collect()
        } else {
            text.split("\n\n").collect()
        }
    }
}

impl Default for PassageSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_splitting_skips_blank_lines() {
        let splitter = PassageSplitter::default();
        let text = "Alice is a data scientist.\n\n  Bob joined the team.  \nCarol leads.";
        let passages = splitter.split(text, "raw");

        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].text, "Alice is a data scientist.");
        assert_eq!(passages[1].text, "Bob joined the team.");
        assert_eq!(passages[1].index, 1);
        assert_eq!(passages[2].index, 2);
        assert!(passages.iter().all(|p| p.source == "raw"));
    }

    #[test]
    fn test_paragraph_splitting() {
        let splitter = PassageSplitter::new(SplitterConfig {
            mode: SplitMode::Paragraphs,
            min_chars: 1,
        });
        let text = "First line\nstill first.\n\nSecond paragraph.";
        let passages = splitter.split(text, "doc.md");

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "First line\nstill first.");
        assert_eq!(passages[1].text, "Second paragraph.");
    }

    #[test]
    fn test_min_chars_filter() {
        let splitter = PassageSplitter::new(SplitterConfig {
            mode: SplitMode::Lines,
            min_chars: 5,
        });
        let passages = splitter.split("ok\nlong enough", "raw");

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].index, 0);
        assert_eq!(passages[0].text, "long enough");
    }

    #[test]
    fn test_empty_input() {
        assert!(PassageSplitter::default().split("", "raw").is_empty());
        assert!(PassageSplitter::default().split("\n \n", "raw").is_empty());
    }
}
