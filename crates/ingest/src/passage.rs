use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One unit of source text that gets embedded and sent through extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    /// Position of the passage within its document.
    pub index: usize,
    pub text: String,
    pub source: String,
    /// Stable content hash, used to key vector records.
    pub hash: String,
}

impl Passage {
    pub fn new(index: usize, text: String, source: String) -> Self {
        let hash = Self::content_hash(&text);

        Self {
            index,
            text,
            source,
            hash,
        }
    }

    /// First 16 bytes of SHA-256 over the text, hex encoded (32 chars)
    pub fn content_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_depends_only_on_text() {
        let a = Passage::new(0, "Bob works on Alpha.".to_string(), "a.txt".to_string());
        let b = Passage::new(7, "Bob works on Alpha.".to_string(), "b.txt".to_string());
        let c = Passage::new(0, "Bob works on Beta.".to_string(), "a.txt".to_string());

        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, c.hash);
        assert_eq!(a.hash.len(), 32);
    }
}
