use dashmap::DashMap;
use regex::Regex;
use std::sync::LazyLock;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.,!?;:'"()\[\]]"#).expect("valid punctuation regex"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Trailing words that do not distinguish one organization from another
const CORPORATE_SUFFIXES: &[&str] = &["inc", "corp", "corporation", "ltd", "llc", "co"];

/// Maps entity names to canonical keys. Safe to share between concurrent extractions.
#[derive(Default)]
pub struct EntityNormalizer {
    /// Maps normalized name -> canonical name
    aliases: DashMap<String, String>,
}

impl EntityNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: DashMap::new(),
        }
    }

    /// Normalize entity name: lowercase, trim punctuation, handle common variations
    pub fn normalize(&self, name: &str) -> String {
        let normalized = Self::clean(name);

        if let Some(canonical) = self.aliases.get(&normalized) {
            return canonical.value().clone();
        }

        // Near-duplicates map onto the first variant seen
        let found_canonical = self
            .aliases
            .iter()
            .find(|entry| Self::are_similar(&normalized, entry.key()))
            .map(|entry| entry.value().clone());

        if let Some(canonical) = found_canonical {
            self.aliases.insert(normalized, canonical.clone());
            return canonical;
        }

        self.aliases.insert(normalized.clone(), normalized.clone());
        normalized
    }

    fn clean(name: &str) -> String {
        let lowered = name.trim().to_lowercase();
        let stripped = PUNCTUATION.replace_all(&lowered, "");
        let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").to_string();

        let mut words: Vec<&str> = collapsed.split(' ').collect();
        while words.len() > 1 && words.last().is_some_and(|w| CORPORATE_SUFFIXES.contains(w)) {
            words.pop();
        }
        words.join(" ")
    }

    /// Multi-word names sharing more than 70% of their words are the same entity
    fn are_similar(a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }

        let words_a: Vec<&str> = a.split_whitespace().collect();
        let words_b: Vec<&str> = b.split_whitespace().collect();

        if words_a.len() > 1 && words_b.len() > 1 {
            let common = words_a.iter().filter(|w| words_b.contains(w)).count();
            let total = words_a.len().max(words_b.len());
            return common as f64 / total as f64 > 0.7;
        }

        false
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}

/// `works on` / `worksOn` / `WORKS-ON` -> `WORKS_ON`
pub fn normalize_relation_type(relation: &str) -> String {
    let mut out = String::with_capacity(relation.len() + 4);
    let mut prev_lower = false;

    for ch in relation.trim().chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower {
                out.push('_');
            }
            prev_lower = ch.is_lowercase() || ch.is_numeric();
            out.extend(ch.to_uppercase());
        } else {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        }
    }

    let trimmed = out.trim_end_matches('_').to_string();
    if trimmed.is_empty() {
        "RELATED_TO".to_string()
    } else {
        trimmed
    }
}

/// `PERSON` / `person` -> `Person`; blank -> `Unknown`
pub fn normalize_entity_type(entity_type: &str) -> String {
    let words: Vec<String> = entity_type
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Unknown".to_string()
    } else {
        words.concat()
    }
}
