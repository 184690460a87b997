pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use llm::{LlmClient, LlmProvider};
pub use normalizer::{EntityNormalizer, normalize_entity_type, normalize_relation_type};
pub use schema::{
    Entity, ExtractedPassage, ExtractionResult, Properties, PropertyValue, Relation,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use ingest::Passage;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns raw text into typed entities and relations.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractionResult>;
}

/// Extractor backed by a JSON-mode language model call.
pub struct LlmExtractor {
    llm_client: LlmClient,
    normalizer: Arc<EntityNormalizer>,
    max_attempts: usize,
}

impl LlmExtractor {
    pub fn new(llm_client: LlmClient) -> Self {
        Self {
            llm_client,
            normalizer: Arc::new(EntityNormalizer::new()),
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Share a normalizer so names resolve consistently across extractors
    pub fn with_normalizer(mut self, normalizer: Arc<EntityNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn normalizer(&self) -> &EntityNormalizer {
        &self.normalizer
    }
}

#[async_trait]
impl EntityExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let prompt = prompt::build_extraction_prompt(text);

        let json_str = self
            .llm_client
            .generate_json_with_retry(&prompt, self.max_attempts)
            .await
            .context("Failed to extract entities after retries")?;

        let raw: ExtractionResult = serde_json::from_str(&json_str)
            .context("Failed to parse extraction result")?;

        Ok(normalize_extraction(raw, &self.normalizer))
    }
}

/// Canonicalize names, types and relation labels of a raw model response.
///
/// Entity ids become the canonical name key, so the same entity extracted
/// from different passages ends up with the same local id. Entities that
/// collapse onto the same key are merged (first one wins, blanks are filled).
/// Relations are re-pointed at the canonical ids; a relation that names an
/// entity missing from the response is dropped.
pub fn normalize_extraction(raw: ExtractionResult, normalizer: &EntityNormalizer) -> ExtractionResult {
    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut entities: Vec<Entity> = Vec::new();

    for entity in raw.entities {
        let name = entity.name.trim().to_string();
        if name.is_empty() {
            tracing::warn!(id = %entity.id, "Dropping entity without a name");
            continue;
        }

        let key = normalizer.normalize(&name);
        id_map.insert(entity.id.clone(), key.clone());
        id_map.insert(name.to_lowercase(), key.clone());

        if let Some(existing) = entities.iter_mut().find(|e| e.id == key) {
            if existing.description.is_empty() {
                existing.description = entity.description;
            }
            for (k, v) in entity.properties {
                existing.properties.entry(k).or_insert(v);
            }
            continue;
        }

        entities.push(Entity {
            id: key,
            name,
            entity_type: normalize_entity_type(&entity.entity_type),
            description: entity.description.trim().to_string(),
            properties: entity.properties,
        });
    }

    let resolve = |reference: &str| {
        id_map
            .get(reference)
            .or_else(|| id_map.get(&reference.trim().to_lowercase()))
            .cloned()
    };

    let mut relations: Vec<Relation> = Vec::new();
    for relation in raw.relations {
        let (Some(source), Some(target)) = (resolve(&relation.source), resolve(&relation.target))
        else {
            tracing::warn!(
                source = %relation.source,
                target = %relation.target,
                relation = %relation.relation,
                "Dropping relation with unknown endpoint"
            );
            continue;
        };

        let normalized = Relation {
            source,
            target,
            relation: normalize_relation_type(&relation.relation),
            evidence: relation.evidence,
        };

        let duplicate = relations.iter().any(|r| {
            r.source == normalized.source
                && r.target == normalized.target
                && r.relation == normalized.relation
        });
        if !duplicate {
            relations.push(normalized);
        }
    }

    ExtractionResult {
        entities,
        relations,
    }
}

/// Run extraction over many passages with at most `max_concurrent` calls in
/// flight. Output order follows passage order; the first error aborts.
pub async fn extract_passages(
    extractor: &dyn EntityExtractor,
    passages: &[Passage],
    max_concurrent: usize,
) -> Result<Vec<ExtractedPassage>> {
    tracing::info!(passages = passages.len(), max_concurrent, "Extracting passages");

    stream::iter(passages.iter().map(|passage| extract_passage(extractor, passage)))
        .boxed()
        .buffered(max_concurrent.max(1))
        .try_collect()
        .await
}

async fn extract_passage(
    extractor: &dyn EntityExtractor,
    passage: &Passage,
) -> Result<ExtractedPassage> {
    let extraction = extractor.extract(&passage.text).await?;
    tracing::debug!(
        passage = passage.index,
        entities = extraction.entities.len(),
        relations = extraction.relations.len(),
        "Extracted passage"
    );

    Ok(ExtractedPassage {
        passage_index: passage.index,
        passage_hash: passage.hash.clone(),
        text: passage.text.clone(),
        extraction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn raw_bob() -> ExtractionResult {
        ExtractionResult {
            entities: vec![
                Entity::new("E1", "Bob", "PERSON"),
                Entity::new("E2", "Alpha project", "PROJECT"),
                Entity::new("E3", "New York office", "location"),
            ],
            relations: vec![
                Relation::new("E1", "works on", "E2"),
                Relation::new("Alpha Project", "managed_from", "E3"),
                Relation::new("E1", "knows", "E9"),
            ],
        }
    }

    #[test]
    fn test_normalize_extraction_remaps_ids() {
        let normalizer = EntityNormalizer::new();
        let result = normalize_extraction(raw_bob(), &normalizer);

        let ids: Vec<&str> = result.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "alpha project", "new york office"]);
        assert_eq!(result.entities[0].name, "Bob");
        assert_eq!(result.entities[0].entity_type, "Person");

        assert_eq!(result.relations.len(), 2);
        assert_eq!(result.relations[0].source, "bob");
        assert_eq!(result.relations[0].relation, "WORKS_ON");
        assert_eq!(result.relations[1].source, "alpha project");
        assert_eq!(result.relations[1].target, "new york office");
        assert!(result.dangling_relations().is_empty());
    }

    #[test]
    fn test_normalize_extraction_merges_duplicates() {
        let normalizer = EntityNormalizer::new();
        let mut second = Entity::new("E2", "bob.", "Person");
        second.description = "engineer".to_string();
        let raw = ExtractionResult {
            entities: vec![Entity::new("E1", "Bob", "Person"), second],
            relations: vec![
                Relation::new("E1", "KNOWS", "E2"),
                Relation::new("E2", "KNOWS", "E1"),
            ],
        };

        let result = normalize_extraction(raw, &normalizer);

        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].description, "engineer");
        // self-loop collapses to one relation
        assert_eq!(result.relations.len(), 1);
    }

    struct EchoExtractor {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl EntityExtractor for EchoExtractor {
        async fn extract(&self, text: &str) -> Result<ExtractionResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if text == "fail" {
                anyhow::bail!("extractor exploded");
            }
            Ok(ExtractionResult {
                entities: vec![Entity::new(text, text, "Thing")],
                relations: vec![],
            })
        }
    }

    fn echo() -> EchoExtractor {
        EchoExtractor {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_extract_passages_preserves_order_and_bounds_concurrency() {
        let extractor = echo();
        let passages = ingest::split_text("a\nb\nc\nd\ne", "raw");

        let extracted = extract_passages(&extractor, &passages, 2).await.unwrap();

        let ids: Vec<&str> = extracted
            .iter()
            .map(|p| p.extraction.entities[0].id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(extracted[3].passage_index, 3);
        assert_eq!(extracted[3].passage_hash, passages[3].hash);
        assert!(extractor.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_extract_passages_propagates_errors() {
        let extractor = echo();
        let passages = ingest::split_text("a\nfail\nc", "raw");

        let err = extract_passages(&extractor, &passages, 4).await.unwrap_err();
        assert_eq!(err.to_string(), "extractor exploded");
    }

    #[tokio::test]
    async fn test_llm_extractor_end_to_end() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "entities": [
                {"id": "E1", "name": "Bob", "type": "PERSON"},
                {"id": "E2", "name": "Alpha project", "type": "PROJECT"}
            ],
            "relations": [
                {"source": "E1", "target": "E2", "relation": "works_on", "evidence": "Bob works on Alpha"}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": body.to_string()})),
            )
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(LlmClient::new(server.uri(), "llama3".to_string()));
        let result = extractor.extract("Bob works on the Alpha project.").await.unwrap();

        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.relations[0].relation, "WORKS_ON");
        assert_eq!(result.relations[0].evidence, "Bob works on Alpha");
        assert_eq!(extractor.normalizer().alias_count(), 2);
    }
}
