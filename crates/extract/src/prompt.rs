pub fn build_extraction_prompt(passage_text: &str) -> String {
    format!(
        r#"Extract entities and relationships from the following text.

INSTRUCTIONS:
1. Identify key entities (people, organizations, locations, projects, concepts, technologies, events)
2. Extract relationships between entities
3. Output ONLY valid JSON, nothing else
4. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"id": "E1", "name": "EntityName", "type": "PERSON|ORGANIZATION|LOCATION|PROJECT|CONCEPT|TECHNOLOGY|EVENT", "description": "brief description"}}
  ],
  "relations": [
    {{"source": "E1", "target": "E2", "relation": "RELATIONSHIP_TYPE", "evidence": "quote from text"}}
  ]
}}

RULES:
- Use sequential IDs: E1, E2, E3, etc.
- Every relation source and target must be an id from "entities"
- Relation types are short verbs in UPPER_SNAKE_CASE: WORKS_ON, WORKS_AT, MANAGED_FROM, MENTORS, LOCATED_IN, etc.
- Use the most specific entity name from the text ("New York office", not "office")
- Evidence must be a direct quote from the text
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        passage_text
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_text() {
        let prompt = build_extraction_prompt("Bob works on Alpha.");
        assert!(prompt.contains("TEXT:\nBob works on Alpha.\n"));
        assert!(prompt.contains("\"relations\""));
    }
}
