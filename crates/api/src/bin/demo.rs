//! End-to-end run against the configured services: extract a small corpus,
//! index it, then answer one question from the graph.

use anyhow::{Context, Result};
use api::{AppConfig, AppState, Services, telemetry};
use tracing::info;

const SAMPLE_TEXT: &str = "\
Alice is a data scientist at TechCorp's Seattle office.
Bob and Carol collaborate on the Alpha project.
Carol transferred to the New York office last year.
Dave mentors both Alice and Bob.
TechCorp's headquarters is in Seattle.
Carol leads the East Coast team.
Dave started his career in Seattle.
The Alpha project is managed from New York.
Alice previously worked with Carol at DataCo.
Bob joined the team after Dave's recommendation.
Eve runs the West Coast operations from Seattle.
Frank works with Carol on client relations.
The New York office expanded under Carol's leadership.
Dave's team spans multiple locations.
Alice visits Seattle monthly for team meetings.
Bob's expertise is crucial for the Alpha project.
Carol implemented new processes in New York.
Eve and Dave collaborated on previous projects.
Frank reports to the New York office.
TechCorp's main AI research is in Seattle.
The Alpha project revolutionized East Coast operations.
Dave oversees projects in both offices.
Bob's contributions are mainly remote.
Carol's team grew significantly after moving to New York.
Seattle remains the technology hub for TechCorp.";

const QUESTION: &str = "How is Bob connected to New York?";
const LIMIT: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.log);

    let services = Services::connect(&config).await?;
    let state = AppState::new(config, services);
    let collection = state.config.qdrant.collection.clone();

    info!(collection = %collection, dimension = state.config.qdrant.dimension, "Ensuring stores");
    state.init_stores().await?;

    let passages = state.splitter.split(SAMPLE_TEXT, "demo");
    info!(passages = passages.len(), "Extracting graph components");
    let extracted = extract::extract_passages(
        state.extractor.as_ref(),
        &passages,
        state.config.concurrency.max_concurrent_extractions,
    )
    .await?;

    info!("Ingesting graph and indexing vectors");
    let report = state.indexer.index_passages(&extracted).await?;
    info!(
        entities = report.entities,
        relations = report.relations,
        vectors = report.vectors_upserted,
        skipped = report.passages_skipped,
        "Indexing complete"
    );

    info!(question = QUESTION, limit = LIMIT, "Starting retriever search");
    let retrieval = state.engine.retrieve(&collection, QUESTION, LIMIT).await?;
    info!(ids = ?retrieval.ids, "Retriever ids");

    let context = state.engine.format(&retrieval);
    info!("Graph context:\n{}", context);

    let answer = state.engine.generate(&context, QUESTION).await?;
    info!("Final answer: {}", answer);

    Ok(())
}
