use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
    total_index_time_us: AtomicU64,
    total_query_time_us: AtomicU64,
    extract_count: AtomicUsize,
    index_count: AtomicUsize,
    query_count: AtomicUsize,

    // Counts
    total_passages_processed: AtomicUsize,
    total_entities_extracted: AtomicUsize,
    answer_cache_hits: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_extract(&self, duration: Duration, passages: usize, entities: usize) {
        self.total_extract_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_passages_processed.fetch_add(passages, Ordering::Relaxed);
        self.total_entities_extracted.fetch_add(entities, Ordering::Relaxed);
        self.extract_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index(&self, duration: Duration) {
        self.total_index_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.index_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, duration: Duration) {
        self.total_query_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_answer_cache_hit(&self) {
        self.answer_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_extract_time_ms: avg_time_ms(&self.total_extract_time_us, self.extract_count.load(Ordering::Relaxed)),
            avg_index_time_ms: avg_time_ms(&self.total_index_time_us, self.index_count.load(Ordering::Relaxed)),
            avg_query_time_ms: avg_time_ms(&self.total_query_time_us, self.query_count.load(Ordering::Relaxed)),
            total_passages_processed: self.total_passages_processed.load(Ordering::Relaxed),
            total_entities_extracted: self.total_entities_extracted.load(Ordering::Relaxed),
            answer_cache_hits: self.answer_cache_hits.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_extract_time_ms: f64,
    pub avg_index_time_ms: f64,
    pub avg_query_time_ms: f64,
    pub total_passages_processed: usize,
    pub total_entities_extracted: usize,
    pub answer_cache_hits: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
