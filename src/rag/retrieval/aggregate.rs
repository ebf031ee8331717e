// Multi-query result merging: dedupe by document id, keep the best distance
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::vector_db::{Metadata, QueryResult};

/// A validated retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Non-negative; smaller is more relevant
    pub distance: f32,
}

impl DocumentHit {
    /// Validate a raw store result. Missing id, text, metadata or a
    /// non-finite/negative distance yields `None`.
    pub fn from_result(result: QueryResult) -> Option<Self> {
        let id = result.id.filter(|id| !id.is_empty())?;
        let distance = result.distance.filter(|d| d.is_finite() && *d >= 0.0)?;

        Some(Self {
            id,
            text: result.document?,
            metadata: result.metadata?,
            distance,
        })
    }

    /// Metadata value or "N/A"
    pub fn meta(&self, key: &str) -> &str {
        self.metadata.get(key).map(String::as_str).unwrap_or("N/A")
    }

    /// First `max_chars` characters of the text
    pub fn snippet(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }
}

/// Best hit per document id across all queries.
///
/// Entries keep the position where their id was first seen, so equal
/// distances rank in first-seen order after the stable sort.
#[derive(Debug, Default)]
pub struct ResultSet {
    hits: Vec<DocumentHit>,
    index: HashMap<String, usize>,
    skipped: usize,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one raw hit; returns false if it was invalid and dropped
    pub fn merge(&mut self, result: QueryResult) -> bool {
        let raw_id = result.id.clone();
        let Some(hit) = DocumentHit::from_result(result) else {
            tracing::debug!(id = ?raw_id, "skipping incomplete hit");
            self.skipped += 1;
            return false;
        };

        match self.index.get(&hit.id) {
            Some(&slot) => {
                if hit.distance < self.hits[slot].distance {
                    self.hits[slot] = hit;
                }
            }
            None => {
                self.index.insert(hit.id.clone(), self.hits.len());
                self.hits.push(hit);
            }
        }
        true
    }

    /// Distinct ids seen so far
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Invalid hits dropped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Sort ascending by distance and keep the first `max_results`
    pub fn into_ranked(self, max_results: usize) -> Vec<DocumentHit> {
        let mut hits = self.hits;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(max_results);
        hits
    }
}

/// Merge per-query hit lists into one deduplicated ranking
pub fn aggregate(per_query_hits: Vec<Vec<QueryResult>>, max_results: usize) -> Vec<DocumentHit> {
    let mut set = ResultSet::new();

    for (i, hits) in per_query_hits.into_iter().enumerate() {
        if hits.is_empty() {
            tracing::debug!(query_index = i, "no results for query");
            continue;
        }
        for hit in hits {
            set.merge(hit);
        }
    }

    tracing::debug!(unique = set.len(), skipped = set.skipped(), "merged results");
    set.into_ranked(max_results)
}
