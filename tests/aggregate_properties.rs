//! Property tests for result merging and query refinement

mod common;

use quickcheck_macros::quickcheck;
use ragprompt::memory::{Metadata, QueryResult};
use ragprompt::rag::{aggregate, QueryRefiner};
use std::collections::{HashMap, HashSet};

use common::{hit, ScriptedGenerator};

/// Small id space so duplicates across queries are common
fn to_batches(raw: &[Vec<(u8, u16)>]) -> Vec<Vec<QueryResult>> {
    raw.iter()
        .map(|batch| {
            batch
                .iter()
                .map(|&(id, d)| hit(&format!("doc{}", id % 16), f32::from(d) / 1000.0))
                .collect()
        })
        .collect()
}

#[quickcheck]
fn prop_keeps_minimum_distance_per_id(raw: Vec<Vec<(u8, u16)>>) -> bool {
    let batches = to_batches(&raw);

    let mut best: HashMap<String, f32> = HashMap::new();
    for hit in batches.iter().flatten() {
        let id = hit.id.clone().unwrap_or_default();
        let d = hit.distance.unwrap_or(f32::MAX);
        let entry = best.entry(id).or_insert(d);
        if d < *entry {
            *entry = d;
        }
    }

    aggregate(batches, usize::MAX)
        .iter()
        .all(|doc| best.get(&doc.id) == Some(&doc.distance))
}

#[quickcheck]
fn prop_output_sorted_non_decreasing(raw: Vec<Vec<(u8, u16)>>, max: u8) -> bool {
    let ranked = aggregate(to_batches(&raw), usize::from(max));
    ranked.windows(2).all(|w| w[0].distance <= w[1].distance)
}

#[quickcheck]
fn prop_no_spurious_truncation(raw: Vec<Vec<(u8, u16)>>) -> bool {
    let batches = to_batches(&raw);
    let distinct: HashSet<String> = batches.iter().flatten().filter_map(|h| h.id.clone()).collect();

    let ranked = aggregate(batches, distinct.len() + 1);
    ranked.len() == distinct.len()
}

#[quickcheck]
fn prop_ids_are_unique(raw: Vec<Vec<(u8, u16)>>) -> bool {
    let ranked = aggregate(to_batches(&raw), usize::MAX);
    let ids: HashSet<&str> = ranked.iter().map(|d| d.id.as_str()).collect();
    ids.len() == ranked.len()
}

#[test]
fn test_duplicate_id_keeps_best_distance_across_queries() {
    let batches = vec![
        vec![hit("d1", 0.10), hit("d2", 0.30)],
        vec![hit("d2", 0.05), hit("d3", 0.40)],
    ];
    let ranked = aggregate(batches, 3);

    let got: Vec<(&str, f32)> = ranked.iter().map(|d| (d.id.as_str(), d.distance)).collect();
    assert_eq!(got, vec![("d2", 0.05), ("d1", 0.10), ("d3", 0.40)]);
}

#[test]
fn test_incomplete_hits_are_dropped() {
    let mut no_text = hit("d9", 0.01);
    no_text.document = None;
    let no_id = QueryResult {
        id: None,
        document: Some("orphan".to_string()),
        metadata: Some(Metadata::new()),
        distance: Some(0.0),
    };

    let ranked = aggregate(vec![vec![no_text, no_id, hit("d1", 0.5)]], 10);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].id, "d1");
}

#[test]
fn test_empty_input_yields_empty_output() {
    assert!(aggregate(Vec::new(), 15).is_empty());
    assert!(aggregate(vec![Vec::new(), Vec::new()], 15).is_empty());
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

#[quickcheck]
fn prop_refine_never_fails_for_non_empty_query(query: String, answer: String) -> bool {
    if query.trim().is_empty() {
        return true;
    }

    let refiner = QueryRefiner::new(Box::new(ScriptedGenerator::Answer(answer)), 5);
    match block_on(refiner.refine(&query)) {
        Ok(refined) => {
            !refined.is_empty()
                && refined.as_slice().iter().all(|q| !q.trim().is_empty())
                && (!refined.is_fallback() || refined.as_slice() == [query.clone()])
        }
        Err(_) => false,
    }
}

#[quickcheck]
fn prop_unreachable_model_returns_query_exactly(query: String) -> bool {
    if query.trim().is_empty() {
        return true;
    }

    let refiner = QueryRefiner::new(Box::new(ScriptedGenerator::Unreachable), 5);
    match block_on(refiner.refine(&query)) {
        Ok(refined) => refined.as_slice() == [query.clone()],
        Err(_) => false,
    }
}
