//! Cross-source duplicate detection.
//!
//! Compares every eligible pair of live postings from different sources.
//! A pair matches when the token-sort similarity of "title company
//! location" reaches the threshold, or when both carry the same canonical
//! URL. The earlier-posted posting survives; ties go to the lower id.
//!
//! The pass is quadratic in the number of live postings. That is fine for
//! a corpus of a few thousand; grouping by rough location first would be
//! the next step if it is not.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use harvest_storage::PostingStore;
use harvest_types::{Posting, PostingId};

use crate::error::PipelineError;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 85.0;

/// Lowercase, split on non-alphanumerics, sort, and re-join.
fn token_sort(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Indel ratio of two already token-sorted strings, in `0..=100`.
fn sorted_ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
}

/// Token-sort ratio in `0..=100`.
pub fn similarity(a: &str, b: &str) -> f64 {
    sorted_ratio(&token_sort(a), &token_sort(b))
}

fn match_text(posting: &Posting) -> String {
    format!("{} {} {}", posting.title, posting.company, posting.location)
}

/// One duplicate found by a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateMatch {
    pub duplicate_id: PostingId,
    pub original_id: PostingId,
    /// Similarity score; 100 for a URL match
    pub score: f64,
}

/// Result of one deduplication pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    /// Live postings considered
    pub eligible: usize,
    pub matches: Vec<DuplicateMatch>,
    /// Older duplicates re-pointed at a new surviving original
    pub repointed: usize,
}

impl DedupReport {
    pub fn duplicates_found(&self) -> usize {
        self.matches.len()
    }
}

/// Result of an explicit merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub kept: Posting,
    pub removed_id: PostingId,
    /// Fields copied from the removed posting into the kept one
    pub fields_copied: Vec<&'static str>,
}

/// Finds and marks duplicates across sources.
pub struct DeduplicationEngine {
    store: Arc<dyn PostingStore>,
    threshold: f64,
}

impl DeduplicationEngine {
    pub fn new(store: Arc<dyn PostingStore>, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run one pass over the active, non-duplicate corpus.
    pub fn run(&self) -> Result<DedupReport, PipelineError> {
        let all = self.store.scan_postings()?;

        // Earliest first, so the survivor of any pair is the lower index
        let mut live: Vec<&Posting> = all.iter().filter(|p| p.is_live()).collect();
        live.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then(a.id.cmp(&b.id)));
        let keys: Vec<String> = live.iter().map(|p| token_sort(&match_text(p))).collect();

        let mut report = DedupReport {
            eligible: live.len(),
            ..Default::default()
        };
        let mut removed = vec![false; live.len()];

        for i in 0..live.len() {
            if removed[i] {
                continue;
            }
            for j in (i + 1)..live.len() {
                if removed[j] || live[i].source == live[j].source {
                    continue;
                }
                let score = if live[i].canonical_url == live[j].canonical_url {
                    100.0
                } else {
                    sorted_ratio(&keys[i], &keys[j])
                };
                if score >= self.threshold {
                    debug!(
                        original = live[i].id,
                        duplicate = live[j].id,
                        score,
                        "Duplicate found"
                    );
                    removed[j] = true;
                    report.matches.push(DuplicateMatch {
                        duplicate_id: live[j].id,
                        original_id: live[i].id,
                        score,
                    });
                }
            }
        }

        if report.matches.is_empty() {
            debug!(eligible = report.eligible, "No duplicates found");
            return Ok(report);
        }

        let survivor: HashMap<PostingId, PostingId> = report
            .matches
            .iter()
            .map(|m| (m.duplicate_id, m.original_id))
            .collect();

        let now = Utc::now();
        let mut changed = Vec::new();
        for posting in &all {
            if let Some(&original) = survivor.get(&posting.id) {
                let mut posting = posting.clone();
                posting.is_duplicate = true;
                posting.duplicate_of = Some(original);
                posting.updated_at = now;
                changed.push(posting);
            } else if let Some(&original) = posting
                .duplicate_of
                .as_ref()
                .and_then(|target| survivor.get(target))
            {
                // Its original just became a duplicate itself
                let mut posting = posting.clone();
                posting.duplicate_of = Some(original);
                posting.updated_at = now;
                changed.push(posting);
                report.repointed += 1;
            }
        }

        self.store.commit_postings(&changed)?;
        info!(
            eligible = report.eligible,
            duplicates = report.duplicates_found(),
            repointed = report.repointed,
            "Deduplication pass complete"
        );
        Ok(report)
    }

    /// Fold `remove_id` into `keep_id`.
    ///
    /// Copies each empty optional field (description, requirements,
    /// benefits, salary) of the kept posting from the removed one, never
    /// overwriting a value, then marks the removed posting a duplicate of
    /// the kept one.
    pub fn merge(&self, keep_id: PostingId, remove_id: PostingId) -> Result<MergeReport, PipelineError> {
        if keep_id == remove_id {
            return Err(PipelineError::InvalidInput(
                "cannot merge a posting into itself".to_string(),
            ));
        }

        let mut keep = self
            .store
            .get_posting(keep_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("posting {keep_id}")))?;
        let mut remove = self
            .store
            .get_posting(remove_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("posting {remove_id}")))?;

        if keep.is_duplicate {
            return Err(PipelineError::InvalidInput(format!(
                "posting {keep_id} is itself a duplicate of {:?}",
                keep.duplicate_of
            )));
        }
        if remove.is_duplicate && remove.duplicate_of != Some(keep_id) {
            return Err(PipelineError::InvalidInput(format!(
                "posting {remove_id} is already a duplicate of {:?}",
                remove.duplicate_of
            )));
        }
        if remove.posted_at < keep.posted_at {
            return Err(PipelineError::InvalidInput(format!(
                "posting {remove_id} was posted before {keep_id}; keep the earlier one"
            )));
        }

        let mut fields_copied = Vec::new();
        if keep.description.trim().is_empty() && !remove.description.trim().is_empty() {
            keep.description = remove.description.clone();
            fields_copied.push("description");
        }
        for (name, target, donor) in [
            ("requirements", &mut keep.requirements, &remove.requirements),
            ("benefits", &mut keep.benefits, &remove.benefits),
            ("salary", &mut keep.salary, &remove.salary),
        ] {
            if target.is_none() && donor.is_some() {
                *target = donor.clone();
                fields_copied.push(name);
            }
        }

        let now = Utc::now();
        keep.updated_at = now;
        remove.is_duplicate = true;
        remove.duplicate_of = Some(keep_id);
        remove.updated_at = now;

        let mut changed = vec![keep.clone(), remove];
        for mut dependent in self.store.scan_postings()? {
            if dependent.duplicate_of == Some(remove_id) {
                dependent.duplicate_of = Some(keep_id);
                dependent.updated_at = now;
                changed.push(dependent);
            }
        }

        self.store.commit_postings(&changed)?;
        info!(keep = keep_id, removed = remove_id, fields = ?fields_copied, "Postings merged");

        Ok(MergeReport {
            kept: keep,
            removed_id: remove_id,
            fields_copied,
        })
    }
}
