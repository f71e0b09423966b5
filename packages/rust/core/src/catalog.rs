//! In-memory funnel matcher.
//!
//! The [`Catalog`] is built once from the loaded dataset and never mutated.
//! Every lookup is a linear scan over one category's records in load order,
//! so when two records share an answer prefix the earlier one wins.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use servicefunnel_dataset::{LoadOptions, load_dataset};
use servicefunnel_shared::{FunnelStep, NextStep, Result, ServiceFunnelError, ServiceRecord};
use tracing::{debug, warn};

/// Immutable table of service records, indexed by category.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<ServiceRecord>,
    /// Record indices per category, in load order.
    by_category: HashMap<String, Vec<usize>>,
}

/// Record count for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category_id: String,
    pub records: usize,
}

/// Two records in one category where the earlier one's answers are a prefix
/// of the later one's (or the reverse). First-match means `shadowed` can
/// never be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub category_id: String,
    /// Service id of the earlier record, which wins every lookup.
    pub winner: String,
    /// Service id of the later record.
    pub shadowed: String,
    /// The answers both records start with.
    pub shared_answers: Vec<String>,
}

impl Catalog {
    /// Build a catalog from records in load order.
    ///
    /// Records with an empty funnel cannot be matched and are dropped.
    pub fn new(records: Vec<ServiceRecord>) -> Self {
        let records: Vec<ServiceRecord> = records
            .into_iter()
            .filter(|r| {
                if r.funnel.is_empty() {
                    warn!(service_id = %r.service_id, "dropping record with empty funnel");
                    false
                } else {
                    true
                }
            })
            .collect();

        let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            by_category
                .entry(record.category_id.trim().to_string())
                .or_default()
                .push(idx);
        }

        Self {
            records,
            by_category,
        }
    }

    /// Load the dataset file and build a catalog from it.
    pub fn load(path: &Path, opts: &LoadOptions) -> Result<Self> {
        Ok(Self::new(load_dataset(path, opts)?))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in load order.
    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    fn in_category<'a>(&'a self, category_id: &str) -> impl Iterator<Item = &'a ServiceRecord> {
        self.by_category
            .get(category_id.trim())
            .into_iter()
            .flatten()
            .map(|&idx| &self.records[idx])
    }

    /// The first question of a category's funnel and its options.
    pub fn first_question(&self, category_id: &str) -> Result<FunnelStep> {
        let record = self.in_category(category_id).next().ok_or_else(|| {
            ServiceFunnelError::CategoryNotFound {
                category_id: category_id.to_string(),
            }
        })?;

        let question = record.funnel.pairs()[0].question.clone();
        let options = self.distinct_options(category_id, &question);
        debug!(category_id, %question, options = options.len(), "first question");

        Ok(FunnelStep { question, options })
    }

    /// Advance the funnel past `answers`.
    ///
    /// Picks the first record (load order) whose funnel starts with exactly
    /// these answers. Returns its next question, or its service id if the
    /// answers cover the whole funnel.
    pub fn next_step(&self, category_id: &str, answers: &[String]) -> Result<NextStep> {
        let depth = answers.len();
        let matched = self
            .in_category(category_id)
            .find(|record| {
                record.funnel.len() >= depth
                    && record
                        .funnel
                        .answers()
                        .zip(answers)
                        .all(|(expected, given)| expected == given.trim())
            })
            .ok_or_else(|| ServiceFunnelError::NoMatchingService {
                category_id: category_id.to_string(),
            })?;

        if let Some(pair) = matched.funnel.pairs().get(depth) {
            let options = self.distinct_options(category_id, &pair.question);
            debug!(category_id, depth, question = %pair.question, "next question");
            Ok(NextStep::Question(FunnelStep {
                question: pair.question.clone(),
                options,
            }))
        } else {
            debug!(category_id, service_id = %matched.service_id, "funnel complete");
            Ok(NextStep::Complete {
                service_id: matched.service_id.clone(),
            })
        }
    }

    /// Every answer offered for `question` anywhere in the category.
    ///
    /// For each record, the first pair whose question contains `question`
    /// contributes its answer. Order of first appearance; duplicates collapsed.
    pub fn distinct_options(&self, category_id: &str, question: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut options = Vec::new();

        for record in self.in_category(category_id) {
            let pair = record
                .funnel
                .pairs()
                .iter()
                .find(|p| p.question.contains(question));

            if let Some(pair) = pair {
                if seen.insert(pair.answer.as_str()) {
                    options.push(pair.answer.clone());
                }
            }
        }

        options
    }

    /// Categories in order of first appearance with their record counts.
    pub fn categories(&self) -> Vec<CategorySummary> {
        let mut summaries: Vec<CategorySummary> = self
            .by_category
            .iter()
            .map(|(id, indices)| CategorySummary {
                category_id: id.clone(),
                records: indices.len(),
            })
            .collect();
        summaries.sort_by_key(|s| self.by_category[&s.category_id][0]);
        summaries
    }

    /// Record pairs that break the prefix-tree rule within their category.
    pub fn ambiguities(&self) -> Vec<Ambiguity> {
        let mut found = Vec::new();

        for summary in self.categories() {
            let indices = &self.by_category[&summary.category_id];
            for (pos, &earlier) in indices.iter().enumerate() {
                for &later in &indices[pos + 1..] {
                    let a = &self.records[earlier];
                    let b = &self.records[later];
                    let shared = a.funnel.len().min(b.funnel.len());

                    if a.funnel.answers().take(shared).eq(b.funnel.answers().take(shared)) {
                        found.push(Ambiguity {
                            category_id: summary.category_id.clone(),
                            winner: a.service_id.clone(),
                            shadowed: b.service_id.clone(),
                            shared_answers: a
                                .funnel
                                .answers()
                                .take(shared)
                                .map(str::to_string)
                                .collect(),
                        });
                    }
                }
            }
        }

        found
    }
}
