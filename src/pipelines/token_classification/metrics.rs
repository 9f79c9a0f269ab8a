use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// An entity span over word positions, `end` exclusive
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    /// The entity type (e.g., "PER")
    pub label: String,

    /// The first word of the span
    pub start: usize,

    /// One past the last word of the span
    pub end: usize,
}

/// Precision, recall and F1 for a set of spans
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Scores {
    /// Correct predicted spans over all predicted spans
    pub precision: f64,

    /// Correct predicted spans over all gold spans
    pub recall: f64,

    /// Harmonic mean of precision and recall
    pub f1: f64,

    /// Number of gold spans
    pub support: usize,
}

impl Scores {
    fn from_counts(correct: usize, predicted: usize, gold: usize) -> Self {
        let precision = ratio(correct, predicted);
        let recall = ratio(correct, gold);

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
            support: gold,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Micro-averaged span scores plus a breakdown per entity type
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Report {
    /// Scores over all entity types
    pub micro: Scores,

    /// Scores per entity type
    pub per_label: BTreeMap<String, Scores>,
}

/// Split a BIO tag into its prefix and entity type. Anything else counts as outside.
fn parse_tag(tag: &str) -> Option<(char, &str)> {
    match tag.split_once('-') {
        Some(("B", kind)) => Some(('B', kind)),
        Some(("I", kind)) => Some(('I', kind)),
        _ => None,
    }
}

/// Extract entity spans from a sequence of BIO tags. An `I-` tag that does not continue a span of
/// the same type starts a new one.
pub fn extract_spans<S: AsRef<str>>(tags: &[S]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current: Option<(usize, &str)> = None;

    for (i, tag) in tags.iter().enumerate() {
        let parsed = parse_tag(tag.as_ref());

        if let Some((start, kind)) = current {
            let continues = matches!(parsed, Some(('I', next)) if next == kind);

            if !continues {
                spans.push(Span {
                    label: kind.to_string(),
                    start,
                    end: i,
                });
                current = None;
            }
        }

        if current.is_none() {
            current = parsed.map(|(_, kind)| (i, kind));
        }
    }

    if let Some((start, kind)) = current {
        spans.push(Span {
            label: kind.to_string(),
            start,
            end: tags.len(),
        });
    }

    spans
}

/// Span-level F1 over parallel gold and predicted tag sequences
pub fn seq_f1<S: AsRef<str>>(gold: &[Vec<S>], predicted: &[Vec<S>]) -> Report {
    let collect = |sequences: &[Vec<S>]| -> HashSet<(usize, Span)> {
        sequences
            .iter()
            .enumerate()
            .flat_map(|(i, tags)| extract_spans(tags).into_iter().map(move |span| (i, span)))
            .collect()
    };

    let gold = collect(gold);
    let predicted = collect(predicted);

    let mut counts: BTreeMap<String, (usize, usize, usize)> = BTreeMap::new();

    for (_, span) in &gold {
        counts.entry(span.label.clone()).or_default().2 += 1;
    }

    for entry in &predicted {
        let count = counts.entry(entry.1.label.clone()).or_default();
        count.1 += 1;

        if gold.contains(entry) {
            count.0 += 1;
        }
    }

    let (correct, n_predicted, n_gold) = counts
        .values()
        .fold((0, 0, 0), |acc, c| (acc.0 + c.0, acc.1 + c.1, acc.2 + c.2));

    Report {
        micro: Scores::from_counts(correct, n_predicted, n_gold),
        per_label: counts
            .into_iter()
            .map(|(label, (c, p, g))| (label, Scores::from_counts(c, p, g)))
            .collect(),
    }
}
