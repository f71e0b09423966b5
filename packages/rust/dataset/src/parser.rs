//! Question Funnel string parser.
//!
//! A funnel cell encodes an ordered list of (question, answer) pairs:
//! - Pairs are separated by ` | `
//! - Within a pair, question and answer are separated by the first `>`,
//!   with optional whitespace around it
//!
//! `Type > Repair | Material > Wood` parses to two pairs.

use servicefunnel_shared::{Funnel, FunnelPair, Result, ServiceFunnelError};

/// Separator between pairs.
const PAIR_SEPARATOR: &str = " | ";

/// Separator between a pair's question and answer.
const ANSWER_SEPARATOR: char = '>';

/// Parse a funnel cell into its pairs.
///
/// Fails on an empty cell, a pair without `>`, or a pair whose question or
/// answer is blank; such a row cannot be matched against.
pub(crate) fn parse_funnel(raw: &str) -> Result<Funnel> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceFunnelError::validation("empty question funnel"));
    }

    let mut pairs = Vec::new();
    for (idx, segment) in raw.split(PAIR_SEPARATOR).enumerate() {
        let (question, answer) = segment.split_once(ANSWER_SEPARATOR).ok_or_else(|| {
            ServiceFunnelError::validation(format!(
                "pair {} '{}' has no '{ANSWER_SEPARATOR}'",
                idx + 1,
                segment.trim()
            ))
        })?;

        let question = question.trim();
        let answer = answer.trim();
        if question.is_empty() || answer.is_empty() {
            return Err(ServiceFunnelError::validation(format!(
                "pair {} '{}' has an empty question or answer",
                idx + 1,
                segment.trim()
            )));
        }

        pairs.push(FunnelPair {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    Ok(Funnel(pairs))
}
