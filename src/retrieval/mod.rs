//! Text-processing primitives for document analysis.
//!
//! Everything here is pure: query rewriting, numbered-section extraction,
//! chunking, and relevance-threshold selection. The rewrite rules and the
//! relevance fallback materially change retrieval behavior, so they are
//! fixed constants with tests pinning them down.

use regex::Regex;
use std::sync::OnceLock;

use crate::services::RankedCandidate;

/// Passages scoring below this floor are dropped (subject to the fallback).
pub const RELEVANCE_FLOOR: f32 = 0.35;

/// How many passages to keep from a rerank pass.
pub const TOP_PASSAGES: usize = 5;

/// Prompts shorter than this are too thin to retrieve against.
const MIN_QUERY_LEN: usize = 12;

/// Canned query used when the prompt is too short to carry signal.
pub const DEFAULT_QUERY: &str = "key provisions of this bill";

/// Fixed query for cost-estimate document reranking.
pub const COST_QUERY: &str = "cost and budget impact";

/// Rewrite a user prompt into a retrieval query.
///
/// Rules, applied in order:
/// 1. lowercase;
/// 2. cost-flavored vocabulary (`price`, `money`, `spend(ing)`, `expensive`,
///    `pay for`) is folded into the canonical `cost appropriations funding`
///    phrasing;
/// 3. authorship questions (`who wrote`, `who authored`, `author of`) fold
///    into `sponsors cosponsors`;
/// 4. anything shorter than the minimum length falls back to
///    [`DEFAULT_QUERY`].
pub fn rewrite_query(prompt: &str) -> String {
    let mut query = prompt.trim().to_lowercase();

    const COST_TERMS: [&str; 5] = ["price", "money", "spending", "spend", "expensive"];
    if query.contains("pay for") || COST_TERMS.iter().any(|t| query.contains(t)) {
        query = format!("{query} cost appropriations funding");
    }

    const AUTHOR_TERMS: [&str; 3] = ["who wrote", "who authored", "author of"];
    if AUTHOR_TERMS.iter().any(|t| query.contains(t)) {
        query = format!("{query} sponsors cosponsors");
    }

    if query.len() < MIN_QUERY_LEN {
        return DEFAULT_QUERY.to_string();
    }
    query
}

/// A numbered section extracted from bill text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// The heading line, e.g. `SEC. 2. DEFINITIONS.`
    pub heading: String,
    pub body: String,
}

impl Section {
    /// Heading and body as one passage for reranking/summarization.
    pub fn passage(&self) -> String {
        format!("{}\n{}", self.heading, self.body.trim())
    }
}

fn section_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Matches `SEC. 2.`, `SECTION 10.`, `Section 3A.` at line starts.
        Regex::new(r"(?mi)^\s*(sec(?:tion)?\.?\s+\d+[a-z]?\.?)").expect("section heading pattern")
    })
}

/// Split bill text into numbered sections.
///
/// Returns an empty vector when the document has no numbered headings;
/// callers fall back to [`chunk_text`].
pub fn split_sections(text: &str) -> Vec<Section> {
    let re = section_heading_re();
    let starts: Vec<usize> = re.find_iter(text).map(|m| m.start()).collect();
    let mut sections = Vec::with_capacity(starts.len());

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let block = &text[start..end];
        let mut lines = block.lines();
        let heading = lines.next().unwrap_or_default().trim().to_string();
        let body: String = lines.collect::<Vec<_>>().join("\n");
        sections.push(Section { heading, body });
    }
    sections
}

/// Paragraph-aware chunking for documents without section structure.
///
/// Paragraphs are packed into chunks of at most `max_chars`; a paragraph
/// longer than `max_chars` is split hard.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if !current.is_empty() && current.len() + paragraph.len() + 2 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if paragraph.len() > max_chars {
            for piece in hard_split(paragraph, max_chars) {
                chunks.push(piece);
            }
            continue;
        }
        if current.is_empty() {
            current.push_str(paragraph);
        } else {
            current.push_str("\n\n");
            current.push_str(paragraph);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(paragraph: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = paragraph.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// Apply the relevance floor with the best-candidate fallback.
///
/// Candidates at or above [`RELEVANCE_FLOOR`] survive. If *every* candidate
/// falls below the floor, the single best-scoring one is kept anyway; the
/// tool never returns zero results while a candidate exists. This is a
/// deliberate policy, not a bug.
pub fn select_relevant(ranked: Vec<RankedCandidate>, floor: f32) -> Vec<RankedCandidate> {
    if ranked.is_empty() {
        return ranked;
    }
    let best = ranked
        .iter()
        .cloned()
        .max_by(|a, b| {
            a.relevance_score
                .partial_cmp(&b.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("non-empty ranking has a maximum");

    let surviving: Vec<RankedCandidate> = ranked
        .into_iter()
        .filter(|c| c.relevance_score >= floor)
        .collect();
    if surviving.is_empty() {
        vec![best]
    } else {
        surviving
    }
}
