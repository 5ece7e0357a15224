use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::{chunk::Metadata, chunking::excerpt, error::Result};

/// Characters of passage content shown per result.
pub const CONTENT_PREVIEW_CHARS: usize = 500;

const RULE_WIDTH: usize = 60;

/// How a query is matched against the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchMode {
    /// ColBERT MaxSim against every passage
    #[default]
    Semantic,
    /// BM25 candidates reranked with ColBERT MaxSim
    Hybrid,
    /// BM25 only
    Keyword,
}

/// One ranked passage returned by an index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub score: f32,
    pub document_id: String,
    pub document_metadata: Metadata,
    pub content: String,
}

/// A query with the results kept for it; the unit of the JSON save file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Keep results whose score is strictly above `threshold`, in their
/// original order.
///
/// # Examples
///
/// ```
/// use chatbert::search::{SearchResult, filter_by_score};
///
/// let make = |rank, score| SearchResult {
///     rank,
///     score,
///     document_id: format!("doc_{rank}"),
///     document_metadata: Default::default(),
///     content: String::new(),
/// };
///
/// let kept = filter_by_score(vec![make(1, 20.0), make(2, 10.0), make(3, 16.0)], 15.0);
/// let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
/// assert_eq!(scores, vec![20.0, 16.0]);
/// ```
pub fn filter_by_score(
    results: impl IntoIterator<Item = SearchResult>,
    threshold: f32,
) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.score > threshold)
        .collect()
}

/// Apply an optional threshold.
pub fn apply_threshold(
    results: Vec<SearchResult>,
    threshold: Option<f32>,
) -> Vec<SearchResult> {
    match threshold {
        Some(t) => filter_by_score(results, t),
        None => results,
    }
}

/// Write one result block: separator, rank, score, ID, metadata, content
/// preview.
pub fn write_result(out: &mut impl Write, result: &SearchResult) -> Result<()> {
    let metadata = serde_json::to_string(&result.document_metadata)?;
    writeln!(out, "\n---")?;
    writeln!(out, "Rank: {}", result.rank)?;
    writeln!(out, "Score: {:.2}", result.score)?;
    writeln!(out, "Document ID: {}", result.document_id)?;
    writeln!(out, "Metadata: {metadata}")?;
    writeln!(
        out,
        "Content:\n{}...",
        excerpt(&result.content, CONTENT_PREVIEW_CHARS)
    )?;
    Ok(())
}

/// What to say when a query comes back with nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyNotice {
    /// The index returned nothing at all.
    NoResults,
    /// Results came back but none passed the threshold.
    BelowThreshold,
}

impl EmptyNotice {
    fn message(self) -> &'static str {
        match self {
            EmptyNotice::NoResults => "No results returned.",
            EmptyNotice::BelowThreshold => "No strong matches above threshold.",
        }
    }
}

/// Human-readable block for one query.
pub fn write_query_human(
    out: &mut impl Write,
    query: &QueryResults,
    empty: EmptyNotice,
) -> Result<()> {
    writeln!(out, "Query: \"{}\"", query.query)?;

    if query.results.is_empty() {
        writeln!(out, "{}\n", empty.message())?;
        // An empty index result ends the block without a rule.
        if empty == EmptyNotice::NoResults {
            return Ok(());
        }
    } else {
        for result in &query.results {
            write_result(out, result)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}\n", "=".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Pretty JSON array of query results.
pub fn write_json(out: &mut impl Write, queries: &[QueryResults]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, queries)?;
    writeln!(out)?;
    Ok(())
}

/// Save query results as pretty JSON, keeping non-ASCII text as-is.
pub fn save_results(
    path: &std::path::Path,
    queries: &[QueryResults],
) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_json(&mut file, queries)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn result(rank: usize, score: f32, content: &str) -> SearchResult {
        let mut document_metadata = Metadata::new();
        document_metadata.insert("chatTitle".into(), json!("Test Chat"));
        SearchResult {
            rank,
            score,
            document_id: format!("test_chat_{rank}_chunk_1"),
            document_metadata,
            content: content.to_string(),
        }
    }

    #[test]
    fn filter_keeps_order_and_is_strict() {
        let results = vec![
            result(1, 20.0, "a"),
            result(2, 10.0, "b"),
            result(3, 16.0, "c"),
            result(4, 15.0, "d"),
        ];
        let kept = filter_by_score(results, 15.0);
        let ranks: Vec<usize> = kept.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 3]);
    }

    #[test]
    fn no_threshold_keeps_everything() {
        let results = vec![result(1, -3.0, "a")];
        assert_eq!(apply_threshold(results.clone(), None), results);
    }

    #[test]
    fn human_block_truncates_content() {
        let long = "x".repeat(800);
        let mut out = Vec::new();
        write_result(&mut out, &result(1, 17.256, &long)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Rank: 1"));
        assert!(text.contains("Score: 17.26"));
        assert!(text.contains("Document ID: test_chat_1_chunk_1"));
        assert!(text.contains(r#"Metadata: {"chatTitle":"Test Chat"}"#));
        assert!(text.contains(&format!("{}...", "x".repeat(500))));
        assert!(!text.contains(&"x".repeat(501)));
    }

    #[test]
    fn empty_query_notice() {
        let query = QueryResults {
            query: "anything".into(),
            results: vec![],
        };
        let mut out = Vec::new();
        write_query_human(&mut out, &query, EmptyNotice::BelowThreshold)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("No strong matches above threshold."));
        assert!(text.contains(&"=".repeat(60)));
    }

    #[test]
    fn no_results_block_has_no_rule() {
        let query = QueryResults {
            query: "nothing matches".into(),
            results: vec![],
        };
        let mut out = Vec::new();
        write_query_human(&mut out, &query, EmptyNotice::NoResults).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Query: \"nothing matches\"\nNo results returned.\n\n");
        assert!(!text.contains('='));
    }

    #[test]
    fn saved_json_round_trips_and_keeps_unicode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.json");
        let queries = vec![QueryResults {
            query: "frustration".into(),
            results: vec![result(1, 21.5, "ça ne marche pas 😤")],
        }];

        save_results(&path, &queries).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("ça ne marche pas 😤"));
        let back: Vec<QueryResults> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, queries);
    }
}
