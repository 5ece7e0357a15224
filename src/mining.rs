//! Query batteries for signal mining.

use std::{io::Write, path::Path};

use crate::{
    error::Result,
    index::ColbertIndex,
    model_manager::Encoder,
    search::{
        self,
        EmptyNotice,
        QueryResults,
        SearchMode,
        apply_threshold,
    },
};

/// High-signal prompts for surfacing pain points and unmet needs.
pub const SIGNAL_QUERIES: [&str; 10] = [
    "Messages where the speaker expresses strong frustration",
    "Parts of the chat where the speaker wishes something existed",
    "Examples of someone obsessing over a problem or idea",
    "Complaints about inefficient tools or workflows",
    "Venting about things that take too much time",
    "Manual workarounds that feel annoying or broken",
    "Recurring problems that keep coming up",
    "Moments when the speaker is clearly annoyed",
    "Someone expressing emotional stress or dissatisfaction",
    "Discussions about needs that aren't being met",
];

/// Frustration, obsession, rant and idea prompts.
pub const FRUSTRATION_QUERIES: [&str; 10] = [
    "What does he keep complaining about?",
    "What recurring problems or rants show up across conversations?",
    "What ideas or thoughts keep coming up?",
    "What\u{2019}s something he seems obsessed with?",
    "What causes emotional frustration or stress?",
    "What are the repeated emotional themes?",
    "Which parts of the conversation feel intense or dramatic?",
    "What issues keep getting revisited?",
    "Where does he vent or express dissatisfaction?",
    "Which goals or problems come up over and over?",
];

/// A built-in set of queries with its default settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Battery {
    /// Strong frustration, wishes, broken workflows
    #[default]
    Signals,
    /// Complaints, obsessions, recurring themes
    Frustrations,
}

impl Battery {
    pub fn queries(self) -> Vec<String> {
        let queries: &[&str] = match self {
            Battery::Signals => &SIGNAL_QUERIES,
            Battery::Frustrations => &FRUSTRATION_QUERIES,
        };
        queries.iter().map(|q| q.to_string()).collect()
    }

    pub fn default_top_k(self) -> usize {
        match self {
            Battery::Signals => 20,
            Battery::Frustrations => 10,
        }
    }

    pub fn default_threshold(self) -> Option<f32> {
        match self {
            Battery::Signals => Some(15.0),
            Battery::Frustrations => None,
        }
    }

    pub fn default_index_name(self) -> &'static str {
        match self {
            Battery::Signals => "Me",
            Battery::Frustrations => "PersonalConversation001",
        }
    }
}

/// Read queries from a text file: one per line, blank lines and lines
/// starting with `#` skipped.
pub fn load_queries_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_queries(&contents))
}

fn parse_queries(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// The outcome of one mined query.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedQuery {
    pub kept: QueryResults,
    /// How many results the index returned before thresholding.
    pub returned: usize,
}

impl MinedQuery {
    pub fn empty_notice(&self) -> EmptyNotice {
        if self.returned == 0 {
            EmptyNotice::NoResults
        } else {
            EmptyNotice::BelowThreshold
        }
    }
}

/// Run every query against the index and keep the results above
/// `threshold`.
pub fn run_queries<E: Encoder>(
    index: &mut ColbertIndex<E>,
    queries: &[String],
    top_k: usize,
    threshold: Option<f32>,
    mode: SearchMode,
) -> Result<Vec<MinedQuery>> {
    let mut mined = Vec::with_capacity(queries.len());
    for query in queries {
        let results = index.search(query, top_k, mode)?;
        let returned = results.len();
        let kept = apply_threshold(results, threshold);
        tracing::debug!(query, returned, kept = kept.len(), "mined");
        mined.push(MinedQuery {
            kept: QueryResults {
                query: query.clone(),
                results: kept,
            },
            returned,
        });
    }
    Ok(mined)
}

/// Print mined queries in the human format.
pub fn write_report(out: &mut impl Write, mined: &[MinedQuery]) -> Result<()> {
    for m in mined {
        search::write_query_human(out, &m.kept, m.empty_notice())?;
    }
    Ok(())
}

/// Strip run bookkeeping, leaving what gets saved or printed as JSON.
pub fn into_query_results(mined: Vec<MinedQuery>) -> Vec<QueryResults> {
    mined.into_iter().map(|m| m.kept).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_dir::IndexRoot,
        index::{IndexInput, IndexOptions},
        model_manager::test_encoder::WordHashEncoder,
    };

    #[test]
    fn battery_defaults() {
        assert_eq!(Battery::Signals.queries().len(), 10);
        assert_eq!(Battery::Signals.default_top_k(), 20);
        assert_eq!(Battery::Signals.default_threshold(), Some(15.0));
        assert_eq!(Battery::Signals.default_index_name(), "Me");
        assert_eq!(Battery::Frustrations.default_top_k(), 10);
        assert_eq!(Battery::Frustrations.default_threshold(), None);
    }

    #[test]
    fn queries_file_skips_comments_and_blanks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queries.txt");
        std::fs::write(&path, "# header\n\n first query \nsecond\n  # indented\n")
            .unwrap();
        assert_eq!(load_queries_file(&path).unwrap(), vec!["first query", "second"]);
    }

    #[test]
    fn threshold_and_notices() {
        let tmp = tempfile::tempdir().unwrap();
        let root = IndexRoot::resolve(Some(tmp.path()));
        let input = IndexInput {
            documents: vec![
                "the deploy script is broken again".into(),
                "lunch was fine".into(),
            ],
            document_ids: vec!["a_1_chunk_1".into(), "b_1_chunk_1".into()],
            metadatas: vec![Default::default(), Default::default()],
        };
        let mut index = ColbertIndex::build(
            &root,
            "Me",
            WordHashEncoder,
            input,
            IndexOptions::default(),
        )
        .unwrap();

        let queries = vec!["deploy script broken".to_string()];
        let mined =
            run_queries(&mut index, &queries, 5, Some(2.5), SearchMode::Semantic)
                .unwrap();
        assert_eq!(mined[0].returned, 2);
        assert_eq!(mined[0].kept.results.len(), 1);
        assert_eq!(mined[0].kept.results[0].document_id, "a_1_chunk_1");

        let strict =
            run_queries(&mut index, &queries, 5, Some(100.0), SearchMode::Semantic)
                .unwrap();
        assert_eq!(strict[0].empty_notice(), EmptyNotice::BelowThreshold);

        let mut out = Vec::new();
        write_report(&mut out, &strict).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Query: \"deploy script broken\""));
        assert!(text.contains("No strong matches above threshold."));

        let none = run_queries(&mut index, &queries, 5, None, SearchMode::Keyword)
            .unwrap();
        assert_eq!(none[0].kept.results.len(), 1);
    }
}
