use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use chatbert::{
    chunking::DEFAULT_MAX_DOCUMENT_LENGTH,
    embedding::DEFAULT_BATCH_SIZE,
    interactive::DEFAULT_INDEX_NAME,
    loader::DEFAULT_CHUNK_PATTERN,
    mining::Battery,
    search::SearchMode,
};

#[derive(Debug, Parser)]
#[command(
    name = "chatbert",
    about = "Semantic signal mining over chunked conversation transcripts",
    version
)]
pub struct Cli {
    /// Directory holding named indexes [env: CHATBERT_INDEX_ROOT]
    #[arg(long, global = true)]
    pub index_root: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path [env: CHATBERT_MODEL]
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index every chunked conversation file in a directory
    Index(IndexArgs),
    /// Run a battery of mining queries against an index
    Mine(MineArgs),
    /// Guided session: choose an index, enter queries, save results
    Interactive(InteractiveArgs),
    /// Run one query against an index
    Search(SearchArgs),
    /// Index a Wikipedia page split into passages and query it
    Demo(DemoArgs),
    /// Split a document into passages and print them
    Split(SplitArgs),
    /// List indexes and their build settings
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

fn positive_usize(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("'{s}' is not a positive integer")),
    }
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Directory containing the chunked conversation files
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// File name glob for chunked conversation files
    #[arg(long, default_value = DEFAULT_CHUNK_PATTERN)]
    pub pattern: String,

    /// Index name
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub name: String,

    /// Maximum tokens per encoded document
    #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENT_LENGTH, value_parser = positive_usize)]
    pub max_document_length: usize,

    /// Split long documents into passages instead of truncating them
    #[arg(long)]
    pub split_documents: bool,

    /// Rebuild the index even if it already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Documents encoded per model call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = positive_usize)]
    pub batch_size: usize,
}

// -- Mine --

#[derive(Debug, Parser)]
pub struct MineArgs {
    /// Built-in query battery
    #[arg(long, value_enum, default_value_t = Battery::Signals)]
    pub battery: Battery,

    /// Index name (default depends on the battery)
    #[arg(long)]
    pub index: Option<String>,

    /// Read queries from a file instead (one per line, # for comments)
    #[arg(long)]
    pub queries_file: Option<PathBuf>,

    /// Results retrieved per query (default depends on the battery)
    #[arg(short = 'k', long, value_parser = positive_usize)]
    pub top_k: Option<usize>,

    /// Only keep results scoring above this (default depends on the battery)
    #[arg(long, conflicts_with = "no_threshold")]
    pub threshold: Option<f32>,

    /// Keep every result regardless of score
    #[arg(long)]
    pub no_threshold: bool,

    /// How queries are matched
    #[arg(long, value_enum, default_value_t = SearchMode::Semantic)]
    pub mode: SearchMode,

    /// Build the index from this chunk file if it does not exist yet
    #[arg(long)]
    pub build_from: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Save results as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl MineArgs {
    pub fn index_name(&self) -> &str {
        self.index
            .as_deref()
            .unwrap_or_else(|| self.battery.default_index_name())
    }

    pub fn effective_top_k(&self) -> usize {
        self.top_k.unwrap_or_else(|| self.battery.default_top_k())
    }

    pub fn effective_threshold(&self) -> Option<f32> {
        if self.no_threshold {
            None
        } else {
            self.threshold.or_else(|| self.battery.default_threshold())
        }
    }
}

// -- Interactive --

#[derive(Debug, Parser)]
pub struct InteractiveArgs {
    /// How queries are matched
    #[arg(long, value_enum, default_value_t = SearchMode::Semantic)]
    pub mode: SearchMode,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Index name
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub index: String,

    /// Number of results to return
    #[arg(short = 'k', long, default_value = "10", value_parser = positive_usize)]
    pub top_k: usize,

    /// Only keep results scoring above this
    #[arg(long)]
    pub threshold: Option<f32>,

    /// How the query is matched
    #[arg(long, value_enum, default_value_t = SearchMode::Semantic)]
    pub mode: SearchMode,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Demo --

#[derive(Debug, Parser)]
pub struct DemoArgs {
    /// Wikipedia page title
    #[arg(long, default_value = "Hayao_Miyazaki")]
    pub title: String,

    /// Index name
    #[arg(long, default_value = "Miyazaki")]
    pub name: String,

    /// Document ID given to the page
    #[arg(long, default_value = "miyazaki")]
    pub document_id: String,

    /// Query to run against the page
    #[arg(long, default_value = "What animation studio did Miyazaki found?")]
    pub query: String,

    /// Second query for the batch search
    #[arg(long, default_value = "Miyazaki son name")]
    pub second_query: String,

    /// Maximum tokens per passage
    #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENT_LENGTH, value_parser = positive_usize)]
    pub max_document_length: usize,

    /// Rebuild the index if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

// -- Split --

#[derive(Debug, Parser)]
pub struct SplitArgs {
    /// Wikipedia page title to fetch
    #[arg(long, default_value = "Hayao_Miyazaki", conflicts_with = "file")]
    pub title: String,

    /// Split a local text file instead of fetching a page
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Document ID given to the passages
    #[arg(long, default_value = "miyazaki")]
    pub document_id: String,

    /// Maximum tokens per passage
    #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENT_LENGTH, value_parser = positive_usize)]
    pub max_tokens: usize,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "chatbert",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_index_defaults() {
        let cli = Cli::parse_from(["chatbert", "index"]);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.data_dir, PathBuf::from("data"));
                assert_eq!(args.pattern, "conversation_*.chunked.json");
                assert_eq!(args.name, "Me");
                assert_eq!(args.max_document_length, 180);
                assert!(!args.split_documents);
                assert!(!args.overwrite);
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn mine_defaults_follow_battery() {
        let cli = Cli::parse_from(["chatbert", "mine"]);
        let Command::Mine(args) = cli.command else {
            panic!("expected mine command");
        };
        assert_eq!(args.index_name(), "Me");
        assert_eq!(args.effective_top_k(), 20);
        assert_eq!(args.effective_threshold(), Some(15.0));

        let cli = Cli::parse_from(["chatbert", "mine", "--battery", "frustrations"]);
        let Command::Mine(args) = cli.command else {
            panic!("expected mine command");
        };
        assert_eq!(args.index_name(), "PersonalConversation001");
        assert_eq!(args.effective_top_k(), 10);
        assert_eq!(args.effective_threshold(), None);
    }

    #[test]
    fn mine_overrides() {
        let cli = Cli::parse_from([
            "chatbert",
            "mine",
            "--index",
            "Work",
            "-k",
            "5",
            "--no-threshold",
            "--mode",
            "hybrid",
        ]);
        let Command::Mine(args) = cli.command else {
            panic!("expected mine command");
        };
        assert_eq!(args.index_name(), "Work");
        assert_eq!(args.effective_top_k(), 5);
        assert_eq!(args.effective_threshold(), None);
        assert_eq!(args.mode, SearchMode::Hybrid);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(Cli::try_parse_from(["chatbert", "search", "q", "-k", "0"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "chatbert",
            "status",
            "--index-root",
            "/tmp/idx",
            "--model",
            "custom/model",
            "-vv",
        ]);
        assert_eq!(cli.index_root, Some(PathBuf::from("/tmp/idx")));
        assert_eq!(cli.model.as_deref(), Some("custom/model"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn split_title_and_file_conflict() {
        assert!(
            Cli::try_parse_from([
                "chatbert", "split", "--title", "X", "--file", "a.txt"
            ])
            .is_err()
        );
    }
}
