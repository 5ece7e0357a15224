//! Guided mining session: ask for an index, queries and settings, run
//! them, optionally save.

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use crate::{
    error::Result,
    index::ColbertIndex,
    mining,
    model_manager::Encoder,
    prompt::Prompter,
    search::{self, SearchMode},
};

pub const DEFAULT_INDEX_NAME: &str = "Me";
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_THRESHOLD: f32 = 15.0;
pub const DEFAULT_OUTPUT_FILE: &str = "results.json";

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The chosen index does not exist; nothing was run.
    IndexMissing(PathBuf),
    Completed { saved_to: Option<PathBuf> },
}

/// Run one interactive session. The encoder is only created once the
/// index has been found and all questions answered.
pub fn run_session<R, W, E>(
    prompter: &mut Prompter<R, W>,
    default_root: &Path,
    make_encoder: impl FnOnce() -> E,
    mode: SearchMode,
) -> Result<SessionOutcome>
where
    R: BufRead,
    W: Write,
    E: Encoder,
{
    prompter.say("Welcome to the semantic signal mining tool!")?;
    prompter.say(
        "You will be asked for queries and options, and can save the results at the end.\n",
    )?;

    let index_name = prompter.ask_string(
        &format!("Enter the name of the index (default: {DEFAULT_INDEX_NAME}): "),
        DEFAULT_INDEX_NAME,
    )?;
    let root_answer = prompter.ask_line(&format!(
        "Enter the path to the directory containing the index (default: {}): ",
        default_root.display()
    ))?;
    let root = if root_answer.is_empty() {
        default_root.to_path_buf()
    } else {
        PathBuf::from(root_answer)
    };
    let index_path = root.join(&index_name);

    if !index_path.is_dir() {
        prompter.say(&format!(
            "Index '{index_name}' not found at: {}",
            index_path.display()
        ))?;
        prompter.say("Exiting.")?;
        return Ok(SessionOutcome::IndexMissing(index_path));
    }

    let count = prompter.ask_positive_int(
        "\nHow many queries do you want to provide? (e.g., 1, 2, 3...): ",
    )?;
    let mut queries = Vec::with_capacity(count);
    for i in 1..=count {
        queries.push(prompter.ask_line(&format!("Enter query #{i}: "))?);
    }

    let top_k = prompter.ask_positive_int_or(
        &format!(
            "\nEnter the number of search results to retrieve for each query (top_k) [default: {DEFAULT_TOP_K}]: "
        ),
        DEFAULT_TOP_K,
    )?;
    let threshold = prompter.ask_number_or(
        &format!(
            "Enter the minimum score threshold for displaying results [default: {DEFAULT_THRESHOLD}]: "
        ),
        DEFAULT_THRESHOLD,
    )?;

    prompter.say(&format!(
        "\nUsing existing index: '{index_name}' at {}",
        index_path.display()
    ))?;
    let mut index = ColbertIndex::open(&index_path, make_encoder())?;

    prompter.say(&format!(
        "\nRunning semantic signal mining (score threshold = {threshold}, top_k = {top_k})...\n"
    ))?;
    let mined =
        mining::run_queries(&mut index, &queries, top_k, Some(threshold), mode)?;
    mining::write_report(prompter.output(), &mined)?;

    let saved_to = if prompter
        .confirm("Do you want to save the results to a JSON file? (y/N): ")?
    {
        let output = PathBuf::from(prompter.ask_string(
            &format!(
                "Enter the path/filename to save results (e.g., {DEFAULT_OUTPUT_FILE}): "
            ),
            DEFAULT_OUTPUT_FILE,
        )?);
        search::save_results(&output, &mining::into_query_results(mined))?;
        let shown = std::fs::canonicalize(&output).unwrap_or(output);
        prompter.say(&format!("Results saved to '{}'", shown.display()))?;
        Some(shown)
    } else {
        prompter.say("Results were not saved to a file.")?;
        None
    };

    prompter.say("\nDone! Thank you for using the semantic signal mining tool.")?;
    Ok(SessionOutcome::Completed { saved_to })
}
