use std::{
    io::{BufWriter, Write},
    time::Instant,
};

use chatbert::{
    ColbertIndex,
    IndexRoot,
    ModelManager,
    chunk::Metadata,
    chunking,
    error::{self, Error},
    index::{IndexInput, IndexManifest, IndexOptions},
    interactive,
    loader,
    mining,
    prompt::Prompter,
    search::{self, EmptyNotice, QueryResults},
    wikipedia,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

const LOG_ENV_VAR: &str = "CHATBERT_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV_VAR) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root = IndexRoot::resolve(cli.index_root.as_deref());
    let model = cli.model.as_deref();

    match cli.command {
        Command::Index(args) => cmd_index(&root, model, &args)?,
        Command::Mine(args) => cmd_mine(&root, model, &args)?,
        Command::Interactive(args) => {
            let stdin = std::io::stdin();
            let mut prompter = Prompter::new(stdin.lock(), std::io::stdout());
            interactive::run_session(
                &mut prompter,
                root.root(),
                || ModelManager::resolve(model),
                args.mode,
            )?;
        }
        Command::Search(args) => cmd_search(&root, model, &args)?,
        Command::Demo(args) => cmd_demo(&root, model, &args)?,
        Command::Split(args) => cmd_split(&args)?,
        Command::Status(args) => cmd_status(&root, args.json)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn cmd_index(
    root: &IndexRoot,
    model: Option<&str>,
    args: &cli::IndexArgs,
) -> error::Result<()> {
    if root.index_exists(&args.name) && !args.overwrite {
        println!(
            "Index '{}' already exists at {}. Skipping indexing.",
            args.name,
            root.index_path(&args.name).display()
        );
        return Ok(());
    }

    let files = loader::discover_chunk_files(&args.data_dir, &args.pattern)?;
    if files.is_empty() {
        return Err(Error::Config(format!(
            "no files matching '{}' in {}",
            args.pattern,
            args.data_dir.display()
        )));
    }
    println!("Found {} files.", files.len());

    let chunks = loader::load_corpus(&files)?;
    println!("Total documents: {}", chunks.len());

    let index = ColbertIndex::build(
        root,
        &args.name,
        ModelManager::resolve(model),
        chunks.into(),
        IndexOptions {
            max_document_length: args.max_document_length,
            split_documents: args.split_documents,
            overwrite: args.overwrite,
            batch_size: args.batch_size,
        },
    )?;

    println!(
        "Indexing complete! Index name: {} ({} passages)",
        args.name,
        index.manifest().passage_count
    );
    Ok(())
}

fn cmd_mine(
    root: &IndexRoot,
    model: Option<&str>,
    args: &cli::MineArgs,
) -> error::Result<()> {
    let name = args.index_name();
    let queries = match &args.queries_file {
        Some(path) => mining::load_queries_file(path)?,
        None => args.battery.queries(),
    };
    if queries.is_empty() {
        return Err(Error::Config("no queries to run".to_string()));
    }

    let encoder = ModelManager::resolve(model);
    let index_path = root.index_path(name);
    let mut index = if root.index_exists(name) {
        eprintln!("Using existing index: '{name}'");
        ColbertIndex::open(&index_path, encoder)?
    } else if let Some(source) = &args.build_from {
        eprintln!("Loading chunks from {}...", source.display());
        let chunks = loader::load_chunks(source)?;
        eprintln!("Indexing {} chunks...", chunks.len());
        ColbertIndex::build(
            root,
            name,
            encoder,
            chunks.into(),
            IndexOptions::default(),
        )?
    } else {
        println!(
            "Index '{name}' not found at: {}",
            index_path.display()
        );
        return Ok(());
    };

    let top_k = args.effective_top_k();
    let threshold = args.effective_threshold();
    let mined =
        mining::run_queries(&mut index, &queries, top_k, threshold, args.mode)?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    if args.json {
        let results = mining::into_query_results(mined.clone());
        search::write_json(&mut out, &results)?;
    } else {
        match threshold {
            Some(t) => writeln!(
                out,
                "Running mining queries (top {top_k} each, only showing results with score > {t}):\n"
            )?,
            None => {
                writeln!(out, "Running mining queries (top {top_k} each):\n")?
            }
        }
        mining::write_report(&mut out, &mined)?;
    }
    out.flush()?;

    if let Some(path) = &args.output {
        search::save_results(path, &mining::into_query_results(mined))?;
        eprintln!("Results saved to '{}'", path.display());
    }
    Ok(())
}

fn cmd_search(
    root: &IndexRoot,
    model: Option<&str>,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let mut index = ColbertIndex::open(
        &root.index_path(&args.index),
        ModelManager::resolve(model),
    )?;

    let results = index.search(&args.query, args.top_k, args.mode)?;
    let notice = if results.is_empty() {
        EmptyNotice::NoResults
    } else {
        EmptyNotice::BelowThreshold
    };
    let query = QueryResults {
        query: args.query.clone(),
        results: search::apply_threshold(results, args.threshold),
    };

    let mut out = BufWriter::new(std::io::stdout().lock());
    if args.json {
        search::write_json(&mut out, std::slice::from_ref(&query))?;
    } else {
        search::write_query_human(&mut out, &query, notice)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_demo(
    root: &IndexRoot,
    model: Option<&str>,
    args: &cli::DemoArgs,
) -> error::Result<()> {
    let encoder = ModelManager::resolve(model);

    let mut index = if root.index_exists(&args.name) && !args.overwrite {
        println!("Using existing index: '{}'", args.name);
        ColbertIndex::open(&root.index_path(&args.name), encoder)?
    } else {
        println!("Fetching Wikipedia page '{}'...", args.title);
        let document = wikipedia::fetch_page(&args.title)?;
        println!("Document length: {} characters", document.chars().count());
        if document.trim().is_empty() {
            return Err(Error::NotFound {
                kind: "wikipedia page",
                name: args.title.clone(),
            });
        }

        let mut metadata = Metadata::new();
        metadata.insert("entity".into(), "person".into());
        metadata.insert("source".into(), "wikipedia".into());

        println!("Indexing document...");
        let index = ColbertIndex::build(
            root,
            &args.name,
            encoder,
            IndexInput {
                documents: vec![document],
                document_ids: vec![args.document_id.clone()],
                metadatas: vec![metadata],
            },
            IndexOptions {
                max_document_length: args.max_document_length,
                split_documents: true,
                overwrite: args.overwrite,
                ..IndexOptions::default()
            },
        )?;
        println!(
            "Indexing complete! {} passages\n",
            index.manifest().passage_count
        );
        index
    };

    let mut out = BufWriter::new(std::io::stdout().lock());
    let mode = search::SearchMode::Semantic;

    writeln!(out, "Querying: \"{}\"", args.query)?;
    for result in index.search(&args.query, 3, mode)? {
        search::write_result(&mut out, &result)?;
    }

    writeln!(out, "\nTiming single search...")?;
    let start = Instant::now();
    index.search(&args.query, 10, mode)?;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    writeln!(out, "Search took {duration_ms:.2} ms")?;

    writeln!(out, "\nRunning batch queries...")?;
    let batch = vec![args.query.clone(), args.second_query.clone()];
    let batch_results = index.search_batch(&batch, 2, mode)?;
    for (query, results) in batch.iter().zip(&batch_results) {
        writeln!(out, "\nResults for: \"{query}\"")?;
        for r in results {
            writeln!(out, "  Rank {} - Score: {:.2}", r.rank, r.score)?;
            writeln!(out, "  {}...\n", chunking::excerpt(&r.content, 300))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn cmd_split(args: &cli::SplitArgs) -> error::Result<()> {
    let document = match &args.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            println!("Fetching Wikipedia page '{}'...", args.title);
            wikipedia::fetch_page(&args.title)?
        }
    };
    println!("Document length: {} characters", document.chars().count());

    println!("Splitting document into passages...");
    let passages =
        chunking::split_document(&args.document_id, &document, args.max_tokens);

    let mut out = BufWriter::new(std::io::stdout().lock());
    for passage in &passages {
        let preview =
            chunking::excerpt(&passage.content, search::CONTENT_PREVIEW_CHARS);
        let ellipsis = if preview.len() < passage.content.len() {
            "..."
        } else {
            ""
        };
        writeln!(out, "\n--- Passage {} ---", passage.index + 1)?;
        writeln!(out, "{preview}{ellipsis}")?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_status(root: &IndexRoot, json: bool) -> error::Result<()> {
    let mut manifests = Vec::new();
    for name in root.list_indexes()? {
        match IndexManifest::read(&root.index_path(&name)) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => tracing::warn!(index = %name, "unreadable manifest: {e}"),
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&manifests)?);
        return Ok(());
    }

    println!("Index root: {}", root.root().display());
    if manifests.is_empty() {
        println!("No indexes found.");
        return Ok(());
    }
    for m in &manifests {
        println!(
            "  {}: {} documents, {} passages, model {}, max length {}{}",
            m.name,
            m.document_count,
            m.passage_count,
            m.model_id,
            m.max_document_length,
            if m.split_documents { ", split" } else { "" }
        );
    }
    Ok(())
}
