use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use lecturedb_assistant::RagService;
use lecturedb_core::config::{expand_path, Config, Settings};
use lecturedb_embed::get_default_embedder;
use lecturedb_pdf::{list_pdf_files, validate_upload, Ingestor, PdfExtractor};
use lecturedb_vector::DocumentStore;

/// Search and chat over PDF lecture notes. Everything lives in memory for
/// the duration of one command.
#[derive(Parser)]
#[command(name = "lecturedb", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and embed PDFs (files or directories) and report the result.
    Ingest {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Index PDFs, then print the passages closest to a query.
    Query {
        query: String,
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<String>,
        /// Number of passages; defaults to `retrieval.top_k`.
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Index PDFs, then chat. `/search <text>` queries the notes, `/quit` exits.
    Chat {
        #[arg(long = "pdf")]
        pdfs: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "lecturedb=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    match cli.command {
        Command::Ingest { paths } => handle_ingest(&settings, &paths),
        Command::Query { query, pdfs, k } => handle_query(&settings, &query, &pdfs, k),
        Command::Chat { pdfs } => handle_chat(&settings, &pdfs),
    }
}

fn collect_pdfs(paths: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for raw in paths {
        let path = expand_path(raw);
        if path.is_dir() { files.extend(list_pdf_files(&path)); } else { files.push(path); }
    }
    files
}

/// Feeds every file to `upload`, reporting failures without stopping.
/// Returns the total number of chunks stored.
fn upload_files<F>(files: &[PathBuf], mut upload: F) -> anyhow::Result<usize>
where
    F: FnMut(&str, &[u8]) -> lecturedb_core::Result<usize>,
{
    if files.is_empty() { println!("No PDF files to ingest"); return Ok(0); }
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?.progress_chars("#>-"));
    let mut total = 0usize;
    for path in files {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.display().to_string());
        pb.set_message(name.clone());
        let outcome = fs::read(path)
            .map_err(|e| lecturedb_core::Error::InvalidUpload(format!("cannot read {}: {e}", path.display())))
            .and_then(|bytes| upload(&name, &bytes));
        match outcome {
            Ok(added) => { total += added; pb.println(format!("📄 {name}: {added} chunks")); }
            Err(e) => { tracing::warn!(file = %name, error = %e, "ingestion failed"); pb.println(format!("⚠️  {name}: {e}")); }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");
    Ok(total)
}

fn build_store(settings: &Settings) -> anyhow::Result<(DocumentStore, Ingestor)> {
    let embedder = get_default_embedder(settings)?;
    let ingestor = Ingestor::new(Arc::new(PdfExtractor::new()), settings.chunking)?;
    Ok((DocumentStore::new(embedder)?, ingestor))
}

fn index_into(store: &DocumentStore, ingestor: &Ingestor, files: &[PathBuf]) -> anyhow::Result<usize> {
    upload_files(files, |name, bytes| {
        validate_upload(name, bytes)?;
        store.add_chunks(ingestor.ingest(bytes, name)?)
    })
}

fn handle_ingest(settings: &Settings, paths: &[String]) -> anyhow::Result<()> {
    let (store, ingestor) = build_store(settings)?;
    let files = collect_pdfs(paths);
    let total = index_into(&store, &ingestor, &files)?;
    println!("\n✅ Ingest complete: {} chunks from {} files (dim={})", total, files.len(), store.dim());
    Ok(())
}

fn handle_query(settings: &Settings, query: &str, pdfs: &[String], k: Option<usize>) -> anyhow::Result<()> {
    let (store, ingestor) = build_store(settings)?;
    index_into(&store, &ingestor, &collect_pdfs(pdfs))?;
    let k = k.unwrap_or(settings.retrieval.top_k);
    let results = store.search(query, k)?;
    println!("\n🔍 Found {} results for: \"{}\"", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        println!("\n  {}. source={}  chunk={}", i + 1, result.metadata.source, result.metadata.chunk);
        println!("     📝 Content: {}", result.text);
    }
    Ok(())
}

fn handle_chat(settings: &Settings, pdfs: &[String]) -> anyhow::Result<()> {
    let rag = RagService::from_settings(settings)?;
    let files = collect_pdfs(pdfs);
    if !files.is_empty() {
        upload_files(&files, |name, bytes| rag.upload_pdf(name, bytes))?;
    }
    println!("{}", rag.greet()?);

    let stdin = io::stdin();
    prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        match line {
            "" => {}
            "/quit" | "/exit" => break,
            _ if line.starts_with("/search ") => match rag.query(line.trim_start_matches("/search ").trim()) {
                Ok(answer) if answer.sources.is_empty() => println!("(no indexed passages)"),
                Ok(answer) => {
                    println!("{}", answer.text);
                    for source in &answer.sources { println!("  - {} #{}", source.source, source.chunk); }
                }
                Err(e) => eprintln!("Search failed: {e}"),
            },
            _ => match rag.chat(line) {
                Ok(reply) => println!("{reply}"),
                Err(e) => eprintln!("Error contacting Gemini API: {e}"),
            },
        }
        prompt()?;
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
