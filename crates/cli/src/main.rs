use anyhow::{bail, Context, Result};
use civicdocs_core::config;
use civicdocs_core::models::DocumentType;
use civicdocs_core::pipeline::App;
use civicdocs_core::templates::TemplateLibrary;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "civicdocs",
    about = "Ingest county documents and answer questions against them"
)]
struct Cli {
    /// Path to a config file (defaults to config/default.toml).
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file (or every supported file under a directory).
    Ingest {
        path: PathBuf,
        /// One of: court_document, procedural, policy, form_template,
        /// legal_brief, ordinance, minutes, notice, foia.
        #[arg(long)]
        doc_type: String,
        #[arg(long)]
        department: String,
        /// Extra metadata as KEY=VALUE, repeatable.
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Semantic search over indexed chunks.
    Query {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        doc_type: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Retrieve relevant chunks and synthesize an answer.
    Ask {
        question: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        doc_type: Option<String>,
        /// Recorded in the query audit log.
        #[arg(long)]
        user: Option<String>,
    },
    /// Corpus statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Fill a document template.
    Generate {
        template: String,
        /// Template variables as KEY=VALUE, repeatable.
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Write the document here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Template filling needs no database or providers.
    if let Commands::Generate {
        template,
        vars,
        output,
    } = &cli.command
    {
        return run_generate(template, vars, output.as_deref());
    }

    let cfg = config::load(cli.config.as_deref())?;
    let app = App::init(cfg).await?;

    match cli.command {
        Commands::Ingest {
            path,
            doc_type,
            department,
            meta,
        } => run_ingest(&app, &path, &doc_type, &department, &meta).await,
        Commands::Query {
            query,
            top_k,
            department,
            doc_type,
            json,
        } => {
            run_query(
                &app,
                &query,
                top_k,
                department.as_deref(),
                doc_type.as_deref(),
                json,
            )
            .await
        }
        Commands::Ask {
            question,
            top_k,
            department,
            doc_type,
            user,
        } => {
            run_ask(
                &app,
                &question,
                top_k,
                department.as_deref(),
                doc_type.as_deref(),
                user.as_deref(),
            )
            .await
        }
        Commands::Stats { json } => run_stats(&app, json).await,
        Commands::Generate { .. } => unreachable!("handled above"),
    }
}

async fn run_ingest(
    app: &App,
    path: &std::path::Path,
    doc_type: &str,
    department: &str,
    meta: &[String],
) -> Result<()> {
    let doc_type = DocumentType::from_str(doc_type)?;
    let metadata = parse_kv(meta)?;
    let ingester = app.ingester();

    if path.is_dir() {
        let reports = ingester
            .ingest_dir(path, doc_type, department, metadata)
            .await?;
        println!("Ingested {} documents from {}", reports.len(), path.display());
        for report in reports {
            println!(
                "  {} ({} chunks){}",
                report.title,
                report.chunk_count,
                if report.replaced { " [replaced]" } else { "" }
            );
        }
    } else {
        let report = ingester
            .ingest_file(path, doc_type, department, metadata)
            .await
            .with_context(|| format!("failed to ingest {}", path.display()))?;
        println!(
            "Ingested '{}' as {} ({} chunks){}",
            report.title,
            report.document_id,
            report.chunk_count,
            if report.replaced { " [replaced]" } else { "" }
        );
    }
    Ok(())
}

async fn run_query(
    app: &App,
    query: &str,
    top_k: usize,
    department: Option<&str>,
    doc_type: Option<&str>,
    json: bool,
) -> Result<()> {
    let doc_type = doc_type.map(DocumentType::from_str).transpose()?;
    let results = app
        .retriever()
        .retrieve(query, top_k, department, doc_type)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No matching documents.");
    } else {
        for (i, r) in results.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} ({} / {})",
                i + 1,
                r.relevance_score,
                r.title,
                r.department,
                r.doc_type
            );
            println!("   {}", r.chunk.chars().take(160).collect::<String>());
        }
    }
    Ok(())
}

async fn run_ask(
    app: &App,
    question: &str,
    top_k: usize,
    department: Option<&str>,
    doc_type: Option<&str>,
    user: Option<&str>,
) -> Result<()> {
    let doc_type = doc_type.map(DocumentType::from_str).transpose()?;
    let results = app
        .retriever()
        .retrieve(question, top_k, department, doc_type)
        .await?;
    let answer = app.synthesizer().answer(question, &results).await;

    let documents_used: Vec<String> = results.iter().map(|r| r.document_id.clone()).collect();
    app.store()
        .record_query(question, &answer, &documents_used, user)
        .await?;

    println!("{answer}");
    Ok(())
}

async fn run_stats(app: &App, json: bool) -> Result<()> {
    let stats = app.store().stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Documents: {} ({} indexed)", stats.total_documents, stats.indexed_documents);
        println!("Chunks:    {}", stats.total_chunks);
        println!("By type:");
        for (doc_type, n) in &stats.document_types {
            println!("  {doc_type}: {n}");
        }
        println!("By department:");
        for (department, n) in &stats.departments {
            println!("  {department}: {n}");
        }
    }
    Ok(())
}

fn run_generate(template: &str, vars: &[String], output: Option<&std::path::Path>) -> Result<()> {
    let lib = TemplateLibrary::new();
    let variables = parse_kv(vars)?;
    let doc = lib.fill(template, &variables)?;

    if !doc.missing.is_empty() {
        eprintln!("warning: unfilled variables: {}", doc.missing.join(", "));
    }
    match output {
        Some(path) => {
            std::fs::write(path, &doc.text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", doc.text),
    }
    Ok(())
}

fn parse_kv(items: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for item in items {
        match item.split_once('=') {
            Some((k, v)) if !k.is_empty() => {
                map.insert(k.to_string(), v.to_string());
            }
            _ => bail!("expected KEY=VALUE, got '{item}'"),
        }
    }
    Ok(map)
}
