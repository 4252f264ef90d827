use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Client, Response, multipart};
use serde_json::{Value, json};
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "docx", "rtf", "txt", "png"];

#[derive(Parser)]
#[command(name = "ragctl", about = "Command-line client for the Rusty RAG server")]
struct Cli {
    /// Base URL of the running server.
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files, or every supported file below the given directories.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a question about the uploaded documents.
    Chat { question: Vec<String> },
    /// Download the conversation report.
    Report {
        #[arg(long, value_enum, default_value_t = Format::Pdf)]
        format: Format,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Clear the conversation.
    Clear,
    /// Show server liveness, index reachability and counters.
    Health,
    /// Print the exchanges recorded since the last clear.
    History,
    /// List uploaded documents and their processing status.
    Documents,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pdf,
    Text,
}

impl Format {
    fn query(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
        }
    }

    fn default_output(self) -> &'static str {
        match self {
            Self::Pdf => "rag_conversation_report.pdf",
            Self::Text => "rag_conversation_report.txt",
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.server.trim_end_matches('/').to_string();

    match cli.command {
        Command::Upload { paths } => upload(&client, &base, &paths).await,
        Command::Chat { question } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                bail!("question must not be empty");
            }
            let response = client
                .post(format!("{base}/chat"))
                .json(&json!({ "question": question }))
                .send()
                .await
                .context("chat request failed")?;
            let body = json_body(response).await?;
            println!("{}", body["answer"].as_str().unwrap_or_default());
            if let Some(sources) = body["sources"].as_array()
                && !sources.is_empty()
            {
                println!();
                println!("Sources:");
                for source in sources {
                    println!(
                        "  - {} (chunk {}, score {:.3})",
                        source["filename"].as_str().unwrap_or("unknown"),
                        source["chunk_index"],
                        source["score"].as_f64().unwrap_or_default()
                    );
                }
            }
            Ok(())
        }
        Command::Report { format, output } => {
            let response = client
                .get(format!("{base}/report"))
                .query(&[("format", format.query())])
                .send()
                .await
                .context("report request failed")?;
            let response = ensure_success(response).await?;
            let bytes = response.bytes().await.context("reading report body")?;
            let output = output.unwrap_or_else(|| PathBuf::from(format.default_output()));
            fs::write(&output, &bytes)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
        Command::Clear => {
            let response = client
                .post(format!("{base}/clear"))
                .send()
                .await
                .context("clear request failed")?;
            json_body(response).await?;
            println!("Conversation cleared");
            Ok(())
        }
        Command::Health => print_get(&client, &format!("{base}/health")).await,
        Command::History => print_get(&client, &format!("{base}/history")).await,
        Command::Documents => print_get(&client, &format!("{base}/documents")).await,
    }
}

async fn upload(client: &Client, base: &str, paths: &[PathBuf]) -> Result<()> {
    let files = collect_files(paths)?;
    if files.is_empty() {
        bail!("no supported files found");
    }

    let mut form = multipart::Form::new();
    for path in &files {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        form = form.part("files", multipart::Part::bytes(bytes).file_name(name));
    }

    let response = client
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .context("upload request failed")?;
    let body = json_body(response).await?;

    let mut failed = 0;
    for result in body["results"].as_array().into_iter().flatten() {
        let filename = result["filename"].as_str().unwrap_or("unknown");
        if result["status"] == "indexed" {
            println!("indexed  {filename} ({} chunks)", result["chunks"]);
        } else {
            failed += 1;
            println!(
                "failed   {filename}: {} ({})",
                result["error"].as_str().unwrap_or_default(),
                result["error_kind"].as_str().unwrap_or_default()
            );
        }
    }
    if failed > 0 {
        bail!("{failed} of {} files failed", files.len());
    }
    Ok(())
}

/// Expand directories into the supported files they contain; explicit files are kept as given.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn print_get(client: &Client, url: &str) -> Result<()> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?;
    let body = json_body(response).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body["error"].as_str().unwrap_or("request failed");
    bail!("server returned {status}: {message}");
}

async fn json_body(response: Response) -> Result<Value> {
    let response = ensure_success(response).await?;
    response.json().await.context("decoding response body")
}
