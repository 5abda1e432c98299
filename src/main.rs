use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::error;

use article_publisher::config::Settings;
use article_publisher::feishu::{FeishuClient, FeishuImageUploader};
use article_publisher::images::fetch::ImageFetcher;
use article_publisher::{
    transcribe, ArticleHeader, DocumentHandle, Pipeline, PipelineOptions, PublishReport,
    TranscodeOptions, Transcoder,
};

#[derive(Parser)]
#[command(
    name = "article_publisher",
    about = "Publish HTML articles as Feishu docx documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode an HTML file and print its content blocks as JSON
    Blocks {
        file: PathBuf,
        /// Override the short-paragraph merge threshold
        #[arg(long)]
        merge_threshold: Option<usize>,
    },
    /// Publish an HTML file into a new or existing document
    Publish {
        file: PathBuf,
        /// Title for the created document and its top heading
        #[arg(short, long)]
        title: String,
        /// Author shown in the article header
        #[arg(long)]
        author: Option<String>,
        /// Publish date shown in the article header
        #[arg(long)]
        published: Option<String>,
        /// Link to the original article, shown in the header
        #[arg(long)]
        source: Option<String>,
        /// Folder token to create the document in
        #[arg(long)]
        folder: Option<String>,
        /// Append to this existing document instead of creating one
        #[arg(long)]
        document: Option<String>,
        /// JSON object mapping original image URLs to hosted ones
        #[arg(long)]
        image_map: Option<PathBuf>,
        /// Blocks per append call
        #[arg(short = 'n', long)]
        batch_size: Option<usize>,
    },
    /// List required settings that are not configured
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Blocks {
            file,
            merge_threshold,
        } => {
            let html = read_html(&file)?;
            let no_rewrites: HashMap<String, String> = HashMap::new();
            let blocks = match merge_threshold {
                Some(threshold) => Transcoder::new(&no_rewrites)
                    .with_options(TranscodeOptions {
                        merge_threshold: threshold.max(1),
                    })
                    .transcribe(&html),
                None => transcribe(&html, &no_rewrites),
            };
            println!("{}", serde_json::to_string_pretty(&blocks)?);
            Ok(())
        }
        Commands::Publish {
            file,
            title,
            author,
            published,
            source,
            folder,
            document,
            image_map,
            batch_size,
        } => {
            let settings = load_settings()?;
            let options = PipelineOptions {
                batch_size: batch_size.unwrap_or(settings.batch_size),
                max_heading_level: settings.max_heading_level,
                merge_threshold: settings.merge_threshold,
                ..PipelineOptions::default()
            };
            let pipeline = Pipeline::new(options)?.with_header(ArticleHeader {
                title: title.clone(),
                author,
                published,
                source_url: source,
            });
            let html = read_html(&file)?;
            let image_map = match image_map {
                Some(path) => read_image_map(&path)?,
                None => HashMap::new(),
            };

            let timeout = Duration::from_secs(settings.request_timeout_secs);
            let client = FeishuClient::new(
                &settings.feishu_base_url,
                &settings.feishu_app_id,
                &settings.feishu_app_secret,
                timeout,
            )?;
            let handle = match document {
                Some(id) => DocumentHandle::root(id),
                None => client
                    .create_document(folder.as_deref(), &title)
                    .context("Failed to create document")?,
            };

            let fetcher = ImageFetcher::new(timeout, settings.image_max_bytes)?;
            let uploader = FeishuImageUploader::new(&client, fetcher, &handle.document_id);
            let report = pipeline.run(&html, &image_map, &uploader, &client, &handle);
            print_report(&handle, &report);

            if report.attempted > 0 && !report.is_success() {
                bail!("No block reached document {}", handle.document_id);
            }
            Ok(())
        }
        Commands::CheckConfig => {
            let settings = load_settings()?;
            let missing = settings.missing();
            if missing.is_empty() {
                println!("All required settings present.");
                println!("Base URL:   {}", settings.feishu_base_url);
                println!("Batch size: {}", settings.batch_size);
            } else {
                for name in &missing {
                    println!("Missing: {}", name);
                }
            }
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn load_settings() -> anyhow::Result<Settings> {
    let settings = Settings::load().context("Failed to load settings")?;
    Ok(settings)
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_image_map(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read image map {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Image map {} is not a JSON object of strings", path.display()))
}

fn print_report(handle: &DocumentHandle, report: &PublishReport) {
    println!(
        "Document {}: {}/{} blocks published in {} batches.",
        handle.document_id,
        report.succeeded,
        report.attempted,
        report.batches.len()
    );
    for batch in report.batches.iter().filter(|b| b.error.is_some()) {
        println!(
            "  batch at index {:>4} ({} blocks) failed: {}",
            batch.index,
            batch.len,
            batch.error.as_deref().unwrap_or_default()
        );
    }
    if report.cancelled {
        println!("  cancelled before all batches were sent");
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
