//! bioRxiv digest CLI - fetch, rank, summarize and email preprints.

use std::path::PathBuf;
use std::sync::Arc;

use ai::{AIProvider, GeminiProvider};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use biorxiv_digest::mailer::test_message;
use biorxiv_digest::{
    AiContentGenerator, AiRanker, BiorxivClient, ComposeOutcome, DigestConfig, DigestPipeline,
    Mailer, PipelineSettings, SelectionPolicy, SmtpMailer, TopicCatalogue,
};

/// Daily bioRxiv digest - ranks new preprints by interest and emails a summary.
#[derive(Parser)]
#[command(name = "biorxiv-digest")]
#[command(about = "Daily bioRxiv/medRxiv email digest")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the digest and send it
    Run {
        /// Run date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Build the digest without sending it
    Preview {
        /// Run date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Write the body to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output the plain-text body instead of HTML
        #[arg(long)]
        text: bool,
    },

    /// Send a test email to verify SMTP settings
    TestEmail,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let result = run_command(cli.command).await;
    if let Err(e) = &result {
        tracing::error!(error = ?e, "Digest run failed");
    }
    result
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("biorxiv_digest=debug,ai=debug,info")
        } else {
            EnvFilter::new("biorxiv_digest=info,ai=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn run_command(command: Commands) -> Result<()> {
    let config = DigestConfig::from_env().context("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    match command {
        Commands::Run { date } => {
            let run_date = date.unwrap_or_else(today);
            let pipeline = build_pipeline(&config)?;

            match pipeline
                .run(run_date, &generated_at_label())
                .await
                .context("Digest run failed")?
            {
                ComposeOutcome::NoPapers => {
                    tracing::info!(%run_date, "No new papers, no digest sent");
                }
                ComposeOutcome::Composed(digest) => {
                    tracing::info!(
                        %run_date,
                        subject = %digest.rendered.subject,
                        papers = digest.selection.len(),
                        "Digest sent"
                    );
                }
            }
        }

        Commands::Preview { date, output, text } => {
            let run_date = date.unwrap_or_else(today);
            let pipeline = build_pipeline(&config)?;

            let outcome = pipeline
                .compose(run_date, &generated_at_label())
                .await
                .context("Failed to compose digest")?;

            let ComposeOutcome::Composed(digest) = outcome else {
                tracing::info!(%run_date, "No new papers in the lookback window");
                return Ok(());
            };

            let body = if text {
                &digest.rendered.text_body
            } else {
                &digest.rendered.html_body
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, body)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(
                        path = %path.display(),
                        subject = %digest.rendered.subject,
                        "Preview written"
                    );
                }
                None => println!("{body}"),
            }
        }

        Commands::TestEmail => {
            let mailer = SmtpMailer::new(&config.smtp).context("Failed to configure SMTP")?;
            let message = test_message(config.feed.server, &config.from_email, &config.recipients);
            mailer
                .send(&message)
                .await
                .context("Failed to send test email")?;
            println!("Test email sent to {}", config.recipients.to.join(", "));
        }
    }

    Ok(())
}

fn build_pipeline(config: &DigestConfig) -> Result<DigestPipeline> {
    let topics = TopicCatalogue::load(config.topics_file.as_deref())
        .context("Failed to load concept topics")?;

    let provider: Arc<dyn AIProvider> = Arc::new(
        GeminiProvider::new(config.ai.api_key.clone()).context("Failed to create Gemini client")?,
    );
    let models = config.ai.models();

    let source = BiorxivClient::new(config.feed.server, config.feed.category.clone())
        .context("Failed to create bioRxiv client")?;
    let ranker = AiRanker::new(
        Arc::clone(&provider),
        models.clone(),
        SelectionPolicy::from_strict_flag(config.strict_selection),
    )?;
    let generator = AiContentGenerator::new(provider, models)?;
    let mailer = SmtpMailer::new(&config.smtp).context("Failed to configure SMTP")?;

    Ok(DigestPipeline::new(
        Arc::new(source),
        Arc::new(ranker),
        Arc::new(generator),
        Arc::new(mailer),
        PipelineSettings::from_config(config, topics),
    ))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn generated_at_label() -> String {
    Local::now().format("%Y-%m-%d %H:%M (UTC%:z)").to_string()
}
