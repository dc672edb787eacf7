use chrono::Utc;
use clap::Parser;
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budget_tracker_bootstrap::bootstrap::with_timeout;
use budget_tracker_bootstrap::cli::{self, Cli, Command, OutputFormat};
use budget_tracker_bootstrap::{
    db, BootstrapError, BootstrapPlan, Bootstrapper, Config, MongoBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "budget_tracker_bootstrap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // `plan` never connects, so it runs without credentials
    if cli.command() == Command::Plan {
        dotenvy::dotenv().ok();
        let plan = BootstrapPlan::preview(|key| std::env::var(key).ok());
        cli::print_plan(&plan, cli.format());
        return Ok(());
    }

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "Environment: {}, database: {}",
        config.environment,
        config.database_name
    );

    let plan = BootstrapPlan::from_config(&config);

    match cli.command() {
        Command::Verify => verify(&config, &plan, cli.format()).await,
        Command::Apply | Command::Plan => apply(&config, &plan, cli.format()).await,
    }
}

async fn apply(config: &Config, plan: &BootstrapPlan, format: OutputFormat) -> anyhow::Result<()> {
    let limit = config.timeout();
    let deadline = Instant::now() + limit;

    let client = tokio::time::timeout_at(deadline, db::connect(config))
        .await
        .map_err(|_| BootstrapError::Timeout(limit))??;
    let backend = MongoBackend::new(&client, &config.database_name);

    // Steps share whatever time connecting left over
    let outcome = Bootstrapper::new(&backend, plan)
        .with_deadline(deadline, limit)
        .run(Utc::now())
        .await;

    match outcome {
        Ok(report) => {
            cli::print_report(&report, format);
            Ok(())
        }
        Err(failure) => {
            cli::print_report(&failure.report, format);
            Err(failure.into())
        }
    }
}

async fn verify(config: &Config, plan: &BootstrapPlan, format: OutputFormat) -> anyhow::Result<()> {
    let report = with_timeout(config.timeout(), async {
        let client = db::connect(config).await?;
        let backend = MongoBackend::new(&client, &config.database_name);
        Bootstrapper::new(&backend, plan).verify().await
    })
    .await??;

    cli::print_verify(&report, format);

    if !report.is_complete() {
        anyhow::bail!(
            "database '{}' is missing {} item(s)",
            report.database,
            report.missing.len()
        );
    }

    Ok(())
}
