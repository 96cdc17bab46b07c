use anyhow::{Context, Result};
use jobsworth::buildkite::BuildkiteClient;
use jobsworth::cli::commands::{RunCommand, ValidateCommand};
use jobsworth::cli::environment;
use jobsworth::cli::{Cli, Command};
use jobsworth::core::Pipeline;
use jobsworth::driver::{run_build, Collaborators};
use jobsworth::scm::GitCli;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run(cmd).await?,
        Command::Validate(cmd) => validate(cmd)?,
    }

    Ok(())
}

async fn run(cmd: &RunCommand) -> Result<()> {
    if !cmd.dry_run {
        environment::require_buildkite()?;
    }

    let pipeline = Pipeline::from_file(&cmd.file)
        .with_context(|| format!("failed to load pipeline from {}", cmd.file))?;
    let mut context = environment::run_context_from_env()?;

    let client = BuildkiteClient::new(environment::buildkite_config_from_env(&context));
    let commits = GitCli::new();
    let collaborators = Collaborators {
        metadata: &client,
        uploader: &client,
        commits: &commits,
    };

    run_build(&pipeline, &mut context, &collaborators, cmd.dry_run).await?;
    Ok(())
}

fn validate(cmd: &ValidateCommand) -> Result<()> {
    let pipeline = Pipeline::from_file(&cmd.file)
        .with_context(|| format!("failed to load pipeline from {}", cmd.file))?;

    println!("Pipeline configuration is valid!");
    println!("  Smoke test steps: {}", pipeline.smoke_test.len());
    println!("  Build steps: {}", pipeline.build.len());
    println!("  Deploy steps: {}", pipeline.deploy.len());
    println!("  Validation steps: {}", pipeline.validation_test.len());
    println!(
        "  Deploy environments: {} trivial, {} cautious",
        pipeline.trivial_deploy_environments.len(),
        pipeline.cautious_deploy_environments.len()
    );
    Ok(())
}
