use clap::Parser;
use quotecrew_lib::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose);

    tracing::info!("Starting quotecrew in {:?} mode", cli.mode);

    let outcomes = match cli::run(&cli).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    println!("Task results:");
    for outcome in &outcomes {
        println!(
            "- [{}] {} ({} ms): {}",
            outcome.agent, outcome.description, outcome.duration_ms, outcome.output.message
        );
    }
    Ok(())
}
