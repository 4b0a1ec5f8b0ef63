use clap::Parser;
use sentiment_analyzer::cli::{Cli, Commands};
use sentiment_analyzer::console::Console;
use sentiment_analyzer::session::{ModelHandle, SessionHandler};
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config();
    tracing::debug!(
        backend = ?config.backend,
        device = ?config.device,
        model_id = config.model.identifier(),
        "starting"
    );

    let session = SessionHandler::new(ModelHandle::from_config(&config), &config);
    let mut console = Console::new(session, std::io::stdout());

    let ok = match cli.command {
        Commands::Analyze { text, raw, .. } => console.analyze(&text, raw).await?,
        Commands::Batch { input, output, .. } => console.batch(&input, &output).await?,
        Commands::Interactive { .. } => {
            console.run(BufReader::new(tokio::io::stdin())).await?;
            true
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "sentiment_analyzer=debug"
    } else {
        "sentiment_analyzer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
