use clap::Parser;
use tracing::error;
use vshrink::cli::Cli;
use vshrink::error::ErrorKind;
use vshrink::{app, JsonReporter, Reporter, StatusEvent, TerminalReporter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config();

    if let Err(e) = vshrink::logging::init_tracing(config.verbose) {
        eprintln!("{:#}", e);
    }

    let mut reporter: Box<dyn Reporter> = if config.json {
        Box::new(JsonReporter)
    } else {
        Box::new(TerminalReporter::new(config.spinner()))
    };

    let code = match app::execute(config, &cli.input, reporter.as_mut()).await {
        Ok(summary) => match reporter.finish(&summary) {
            Ok(()) => 0,
            Err(e) => {
                error!("could not write summary: {:#}", e);
                1
            }
        },
        Err(e) => {
            // interruption has already been reported with its cleanup result
            if e.kind() != ErrorKind::Interruption {
                reporter.event(&StatusEvent::Failed(&e));
            }
            e.exit_code()
        }
    };

    std::process::exit(code);
}
