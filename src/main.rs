//! pairprobe - packet-pair latency and bandwidth estimator

use clap::Parser;
use pairprobe::{
    cli::Cli,
    config::{load_config, validate_config},
    error::{AppError, ErrorReporter, Result},
    logging::Logger,
    output::{JsonReport, OutputCoordinator, OutputFormatterFactory, SessionInfo},
    resolve::resolve_target,
    transport::{Connector, IcmpConnector, SimulatedConnector},
    version_info, Config, Session,
};
use std::process;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);
    if !reporter.use_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        eprintln!("{}", version_info());
    }

    let config = load_config(cli)?;
    if !config.enable_color {
        colored::control::set_override(false);
    }

    for warning in validate_config(&config)? {
        eprintln!("{}", warning.format(config.enable_color));
    }

    let logger = Logger::with_config("PAIRPROBE", &config);
    let target = resolve_target(&config.target, true).await?;
    let connector = create_connector(&config)?;

    let transport = connector.name();
    let session = Arc::new(Session::new(&config, target, connector, logger.clone()));
    let info = SessionInfo {
        session: session.id(),
        target,
        transport,
        sizes: config.probe_sizes.clone(),
    };

    let coordinator = OutputCoordinator::new(
        OutputFormatterFactory::create_formatter(config.enable_color, config.verbose),
        config.verbose,
    );
    if !config.json_output {
        println!("{}\n", coordinator.display_header(&info)?);
    }

    let started = Instant::now();
    let cancel = CancellationToken::new();
    let mut run = tokio::spawn({
        let session = Arc::clone(&session);
        let cancel = cancel.clone();
        async move { session.run(cancel).await }
    });

    let mut ticker = tokio::time::interval_at(started + config.report_interval(), config.report_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            result = &mut run => break result,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                logger.info("Interrupted, stopping probes").log().await;
                cancel.cancel();
            }
            _ = ticker.tick() => {
                if !config.json_output {
                    println!("{}", coordinator.display_progress(started.elapsed(), &session.statistics())?);
                }
            }
        }
    };
    outcome.map_err(|e| AppError::internal(format!("session task failed: {}", e)))??;

    let report = match session.statistics() {
        Ok(report) => Some(report),
        Err(AppError::NoData) => None,
        Err(e) => return Err(e),
    };
    let summaries = session.probe_summaries();

    if config.json_output {
        let json = JsonReport::new(&info, started.elapsed(), report.clone(), summaries, session.packet_loss());
        println!("{}", json.to_json()?);
    } else {
        println!("\n{}", coordinator.display_results(report.as_ref(), &summaries)?);
    }

    match report {
        Some(_) => Ok(()),
        None => Err(AppError::NoData),
    }
}

/// Simulated path when one is configured, raw ICMP otherwise
fn create_connector(config: &Config) -> Result<Arc<dyn Connector>> {
    match config.simulated_path()? {
        Some(path) => Ok(Arc::new(SimulatedConnector::new(path))),
        None => Ok(Arc::new(IcmpConnector::new(config.bind_ip()?))),
    }
}
