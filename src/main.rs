use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error};

use stomp_probe::cli::{parse_error_status, Cli};
use stomp_probe::config::LoggingConfig;
use stomp_probe::logging::{self, ProbeLogger, TracingLogger};
use stomp_probe::probe::{report, ProbeStatus, Prober};
use stomp_probe::stomp::StompConnector;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return parse_error_status(&e).into();
        }
    };

    logging::init(&LoggingConfig::from_env());
    debug!(
        "stomp-probe {} {}",
        stomp_probe::PKG_VERSION,
        stomp_probe::BUILD_VERSION
    );

    let config = match cli.into_config_or_status() {
        Ok(config) => config,
        Err(status) => return status.into(),
    };
    config.log_summary();

    // One connection and two short-lived tasks: a single thread is plenty
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start runtime: {}", e);
            return ProbeStatus::Failed.into();
        }
    };

    let log: Arc<dyn ProbeLogger> = Arc::new(TracingLogger);
    let prober = Prober::new(StompConnector::new(), Arc::clone(&log));
    let result = runtime.block_on(prober.run(&config));

    report(&result, log.as_ref()).into()
}
