use scripts::{report_unexpected, run_import, ImportConfig};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let config = ImportConfig::from_args();

    let status = match tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init()
    {
        Ok(()) => {
            let status = run_import(&config);
            info!("done");
            status
        },
        Err(e) => report_unexpected(&mut std::io::stdout(), &e),
    };

    std::process::exit(status.code());
}
