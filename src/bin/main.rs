use fiscal_result::args::{Args, OutputKind};
use fiscal_result::engine::FiscalLedger;
use fiscal_result::errors::FiscalError;
use std::process;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let args = Args::parse();

    // Logs go to stderr so that stdout only ever carries the report.
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(err) => {
            if err.is_fatal() {
                eprintln!("failed to compute fiscal result: {}", err);
            } else {
                eprintln!("{}", err);
            }
            process::exit(err.exit_code());
        }
    }
}

fn run(args: &Args) -> Result<String, FiscalError> {
    // The interval is validated before any source is read.
    let requested = args.year_range()?;
    let mut ledger = FiscalLedger::new(args.sources()?);

    let dataset = ledger.dataset()?;
    if !dataset.warnings().is_empty() {
        warn!(
            cells = dataset.warnings().len(),
            "some values could not be parsed and are reported as N/A"
        );
    }

    match args.output {
        OutputKind::Table => ledger.generate_table_report(requested),
        OutputKind::Chart => ledger.generate_chart_report(requested),
    }
}
