use blockcache::{config, sim, trace};
use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::style;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "event driven blocking writeback cache model")]
pub struct Options {
    #[clap(short = 'c', long = "config", help = "path to system config (YAML)")]
    pub config: Option<PathBuf>,
    #[clap(short = 't', long = "trace", help = "path to access trace (YAML or JSON)")]
    pub trace: PathBuf,
    #[clap(long = "seed", help = "override the random seed of the config")]
    pub seed: Option<u64>,
    #[clap(long = "max-cycles", help = "abort after this many cycles")]
    pub max_cycles: Option<u64>,
    #[clap(long = "stats-json", help = "write the full summary as JSON")]
    pub stats_json: Option<PathBuf>,
    #[clap(long = "stats-csv", help = "write the cache stats as CSV")]
    pub stats_csv: Option<PathBuf>,
    #[clap(short = 'v', action = clap::ArgAction::Count, help = "increase log verbosity")]
    pub verbose: u8,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let options = Options::parse();

    let level = match options.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let start = std::time::Instant::now();

    let mut config = match options.config {
        Some(ref path) => config::System::from_file(path)?,
        None => config::System::default(),
    };
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    let trace = trace::Trace::from_file(&options.trace)?;

    let mut system = sim::System::new(config, trace)?;
    let summary = system.run_to_completion(options.max_cycles)?;

    if let Some(ref path) = options.stats_json {
        let file = std::fs::File::create(path)
            .wrap_err_with(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summary)?;
    }
    if let Some(ref path) = options.stats_csv {
        let file = std::fs::File::create(path)
            .wrap_err_with(|| format!("failed to create {}", path.display()))?;
        sim::write_stats_as_csv(std::io::BufWriter::new(file), &summary.cache)?;
    }

    let stats = &summary.cache;
    println!("{:#?}", stats);
    for (stat, value) in stats.flatten() {
        println!("{:<40} {}", stat, value);
    }
    eprintln!(
        "{} {} cycles in {:?}",
        style("simulated").green(),
        summary.cycles,
        start.elapsed()
    );
    Ok(())
}
