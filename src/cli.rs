use crate::config::{MeshStrategy, load_config};
use crate::dump::{MeshDump, write_dump};
use crate::ir::MeshInput;
use crate::mesh::compute_mesh;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "railmesh", version, about = "Rectilinear routing mesh builder")]
pub struct Args {
    /// Input graph (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the mesh dump. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Mesh construction strategy, overriding the config file
    #[arg(short = 's', long = "strategy", value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Skip elision, contraction and position optimization
    #[arg(long = "no-refine")]
    pub no_refine: bool,

    /// Ring every node with detour junctions before routing
    #[arg(long = "detour")]
    pub detour: bool,

    /// Log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum StrategyArg {
    Fast,
    Competition,
    LeftPriority,
}

impl From<StrategyArg> for MeshStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Fast => MeshStrategy::Fast,
            StrategyArg::Competition => MeshStrategy::Competition,
            StrategyArg::LeftPriority => MeshStrategy::CompetitionLeftPriority,
        }
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(log_level(args.verbose))
        .parse_default_env()
        .init();

    let mut config = load_config(args.config.as_deref())
        .with_context(|| format!("failed to load config {:?}", args.config))?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    if args.no_refine {
        config.refine = false;
    }
    if args.detour {
        config.detour = true;
    }

    let text = read_input(args.input.as_deref())?;
    let input = MeshInput::from_json(&text).context("input is not a valid mesh graph")?;
    let layout = compute_mesh(&input, &config)?;
    let dump = MeshDump::from_layout(&layout, &input);
    write_dump(&dump, args.output.as_deref())
        .with_context(|| format!("failed to write output {:?}", args.output))?;
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
