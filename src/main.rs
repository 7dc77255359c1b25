use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Builder;
use log::LevelFilter;

use header_warp::{
    blocks::block_fetcher::RpcHeaderSource,
    client::rocket,
    config::Config,
    proofs::generators::{BatchProofCompiler, BatchRange},
    proofs::provers::ZokratesProver,
    registry::ChainId,
};

#[derive(Parser, Debug)]
struct Args {
    #[clap(subcommand)]
    cmd: SubCommand,
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Write the circuit input for one 32-header batch
    Input {
        #[clap(short, long, required = true)]
        chain: ChainId,
        #[clap(short, long, required = true, allow_negative_numbers = true)]
        start: i64,
        #[clap(short, long, required = true, allow_negative_numbers = true)]
        end: i64,
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// Prove one batch and write the submission payload
    Prove {
        #[clap(short, long, required = true)]
        chain: ChainId,
        #[clap(short, long, required = true, allow_negative_numbers = true)]
        start: i64,
        #[clap(short, long, required = true, allow_negative_numbers = true)]
        end: i64,
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// Compile the validator program and export its verifier
    Compile {
        #[clap(short, long, default_value = "btcValidation.zok")]
        program: String,
    },
    Api,
}

fn compiler(config: &Config, chain: ChainId) -> Result<BatchProofCompiler> {
    let source = RpcHeaderSource::from_config(config, chain)?;
    let prover = ZokratesProver::from_config(config);
    Ok(BatchProofCompiler::new(Arc::new(source), Arc::new(prover))
        .with_scheme(config.proof_scheme.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.init();

    dotenv().ok();
    let config = Config::from_env();

    let args = Args::parse();
    log::info!("Args: {:#?}", args);
    match args.cmd {
        SubCommand::Input { chain, start, end, out } => {
            let range = BatchRange::new(start, end)?;
            let input = compiler(&config, chain)?.circuit_input(chain, range).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, input.as_str())?;
                    log::info!("Wrote circuit input to {}", path.display());
                }
                None => println!("{}", input),
            }
        }
        SubCommand::Prove { chain, start, end, out } => {
            let range = BatchRange::new(start, end)?;
            log::info!("Proving {chain} batch {range}");
            let payload = compiler(&config, chain)?.compile(chain, range).await?;
            let body = serde_json::to_string_pretty(&payload)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, body)?;
                    log::info!("Wrote submission payload to {}", path.display());
                }
                None => println!("{}", body),
            }
        }
        SubCommand::Compile { program } => {
            log::info!("Compiling validator {program}");
            ZokratesProver::from_config(&config)
                .compile_validator(&program)
                .await?;
        }
        SubCommand::Api => {
            log::info!("Starting circuit input API");
            if let Err(e) = rocket(config).launch().await {
                return Err(anyhow!("Error launching rocket: {:#?}", e));
            }
        }
    }

    Ok(())
}
