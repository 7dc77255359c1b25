use anyhow::anyhow;
use dotenv::dotenv;

use header_warp::{
    blocks::{
        block::{canonicalize, CanonicalHeader},
        block_fetcher::{HeaderSource, RpcHeaderSource},
    },
    config::Config,
    registry::ChainId,
};

/// Usage: get_blocks <chain> <from> <to>
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let [chain, from, to] = args.as_slice() else {
        return Err(anyhow!("usage: get_blocks <chain> <from> <to>"));
    };
    let chain = chain.parse::<ChainId>().map_err(|e| anyhow!(e))?;

    let config = Config::from_env();
    let source = RpcHeaderSource::from_config(&config, chain)?;
    let headers = source
        .headers(chain, from.parse()?, to.parse()?)
        .await?
        .iter()
        .map(canonicalize)
        .collect::<Result<Vec<CanonicalHeader>, _>>()?;
    let body = CanonicalHeader::to_hex_vec(&headers)
        .iter()
        .map(|header| format!("\"{}\"", header))
        .collect::<Vec<String>>()
        .join(",\n");
    println!("{}", body);
    Ok(())
}
