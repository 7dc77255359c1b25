use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::ChainId;

pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ZOKRATES_BIN: &str = "zokrates";
pub const DEFAULT_ZOKRATES_DIR: &str = "zokrates";
pub const DEFAULT_PROOF_SCHEME: &str = "g16";

#[derive(Clone, Debug)]
pub struct Config {
    pub btc_rpc_url: Option<String>,
    pub doge_rpc_url: Option<String>,
    pub bch_rpc_url: Option<String>,
    pub rpc_auth_token: Option<String>,
    pub rpc_timeout: Duration,
    pub zokrates_bin: String,
    pub zokrates_dir: PathBuf,
    pub proof_scheme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            btc_rpc_url: None,
            doge_rpc_url: None,
            bch_rpc_url: None,
            rpc_auth_token: None,
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            zokrates_bin: DEFAULT_ZOKRATES_BIN.to_string(),
            zokrates_dir: PathBuf::from(DEFAULT_ZOKRATES_DIR),
            proof_scheme: DEFAULT_PROOF_SCHEME.to_string(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Read settings from the process environment. Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let rpc_timeout = var("RPC_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.rpc_timeout);

        Self {
            btc_rpc_url: var("BTC_RPC_URL"),
            doge_rpc_url: var("DOGE_RPC_URL"),
            bch_rpc_url: var("BCH_RPC_URL"),
            rpc_auth_token: var("RPC_AUTH_TOKEN"),
            rpc_timeout,
            zokrates_bin: var("ZOKRATES_BIN").unwrap_or(defaults.zokrates_bin),
            zokrates_dir: var("ZOKRATES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.zokrates_dir),
            proof_scheme: var("PROOF_SCHEME").unwrap_or(defaults.proof_scheme),
        }
    }

    pub fn rpc_url(&self, chain: ChainId) -> Option<&str> {
        match chain {
            ChainId::Btc => self.btc_rpc_url.as_deref(),
            ChainId::Doge => self.doge_rpc_url.as_deref(),
            ChainId::Bch => self.bch_rpc_url.as_deref(),
        }
    }
}
