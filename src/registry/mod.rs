use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::circuits::encoder::HEADERS_PER_BATCH;
use crate::error::{Error, Result};
use crate::proofs::artifact::{ProofPayload, SubmissionPayload};

/// Source chains known to the verifier contract.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ChainId {
    Btc = 0,
    Doge = 1,
    Bch = 2,
}

impl ChainId {
    /// Chains whose headers are mined against their SHA-256d hash. DOGE is scrypt/AuxPoW.
    pub fn sha256d_work(self) -> bool {
        matches!(self, ChainId::Btc | ChainId::Bch)
    }
}

impl From<ChainId> for u8 {
    fn from(chain: ChainId) -> u8 {
        chain as u8
    }
}

impl TryFrom<u8> for ChainId {
    type Error = String;

    fn try_from(id: u8) -> std::result::Result<Self, Self::Error> {
        match id {
            0 => Ok(ChainId::Btc),
            1 => Ok(ChainId::Doge),
            2 => Ok(ChainId::Bch),
            other => Err(format!("unknown chain id {other}")),
        }
    }
}

impl FromStr for ChainId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(ChainId::Btc),
            "doge" | "dogecoin" => Ok(ChainId::Doge),
            "bch" | "bitcoin-cash" => Ok(ChainId::Bch),
            other => other
                .parse::<u8>()
                .map_err(|_| format!("unknown chain {s:?}"))
                .and_then(ChainId::try_from),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainId::Btc => "btc",
            ChainId::Doge => "doge",
            ChainId::Bch => "bch",
        };
        f.write_str(name)
    }
}

/// `submitBatches(chainId, proof, start, end)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBatchesCall {
    pub chain_id: ChainId,
    pub proof: ProofPayload,
    pub start: u64,
    pub end: u64,
}

impl SubmitBatchesCall {
    pub fn new(chain_id: ChainId, payload: SubmissionPayload) -> Self {
        Self {
            chain_id,
            proof: payload.proof,
            start: payload.start,
            end: payload.end,
        }
    }

    /// Positional contract arguments.
    pub fn to_params(&self) -> Result<Value> {
        Ok(json!([
            u8::from(self.chain_id),
            serde_json::to_value(&self.proof)?,
            self.start,
            self.end
        ]))
    }
}

/// `getClosestHash(chainId, height, flag)`. The flag is passed through untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetClosestHashCall {
    pub chain_id: ChainId,
    pub height: u64,
    pub flag: u8,
}

impl GetClosestHashCall {
    pub fn to_params(&self) -> Value {
        json!([u8::from(self.chain_id), self.height, self.flag])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosestHash {
    pub hash: String,
    pub height: u64,
}

/// On-chain verifier holding accepted batches for every chain.
#[async_trait]
pub trait BatchRegistry: Send + Sync {
    async fn submit_batches(&self, call: SubmitBatchesCall) -> Result<()>;

    async fn get_closest_hash(&self, call: GetClosestHashCall) -> Result<ClosestHash>;
}

#[derive(Default)]
struct ChainRecord {
    tip_end: Option<u64>,
    hashes: BTreeMap<u64, String>,
}

/// In-process verifier with the contract's acceptance rules: the first batch of a chain must
/// start at `first_height`, every later one at the previous batch's end.
pub struct MemoryRegistry {
    first_height: u64,
    chains: Mutex<HashMap<ChainId, ChainRecord>>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        MemoryRegistry::new(1)
    }
}

impl MemoryRegistry {
    pub fn new(first_height: u64) -> Self {
        Self {
            first_height,
            chains: Mutex::new(HashMap::new()),
        }
    }

    pub fn tip(&self, chain: ChainId) -> Option<u64> {
        self.chains
            .lock()
            .ok()
            .and_then(|chains| chains.get(&chain).and_then(|c| c.tip_end))
    }
}

fn poisoned(call: &SubmitBatchesCall) -> Error {
    Error::SubmissionFailure {
        chain: call.chain_id,
        start: call.start,
        end: call.end,
        reason: "registry lock poisoned".to_string(),
    }
}

#[async_trait]
impl BatchRegistry for MemoryRegistry {
    async fn submit_batches(&self, call: SubmitBatchesCall) -> Result<()> {
        let reject = |reason: String| Error::SubmissionFailure {
            chain: call.chain_id,
            start: call.start,
            end: call.end,
            reason,
        };

        let mut chains = self.chains.lock().map_err(|_| poisoned(&call))?;
        let record = chains.entry(call.chain_id).or_default();
        let expected = record.tip_end.unwrap_or(self.first_height);
        if call.start != expected {
            return Err(reject(format!(
                "out of order: expected batch starting at {expected}"
            )));
        }
        if call.start.checked_add(HEADERS_PER_BATCH as u64) != Some(call.end) {
            return Err(reject(format!("batch must span {HEADERS_PER_BATCH} headers")));
        }
        let tip_hash = call
            .proof
            .inputs
            .last()
            .cloned()
            .ok_or_else(|| reject("proof carries no inputs".to_string()))?;

        record.hashes.insert(call.end - 1, tip_hash);
        record.tip_end = Some(call.end);
        Ok(())
    }

    async fn get_closest_hash(&self, call: GetClosestHashCall) -> Result<ClosestHash> {
        let chains = self
            .chains
            .lock()
            .map_err(|_| Error::RegistryQuery("registry lock poisoned".to_string()))?;
        chains
            .get(&call.chain_id)
            .and_then(|record| record.hashes.range(..=call.height).next_back())
            .map(|(height, hash)| ClosestHash {
                hash: hash.clone(),
                height: *height,
            })
            .ok_or_else(|| {
                Error::RegistryQuery(format!(
                    "no {} hash recorded at or below {}",
                    call.chain_id, call.height
                ))
            })
    }
}

/// Sends compiled batches in ascending, contiguous order per chain.
pub struct BatchSubmitter<R: BatchRegistry> {
    registry: R,
    next_start: HashMap<ChainId, u64>,
}

impl<R: BatchRegistry> BatchSubmitter<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            next_start: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Refuses a batch that does not continue the last one accepted for its chain.
    pub async fn submit(&mut self, chain: ChainId, payload: SubmissionPayload) -> Result<()> {
        if let Some(expected) = self.next_start.get(&chain) {
            if payload.start != *expected {
                return Err(Error::SubmissionFailure {
                    chain,
                    start: payload.start,
                    end: payload.end,
                    reason: format!("not contiguous: next batch must start at {expected}"),
                });
            }
        }

        let end = payload.end;
        log::info!("Submitting {chain} batch [{}, {end})", payload.start);
        self.registry
            .submit_batches(SubmitBatchesCall::new(chain, payload))
            .await?;
        self.next_start.insert(chain, end);
        Ok(())
    }

    pub async fn closest_hash(&self, chain: ChainId, height: u64, flag: u8) -> Result<ClosestHash> {
        self.registry
            .get_closest_hash(GetClosestHashCall {
                chain_id: chain,
                height,
                flag,
            })
            .await
    }
}
