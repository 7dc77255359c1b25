use std::fmt;
use std::sync::Arc;

use num::BigUint;
use thiserror::Error;

use crate::blocks::block::{canonicalize, CanonicalHeader, RawHeader};
use crate::blocks::block_fetcher::{get_link_hash_and_headers, HeaderSource};
use crate::blocks::hash::ChainHash;
use crate::blocks::target::{check_proof_of_work, decode_target};
use crate::circuits::encoder::{CircuitInput, CircuitLayout, CIRCUIT_V1, HEADERS_PER_BATCH};
use crate::config::DEFAULT_PROOF_SCHEME;
use crate::error::{Error, Result};
use crate::proofs::artifact::{reshape, SubmissionPayload};
use crate::proofs::provers::Prover;
use crate::registry::ChainId;

/// Height window `[start, end)` of exactly one batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatchRange {
    pub start: u64,
    pub end: u64,
}

impl BatchRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if end.checked_sub(start) != Some(HEADERS_PER_BATCH as i64) {
            return Err(Error::InvalidBatchRange { start, end });
        }
        let start = u64::try_from(start).map_err(|_| Error::NegativeHeight(start))?;
        Ok(BatchRange {
            start,
            end: start + HEADERS_PER_BATCH as u64,
        })
    }

    pub fn starting_at(start: u64) -> Self {
        BatchRange {
            start,
            end: start + HEADERS_PER_BATCH as u64,
        }
    }

    pub fn next(&self) -> Self {
        BatchRange::starting_at(self.end)
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// 32 consecutive headers with everything derived from them.
#[derive(Clone, Debug)]
pub struct Batch {
    pub chain: ChainId,
    pub range: BatchRange,
    pub link_hash: ChainHash,
    pub headers: Vec<CanonicalHeader>,
    pub hashes: Vec<ChainHash>,
    pub targets: Vec<BigUint>,
}

impl Batch {
    /// Canonicalize and check that every header extends the previous one.
    /// SHA-256d mined chains must also meet their target.
    pub fn build(
        chain: ChainId,
        range: BatchRange,
        link_hash: ChainHash,
        raw_headers: &[RawHeader],
    ) -> Result<Self> {
        if raw_headers.len() != HEADERS_PER_BATCH {
            return Err(Error::BatchSize {
                expected: HEADERS_PER_BATCH,
                actual: raw_headers.len(),
            });
        }

        let mut headers = Vec::with_capacity(HEADERS_PER_BATCH);
        let mut hashes = Vec::with_capacity(HEADERS_PER_BATCH);
        let mut targets = Vec::with_capacity(HEADERS_PER_BATCH);
        let mut prev = link_hash;

        for (height, raw) in (range.start..range.end).zip(raw_headers) {
            if raw.height != height {
                return Err(Error::malformed(
                    Some(raw.height),
                    format!("expected header at height {height}"),
                ));
            }
            let header = canonicalize(raw)?;
            if header.prev_hash() != prev {
                return Err(Error::malformed(
                    Some(height),
                    format!("does not extend {prev}"),
                ));
            }

            let hash = header.hash();
            let target = decode_target(&header.bits_hex())?;
            if chain.sha256d_work() && !check_proof_of_work(&header, &target) {
                return Err(Error::malformed(
                    Some(height),
                    format!("hash {hash} is above its target"),
                ));
            }

            prev = hash;
            headers.push(header);
            hashes.push(hash);
            targets.push(target);
        }

        Ok(Batch {
            chain,
            range,
            link_hash,
            headers,
            hashes,
            targets,
        })
    }

    pub fn circuit_input(&self, layout: &CircuitLayout) -> Result<CircuitInput> {
        layout.encode_batch(&self.headers, &self.targets, &self.link_hash)
    }

    /// Hash of the last header in the window.
    pub fn tip_hash(&self) -> Option<&ChainHash> {
        self.hashes.last()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BatchStage {
    Fetching,
    Encoding,
    Proving,
    Reshaping,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Fetching => "fetching",
            BatchStage::Encoding => "encoding",
            BatchStage::Proving => "proving",
            BatchStage::Reshaping => "reshaping",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchState {
    Fetching,
    Encoding,
    Proving,
    Reshaping,
    Ready,
    Failed { stage: BatchStage, reason: String },
}

impl From<BatchStage> for BatchState {
    fn from(stage: BatchStage) -> Self {
        match stage {
            BatchStage::Fetching => BatchState::Fetching,
            BatchStage::Encoding => BatchState::Encoding,
            BatchStage::Proving => BatchState::Proving,
            BatchStage::Reshaping => BatchState::Reshaping,
        }
    }
}

#[derive(Error, Debug)]
#[error("{chain} batch {range} failed while {stage}: {source}")]
pub struct BatchFailure {
    pub chain: ChainId,
    pub range: BatchRange,
    pub stage: BatchStage,
    pub source: Error,
}

/// One proving run. Every run starts over from `Fetching`.
pub struct BatchJob {
    pub chain: ChainId,
    pub range: BatchRange,
    state: BatchState,
}

impl BatchJob {
    pub fn new(chain: ChainId, range: BatchRange) -> Self {
        Self {
            chain,
            range,
            state: BatchState::Fetching,
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    fn enter(&mut self, stage: BatchStage) {
        log::info!("{} batch {}: {stage}", self.chain, self.range);
        self.state = stage.into();
    }

    fn check<T>(
        &mut self,
        stage: BatchStage,
        result: Result<T>,
    ) -> std::result::Result<T, BatchFailure> {
        result.map_err(|source| {
            log::error!("{} batch {} failed while {stage}: {source}", self.chain, self.range);
            self.state = BatchState::Failed {
                stage,
                reason: source.to_string(),
            };
            BatchFailure {
                chain: self.chain,
                range: self.range,
                stage,
                source,
            }
        })
    }

    /// Fetching and Encoding: produce the prover input for this window.
    pub async fn encode(
        &mut self,
        source: &dyn HeaderSource,
        layout: &CircuitLayout,
    ) -> std::result::Result<CircuitInput, BatchFailure> {
        self.enter(BatchStage::Fetching);
        let fetched = get_link_hash_and_headers(
            source,
            self.chain,
            self.range.start,
            self.range.end,
        )
        .await;
        let fetched = self.check(BatchStage::Fetching, fetched)?;

        self.enter(BatchStage::Encoding);
        let input = Batch::build(self.chain, self.range, fetched.link_hash, &fetched.headers)
            .and_then(|batch| {
                if let Some(tip) = batch.tip_hash() {
                    log::debug!("{} batch {} ends at {tip}", batch.chain, batch.range);
                }
                batch.circuit_input(layout)
            });
        let input = self.check(BatchStage::Encoding, input)?;
        log::debug!("Circuit input has {} tokens", input.tokens().count());
        Ok(input)
    }

    pub async fn run(
        &mut self,
        compiler: &BatchProofCompiler,
    ) -> std::result::Result<SubmissionPayload, BatchFailure> {
        let input = self
            .encode(compiler.source.as_ref(), &compiler.layout)
            .await?;

        self.enter(BatchStage::Proving);
        let artifact = compiler.prover.prove(&input).await;
        let artifact = self.check(BatchStage::Proving, artifact)?;

        self.enter(BatchStage::Reshaping);
        let payload = reshape(&artifact, self.range.start, self.range.end, &compiler.scheme);
        let payload = self.check(BatchStage::Reshaping, payload)?;

        self.state = BatchState::Ready;
        log::info!("{} batch {} ready for submission", self.chain, self.range);
        Ok(payload)
    }
}

/// Turns a height window into a submission payload.
pub struct BatchProofCompiler {
    pub source: Arc<dyn HeaderSource>,
    pub prover: Arc<dyn Prover>,
    pub layout: CircuitLayout,
    pub scheme: String,
}

impl BatchProofCompiler {
    pub fn new(source: Arc<dyn HeaderSource>, prover: Arc<dyn Prover>) -> Self {
        Self {
            source,
            prover,
            layout: CIRCUIT_V1,
            scheme: DEFAULT_PROOF_SCHEME.to_string(),
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub async fn circuit_input(
        &self,
        chain: ChainId,
        range: BatchRange,
    ) -> std::result::Result<CircuitInput, BatchFailure> {
        BatchJob::new(chain, range)
            .encode(self.source.as_ref(), &self.layout)
            .await
    }

    pub async fn compile(
        &self,
        chain: ChainId,
        range: BatchRange,
    ) -> std::result::Result<SubmissionPayload, BatchFailure> {
        BatchJob::new(chain, range).run(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use rand::Rng;

    use crate::blocks::block::{canonicalize, RawHeader};
    use crate::blocks::block_fetcher::tests::MemoryHeaderSource;
    use crate::blocks::hash::sha256d;
    use crate::blocks::target::{check_proof_of_work, decode_target};
    use crate::circuits::encoder::{CircuitInput, CIRCUIT_V1};
    use crate::error::{Error, Result};
    use crate::proofs::artifact::tests::sample_artifact;
    use crate::proofs::artifact::ProofArtifact;
    use crate::blocks::hash::ChainHash;
    use crate::proofs::generators::{
        Batch, BatchJob, BatchProofCompiler, BatchRange, BatchStage, BatchState,
    };
    use crate::proofs::provers::Prover;
    use crate::registry::{BatchSubmitter, ChainId, MemoryRegistry};

    #[derive(Default)]
    struct StubProver {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Prover for StubProver {
        async fn prove(&self, input: &CircuitInput) -> Result<ProofArtifact> {
            self.seen.lock().unwrap().push(input.as_str().to_string());
            if self.fail {
                return Err(Error::ProverFailure("stub prover exited with 1".to_string()));
            }
            Ok(sample_artifact())
        }
    }

    fn mine(mut raw: RawHeader) -> RawHeader {
        let target = decode_target(&raw.bits).unwrap();
        while !check_proof_of_work(&canonicalize(&raw).unwrap(), &target) {
            raw.nonce += 1;
        }
        raw
    }

    /// Regtest difficulty chain starting at a genesis header.
    fn synthetic_chain(len: u64) -> Vec<RawHeader> {
        let mut prev: Option<String> = None;
        let mut chain = Vec::new();
        for height in 0..len {
            let raw = mine(RawHeader {
                height,
                version_hex: "20000000".to_string(),
                previous_block_hash: prev.clone(),
                merkle_root: hex::encode(sha256d(&height.to_le_bytes())),
                time: 1_600_000_000 + height * 600,
                bits: "207fffff".to_string(),
                nonce: 0,
            });
            prev = Some(canonicalize(&raw).unwrap().hash().to_hex());
            chain.push(raw);
        }
        chain
    }

    /// Dogecoin mainnet genesis followed by unmined headers that link onto it.
    fn doge_chain() -> Vec<RawHeader> {
        let mut chain = vec![RawHeader {
            height: 0,
            version_hex: "00000001".to_string(),
            previous_block_hash: None,
            merkle_root: "5b2a3f53f605d62c53e62932dac6925e3d74afa5a4b459745c36d42d0ed26a69"
                .to_string(),
            time: 1386325540,
            bits: "1e0ffff0".to_string(),
            nonce: 99943,
        }];
        for height in 1..32 {
            let prev = canonicalize(&chain[height as usize - 1]).unwrap().hash();
            chain.push(RawHeader {
                height,
                previous_block_hash: Some(prev.to_hex()),
                time: 1386325540 + height * 60,
                nonce: height,
                ..chain[0].clone()
            });
        }
        chain
    }

    fn compiler(chain: Vec<RawHeader>, prover: Arc<StubProver>) -> BatchProofCompiler {
        BatchProofCompiler::new(Arc::new(MemoryHeaderSource::new(chain)), prover)
    }

    #[test]
    fn test_batch_range_width() {
        assert_eq!(BatchRange::new(1, 33).unwrap(), BatchRange { start: 1, end: 33 });
        assert_eq!(BatchRange::new(0, 32).unwrap().next(), BatchRange { start: 32, end: 64 });

        let mut rng = rand::thread_rng();
        let mut pairs = vec![
            (0, 0),
            (5, 5),
            (33, 1),
            (1, 32),
            (1, 34),
            (-32, 0),
            (-1, -33),
            (i64::MIN, i64::MAX),
            (i64::MAX - 31, i64::MAX),
        ];
        for _ in 0..1000 {
            pairs.push((rng.gen_range(-1000..1000), rng.gen_range(-1000..1000)));
        }
        for (start, end) in pairs {
            let invalid = matches!(
                BatchRange::new(start, end),
                Err(Error::InvalidBatchRange { .. })
            );
            assert_eq!(invalid, end.checked_sub(start) != Some(32), "[{start}, {end})");
        }

        assert!(matches!(BatchRange::new(-32, 0), Err(Error::NegativeHeight(-32))));
    }

    #[tokio::test]
    async fn test_end_to_end_batch() -> anyhow::Result<()> {
        let chain = synthetic_chain(33);
        let genesis_hash = canonicalize(&chain[0])?.hash();
        let prover = Arc::new(StubProver::default());
        let compiler = compiler(chain, prover.clone());

        let payload = compiler
            .compile(ChainId::Btc, BatchRange::new(1, 33)?)
            .await?;
        assert_eq!((payload.start, payload.end), (1, 33));
        assert_eq!(payload.proof.b.len(), 2);
        assert!(payload.proof.inputs.iter().all(|v| v.len() == 66 && v.starts_with("0x")));

        let seen = prover.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let tokens = seen[0].split(' ').collect::<Vec<_>>();
        assert_eq!(tokens.len(), 32 * 20 + 32 * 4 + 1);
        assert_eq!(tokens.len(), CIRCUIT_V1.batch_tokens());
        assert_eq!(*tokens.last().unwrap(), genesis_hash.to_biguint().to_string());
        Ok(())
    }

    #[tokio::test]
    async fn test_circuit_input_matches_proved_input() -> anyhow::Result<()> {
        let prover = Arc::new(StubProver::default());
        let compiler = compiler(synthetic_chain(65), prover.clone());
        let range = BatchRange::new(33, 65)?;

        let input = compiler.circuit_input(ChainId::Doge, range).await?;
        compiler.compile(ChainId::Doge, range).await?;
        assert_eq!(prover.seen.lock().unwrap()[0], input.as_str());
        Ok(())
    }

    #[tokio::test]
    async fn test_prover_failure_aborts_batch() {
        let prover = Arc::new(StubProver {
            fail: true,
            ..StubProver::default()
        });
        let compiler = compiler(synthetic_chain(33), prover);
        let mut job = BatchJob::new(ChainId::Bch, BatchRange::starting_at(1));

        let failure = job.run(&compiler).await.unwrap_err();
        assert_eq!(failure.stage, BatchStage::Proving);
        assert_eq!(failure.chain, ChainId::Bch);
        assert!(matches!(failure.source, Error::ProverFailure(_)));
        assert!(matches!(
            job.state(),
            BatchState::Failed { stage: BatchStage::Proving, .. }
        ));
    }

    #[test]
    fn test_doge_headers_skip_sha256d_work() {
        let chain = doge_chain();
        let range = BatchRange::starting_at(0);

        let batch = Batch::build(ChainId::Doge, range, ChainHash::ZERO, &chain).unwrap();
        assert_eq!(
            batch.hashes[0].to_hex(),
            "1a91e3dace36e2be3bf030a65679fe821aa1d6ef92e7c9902eb318182c355691"
        );
        assert_eq!(batch.tip_hash(), batch.hashes.last());
        assert_eq!(batch.circuit_input(&CIRCUIT_V1).unwrap().tokens().count(), 769);

        // The same headers judged as SHA-256d mined fail at genesis.
        let as_btc = Batch::build(ChainId::Btc, range, ChainHash::ZERO, &chain);
        assert!(matches!(
            as_btc,
            Err(Error::MalformedHeader { height: Some(0), .. })
        ));

        let mut broken = chain.clone();
        broken[5].previous_block_hash = Some("00".repeat(32));
        let unlinked = Batch::build(ChainId::Doge, range, ChainHash::ZERO, &broken);
        assert!(matches!(
            unlinked,
            Err(Error::MalformedHeader { height: Some(5), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_headers_fail_while_fetching() {
        let compiler = compiler(synthetic_chain(20), Arc::new(StubProver::default()));
        let failure = compiler
            .compile(ChainId::Btc, BatchRange::starting_at(1))
            .await
            .unwrap_err();
        assert_eq!(failure.stage, BatchStage::Fetching);
    }

    #[tokio::test]
    async fn test_broken_link_fails_while_encoding() {
        let mut chain = synthetic_chain(33);
        chain[10].previous_block_hash = Some("00".repeat(32));
        let prover = Arc::new(StubProver::default());
        let compiler = compiler(chain, prover.clone());

        let failure = compiler
            .compile(ChainId::Btc, BatchRange::starting_at(1))
            .await
            .unwrap_err();
        assert_eq!(failure.stage, BatchStage::Encoding);
        assert!(matches!(
            failure.source,
            Error::MalformedHeader { height: Some(10), .. }
        ));
        assert!(prover.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compiled_batches_submit_in_order() -> anyhow::Result<()> {
        let compiler = compiler(synthetic_chain(65), Arc::new(StubProver::default()));
        let first = BatchRange::starting_at(1);
        let second = first.next();

        let mut submitter = BatchSubmitter::new(MemoryRegistry::default());
        let early = submitter
            .submit(ChainId::Btc, compiler.compile(ChainId::Btc, second).await?)
            .await;
        assert!(matches!(early, Err(Error::SubmissionFailure { start: 33, .. })));

        submitter
            .submit(ChainId::Btc, compiler.compile(ChainId::Btc, first).await?)
            .await?;
        submitter
            .submit(ChainId::Btc, compiler.compile(ChainId::Btc, second).await?)
            .await?;
        assert_eq!(submitter.registry().tip(ChainId::Btc), Some(65));
        Ok(())
    }
}
