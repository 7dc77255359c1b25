use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::circuits::encoder::CircuitInput;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::proofs::artifact::ProofArtifact;

/// External proving system. One blocking call per batch input.
#[async_trait]
pub trait Prover: Send + Sync {
    async fn prove(&self, input: &CircuitInput) -> Result<ProofArtifact>;
}

/// Drives a ZoKrates installation inside a working directory holding the compiled validator.
pub struct ZokratesProver {
    pub bin: String,
    pub working_dir: PathBuf,
}

impl ZokratesProver {
    pub const INPUT_FILE: &'static str = "zokratesInput";
    pub const WITNESS_FILE: &'static str = "witness";
    pub const PROOF_FILE: &'static str = "proof.json";

    pub fn new(bin: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            working_dir: working_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        ZokratesProver::new(config.zokrates_bin.clone(), config.zokrates_dir.clone())
    }

    fn path(&self, file: &str) -> PathBuf {
        self.working_dir.join(file)
    }

    async fn remove_stale(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                log::debug!("Removed stale {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the input for this run. Leftovers of an earlier run are never reused.
    pub async fn write_input(&self, input: &CircuitInput) -> Result<PathBuf> {
        Self::remove_stale(&self.path(Self::WITNESS_FILE)).await?;
        Self::remove_stale(&self.path(Self::PROOF_FILE)).await?;

        let input_path = self.path(Self::INPUT_FILE);
        tokio::fs::write(&input_path, input.as_str()).await?;
        Ok(input_path)
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let subcommand = args.first().copied().unwrap_or_default();
        log::info!("Running {} {subcommand}", self.bin);

        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| Error::ProverFailure(format!("failed to launch {}: {e}", self.bin)))?;

        if !output.status.success() {
            return Err(Error::ProverFailure(format!(
                "{} {subcommand} exited with {}: {}",
                self.bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    /// Compile the validator program, run the trusted setup and export the verifier contract.
    pub async fn compile_validator(&self, program: &str) -> Result<()> {
        self.run(&["compile", "-i", program]).await?;
        self.run(&["setup"]).await?;
        self.run(&["export-verifier"]).await
    }
}

#[async_trait]
impl Prover for ZokratesProver {
    async fn prove(&self, input: &CircuitInput) -> Result<ProofArtifact> {
        let input_path = self.write_input(input).await?;
        log::info!("Wrote prover input to {}", input_path.display());

        let mut args = vec!["compute-witness", "-a"];
        args.extend(input.tokens());
        self.run(&args).await?;
        self.run(&["generate-proof"]).await?;

        ProofArtifact::from_file(&self.path(Self::PROOF_FILE))
    }
}
