//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ASSESSOR_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_CONCURRENT_ASSESSORS: usize = 4;

/// Tunables for an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on a single assessor call before the placeholder is used.
    pub assessor_timeout: Duration,
    /// Maximum number of dimensions assessed at the same time.
    pub max_concurrent_assessors: usize,
    /// Directory of `<specialization>.json` knowledge files for dimension agents.
    pub knowledge_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            assessor_timeout: Duration::from_secs(DEFAULT_ASSESSOR_TIMEOUT_SECS),
            max_concurrent_assessors: DEFAULT_MAX_CONCURRENT_ASSESSORS,
            knowledge_dir: None,
        }
    }
}

impl OrchestratorConfig {
    /// Read `VERITY_ASSESSOR_TIMEOUT_SECS`, `VERITY_MAX_CONCURRENT` and
    /// `VERITY_KNOWLEDGE_DIR`, keeping defaults for unset or unparseable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("VERITY_ASSESSOR_TIMEOUT_SECS") {
            config.assessor_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<usize>("VERITY_MAX_CONCURRENT") {
            config.max_concurrent_assessors = n;
        }
        if let Some(dir) = std::env::var_os("VERITY_KNOWLEDGE_DIR").filter(|d| !d.is_empty()) {
            config.knowledge_dir = Some(PathBuf::from(dir));
        }
        config.normalized()
    }

    pub fn with_assessor_timeout(mut self, timeout: Duration) -> Self {
        self.assessor_timeout = timeout;
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent_assessors = n;
        self.normalized()
    }

    pub fn with_knowledge_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.knowledge_dir = Some(dir.into());
        self
    }

    /// At least one assessor must be allowed to run.
    fn normalized(mut self) -> Self {
        self.max_concurrent_assessors = self.max_concurrent_assessors.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
