//! Context configuration.
//!
//! A [`ContextConfig`] fixes the number of logical workers (partitions of every
//! DIA) and the size of the compute thread pool. Defaults follow the machine's
//! CPU count; [`ContextConfig::from_env`] lets a deployment override both via
//! `IRONDIA_WORKERS` and `IRONDIA_THREADS`.

use crate::error::DiaError;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const WORKERS_ENV: &str = "IRONDIA_WORKERS";
pub const THREADS_ENV: &str = "IRONDIA_THREADS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Number of logical workers, i.e. partitions per DIA.
    pub workers: usize,
    /// Threads in the context's compute pool.
    pub threads: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            workers: cpus,
            threads: cpus,
        }
    }
}

impl ContextConfig {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Defaults overridden by `IRONDIA_WORKERS` / `IRONDIA_THREADS`.
    ///
    /// # Errors
    ///
    /// A [`DiaError::Usage`] if a variable is set but not a positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// A [`DiaError::Usage`] if a variable is set but not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup(WORKERS_ENV) {
            config.workers = parse_count(WORKERS_ENV, &v)?;
        }
        if let Some(v) = lookup(THREADS_ENV) {
            config.threads = parse_count(THREADS_ENV, &v)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// A [`DiaError::Usage`] if either count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DiaError::usage("workers must be at least 1").into());
        }
        if self.threads == 0 {
            return Err(DiaError::usage("threads must be at least 1").into());
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DiaError::usage(format!("{key}={value:?} is not a positive integer")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::dia_error;

    #[test]
    fn lookup_overrides_defaults() {
        let cfg = ContextConfig::from_lookup(|k| match k {
            WORKERS_ENV => Some("3".into()),
            THREADS_ENV => Some(" 2 ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg, ContextConfig { workers: 3, threads: 2 });
    }

    #[test]
    fn invalid_values_are_usage_errors() {
        let err = ContextConfig::from_lookup(|k| (k == WORKERS_ENV).then(|| "zero".into()))
            .unwrap_err();
        assert!(matches!(dia_error(&err), Some(DiaError::Usage(_))));

        let err = ContextConfig::from_lookup(|k| (k == THREADS_ENV).then(|| "0".into()))
            .unwrap_err();
        assert!(matches!(dia_error(&err), Some(DiaError::Usage(_))));
    }
}
