//! Trace sampling strategies.
//!
//! A sampler is consulted only when the inbound request carries no upstream
//! decision and its path is not excluded. Samplers are built once from
//! configuration and shared read-only across requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::{SamplerConfig, SamplerKind};

/// Trait for samplers.
pub trait Sampler: Send + Sync {
    /// Decide whether the current request is sampled.
    fn check(&self) -> bool;

    /// Get a description of this sampler
    fn description(&self) -> String;
}

/// Samples every request.
#[derive(Debug, Default)]
pub struct AlwaysSampler;

impl Sampler for AlwaysSampler {
    fn check(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "AlwaysSampler".to_string()
    }
}

/// Samples nothing.
#[derive(Debug, Default)]
pub struct NeverSampler;

impl Sampler for NeverSampler {
    fn check(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        "NeverSampler".to_string()
    }
}

/// Samples each request independently with a fixed probability.
#[derive(Debug)]
pub struct ProbabilitySampler {
    probability: f64,
}

impl ProbabilitySampler {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl Sampler for ProbabilitySampler {
    fn check(&self) -> bool {
        if self.probability >= 1.0 {
            return true;
        }
        if self.probability <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_bool(self.probability)
    }

    fn description(&self) -> String {
        format!("ProbabilitySampler{{probability={}}}", self.probability)
    }
}

/// Samples at most `qps` requests per second.
///
/// The first request is always sampled; after a sample, requests are dropped
/// until `1 / qps` seconds have elapsed.
#[derive(Debug)]
pub struct RateSampler {
    qps: f64,
    interval_nanos: u64,
    origin: Instant,
    /// Nanoseconds since `origin` at which the next sample is allowed.
    next_allowed: AtomicU64,
}

impl RateSampler {
    pub fn new(qps: f64) -> Self {
        let interval = if qps > 0.0 {
            Duration::try_from_secs_f64(1.0 / qps).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };

        Self {
            qps,
            interval_nanos: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
            origin: Instant::now(),
            next_allowed: AtomicU64::new(0),
        }
    }

    pub fn qps(&self) -> f64 {
        self.qps
    }

    fn check_at(&self, now_nanos: u64) -> bool {
        let mut next = self.next_allowed.load(Ordering::Acquire);
        loop {
            if now_nanos < next {
                return false;
            }
            let following = now_nanos.saturating_add(self.interval_nanos);
            match self.next_allowed.compare_exchange_weak(
                next,
                following,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => next = current,
            }
        }
    }
}

impl Sampler for RateSampler {
    fn check(&self) -> bool {
        let elapsed = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.check_at(elapsed)
    }

    fn description(&self) -> String {
        format!("RateSampler{{qps={}}}", self.qps)
    }
}

/// Build the default sampler from configuration.
pub fn sampler_from_config(config: &SamplerConfig) -> Arc<dyn Sampler> {
    match config.kind {
        SamplerKind::Always => Arc::new(AlwaysSampler),
        SamplerKind::Never => Arc::new(NeverSampler),
        SamplerKind::Probability => Arc::new(ProbabilitySampler::new(config.probability)),
        SamplerKind::Rate => Arc::new(RateSampler::new(config.qps)),
    }
}
