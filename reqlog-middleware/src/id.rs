use rand::Rng;
use std::fmt;

/// Links a request entry to its response entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Source of correlation ids. Plain `Fn() -> u64` closures qualify.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> CorrelationId;
}

impl<F> IdGenerator for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn next_id(&self) -> CorrelationId {
        CorrelationId(self())
    }
}

/// Random non-negative ids below `i64::MAX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> CorrelationId {
        CorrelationId(rand::thread_rng().gen_range(0..i64::MAX as u64))
    }
}
