//! Per-step outcome tallies.

/// Monotonic counters for one bulk step invocation (per-addon or
/// per-nodegroup loops within a single cluster). Single-threaded by design;
/// one instance per invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    total: u32,
    updated: u32,
    failed: u32,
    no_action: u32,
    not_active: u32,
    not_requested: u32,
    not_supported: u32,
}

impl Progress {
    pub fn new() -> Self {
        Progress::default()
    }

    pub fn record_total(&mut self) {
        self.total += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub fn record_no_action(&mut self) {
        self.no_action += 1;
    }

    pub fn record_not_active(&mut self) {
        self.not_active += 1;
    }

    pub fn record_not_requested(&mut self) {
        self.not_requested += 1;
    }

    pub fn record_not_supported(&mut self) {
        self.not_supported += 1;
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn updated(&self) -> u32 {
        self.updated
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn no_action(&self) -> u32 {
        self.no_action
    }

    pub fn not_active(&self) -> u32 {
        self.not_active
    }

    pub fn not_requested(&self) -> u32 {
        self.not_requested
    }

    pub fn not_supported(&self) -> u32 {
        self.not_supported
    }

    /// True when every sub-item either succeeded or legitimately needed no
    /// action.
    pub fn clean(&self) -> bool {
        self.failed == 0 && self.not_active == 0
    }
}
