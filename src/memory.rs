/// Resident memory probing
///
/// The frame is meant to run for weeks on small boards, so the UI samples
/// its own resident set size on a timer and logs it. With a configured
/// ceiling, going over it makes the UI drop queued photos.

use log::{info, warn};

/// Current resident set size in bytes, if the platform exposes it
pub fn resident_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

/// Extract `VmRSS` from the contents of `/proc/<pid>/status`
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryStatus {
    /// The platform does not report resident memory
    Unknown,
    Ok { resident: u64 },
    OverLimit { resident: u64, limit: u64 },
}

/// Compares resident memory against an optional ceiling
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProbe {
    limit: Option<u64>,
}

impl MemoryProbe {
    pub fn new(limit: Option<u64>) -> Self {
        Self { limit }
    }

    /// Sample the current process and log the reading
    pub fn probe(&self) -> MemoryStatus {
        let status = self.check(resident_bytes());
        match status {
            MemoryStatus::Unknown => {}
            MemoryStatus::Ok { resident } => {
                info!("🧠 Resident memory: {:.1} MB", mb(resident));
            }
            MemoryStatus::OverLimit { resident, limit } => {
                warn!(
                    "⚠️  Resident memory {:.1} MB is over the {:.1} MB limit",
                    mb(resident),
                    mb(limit)
                );
            }
        }
        status
    }

    /// Classify a reading without touching the system
    pub fn check(&self, resident: Option<u64>) -> MemoryStatus {
        match (resident, self.limit) {
            (None, _) => MemoryStatus::Unknown,
            (Some(resident), Some(limit)) if resident > limit => {
                MemoryStatus::OverLimit { resident, limit }
            }
            (Some(resident), _) => MemoryStatus::Ok { resident },
        }
    }
}

pub fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
