//! Process-level readings behind the runtime metric catalogue.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// The gauge identifiers of the runtime catalogue, in wire order. The names
/// are the wire contract; collectors without a process-level counterpart
/// report zero.
pub const RUNTIME_GAUGES: &[&str] = &[
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Samples the running process's memory statistics.
pub struct RuntimeSampler {
    sys: System,
    pid: Pid,
    peak_resident: u64,
}

impl RuntimeSampler {
    /// Create a sampler bound to the current process.
    pub fn new() -> Result<Self, SamplerError> {
        let pid = sysinfo::get_current_pid().map_err(|e| SamplerError::Pid(e.to_string()))?;
        Ok(Self {
            sys: System::new(),
            pid,
            peak_resident: 0,
        })
    }

    /// Take one reading of the full catalogue.
    pub fn sample(&mut self) -> Vec<(&'static str, f64)> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            ProcessRefreshKind::new().with_memory(),
        );

        let (resident, virtual_mem) = match self.sys.process(self.pid) {
            Some(proc) => (proc.memory(), proc.virtual_memory()),
            None => (0, 0),
        };
        self.peak_resident = self.peak_resident.max(resident);

        let resident = resident as f64;
        let virtual_mem = virtual_mem as f64;
        let idle = (virtual_mem - resident).max(0.0);

        RUNTIME_GAUGES
            .iter()
            .map(|&name| {
                let value = match name {
                    "Alloc" | "HeapAlloc" | "HeapInuse" => resident,
                    "Sys" | "HeapSys" => virtual_mem,
                    "HeapIdle" => idle,
                    "TotalAlloc" => self.peak_resident as f64,
                    _ => 0.0,
                };
                (name, value)
            })
            .collect()
    }
}

/// Sampler construction errors.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("cannot resolve current process id: {0}")]
    Pid(String),
}
