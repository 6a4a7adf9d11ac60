//! Host CPU and memory utilization.
//!
//! Two CPU strategies, chosen once at construction:
//! - `ProcessTime`: delta of this process's `utime + stime` over wall-clock
//!   delta, divided by core count (needs `/proc/self/stat`).
//! - `LoadAverage`: 1-minute load average over core count (`/proc/loadavg`).
//!
//! Memory is `(MemTotal - MemFree) / MemTotal` from `/proc/meminfo`.
//! Every percentage is clamped to [0, 100] and rounded to two decimals; any
//! read or parse failure reports 0.

use std::fs;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use pizzatel_core::error::{Result, PizzatelError};

/// Kernel USER_HZ; 100 on every mainstream Linux ABI.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

const PROC_SELF_STAT: &str = "/proc/self/stat";
const PROC_LOADAVG: &str = "/proc/loadavg";
const PROC_MEMINFO: &str = "/proc/meminfo";

/// Reads `/proc`-style files. Swapped out in tests.
pub trait ProcSource: Send + Sync {
    fn read(&self, path: &str) -> Option<String>;
}

/// The real `/proc` filesystem.
pub struct ProcFs;

impl ProcSource for ProcFs {
    fn read(&self, path: &str) -> Option<String> {
        fs::read_to_string(path).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuStrategy {
    ProcessTime,
    LoadAverage,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemLoad {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

#[derive(Debug, Clone, Copy)]
struct CpuSample {
    ticks: u64,
    at: Instant,
}

pub struct SystemSampler {
    source: Box<dyn ProcSource>,
    strategy: CpuStrategy,
    cores: usize,
    last: Mutex<Option<CpuSample>>,
}

impl SystemSampler {
    /// Sampler over the real `/proc`, strategy picked by what is readable.
    pub fn detect() -> Self {
        Self::with_source(Box::new(ProcFs))
    }

    pub fn with_source(source: Box<dyn ProcSource>) -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_source_and_cores(source, cores)
    }

    pub fn with_source_and_cores(source: Box<dyn ProcSource>, cores: usize) -> Self {
        let baseline = source
            .read(PROC_SELF_STAT)
            .and_then(|s| parse_self_cpu_ticks(&s).ok());

        let strategy = if baseline.is_some() {
            CpuStrategy::ProcessTime
        } else if source
            .read(PROC_LOADAVG)
            .is_some_and(|s| parse_loadavg_1m(&s).is_ok())
        {
            CpuStrategy::LoadAverage
        } else {
            CpuStrategy::Unavailable
        };
        tracing::debug!(?strategy, cores, "system sampler ready");

        Self {
            source,
            strategy,
            cores: cores.max(1),
            last: Mutex::new(baseline.map(|ticks| CpuSample { ticks, at: Instant::now() })),
        }
    }

    /// Sampler that always reports zeros.
    pub fn unavailable() -> Self {
        struct Nothing;
        impl ProcSource for Nothing {
            fn read(&self, _: &str) -> Option<String> {
                None
            }
        }
        Self::with_source_and_cores(Box::new(Nothing), 1)
    }

    pub fn strategy(&self) -> CpuStrategy {
        self.strategy
    }

    pub fn sample(&self) -> SystemLoad {
        SystemLoad {
            cpu_percent: self.cpu_percent(),
            memory_percent: self.memory_percent(),
        }
    }

    pub fn cpu_percent(&self) -> f64 {
        match self.strategy {
            CpuStrategy::ProcessTime => {
                let Some(ticks) = self
                    .source
                    .read(PROC_SELF_STAT)
                    .and_then(|s| parse_self_cpu_ticks(&s).ok())
                else {
                    return 0.0;
                };
                let now = CpuSample { ticks, at: Instant::now() };
                let prev = self
                    .last
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .replace(now);
                match prev {
                    Some(prev) => process_cpu_percent(
                        now.ticks.saturating_sub(prev.ticks),
                        now.at.saturating_duration_since(prev.at),
                        self.cores,
                    ),
                    None => 0.0,
                }
            }
            CpuStrategy::LoadAverage => self
                .source
                .read(PROC_LOADAVG)
                .and_then(|s| parse_loadavg_1m(&s).ok())
                .map(|load1| load_average_percent(load1, self.cores))
                .unwrap_or(0.0),
            CpuStrategy::Unavailable => 0.0,
        }
    }

    pub fn memory_percent(&self) -> f64 {
        self.source
            .read(PROC_MEMINFO)
            .and_then(|s| parse_meminfo(&s).ok())
            .map(|m| memory_percent(m.total_kb, m.free_kb))
            .unwrap_or(0.0)
    }
}

/// Clamp to [0, 100] and round to two decimals. NaN reports 0.
pub fn clamp_percent(v: f64) -> f64 {
    if !v.is_finite() {
        return if v == f64::INFINITY { 100.0 } else { 0.0 };
    }
    (v.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

pub fn process_cpu_percent(cpu_ticks: u64, wall: Duration, cores: usize) -> f64 {
    let wall_secs = wall.as_secs_f64();
    if wall_secs <= 0.0 {
        return 0.0;
    }
    let cpu_secs = cpu_ticks as f64 / CLOCK_TICKS_PER_SEC;
    clamp_percent(cpu_secs / wall_secs / cores.max(1) as f64 * 100.0)
}

pub fn load_average_percent(load1: f64, cores: usize) -> f64 {
    clamp_percent(load1 / cores.max(1) as f64 * 100.0)
}

pub fn memory_percent(total_kb: u64, free_kb: u64) -> f64 {
    if total_kb == 0 {
        return 0.0;
    }
    let used = total_kb.saturating_sub(free_kb);
    clamp_percent(used as f64 / total_kb as f64 * 100.0)
}

/// `utime + stime` (clock ticks) from `/proc/self/stat`.
///
/// `comm` may contain spaces and parentheses, so fields are counted from the
/// last `)`.
pub fn parse_self_cpu_ticks(content: &str) -> Result<u64> {
    let close = content
        .rfind(')')
        .ok_or_else(|| PizzatelError::BadRequest("missing ')' in stat".into()))?;
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();

    // After comm: state(0) ... utime(11) stime(12)
    let field = |idx: usize, name: &str| -> Result<u64> {
        fields
            .get(idx)
            .ok_or_else(|| PizzatelError::BadRequest(format!("missing {name} in stat")))?
            .parse()
            .map_err(|_| PizzatelError::BadRequest(format!("invalid {name} in stat")))
    };

    Ok(field(11, "utime")? + field(12, "stime")?)
}

/// 1-minute load average from `/proc/loadavg`.
pub fn parse_loadavg_1m(content: &str) -> Result<f64> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| PizzatelError::BadRequest("empty loadavg".into()))?
        .parse()
        .map_err(|_| PizzatelError::BadRequest("invalid load1".into()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: u64,
    pub free_kb: u64,
}

/// `MemTotal` and `MemFree` from `/proc/meminfo`.
pub fn parse_meminfo(content: &str) -> Result<MemInfo> {
    let parse_kb = |line: &str| -> Option<u64> { line.split_whitespace().nth(1)?.parse().ok() };

    let mut total = None;
    let mut free = None;
    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total = parse_kb(line);
        } else if line.starts_with("MemFree:") {
            free = parse_kb(line);
        }
    }

    match (total, free) {
        (Some(total_kb), Some(free_kb)) => Ok(MemInfo { total_kb, free_kb }),
        _ => Err(PizzatelError::BadRequest("meminfo missing MemTotal/MemFree".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    const STAT: &str = "4242 (node (pizza) srv) S 1 4242 4242 0 -1 4194560 900 0 0 0 250 50 0 0 20 0 11 0 1234 987654 321 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";

    const MEMINFO: &str = "\
MemTotal:       16000000 kB
MemFree:         4000000 kB
MemAvailable:   12000000 kB
Buffers:          100000 kB
";

    struct Fixed(Arc<Mutex<HashMap<&'static str, String>>>);

    impl ProcSource for Fixed {
        fn read(&self, path: &str) -> Option<String> {
            self.0.lock().unwrap().get(path).cloned()
        }
    }

    #[test]
    fn parses_stat_with_parens_in_comm() {
        assert_eq!(parse_self_cpu_ticks(STAT).unwrap(), 300);
    }

    #[test]
    fn rejects_truncated_stat() {
        assert!(parse_self_cpu_ticks("1 (x) S 0 0").is_err());
        assert!(parse_self_cpu_ticks("garbage").is_err());
    }

    #[test]
    fn parses_loadavg() {
        assert!((parse_loadavg_1m("0.15 0.10 0.05 1/150 1234\n").unwrap() - 0.15).abs() < 1e-9);
        assert!(parse_loadavg_1m("").is_err());
        assert!(parse_loadavg_1m("abc 1 1").is_err());
    }

    #[test]
    fn parses_meminfo() {
        let m = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(m, MemInfo { total_kb: 16_000_000, free_kb: 4_000_000 });
        assert_eq!(memory_percent(m.total_kb, m.free_kb), 75.0);
        assert!(parse_meminfo("MemTotal: 1 kB\n").is_err());
    }

    #[test]
    fn percentages_are_clamped_and_rounded() {
        assert_eq!(load_average_percent(3.0, 2), 100.0);
        assert_eq!(load_average_percent(-1.0, 2), 0.0);
        assert_eq!(load_average_percent(1.0, 3), 33.33);
        assert_eq!(process_cpu_percent(50, Duration::from_secs(1), 1), 50.0);
        assert_eq!(process_cpu_percent(500, Duration::from_secs(1), 2), 100.0);
        assert_eq!(process_cpu_percent(10, Duration::ZERO, 4), 0.0);
        assert_eq!(memory_percent(0, 0), 0.0);
        assert_eq!(memory_percent(10, 20), 0.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
    }

    #[test]
    fn picks_process_time_when_stat_is_readable() {
        let files = Arc::new(Mutex::new(HashMap::from([
            (PROC_SELF_STAT, STAT.to_string()),
            (PROC_LOADAVG, "0.5 0.5 0.5 1/1 1".to_string()),
            (PROC_MEMINFO, MEMINFO.to_string()),
        ])));
        let sampler = SystemSampler::with_source_and_cores(Box::new(Fixed(Arc::clone(&files))), 4);
        assert_eq!(sampler.strategy(), CpuStrategy::ProcessTime);

        // Burn a huge number of ticks between samples: still clamped.
        files
            .lock()
            .unwrap()
            .insert(PROC_SELF_STAT, STAT.replace(" 250 50 ", " 900000 50 "));
        let load = sampler.sample();
        assert!((0.0..=100.0).contains(&load.cpu_percent));
        assert_eq!(load.memory_percent, 75.0);
    }

    #[test]
    fn falls_back_to_load_average() {
        let files = Arc::new(Mutex::new(HashMap::from([(
            PROC_LOADAVG,
            "1.00 0.5 0.5 1/1 1".to_string(),
        )])));
        let sampler = SystemSampler::with_source_and_cores(Box::new(Fixed(files)), 4);
        assert_eq!(sampler.strategy(), CpuStrategy::LoadAverage);
        assert_eq!(sampler.cpu_percent(), 25.0);
        assert_eq!(sampler.memory_percent(), 0.0);
    }

    #[test]
    fn unavailable_reports_zeros() {
        let sampler = SystemSampler::unavailable();
        assert_eq!(sampler.strategy(), CpuStrategy::Unavailable);
        assert_eq!(sampler.sample(), SystemLoad { cpu_percent: 0.0, memory_percent: 0.0 });
    }
}
