//! In-process hardware counters read through `perf_event_open(2)`.
//!
//! Used by the companion workload to report its own cache and TLB misses
//! without going through the external sampling tool.

use std::{
    fs::File,
    io::{stdout, Read, Write},
    os::fd::{AsRawFd, FromRawFd},
    time::{Duration, Instant},
};

use perf_event_open_sys::{
    bindings::{
        perf_event_attr, PERF_COUNT_HW_CACHE_DTLB, PERF_COUNT_HW_CACHE_ITLB,
        PERF_COUNT_HW_CACHE_L1D, PERF_COUNT_HW_CACHE_LL, PERF_COUNT_HW_CACHE_OP_READ,
        PERF_COUNT_HW_CACHE_OP_WRITE, PERF_COUNT_HW_CACHE_RESULT_MISS, PERF_COUNT_HW_CPU_CYCLES,
        PERF_COUNT_HW_INSTRUCTIONS, PERF_COUNT_SW_TASK_CLOCK, PERF_FORMAT_TOTAL_TIME_ENABLED,
        PERF_FORMAT_TOTAL_TIME_RUNNING, PERF_TYPE_HARDWARE, PERF_TYPE_HW_CACHE, PERF_TYPE_SOFTWARE,
    },
    perf_event_open,
};

use crate::{
    error::{Error, Result},
    report::push_column,
};

const READ_SIZE: usize = std::mem::size_of::<ReadFormat>();

#[derive(Debug, Default, Clone, Copy)]
#[repr(C)]
struct ReadFormat {
    value: u64,
    time_enabled: u64,
    time_running: u64,
}

impl ReadFormat {
    fn from_ne_bytes(data: &[u8; READ_SIZE]) -> Self {
        let word = |i: usize| {
            let mut bytes = [0_u8; 8];
            bytes.copy_from_slice(&data[i * 8..(i + 1) * 8]);
            u64::from_ne_bytes(bytes)
        };
        Self {
            value: word(0),
            time_enabled: word(1),
            time_running: word(2),
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventDomain: u64 {
        const USER = 0b1;
        const KERNEL = 0b10;
        const HYPERVISOR = 0b100;
    }
}

/// A counter to open: perf type, config word and privilege domain.
#[derive(Debug, Clone, Copy)]
pub struct CounterSpec {
    pub name: &'static str,
    pub perf_type: u32,
    pub config: u64,
    pub domain: EventDomain,
}

const fn cache_event(cache: u32, op: u32, result: u32) -> u64 {
    cache as u64 | ((op as u64) << 8) | ((result as u64) << 16)
}

impl CounterSpec {
    const fn hardware(name: &'static str, config: u32, domain: EventDomain) -> Self {
        Self {
            name,
            perf_type: PERF_TYPE_HARDWARE,
            config: config as u64,
            domain,
        }
    }

    const fn cache_miss(name: &'static str, cache: u32, op: u32) -> Self {
        Self {
            name,
            perf_type: PERF_TYPE_HW_CACHE,
            config: cache_event(cache, op, PERF_COUNT_HW_CACHE_RESULT_MISS),
            domain: EventDomain::all(),
        }
    }
}

pub const DEFAULT_COUNTERS: &[CounterSpec] = &[
    CounterSpec::hardware("cycles", PERF_COUNT_HW_CPU_CYCLES, EventDomain::all()),
    CounterSpec::hardware("instructions", PERF_COUNT_HW_INSTRUCTIONS, EventDomain::all()),
    CounterSpec::cache_miss("L1D-read-misses", PERF_COUNT_HW_CACHE_L1D, PERF_COUNT_HW_CACHE_OP_READ),
    CounterSpec::cache_miss("LLC-read-misses", PERF_COUNT_HW_CACHE_LL, PERF_COUNT_HW_CACHE_OP_READ),
    CounterSpec::cache_miss("dTLB-read-misses", PERF_COUNT_HW_CACHE_DTLB, PERF_COUNT_HW_CACHE_OP_READ),
    CounterSpec::cache_miss("dTLB-write-misses", PERF_COUNT_HW_CACHE_DTLB, PERF_COUNT_HW_CACHE_OP_WRITE),
    CounterSpec::cache_miss("iTLB-read-misses", PERF_COUNT_HW_CACHE_ITLB, PERF_COUNT_HW_CACHE_OP_READ),
    CounterSpec {
        name: "task-clock",
        perf_type: PERF_TYPE_SOFTWARE,
        config: PERF_COUNT_SW_TASK_CLOCK as u64,
        domain: EventDomain::all(),
    },
];

/// Values computed from other counters rather than read from the kernel.
const DERIVED: &[&str] = &["IPC", "GHz", "CPUs", "runtime"];

#[derive(Debug)]
struct Counter {
    name: &'static str,
    file: File,
    prev: ReadFormat,
    data: ReadFormat,
}

impl Counter {
    fn read_format(&mut self) -> Result<ReadFormat> {
        let mut data = [0_u8; READ_SIZE];
        self.file
            .read_exact(&mut data)
            .map_err(|source| Error::Counter {
                name: self.name.to_owned(),
                source,
            })?;
        Ok(ReadFormat::from_ne_bytes(&data))
    }

    fn ioctl(&self, request: u32) -> Result<()> {
        let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), u64::from(request), 0) };
        if ret == -1 {
            return Err(Error::Counter {
                name: self.name.to_owned(),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    /// Delta since the start, scaled up when the counter was multiplexed.
    #[allow(clippy::cast_precision_loss)]
    fn read_counter(&self) -> f64 {
        let running = self.data.time_running.wrapping_sub(self.prev.time_running);
        if running == 0 {
            return 0.0;
        }
        let enabled = self.data.time_enabled.wrapping_sub(self.prev.time_enabled);
        let value = self.data.value.wrapping_sub(self.prev.value);
        value as f64 * (enabled as f64 / running as f64)
    }
}

#[derive(Debug)]
pub struct CounterSet {
    counters: Vec<Counter>,
    begin: Instant,
    end: Instant,
}

impl CounterSet {
    /// Opens every counter in `specs` for the calling thread and its children.
    ///
    /// Counters the PMU does not provide are skipped with a warning; any other
    /// failure (typically missing permissions) is an error.
    pub fn open(specs: &[CounterSpec]) -> Result<Self> {
        let mut counters = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut attr = Self::attr(spec);
            let fd = unsafe { perf_event_open(&mut attr, 0, -1, -1, 0) };
            if fd < 0 {
                let source = std::io::Error::last_os_error();
                if matches!(source.raw_os_error(), Some(libc::ENOENT | libc::EOPNOTSUPP)) {
                    log::warn!("counter {} not supported here, skipping", spec.name);
                    continue;
                }
                return Err(Error::Counter {
                    name: spec.name.to_owned(),
                    source,
                });
            }
            counters.push(Counter {
                name: spec.name,
                file: unsafe { File::from_raw_fd(fd) },
                prev: ReadFormat::default(),
                data: ReadFormat::default(),
            });
        }
        Ok(Self {
            counters,
            begin: Instant::now(),
            end: Instant::now(),
        })
    }

    fn attr(spec: &CounterSpec) -> perf_event_attr {
        let mut pe = perf_event_attr::default();
        pe.type_ = spec.perf_type;
        pe.size = std::mem::size_of::<perf_event_attr>() as u32;
        pe.config = spec.config;
        pe.set_disabled(1);
        pe.set_inherit(1);
        pe.set_inherit_stat(0);
        pe.set_exclude_user(u64::from(!spec.domain.contains(EventDomain::USER)));
        pe.set_exclude_kernel(u64::from(!spec.domain.contains(EventDomain::KERNEL)));
        pe.set_exclude_hv(u64::from(!spec.domain.contains(EventDomain::HYPERVISOR)));
        pe.read_format = u64::from(PERF_FORMAT_TOTAL_TIME_ENABLED | PERF_FORMAT_TOTAL_TIME_RUNNING);
        pe
    }

    pub fn start(&mut self) -> Result<()> {
        for counter in &mut self.counters {
            counter.ioctl(perf_event_open_sys::bindings::RESET)?;
            counter.ioctl(perf_event_open_sys::bindings::ENABLE)?;
            counter.prev = counter.read_format()?;
        }
        self.begin = Instant::now();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        for counter in &mut self.counters {
            counter.data = counter.read_format()?;
            counter.ioctl(perf_event_open_sys::bindings::DISABLE)?;
        }
        self.end = Instant::now();
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.begin)
    }

    /// Opened counter names followed by the derived ones.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.counters
            .iter()
            .map(|c| c.name)
            .chain(DERIVED.iter().copied())
    }

    /// Reading for `name`, `None` when that counter is not open.
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "IPC" => Some(self.get("instructions")? / self.get("cycles")?),
            "GHz" => Some(self.get("cycles")? / self.get("task-clock")?),
            "CPUs" => Some(self.get("task-clock")? / (self.duration().as_secs_f64() * 1e9)),
            "runtime" => Some(self.duration().as_secs_f64()),
            _ => self
                .counters
                .iter()
                .find(|c| c.name == name)
                .map(Counter::read_counter),
        }
    }

    /// Raw counters are divided by `scale`; derived values are not.
    pub fn get_normalized(&self, name: &str, scale: f64) -> Option<f64> {
        let value = self.get(name)?;
        Some(if DERIVED.iter().any(|derived| *derived == name) {
            value
        } else {
            value / scale
        })
    }

    /// One CSV header line and one data line of normalized readings.
    pub fn write_csv(
        &self,
        params: &[(String, String)],
        scale: f64,
        out: &mut dyn Write,
    ) -> Result<()> {
        let mut header = String::new();
        let mut data = String::new();
        for (name, value) in params {
            push_column(&mut header, &mut data, name, value, true);
        }
        for name in self.names() {
            let value = self
                .get_normalized(name, scale)
                .map_or_else(|| "-".to_owned(), |v| format!("{v:.2}"));
            push_column(&mut header, &mut data, name, &value, true);
        }
        push_column(&mut header, &mut data, "scale", &format!("{scale:.2}"), false);
        writeln!(out, "{header}")?;
        writeln!(out, "{data}")?;
        Ok(())
    }
}

/// Counts from construction to drop, then prints the CSV report to stdout.
pub struct CounterBlock {
    counters: CounterSet,
    params: Vec<(String, String)>,
    scale: f64,
}

impl CounterBlock {
    pub fn new(params: Vec<(String, String)>, scale: f64) -> Result<Self> {
        let mut counters = CounterSet::open(DEFAULT_COUNTERS)?;
        counters.start()?;
        Ok(Self {
            counters,
            params,
            scale,
        })
    }
}

impl Drop for CounterBlock {
    fn drop(&mut self) {
        if let Err(err) = self.counters.stop() {
            log::error!("could not stop counters: {err}");
            return;
        }
        let mut out = stdout().lock();
        if let Err(err) = self.counters.write_csv(&self.params, self.scale, &mut out) {
            log::error!("could not write counter report: {err}");
        }
    }
}
