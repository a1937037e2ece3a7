#![cfg(unix)]

use std::{fs, io::Write, os::unix::fs::PermissionsExt, path::Path};

use tmastat::{config::Format, Config, Error, PerfStat, Profiler, Variant};

/// Writes an executable stand-in for `perf` that prints `stderr` and exits
/// with `code`, echoing its arguments to stdout.
///
/// Only one test in this file writes and runs scripts: a script exec'd while
/// another thread still holds a write handle to it fails with ETXTBSY.
fn fake_perf(dir: &Path, stderr: &str, code: i32) -> std::path::PathBuf {
    let path = dir.join("perf");
    let mut file = fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    writeln!(file, "echo \"$@\"").unwrap();
    writeln!(file, "cat >&2 <<'EOF'\n{stderr}EOF").unwrap();
    writeln!(file, "exit {code}").unwrap();
    file.sync_all().unwrap();
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const CACHE_OUTPUT: &str = "
 Performance counter stats for './computation_program 1000':

                                                  #    100.00 tma_info_memory_load_miss_real_latency
                                                  #    200.00 tma_info_memory_oro_load_l2_miss_latency
                                                  #    300.00 tma_info_memory_oro_load_l3_miss_latency

       0.001 seconds time elapsed
";

#[test]
fn samples_through_external_tool() {
    let dir = tempfile::tempdir().unwrap();

    let perf = fake_perf(dir.path(), CACHE_OUTPUT, 0);
    let profiler = PerfStat::new(&perf, "./computation_program", Variant::CacheLatency);
    let text = profiler.profile(1000).unwrap();
    assert!(text.contains("tma_info_memory_oro_load_l2_miss_latency"));
    assert!(!text.contains("stat -e"), "stdout must not be captured");

    let config = Config {
        perf: perf.clone(),
        iterations: 1000,
        trials: 3,
        format: Format::Json,
        ..Config::default()
    };
    let mut out = Vec::new();
    let summary = tmastat::run(&config, &mut out).unwrap();
    assert_eq!(summary.trials, 3);
    assert_eq!(summary.degraded_trials, 0);
    let means: Vec<_> = summary.metrics.iter().map(|m| m.mean).collect();
    assert_eq!(means, [Some(100.0), Some(200.0), Some(300.0)]);
    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["metrics"][2]["mean"], 300.0);

    // a failing tool still yields a zero-filled report
    let failing = fake_perf(dir.path(), "event syntax error: 'tma_itlb_misses'\n", 129);
    let config = Config {
        variant: Variant::Tlb,
        perf: failing,
        iterations: 1,
        trials: 2,
        ..Config::default()
    };
    let mut out = Vec::new();
    let summary = tmastat::run(&config, &mut out).unwrap();
    assert_eq!(summary.degraded_trials, 2);
    assert!(summary.metrics.iter().all(|m| m.mean == Some(0.0)));
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 6);

    // a missing tool is fatal
    let config = Config {
        perf: dir.path().join("no-such-perf"),
        ..Config::default()
    };
    let err = tmastat::run(&config, &mut Vec::<u8>::new()).unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
}
