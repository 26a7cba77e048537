use clap::Parser;
use freqfold::engine::{Cli, Commands, handle_merge};
use freqfold::merge::{
    PendingRun, RunReader, collapse, merge_group, merge_pattern, merge_rounds, read_run,
    write_sorted_run,
};
use freqfold::{
    Count, MergeError, MergeOpts, MergeStats, Opts, RunAccumulator, RunFormat, reduce,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_run(dir: &Path, name: &str, records: &[(&str, Count)]) -> PathBuf {
    let path = dir.join(name);
    write_sorted_run(&path, RunFormat::for_path(&path), records.iter().copied()).unwrap();
    path
}

fn owned(records: &[(&str, Count)]) -> Vec<(String, Count)> {
    records.iter().map(|(k, c)| (k.to_string(), *c)).collect()
}

fn opts(fanout: usize, threshold: Count) -> MergeOpts {
    MergeOpts {
        fanout,
        threshold,
        ..MergeOpts::default()
    }
}

fn merge_error(err: &anyhow::Error) -> &MergeError {
    err.downcast_ref::<MergeError>()
        .unwrap_or_else(|| panic!("not a MergeError: {err:#}"))
}

fn leftover_temp_dirs(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".freqfold-merge-"))
        .count()
}

// --- merge_group ---

#[test]
fn test_merge_group_sums_across_runs() {
    let dir = TempDir::new().unwrap();
    let a = write_run(dir.path(), "a.txt", &[("apple", 1), ("cherry", 2)]);
    let b = write_run(dir.path(), "b.txt", &[("apple", 3), ("banana", 1)]);
    let out = dir.path().join("out.txt");
    let merged = merge_group(&[a, b], &out, RunFormat::Text).unwrap();
    assert_eq!(merged.records, 3);
    assert_eq!(merged.open_readers, 2);
    assert_eq!(
        read_run(&out).unwrap(),
        owned(&[("apple", 4), ("banana", 1), ("cherry", 2)])
    );
}

#[test]
fn test_merge_group_keeps_zero_totals() {
    let dir = TempDir::new().unwrap();
    let a = write_run(dir.path(), "a.txt", &[("k", 0)]);
    let b = write_run(dir.path(), "b.txt", &[("k", 0), ("z", 1)]);
    let out = dir.path().join("out.txt");
    merge_group(&[a, b], &out, RunFormat::Text).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("k", 0), ("z", 1)]));
}

#[test]
fn test_merge_group_key_prefix_ordering() {
    let dir = TempDir::new().unwrap();
    let a = write_run(dir.path(), "a.txt", &[("ab", 1), ("abc", 1)]);
    let b = write_run(dir.path(), "b.txt", &[("ab", 2), ("abd", 1)]);
    let out = dir.path().join("out.txt");
    merge_group(&[a, b], &out, RunFormat::Text).unwrap();
    assert_eq!(
        read_run(&out).unwrap(),
        owned(&[("ab", 3), ("abc", 1), ("abd", 1)])
    );
}

#[test]
fn test_merge_group_control_byte_after_prefix() {
    let dir = TempDir::new().unwrap();
    let a = write_run(dir.path(), "a.txt", &[("a", 1), ("a\x01", 1)]);
    let b = write_run(dir.path(), "b.txt", &[("a", 2), ("a\x01", 4)]);
    let out = dir.path().join("out.txt");
    merge_group(&[a, b], &out, RunFormat::Text).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 3), ("a\x01", 5)]));
}

// --- run readers ---

#[test]
fn test_open_readers_counted_per_thread() {
    let dir = TempDir::new().unwrap();
    let a = write_run(dir.path(), "a.txt", &[("a", 1)]);
    let base = RunReader::open_on_thread();
    let first = RunReader::open(&a).unwrap();
    let second = RunReader::open(&a).unwrap();
    assert_eq!(RunReader::open_on_thread(), base + 2);
    drop(first);
    assert_eq!(RunReader::open_on_thread(), base + 1);
    drop(second);
    assert_eq!(RunReader::open_on_thread(), base);
    assert!(RunReader::open(&dir.path().join("missing.txt")).is_err());
    assert_eq!(RunReader::open_on_thread(), base);
}

// --- merge rounds ---

#[test]
fn test_rounds_bounded_by_fanout() {
    let dir = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let runs: Vec<PendingRun> = (0..7)
        .map(|i| {
            let name = format!("r{i}.txt");
            PendingRun::borrowed(write_run(dir.path(), &name, &[("x", 1)]))
        })
        .collect();
    let mut stats = MergeStats::default();
    let merged = merge_rounds(runs, 3, RunFormat::Text, tmp.path(), &mut stats).unwrap();
    assert_eq!(stats.rounds, 2);
    // Readers actually held open at once: the first round's groups of 3.
    assert_eq!(stats.peak_open_runs, 3);
    assert_eq!(RunReader::open_on_thread(), 0);
    assert_eq!(read_run(&merged.path).unwrap(), owned(&[("x", 7)]));
    assert!(merged.owned);
    // Borrowed inputs are left alone.
    assert!(dir.path().join("r0.txt").exists());
}

#[test]
fn test_rounds_reject_small_fanout() {
    let tmp = TempDir::new().unwrap();
    let runs = vec![PendingRun::borrowed(PathBuf::from("missing.txt"))];
    let err = merge_rounds(runs, 1, RunFormat::Text, tmp.path(), &mut MergeStats::default())
        .unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::InvalidFanout(1)));
}

#[test]
fn test_rounds_single_run_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_run(dir.path(), "only.txt", &[("a", 1)]);
    let mut stats = MergeStats::default();
    let merged = merge_rounds(
        vec![PendingRun::borrowed(path.clone())],
        4,
        RunFormat::Text,
        dir.path(),
        &mut stats,
    )
    .unwrap();
    assert_eq!(merged.path, path);
    assert_eq!(stats.rounds, 0);
}

// --- reduce ---

#[test]
fn test_reduce_totals_match_sum_of_inputs() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<Vec<(&str, Count)>> = vec![
        vec![("a", 1), ("c", 4), ("e", 2)],
        vec![("a", 2), ("b", 1)],
        vec![("b", 5), ("c", 1), ("d", 9)],
        vec![("e", 1)],
        vec![("a", 1), ("d", 1), ("f", 3)],
    ];
    let mut expected: BTreeMap<String, Count> = BTreeMap::new();
    let mut files = Vec::new();
    for (i, run) in inputs.iter().enumerate() {
        for (k, c) in run {
            *expected.entry(k.to_string()).or_insert(0) += c;
        }
        files.push(write_run(dir.path(), &format!("in{i}.txt"), run));
    }
    let out = dir.path().join("merged.txt");
    let outcome = reduce(files, Some(&out), &opts(2, 0)).unwrap();
    assert_eq!(outcome.path, out);
    assert_eq!(
        read_run(&out).unwrap(),
        expected.into_iter().collect::<Vec<_>>()
    );
    assert_eq!(outcome.stats.keys_written, 6);
    assert_eq!(outcome.stats.keys_dropped, 0);
    assert!(outcome.stats.peak_open_runs <= 2);
}

#[test]
fn test_threshold_is_strictly_greater() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 2)]),
        write_run(dir.path(), "2.txt", &[("a", 2)]),
        write_run(dir.path(), "3.txt", &[("b", 5)]),
    ];
    let out = dir.path().join("out.txt");
    let outcome = reduce(files, Some(&out), &opts(8, 4)).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("b", 5)]));
    assert_eq!(outcome.stats.keys_written, 1);
    assert_eq!(outcome.stats.keys_dropped, 1);
}

#[test]
fn test_default_threshold_drops_zero_totals() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 0), ("b", 1)]),
        write_run(dir.path(), "2.txt", &[("a", 0)]),
    ];
    let out = dir.path().join("out.txt");
    reduce(files, Some(&out), &MergeOpts::default()).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("b", 1)]));
}

#[test]
fn test_single_input_only_collapsed() {
    let dir = TempDir::new().unwrap();
    let input = write_run(dir.path(), "in.txt", &[("a", 1), ("a", 2), ("b", 1)]);
    let out = dir.path().join("out.txt");
    let outcome = reduce(vec![input.clone()], Some(&out), &opts(4, 0)).unwrap();
    assert_eq!(outcome.stats.rounds, 0);
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 3), ("b", 1)]));
    assert!(input.exists());
}

#[test]
fn test_collapse_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 3), ("b", 1), ("c", 7)]),
        write_run(dir.path(), "2.txt", &[("a", 1), ("c", 1)]),
    ];
    let once = dir.path().join("once.txt");
    reduce(files, Some(&once), &opts(2, 1)).unwrap();

    let twice = dir.path().join("twice.txt");
    let stats = collapse(&once, &twice, 1).unwrap();
    assert_eq!(stats.keys_dropped, 0);
    assert_eq!(
        std::fs::read_to_string(&once).unwrap(),
        std::fs::read_to_string(&twice).unwrap()
    );
}

#[test]
fn test_collapse_in_place() {
    let dir = TempDir::new().unwrap();
    let path = write_run(dir.path(), "run.txt", &[("a", 1), ("a", 1), ("b", 1)]);
    collapse(&path, &path, 1).unwrap();
    assert_eq!(read_run(&path).unwrap(), owned(&[("a", 2)]));
    assert!(!dir.path().join("run.txt.tmp").exists());
}

#[test]
fn test_reduce_no_inputs() {
    let err = reduce(Vec::new(), None, &MergeOpts::default()).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::NoInputs));
}

#[test]
fn test_reduce_invalid_fanout() {
    let dir = TempDir::new().unwrap();
    let files = vec![write_run(dir.path(), "1.txt", &[("a", 1)])];
    let err = reduce(files, None, &opts(0, 0)).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::InvalidFanout(0)));
}

#[test]
fn test_reduce_rejects_unsorted_run() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.txt");
    std::fs::write(&bad, "b\t1\na\t1\n").unwrap();
    let good = write_run(dir.path(), "good.txt", &[("c", 1)]);
    let out = dir.path().join("out.txt");
    let err = reduce(vec![bad, good], Some(&out), &opts(2, 0)).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::Unsorted { .. }));
    assert!(!out.exists());
}

#[test]
fn test_reduce_rejects_malformed_line() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.txt");
    std::fs::write(&bad, "a\t1\nno tab here\n").unwrap();
    let err = reduce(vec![bad], Some(&dir.path().join("out.txt")), &opts(2, 0)).unwrap_err();
    match merge_error(&err) {
        MergeError::MalformedLine { line, .. } => assert_eq!(*line, 2),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_reduce_count_overflow() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", Count::MAX)]),
        write_run(dir.path(), "2.txt", &[("a", 1)]),
    ];
    let err = reduce(files, Some(&dir.path().join("out.txt")), &opts(2, 0)).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::CountOverflow { .. }));
}

#[test]
fn test_tabs_inside_key_preserved() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("x\ty", 1)]),
        write_run(dir.path(), "2.txt", &[("x\ty", 2)]),
    ];
    let out = dir.path().join("out.txt");
    reduce(files, Some(&out), &opts(2, 0)).unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "x\ty\t3\n");
}

#[test]
fn test_reduce_tab_key_after_its_prefix() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "a.txt", &[("x", 9)]),
        write_run(dir.path(), "b.txt", &[("x\t1", 3)]),
    ];
    let out = dir.path().join("out.txt");
    reduce(files, Some(&out), &opts(2, 0)).unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "x\t9\nx\t1\t3\n");
    assert_eq!(read_run(&out).unwrap(), owned(&[("x", 9), ("x\t1", 3)]));
}

#[test]
fn test_reduce_control_byte_keys() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 1), ("a\x01", 1)]),
        write_run(dir.path(), "2.txt", &[("a", 1), ("a\x01", 1), ("b", 1)]),
        write_run(dir.path(), "3.txt", &[("a\x01", 2)]),
    ];
    let out = dir.path().join("out.txt");
    let outcome = reduce(files, Some(&out), &opts(2, 0)).unwrap();
    assert_eq!(outcome.stats.rounds, 2);
    assert_eq!(
        read_run(&out).unwrap(),
        owned(&[("a", 2), ("a\x01", 4), ("b", 1)])
    );
}

// --- ownership ---

#[test]
fn test_inputs_kept_by_default() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 1)]),
        write_run(dir.path(), "2.txt", &[("b", 1)]),
        write_run(dir.path(), "3.txt", &[("c", 1)]),
    ];
    reduce(files.clone(), Some(&dir.path().join("out.txt")), &opts(2, 0)).unwrap();
    assert!(files.iter().all(|f| f.exists()));
    assert_eq!(leftover_temp_dirs(dir.path()), 0);
}

#[test]
fn test_delete_inputs_consumes_runs() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 1)]),
        write_run(dir.path(), "2.txt", &[("b", 1)]),
        write_run(dir.path(), "3.txt", &[("c", 1)]),
    ];
    let mut o = opts(2, 0);
    o.delete_inputs = true;
    let out = dir.path().join("out.txt");
    reduce(files.clone(), Some(&out), &o).unwrap();
    assert!(files.iter().all(|f| !f.exists()));
    assert!(out.exists());
    assert_eq!(leftover_temp_dirs(dir.path()), 0);
}

#[test]
fn test_tmp_dir_option_used_and_cleaned() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt", &[("a", 1)]),
        write_run(dir.path(), "2.txt", &[("a", 1)]),
    ];
    let mut o = opts(2, 0);
    o.tmp_dir = Some(scratch.path().to_path_buf());
    let out = dir.path().join("out.txt");
    reduce(files, Some(&out), &o).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 2)]));
    assert_eq!(leftover_temp_dirs(scratch.path()), 0);
}

#[test]
fn test_default_output_path() {
    let dir = TempDir::new().unwrap();
    let files = vec![write_run(dir.path(), "1.txt", &[("a", 2)])];
    let mut o = opts(2, 0);
    o.tmp_dir = Some(dir.path().to_path_buf());
    let outcome = reduce(files, None, &o).unwrap();
    assert_eq!(outcome.path.parent(), Some(dir.path()));
    let name = outcome.path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("freqfold-merged-"), "{name}");
    assert_eq!(read_run(&outcome.path).unwrap(), owned(&[("a", 2)]));
}

// --- gzip runs ---

#[test]
fn test_gzip_runs_round_through_reduce() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_run(dir.path(), "1.txt.gz", &[("a", 1), ("b", 2)]),
        write_run(dir.path(), "2.txt", &[("a", 4)]),
        write_run(dir.path(), "3.txt.gz", &[("c", 1)]),
    ];
    let mut o = opts(2, 0);
    o.format = RunFormat::Gzip;
    let out = dir.path().join("out.txt.gz");
    reduce(files, Some(&out), &o).unwrap();

    let raw = std::fs::read(&out).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_eq!(
        read_run(&out).unwrap(),
        owned(&[("a", 5), ("b", 2), ("c", 1)])
    );
}

// --- glob ---

#[test]
fn test_merge_pattern_expands_glob() {
    let dir = TempDir::new().unwrap();
    write_run(dir.path(), "part-1.txt", &[("a", 1)]);
    write_run(dir.path(), "part-2.txt", &[("a", 2)]);
    write_run(dir.path(), "other.txt", &[("z", 9)]);
    let pattern = format!("{}/part-*.txt", dir.path().display());
    let out = dir.path().join("out.txt");
    merge_pattern(&pattern, Some(&out), &opts(4, 0)).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 3)]));
}

#[test]
fn test_merge_pattern_no_match() {
    let dir = TempDir::new().unwrap();
    let pattern = format!("{}/nothing-*.txt", dir.path().display());
    let err = merge_pattern(&pattern, None, &MergeOpts::default()).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::NoInputs));
}

#[test]
fn test_merge_command_mixes_patterns_and_paths() {
    let dir = TempDir::new().unwrap();
    write_run(dir.path(), "part-1.txt", &[("a", 1)]);
    write_run(dir.path(), "part-2.txt", &[("a", 2), ("b", 1)]);
    let extra = write_run(dir.path(), "extra.txt", &[("b", 4)]);
    let out = dir.path().join("out.txt");
    let pattern = format!("{}/part-?.txt", dir.path().display());
    let cli = Cli::try_parse_from([
        "freqfold".to_string(),
        "merge".to_string(),
        pattern,
        extra.display().to_string(),
        "-o".to_string(),
        out.display().to_string(),
        "-k".to_string(),
    ])
    .unwrap();
    let Commands::Merge(args) = cli.command else {
        panic!("expected merge command");
    };
    handle_merge(&args, Opts::default()).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 3), ("b", 5)]));
    assert!(extra.exists());
}

// --- RunAccumulator ---

#[test]
fn test_accumulator_keeps_pending_bounded() {
    let dir = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let mut acc = RunAccumulator::new(opts(3, 0), work.path()).unwrap();
    for i in 0..10 {
        let run = write_run(dir.path(), &format!("{i}.txt"), &[("k", 1), ("v", i)]);
        acc.add(run).unwrap();
        assert!(acc.pending() < 3);
    }
    assert_eq!(acc.added(), 10);
    assert!(acc.stats().rounds > 0);

    let out = dir.path().join("out.txt");
    let outcome = acc.finish(Some(&out)).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("k", 10), ("v", 45)]));
    assert!(outcome.stats.peak_open_runs <= 3);
    assert!(dir.path().join("0.txt").exists());
    assert_eq!(leftover_temp_dirs(work.path()), 0);
}

#[test]
fn test_accumulator_owned_inputs_deleted() {
    let dir = TempDir::new().unwrap();
    let mut o = opts(2, 0);
    o.delete_inputs = true;
    let mut acc = RunAccumulator::new(o, dir.path()).unwrap();
    let a = write_run(dir.path(), "a.txt", &[("a", 1)]);
    let b = write_run(dir.path(), "b.txt", &[("b", 1)]);
    acc.add(a.clone()).unwrap();
    acc.add(b.clone()).unwrap();
    assert!(!a.exists() && !b.exists());
    let out = dir.path().join("out.txt");
    acc.finish(Some(&out)).unwrap();
    assert_eq!(read_run(&out).unwrap(), owned(&[("a", 1), ("b", 1)]));
}

#[test]
fn test_accumulator_empty_finish() {
    let work = TempDir::new().unwrap();
    let acc = RunAccumulator::new(MergeOpts::default(), work.path()).unwrap();
    let err = acc.finish(None).unwrap_err();
    assert!(matches!(merge_error(&err), MergeError::NoInputs));
}
