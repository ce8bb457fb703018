use std::{
    io::{Cursor, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread,
    time::Duration,
};

use traffic_aggregator::{
    metrics::Metrics,
    pipeline::{Pipeline, PipelineOptions},
    processing::{IngestionSettings, MalformedPolicy},
    record::Record,
    report::{RankedEntry, RankedReport},
    sinks::{console::ConsoleReporter, Reporter},
    source::{SourceError, SourceSpec},
};

#[derive(Default)]
struct RecordingReporter {
    produced: Mutex<Vec<Record>>,
    consumed: Mutex<Vec<Record>>,
    rejected: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    reports: Mutex<Vec<RankedReport>>,
}

impl Reporter for RecordingReporter {
    fn record_produced(&self, _source: &str, record: &Record) {
        self.produced.lock().unwrap().push(record.clone());
    }

    fn record_consumed(&self, record: &Record) {
        self.consumed.lock().unwrap().push(record.clone());
    }

    fn record_rejected(&self, source: &str, error: &SourceError) {
        self.rejected
            .lock()
            .unwrap()
            .push(format!("{}: {}", source, error));
    }

    fn source_failed(&self, source: &str, error: &SourceError) {
        self.failures
            .lock()
            .unwrap()
            .push(format!("{}: {}", source, error));
    }

    fn final_report(&self, report: &RankedReport) -> std::io::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn options() -> PipelineOptions {
    PipelineOptions::default()
}

fn pipeline(options: PipelineOptions, reporter: &Arc<RecordingReporter>) -> Pipeline {
    Pipeline::new(options, Metrics::new().unwrap()).with_reporter(reporter.clone())
}

fn entry(light: &str, count: u64) -> RankedEntry {
    RankedEntry {
        light: light.into(),
        count,
    }
}

/// Deterministic pseudo random input so stress runs are reproducible.
fn generated_input(n: u64, lights: u64) -> (String, u64) {
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    let mut input = String::new();
    let mut sum = 0;

    for i in 0..n {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let count = state % 50;
        sum += count;
        input.push_str(&format!("t{},L{},{}\n", i, state % lights, count));
    }

    (input, sum)
}

#[test]
fn no_records_are_lost_or_duplicated_under_stress() {
    let (input, expected_sum) = generated_input(5_000, 13);

    for (aggregators, capacity) in [(1, None), (4, None), (1, Some(1)), (3, Some(8))] {
        let reporter = Arc::new(RecordingReporter::default());
        let summary = pipeline(
            PipelineOptions {
                aggregators,
                capacity,
                ..options()
            },
            &reporter,
        )
        .run(vec![SourceSpec::reader("generated", Cursor::new(input.clone()))])
        .unwrap();

        assert_eq!(summary.produced(), 5_000);
        assert_eq!(summary.consumed, 5_000);
        assert_eq!(summary.totals.total(), expected_sum);
        assert_eq!(reporter.consumed.lock().unwrap().len(), 5_000);
    }
}

#[test]
fn counts_at_the_u64_limit_saturate_instead_of_failing_the_run() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![SourceSpec::reader(
            "mem",
            Cursor::new("t1,A,18446744073709551615\nt2,A,1\nt3,B,2\n"),
        )])
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.consumed, 3);
    assert_eq!(
        summary.report.entries,
        vec![entry("A", u64::MAX), entry("B", 2)]
    );
    assert_eq!(summary.report.total_vehicles, u64::MAX);
}

#[test]
fn multiple_sources_are_all_aggregated() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![
            SourceSpec::reader("north", Cursor::new("t1,A,5\nt2,B,1\n")),
            SourceSpec::reader("south", Cursor::new("t1,A,2\nt3,C,9\n")),
            SourceSpec::reader("empty", Cursor::new("")),
        ])
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.totals.get("A"), Some(7));
    assert_eq!(summary.totals.get("B"), Some(1));
    assert_eq!(summary.totals.get("C"), Some(9));
    assert_eq!(summary.ingestion.len(), 3);
}

#[test]
fn single_producer_records_are_consumed_in_order() {
    let (input, _) = generated_input(500, 5);
    let reporter = Arc::new(RecordingReporter::default());

    pipeline(
        PipelineOptions {
            capacity: Some(3),
            ..options()
        },
        &reporter,
    )
    .run(vec![SourceSpec::reader("generated", Cursor::new(input))])
    .unwrap();

    let produced = reporter.produced.lock().unwrap().clone();
    let consumed = reporter.consumed.lock().unwrap().clone();
    assert_eq!(produced, consumed);
}

#[test]
fn result_does_not_depend_on_producer_pacing() {
    let input = "t1,A,4\nt2,B,7\nt3,A,1\nt4,C,7\nt5,B,2\n";

    let run = |delay: Duration| {
        let reporter = Arc::new(RecordingReporter::default());
        pipeline(
            PipelineOptions {
                ingestion: IngestionSettings {
                    delay,
                    ..Default::default()
                },
                ..options()
            },
            &reporter,
        )
        .run(vec![SourceSpec::reader("mem", Cursor::new(input))])
        .unwrap()
    };

    let fast = run(Duration::ZERO);
    let paced = run(Duration::from_millis(5));

    assert_eq!(fast.totals, paced.totals);
    assert_eq!(fast.report, paced.report);
}

#[test]
fn empty_input_terminates_with_empty_report() {
    let reporter = Arc::new(RecordingReporter::default());
    let (tx, rx) = mpsc::channel();

    let worker_reporter = reporter.clone();
    thread::spawn(move || {
        let summary = pipeline(options(), &worker_reporter)
            .run(vec![SourceSpec::reader("empty", Cursor::new(""))])
            .unwrap();
        tx.send(summary).unwrap();
    });

    let summary = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("pipeline finishes on empty input");

    assert!(summary.is_success());
    assert!(summary.report.is_empty());
    assert!(summary.totals.is_empty());
    assert_eq!(*reporter.reports.lock().unwrap(), vec![RankedReport::default()]);
}

#[test]
fn ranking_reports_top_n_descending() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(
        PipelineOptions {
            top_n: 2,
            ..options()
        },
        &reporter,
    )
    .run(vec![SourceSpec::reader(
        "mem",
        Cursor::new("t1,A,10\nt2,B,30\nt3,C,20\n"),
    )])
    .unwrap();

    assert_eq!(summary.report.entries, vec![entry("B", 30), entry("C", 20)]);
    assert_eq!(reporter.reports.lock().unwrap()[0], summary.report);
}

#[test]
fn unreadable_source_reports_error_without_hanging() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![SourceSpec::file("/definitely/not/here/traffic_data.txt")])
        .unwrap();

    assert!(!summary.is_success());
    assert!(summary.totals.is_empty());
    assert!(summary.report.is_empty());
    assert!(matches!(
        summary.failures().next().unwrap().error,
        Some(SourceError::Unavailable { .. })
    ));
    assert_eq!(reporter.failures.lock().unwrap().len(), 1);
}

#[test]
fn one_unreadable_source_does_not_stop_the_others() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![
            SourceSpec::file("/definitely/not/here/traffic_data.txt"),
            SourceSpec::reader("mem", Cursor::new("t1,A,5\n")),
        ])
        .unwrap();

    assert_eq!(summary.failures().count(), 1);
    assert_eq!(summary.totals.get("A"), Some(5));
}

#[test]
fn malformed_lines_are_skipped_by_default() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![SourceSpec::reader(
            "mem",
            Cursor::new("t1,A,5\nbadline\nt2,A,3"),
        )])
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.totals.get("A"), Some(8));
    assert_eq!(summary.skipped(), 1);
    assert_eq!(reporter.rejected.lock().unwrap().len(), 1);
}

#[test]
fn malformed_lines_end_the_stream_with_abort_policy() {
    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(
        PipelineOptions {
            ingestion: IngestionSettings {
                policy: MalformedPolicy::Abort,
                ..Default::default()
            },
            ..options()
        },
        &reporter,
    )
    .run(vec![SourceSpec::reader(
        "mem",
        Cursor::new("t1,A,5\nbadline\nt2,A,3"),
    )])
    .unwrap();

    assert_eq!(summary.totals.get("A"), Some(5));
    assert!(matches!(
        summary.failures().next().unwrap().error,
        Some(SourceError::Malformed { line_number: 2, .. })
    ));

    let failures = reporter.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("line 2"));
}

#[test]
fn cancellation_stops_ingestion_and_reports_partial_results() {
    let reporter = Arc::new(RecordingReporter::default());
    let cancel = Arc::new(AtomicBool::new(false));
    let (input, _) = generated_input(10_000, 3);

    let pipeline = pipeline(
        PipelineOptions {
            ingestion: IngestionSettings {
                delay: Duration::from_millis(1),
                ..Default::default()
            },
            ..options()
        },
        &reporter,
    )
    .with_cancellation(cancel.clone());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.store(true, Ordering::Relaxed);
    });

    let summary = pipeline
        .run(vec![SourceSpec::reader("generated", Cursor::new(input))])
        .unwrap();
    canceller.join().unwrap();

    assert!(summary.cancelled());
    assert!(summary.produced() < 10_000);
    assert_eq!(summary.produced(), summary.consumed);
    assert_eq!(reporter.reports.lock().unwrap().len(), 1);
}

#[test]
fn reads_records_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "2024-01-01T08:00,7,12").unwrap();
    writeln!(file, "2024-01-01T08:01,3,4").unwrap();
    writeln!(file, "2024-01-01T08:02,7,1").unwrap();
    file.flush().unwrap();

    let reporter = Arc::new(RecordingReporter::default());
    let summary = pipeline(options(), &reporter)
        .run(vec![SourceSpec::file(file.path())])
        .unwrap();

    assert_eq!(summary.report.entries, vec![entry("7", 13), entry("3", 4)]);
}

#[test]
fn console_output_lists_records_and_ranking() {
    let console = Arc::new(ConsoleReporter::new(Vec::<u8>::new(), true));

    Pipeline::new(options(), Metrics::new().unwrap())
        .with_reporter(console.clone())
        .run(vec![SourceSpec::reader("mem", Cursor::new("t1,A,5\n"))])
        .unwrap();

    let console = Arc::try_unwrap(console).ok().expect("pipeline released the reporter");
    let out = String::from_utf8(console.into_inner()).unwrap();

    assert!(out.contains("[producer] read (t1, A, 5 cars)\n"));
    assert!(out.contains("[consumer] processed t1 - A (5 cars)\n"));
    assert!(out.contains("--- Top Congested Traffic Lights ---\nA -> 5 cars\n"));
}
