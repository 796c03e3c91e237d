use headline_tournament::gateway::{ModelRoute, ProviderId};
use headline_tournament::tournament::MatchOutcome;
use headline_tournament::{
    ComparisonEvent, ComparisonTrace, HeadlineId, JsonlTraceSink, PipelineObserver, TraceSink,
};
use tempfile::tempdir;
use uuid::Uuid;

#[derive(Debug, serde::Deserialize)]
struct TraceRow {
    round: u32,
    seed_a: usize,
    seed_b: usize,
    judge_provider: String,
    judge_model: String,
    outcome: String,
    error: Option<String>,
}

fn event(round: u32, outcome: MatchOutcome, error: Option<&str>) -> ComparisonEvent {
    ComparisonEvent {
        run_id: Some(Uuid::new_v4()),
        round,
        headline_a: HeadlineId::new(),
        headline_b: HeadlineId::new(),
        seed_a: 0,
        seed_b: 1,
        judge: ModelRoute::new(ProviderId::OpenRouter, "google/gemini-2.5-flash-lite"),
        outcome,
        attempts: 1,
        error: error.map(str::to_string),
    }
}

#[test]
fn jsonl_trace_sink_writes_events_and_flushes_on_join() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    sink.record(ComparisonTrace::from(event(1, MatchOutcome::WinA, None)))
        .unwrap();
    sink.record(ComparisonTrace::from(event(
        2,
        MatchOutcome::Failure,
        Some("parse_error"),
    )))
    .unwrap();

    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<TraceRow> = raw
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].round, 1);
    assert_eq!((rows[0].seed_a, rows[0].seed_b), (0, 1));
    assert_eq!(rows[0].judge_provider, "openrouter");
    assert_eq!(rows[0].judge_model, "google/gemini-2.5-flash-lite");
    assert_eq!(rows[0].outcome, "win_a");
    assert_eq!(rows[1].outcome, "failure");
    assert_eq!(rows[1].error.as_deref(), Some("parse_error"));
}

#[tokio::test]
async fn jsonl_trace_sink_records_comparisons_as_an_observer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("observer.jsonl");

    let (sink, worker) = JsonlTraceSink::new(&path).unwrap();
    sink.on_comparison(event(3, MatchOutcome::Tie, None))
        .await
        .unwrap();

    drop(sink);
    worker.join().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let row: TraceRow = serde_json::from_str(raw.trim()).unwrap();
    assert_eq!(row.round, 3);
    assert_eq!(row.outcome, "tie");
}
