//! Worker pool integration tests: background execution, fan-out, shutdown.

use serde_json::json;
use sqlstash::{
    JobQueue, JobRunner, MemoryCatalog, MemoryEngine, MemoryStore, Query, QueryService,
    QueryStatus, Row,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

// Test Helpers
fn int_schema() -> Vec<(String, String)> {
    vec![("n".to_string(), "int".to_string())]
}

fn int_rows(count: usize) -> Vec<Row> {
    (0..count).map(|i| vec![json!(i)]).collect()
}

fn create_test_service(engine: MemoryEngine) -> Arc<QueryService> {
    Arc::new(QueryService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryCatalog::with_domains(["int"])),
        Arc::new(engine),
    ))
}

fn wait_terminal(service: &QueryService, id: &str) -> Query {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let query = service.find(id).unwrap().unwrap();
        if query.status().is_terminal() {
            return query;
        }
        assert!(Instant::now() < deadline, "query {id} never reached a terminal status");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_submitted_query_results_are_readable() {
    let mut engine = MemoryEngine::new();
    engine.register_rows("SELECT n FROM t", int_schema(), int_rows(4));
    let runner = JobRunner::start(create_test_service(engine), 2).unwrap();
    let service = runner.service();

    let query = runner.submit("SELECT n FROM t").unwrap();
    let id = query.id().unwrap().to_string();

    let done = wait_terminal(&service, &id);
    assert_eq!(done.status(), QueryStatus::Finished);
    assert_eq!(service.rows(&id, 0, 100).unwrap(), int_rows(4));

    runner.shutdown().unwrap();
}

#[test]
fn test_many_submissions_fan_out_across_workers() {
    let mut engine = MemoryEngine::new();
    for i in 0..16 {
        engine.register_rows(format!("SELECT {i}"), int_schema(), int_rows(i + 1));
    }
    let runner = JobRunner::start(create_test_service(engine), 4).unwrap();
    let service = runner.service();

    let ids: Vec<String> = (0..16)
        .map(|i| {
            let query = runner.submit(format!("SELECT {i}")).unwrap();
            query.id().unwrap().to_string()
        })
        .collect();

    for (i, id) in ids.iter().enumerate() {
        let done = wait_terminal(&service, id);
        assert_eq!(done.status(), QueryStatus::Finished);
        assert_eq!(done.count(), (i + 1) as u64);
    }

    runner.shutdown().unwrap();
}

#[test]
fn test_mixed_outcomes_land_in_their_own_status() {
    let mut engine = MemoryEngine::new();
    engine.register_rows("SELECT good", int_schema(), int_rows(2));
    engine.register_failure("SELECT bad", "permission denied");
    let runner = JobRunner::start(create_test_service(engine), 2).unwrap();
    let service = runner.service();

    let good = runner.submit("SELECT good").unwrap();
    let bad = runner.submit("SELECT bad").unwrap();
    let good_id = good.id().unwrap().to_string();
    let bad_id = bad.id().unwrap().to_string();

    assert_eq!(wait_terminal(&service, &good_id).status(), QueryStatus::Finished);
    let failed = wait_terminal(&service, &bad_id);
    assert_eq!(failed.status(), QueryStatus::Error);
    assert_eq!(failed.message(), "permission denied");

    runner.shutdown().unwrap();
}

#[test]
fn test_shutdown_completes_backlog() {
    let mut engine = MemoryEngine::new();
    for i in 0..32 {
        engine.register_rows(format!("SELECT {i}"), int_schema(), int_rows(1));
    }
    // One worker, so most of the backlog is still queued at shutdown
    let runner = JobRunner::start(create_test_service(engine), 1).unwrap();
    let service = runner.service();

    let ids: Vec<String> = (0..32)
        .map(|i| {
            let query = runner.submit(format!("SELECT {i}")).unwrap();
            query.id().unwrap().to_string()
        })
        .collect();
    runner.shutdown().unwrap();

    // No polling: shutdown returns only after the queue is drained
    for id in ids {
        let query = service.find(&id).unwrap().unwrap();
        assert_eq!(query.status(), QueryStatus::Finished);
    }
}

#[test]
fn test_enqueue_through_the_transport_seam() {
    let mut engine = MemoryEngine::new();
    engine.register_rows("SELECT n FROM t", int_schema(), int_rows(3));
    let runner = JobRunner::start(create_test_service(engine), 1).unwrap();
    let service = runner.service();

    let mut query = Query::new("SELECT n FROM t");
    service.create(&mut query).unwrap();
    let id = query.id().unwrap().to_string();

    let queue: &dyn JobQueue = &runner;
    queue.enqueue(&id).unwrap();

    let done = wait_terminal(&service, &id);
    assert_eq!(done.status(), QueryStatus::Finished);
    assert_eq!(done.count(), 3);

    runner.shutdown().unwrap();
}
