//! Concurrent request handling, isolation and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use diag_core::fakes::{MemoryInteractionLog, ReversingOracle, ScriptedOracle, StallingOracle};
use diag_core::formatter::{TITLE_CODE, TITLE_MEANING};
use diag_core::{
    EnrichPolicy, Enricher, PipelineError, PipelineOrchestrator, Provenance, ReasoningOracle,
    ReplyOutcome,
};
use futures::future::join_all;
use obd_catalog::{CatalogHandle, CodeCatalog};

fn pipeline(
    oracle: Arc<dyn ReasoningOracle>,
    timeout: Duration,
) -> (Arc<PipelineOrchestrator>, Arc<MemoryInteractionLog>) {
    let catalog = Arc::new(CatalogHandle::new(CodeCatalog::builtin().unwrap()));
    let log = Arc::new(MemoryInteractionLog::new());
    let policy = EnrichPolicy {
        timeout,
        retry_transient: true,
        max_causes: 5,
    };
    let orch = PipelineOrchestrator::new(catalog, Enricher::new(oracle, policy), log.clone());
    (Arc::new(orch), log)
}

const CODES: [&str; 6] = ["P0171", "P0420", "P0300", "U0100", "C0035", "B1000"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_stay_isolated() {
    let (orch, log) = pipeline(Arc::new(ReversingOracle), Duration::from_secs(1));

    let handles: Vec<_> = (0..60)
        .map(|i| {
            let orch = Arc::clone(&orch);
            let code = CODES[i % CODES.len()];
            tokio::spawn(async move {
                let reply = orch.handle(code, &format!("user-{i}"), Utc::now()).await;
                (code, reply)
            })
        })
        .collect();

    for handle in handles {
        let (code, reply) = handle.await.unwrap();
        assert_eq!(reply.text.section(TITLE_CODE).unwrap().lines, vec![code]);
        for other in CODES.iter().filter(|c| **c != code) {
            assert!(!reply.text.to_string().contains(other));
        }
    }

    assert!(log.wait_for(60, Duration::from_secs(5)).await);
    let records = log.records();
    for record in records {
        let code = record.code.unwrap();
        assert!(record.structured_response.contains(&code));
    }
}

#[tokio::test(start_paused = true)]
async fn test_oracle_calls_are_not_serialised() {
    let oracle = ScriptedOracle::reply(&["Vacuum leak"], &[]).with_delay(Duration::from_millis(200));
    let (orch, _log) = pipeline(Arc::new(oracle.clone()), Duration::from_secs(1));

    let started = tokio::time::Instant::now();
    let replies = join_all((0..20).map(|_| orch.handle("P0171", "tester", Utc::now()))).await;

    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(oracle.calls(), 20);
    for reply in replies {
        assert_eq!(
            reply.outcome,
            ReplyOutcome::Diagnosed {
                provenance: Provenance::AiRanked
            }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_oracles_time_out_independently() {
    let (orch, _log) = pipeline(Arc::new(StallingOracle), Duration::from_millis(1_500));

    let started = tokio::time::Instant::now();
    let replies = join_all(CODES.iter().map(|c| orch.handle(c, "tester", Utc::now()))).await;

    assert!(started.elapsed() < Duration::from_millis(2_000));
    for reply in replies {
        assert_eq!(
            reply.outcome,
            ReplyOutcome::Diagnosed {
                provenance: Provenance::GenericFallback
            }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_returns_cancelled() {
    let (orch, log) = pipeline(Arc::new(StallingOracle), Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let result = orch
        .handle_until(
            "P0171",
            "tester",
            Utc::now(),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!log.wait_for(1, Duration::from_millis(50)).await);
}

#[tokio::test]
async fn test_uncancelled_request_completes() {
    let (orch, log) = pipeline(Arc::new(ReversingOracle), Duration::from_secs(1));
    let reply = orch
        .handle_until(
            "P0442",
            "tester",
            Utc::now(),
            tokio::time::sleep(Duration::from_secs(30)),
        )
        .await
        .unwrap();
    assert_eq!(reply.text.section(TITLE_CODE).unwrap().lines, vec!["P0442"]);
    assert!(log.wait_for(1, Duration::from_secs(1)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_swap_during_traffic() {
    let (orch, _log) = pipeline(Arc::new(ReversingOracle), Duration::from_secs(1));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let mut meanings = Vec::new();
                for _ in 0..25 {
                    let reply = orch.handle("P0171", "tester", Utc::now()).await;
                    meanings.push(reply.text.section(TITLE_MEANING).unwrap().lines[0].clone());
                }
                meanings
            })
        })
        .collect();

    let dataset = br#"{
        "version": "swap-test",
        "codes": [{
            "code": "P0171",
            "description": "Fuel trim lean, bank 1",
            "symptoms": [],
            "causes": ["Vacuum leak"],
            "fixes": ["Check intake leaks"]
        }]
    }"#;
    orch.catalog()
        .swap(CodeCatalog::from_json(dataset).unwrap())
        .unwrap();

    for worker in workers {
        for meaning in worker.await.unwrap() {
            assert!(
                meaning == "System too lean (Bank 1)" || meaning == "Fuel trim lean, bank 1",
                "torn read: {meaning}"
            );
        }
    }

    let reply = orch.handle("P0171", "tester", Utc::now()).await;
    assert_eq!(
        reply.text.section(TITLE_MEANING).unwrap().lines[0],
        "Fuel trim lean, bank 1"
    );
}
