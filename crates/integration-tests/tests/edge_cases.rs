//! Edge Case Tests
//!
//! Server-side validation, transport failures, concurrent callers and
//! malformed responses.

use axum::http::{HeaderMap, HeaderValue};
use axum::routing::get;
use axum::Router;
use futures::future::join_all;
use jobsched_integration_tests::make_client;
use jobsched_sdk::{Client, Config, Constraint, Job, SdkError};
use tokio::net::TcpListener;

/// Serve `app` on an ephemeral port and return a client for it
async fn serve(app: Router) -> Client {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Client::new(Config::default().with_address(format!("http://{}", addr))).unwrap()
}

#[tokio::test]
async fn test_rejected_job_is_validation_error() {
    let (client, _agent) = make_client().await;
    let jobs = client.jobs();

    let err = jobs
        .register(&Job::new_batch("", "myjob", 5), None)
        .await
        .unwrap_err();
    assert!(err.is_validation(), "got: {:?}", err);
    assert!(err.to_string().contains("Missing job ID"));

    let err = jobs
        .register(&Job::new_service("web", "web", 500), None)
        .await
        .unwrap_err();
    assert!(err.is_validation(), "got: {:?}", err);

    let mut job = Job::new_batch("job1", "myjob", 5);
    job.constrain(Constraint::soft("memory.totalbytes", "", "1", 3));
    let err = jobs.register(&job, None).await.unwrap_err();
    assert!(err.is_validation(), "got: {:?}", err);

    // Nothing was stored
    let (resp, qm) = jobs.list(None).await.unwrap();
    assert!(resp.is_empty());
    assert_eq!(qm.last_index, 0);
}

#[tokio::test]
async fn test_unreachable_address_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = Client::new(Config::default().with_address(format!("http://{}", addr))).unwrap();

    let err = client.jobs().list(None).await.unwrap_err();
    assert!(matches!(err, SdkError::Transport(_)), "got: {:?}", err);
}

#[tokio::test]
async fn test_job_ids_are_path_encoded() {
    let (client, _agent) = make_client().await;
    let jobs = client.jobs();

    let job = Job::new_batch("web/frontend?v=2", "frontend", 10);
    let (eval_id, _) = jobs.register(&job, None).await.unwrap();

    let (stored, _) = jobs.info("web/frontend?v=2", None).await.unwrap();
    assert_eq!(stored.id, "web/frontend?v=2");

    let (evals, _) = jobs.evaluations("web/frontend?v=2", None).await.unwrap();
    assert_eq!(evals.len(), 1);
    assert_eq!(evals[0].id, eval_id);

    jobs.delete("web/frontend?v=2", None).await.unwrap();
    assert!(jobs.list(None).await.unwrap().0.is_empty());
}

#[tokio::test]
async fn test_concurrent_registers_from_cloned_clients() {
    let (client, _agent) = make_client().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let job = Job::new_batch(format!("job-{}", i), "parallel", 10);
                client.jobs().register(&job, None).await
            })
        })
        .collect();

    let mut indexes = Vec::new();
    for result in join_all(handles).await {
        let (eval_id, wm) = result.unwrap().unwrap();
        assert!(!eval_id.is_empty());
        indexes.push(wm.last_index);
    }

    // Every write got its own index
    indexes.sort_unstable();
    indexes.dedup();
    assert_eq!(indexes.len(), 16);

    let (resp, qm) = client.jobs().list(None).await.unwrap();
    assert_eq!(resp.len(), 16);
    assert_eq!(qm.last_index, *indexes.last().unwrap());
}

#[tokio::test]
async fn test_null_list_body_is_empty() {
    let client = serve(Router::new().route("/v1/jobs", get(|| async { "null" }))).await;

    let (resp, qm) = client.jobs().list(None).await.unwrap();
    assert!(resp.is_empty());
    assert_eq!(qm.last_index, 0);
}

#[tokio::test]
async fn test_malformed_index_header_is_error() {
    let app = Router::new().route(
        "/v1/jobs",
        get(|| async {
            let mut headers = HeaderMap::new();
            headers.insert("x-nomad-index", HeaderValue::from_static("latest"));
            (headers, "[]")
        }),
    );
    let client = serve(app).await;

    let err = client.jobs().list(None).await.unwrap_err();
    assert!(
        matches!(err, SdkError::InvalidHeader { .. }),
        "got: {:?}",
        err
    );
}

#[tokio::test]
async fn test_undecodable_body_is_serialization_error() {
    let app = Router::new().route("/v1/job/{job_id}", get(|| async { "<html>oops</html>" }));
    let client = serve(app).await;

    let err = client.jobs().info("job1", None).await.unwrap_err();
    assert!(matches!(err, SdkError::Serialization(_)), "got: {:?}", err);
}
