use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use tokio::task::JoinHandle;

use eth_fee_analytics::analytics::{DayWindow, PipelineSettings, TransactionSource};
use eth_fee_analytics::api::{app_router, AppState};
use eth_fee_analytics::error::PipelineError;
use eth_fee_analytics::models::{HourlyGasResponse, TransactionRecord};
use eth_fee_analytics::storage::{self, DbPool, SqliteSource};

const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";

#[tokio::test]
async fn health_endpoint_works() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let res = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body.get("status").and_then(|s| s.as_str()), Some("ok"));
    handle.abort();
}

#[tokio::test]
async fn gas_hourly_returns_sorted_buckets() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let res = client
        .get(format!("{}/api/v1/gashourly/2021-Jan-01", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: HourlyGasResponse = res.json().await.unwrap();

    let starts: Vec<i64> = body.result.iter().map(|a| a.t).collect();
    assert_eq!(
        starts,
        vec![
            at(13, 0, 0).timestamp(),
            at(14, 0, 0).timestamp(),
            at(16, 0, 0).timestamp()
        ]
    );
    assert!((body.result[0].v - 0.005).abs() < 1e-12);
    assert!((body.result[1].v - 0.002).abs() < 1e-12);
    assert!((body.result[2].v - 0.0105).abs() < 1e-12);
    handle.abort();
}

#[tokio::test]
async fn gas_hourly_wire_format() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let body: serde_json::Value = client
        .get(format!("{}/api/v1/gashourly/2021-Jan-01", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let first = &body["result"][0];
    assert!(first["t"].is_i64());
    assert!(first["v"].is_f64());
    handle.abort();
}

#[tokio::test]
async fn bad_day_is_rejected() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let res = client
        .get(format!("{}/api/v1/gashourly/2021-01-01", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body.get("code").and_then(|c| c.as_u64()), Some(400));
    handle.abort();
}

#[tokio::test]
async fn day_without_transfers_is_not_found() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let res = client
        .get(format!("{}/api/v1/gashourly/2021-Mar-15", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    handle.abort();
}

#[tokio::test]
async fn concurrent_requests_agree() {
    let (base_url, handle) = spawn_app_with_data().await;
    let client = Client::new();
    let url = format!("{}/api/v1/gashourly/2021-Jan-01", base_url);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let url = url.clone();
        tasks.push(tokio::spawn(async move {
            client
                .get(url)
                .send()
                .await
                .unwrap()
                .json::<HourlyGasResponse>()
                .await
                .unwrap()
        }));
    }

    let mut bodies = Vec::new();
    for task in tasks {
        bodies.push(task.await.unwrap());
    }
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
    handle.abort();
}

#[tokio::test]
async fn stalled_query_times_out_and_frees_its_connection() {
    let pool = seeded_pool().await;
    let source = StallOnce {
        inner: SqliteSource::new(pool.clone()),
        pool: pool.clone(),
        stalled: AtomicBool::new(false),
    };
    let (base_url, handle) = spawn_app(Arc::new(source), Duration::from_millis(200)).await;
    let client = Client::new();
    let url = format!("{}/api/v1/gashourly/2021-Jan-01", base_url);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body.get("code").and_then(|c| c.as_u64()), Some(504));

    let mut released = false;
    for _ in 0..50 {
        if pool.num_idle() == pool.size() as usize {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(released, "stalled query kept its pooled connection");

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: HourlyGasResponse = res.json().await.unwrap();
    assert_eq!(body.result.len(), 3);
    handle.abort();
}

/// Holds a pooled connection past any deadline on its first call, then
/// defers to the store.
struct StallOnce {
    inner: SqliteSource,
    pool: DbPool,
    stalled: AtomicBool,
}

#[async_trait]
impl TransactionSource for StallOnce {
    async fn organic_transfers(
        &self,
        window: &DayWindow,
    ) -> Result<Vec<TransactionRecord>, PipelineError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            let _conn = self
                .pool
                .acquire()
                .await
                .map_err(PipelineError::source_unavailable)?;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.inner.organic_transfers(window).await
    }
}

async fn seeded_pool() -> DbPool {
    let db_url = temp_db_url();
    let pool = storage::init_pool(&db_url).await.unwrap();
    seed_data(&pool).await.unwrap();
    pool
}

async fn spawn_app_with_data() -> (String, JoinHandle<()>) {
    let pool = seeded_pool().await;
    spawn_app(Arc::new(SqliteSource::new(pool)), Duration::from_secs(5)).await
}

async fn spawn_app(
    source: Arc<dyn TransactionSource + Send + Sync>,
    request_timeout: Duration,
) -> (String, JoinHandle<()>) {
    let state = AppState {
        source,
        settings: PipelineSettings::default(),
        request_timeout,
    };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);
    let server = axum::serve(listener, app);
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });

    (base_url, handle)
}

fn temp_db_url() -> String {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let file = format!(
        "eth_fee_analytics_test_{}_{}.sqlite",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::SeqCst)
    );
    let path = std::env::temp_dir().join(file);
    let _ = std::fs::remove_file(&path);
    format!("sqlite://{}", path.to_string_lossy())
}

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, h, m, s).unwrap()
}

fn transfer(
    txid: &str,
    block_time: DateTime<Utc>,
    gas_used: u64,
    gas_price: u64,
) -> TransactionRecord {
    TransactionRecord {
        txid: txid.to_string(),
        block_height: 11_565_000,
        block_hash: "0xabc".to_string(),
        block_time,
        from: "0xaaa".to_string(),
        to: Some("0xbbb".to_string()),
        value: BigDecimal::from_str("1000000000000000000").unwrap(),
        gas_provided: BigDecimal::from(gas_used * 2),
        gas_used: Some(BigDecimal::from(gas_used)),
        gas_price: Some(BigDecimal::from(gas_price)),
        success: true,
    }
}

async fn seed_data(pool: &DbPool) -> anyhow::Result<()> {
    let mut to_contract = transfer("0xtx6", at(14, 20, 0), 1_000_000, 90_000_000_000);
    to_contract.to = Some(CONTRACT.to_string());
    let mut reverted = transfer("0xtx7", at(14, 20, 0), 1_000_000, 90_000_000_000);
    reverted.success = false;
    let mut no_price = transfer("0xtx8", at(16, 30, 0), 1_000_000, 0);
    no_price.gas_price = None;

    let txs = vec![
        // 14:00:30 lands in the 13:00 bucket
        transfer("0xtx1", at(14, 0, 30), 1_000_000, 5_000_000_000),
        transfer("0xtx2", at(14, 5, 0), 1_000_000, 1_000_000_000),
        transfer("0xtx3", at(14, 59, 59), 1_000_000, 3_000_000_000),
        transfer("0xtx4", at(16, 10, 0), 21_000, 500_000_000_000),
        transfer("0xtx5", at(16, 45, 0), 1_000_000, 10_500_000_000),
        to_contract,
        reverted,
        no_price,
        // next day, outside the window
        transfer("0xtx9", at(23, 0, 0) + chrono::Duration::hours(2), 1_000_000, 1_000_000_000),
    ];

    storage::insert_transactions(pool, &txs).await?;
    storage::insert_contracts(pool, &[CONTRACT]).await?;
    Ok(())
}
