//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use stub_server::config::ReloadTrigger;
use stub_server::{App, ServerSettings, Shutdown, StartupError};

/// A running server bound to an ephemeral port on loopback.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub shutdown: Shutdown,
    pub reload: ReloadTrigger,
    pub handle: JoinHandle<Result<(), StartupError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Replace the configuration document on disk.
    pub fn rewrite_config(&self, endpoints: Value) {
        write_config(&self.config_path, endpoints);
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
        assert!(result.is_ok(), "server returned error: {:?}", result);
    }
}

/// Write a document with port 0 and the given endpoints.
pub fn write_config(path: &Path, endpoints: Value) {
    let document = serde_json::json!({ "port": 0, "endpoints": endpoints });
    std::fs::write(path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
}

/// Boot a server whose endpoints are built from the temp directory path.
pub async fn start_server<F>(endpoints: F) -> TestServer
where
    F: FnOnce(&Path) -> Value,
{
    start_server_with(endpoints, |_| {}).await
}

pub async fn start_server_with<F, S>(endpoints: F, customize: S) -> TestServer
where
    F: FnOnce(&Path) -> Value,
    S: FnOnce(&mut ServerSettings),
{
    let (app, dir, config_path) = build_app(endpoints, customize).await;
    serve_app(app, dir, config_path)
}

/// Build (load, bind, watch) without serving yet.
pub async fn build_app<F, S>(endpoints: F, customize: S) -> (App, TempDir, PathBuf)
where
    F: FnOnce(&Path) -> Value,
    S: FnOnce(&mut ServerSettings),
{
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("settings.json");
    write_config(&config_path, endpoints(dir.path()));

    let mut settings = ServerSettings {
        config_path: config_path.clone(),
        bind_ip: Ipv4Addr::LOCALHOST.into(),
        shutdown_grace: Duration::from_secs(5),
        ..ServerSettings::default()
    };
    customize(&mut settings);

    let app = App::build(settings).await.expect("server failed to start");
    (app, dir, config_path)
}

/// Start serving an already built app in the background.
pub fn serve_app(app: App, dir: TempDir, config_path: PathBuf) -> TestServer {
    let addr = app.local_addr().unwrap();
    let shutdown = app.shutdown_handle();
    let reload = app.reload_trigger();
    let handle = tokio::spawn(app.serve());

    TestServer {
        addr,
        dir,
        config_path,
        shutdown,
        reload,
        handle,
    }
}

/// Client without proxies or pooled connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Send raw bytes and read until the server closes the socket.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("server kept the connection open");
    match read {
        Ok(_) => received,
        // A reset before any bytes also means nothing was written.
        Err(_) => received,
    }
}

/// Poll `check` until it returns true or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
