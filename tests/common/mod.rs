//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use edge_router::functions::{DispatchError, FunctionInvoker, FunctionRequest, FunctionResponse};
use edge_router::storage::MemoryObjectStore;
use edge_router::{EdgeConfig, EdgeRouter, HttpServer, SharedRouter};

/// An invoker that records calls and answers from a script.
#[derive(Clone)]
pub struct ScriptedInvoker {
    calls: Arc<Mutex<Vec<(String, FunctionRequest)>>>,
    answer: Arc<dyn Fn(&str) -> Result<FunctionResponse, DispatchError> + Send + Sync>,
}

impl std::fmt::Debug for ScriptedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedInvoker").finish_non_exhaustive()
    }
}

#[allow(dead_code)]
impl ScriptedInvoker {
    pub fn new<F>(answer: F) -> Self
    where
        F: Fn(&str) -> Result<FunctionResponse, DispatchError> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            answer: Arc::new(answer),
        }
    }

    /// Answer every call with 200 and `function:{id}`.
    pub fn echo() -> Self {
        Self::new(|id| {
            Ok(FunctionResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: format!("function:{}", id).into(),
            })
        })
    }

    pub fn calls(&self) -> Vec<(String, FunctionRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FunctionInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        function_id: &str,
        request: FunctionRequest,
    ) -> Result<FunctionResponse, DispatchError> {
        self.calls
            .lock()
            .unwrap()
            .push((function_id.to_string(), request));
        (self.answer)(function_id)
    }
}

/// Build a shared router over `store`, loading its control documents.
#[allow(dead_code)]
pub async fn shared_router(
    config: EdgeConfig,
    store: &MemoryObjectStore,
    invoker: Arc<dyn FunctionInvoker>,
) -> SharedRouter {
    let (router, _report) =
        EdgeRouter::load(Arc::new(config), Arc::new(store.clone()), invoker).await;
    SharedRouter::new(router)
}

/// The fully layered application over `shared`.
#[allow(dead_code)]
pub fn app(shared: SharedRouter) -> Router {
    HttpServer::new(shared).app()
}

/// Drive one request through `app`; returns status, headers and body text.
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

#[allow(dead_code)]
pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

/// Read one HTTP/1.1 request (head plus Content-Length body) and return its body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return String::new(),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    String::from_utf8_lossy(&buf[head_end..]).into_owned()
}

/// Start a programmable mock backend; `f` receives each request body.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request_body = read_request(&mut socket).await;
                        let (status, body) = f(request_body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}
