use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{error, info};

use crontask_core::models::{ExecutionState, HttpMethod, Output, Task, TaskKind};
use crontask_core::{SchedulerResult, TaskRunner};

use super::{errored, succeed, unsupported};

/// HTTP任务执行器，非2xx响应视为任务失败
#[derive(Debug, Clone, Default)]
pub struct HttpTaskRunner {
    client: reqwest::Client,
}

impl HttpTaskRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

#[async_trait]
impl TaskRunner for HttpTaskRunner {
    fn name(&self) -> &str {
        "http"
    }

    fn support(&self, task: &Task) -> bool {
        matches!(task.kind(), TaskKind::Http(_))
    }

    async fn run(&self, task: &mut Task) -> SchedulerResult<Output> {
        let TaskKind::Http(config) = task.kind() else {
            return Err(unsupported(self.name(), task));
        };
        let config = config.clone();
        let options = &config.client_options;

        task.set_execution_state(Some(ExecutionState::Running));
        info!(
            "执行HTTP任务: task={}, method={}, url={}",
            task.name(),
            config.method,
            config.url
        );

        let mut request = self
            .client
            .request(to_method(config.method), &config.url)
            .query(&options.query);
        for (key, value) in &options.headers {
            request = request.header(key, value);
        }
        if let Some(ref body) = options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout_seconds.and_then(|t| Duration::try_from_secs_f64(t).ok()) {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("HTTP任务执行失败: task={}, error={}", task.name(), e);
                return Ok(errored(task, format!("HTTP请求失败: {e}")));
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("读取响应体失败: {e}"));

        info!(
            "HTTP任务执行完成: task={}, status={}",
            task.name(),
            status.as_u16()
        );

        if status.is_success() {
            Ok(succeed(task, Some(body)))
        } else {
            Ok(errored(
                task,
                format!("HTTP请求失败，状态码: {}\n{}", status.as_u16(), body),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 只应答一次请求的本地HTTP服务，返回其地址
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}/ping")
    }

    #[tokio::test]
    async fn test_successful_request() {
        let url = serve_once("200 OK", "pong").await;
        let mut task = Task::http("ping", url).unwrap();

        let output = HttpTaskRunner::new().run(&mut task).await.unwrap();

        assert!(output.is_success());
        assert_eq!(output.output(), Some("pong"));
        assert_eq!(task.execution_state(), Some(ExecutionState::Succeed));
    }

    #[tokio::test]
    async fn test_server_error_is_errored_output() {
        let url = serve_once("500 Internal Server Error", "boom").await;
        let mut task = Task::http("ping", url).unwrap();

        let output = HttpTaskRunner::new().run(&mut task).await.unwrap();

        assert!(!output.is_success());
        assert!(output.output().unwrap().contains("500"));
        assert_eq!(task.execution_state(), Some(ExecutionState::Errored));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_errored_output() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut task = Task::http("ping", format!("http://{addr}/")).unwrap();
        let output = HttpTaskRunner::new().run(&mut task).await.unwrap();

        assert!(!output.is_success());
        assert_eq!(task.execution_state(), Some(ExecutionState::Errored));
    }

    #[test]
    fn test_methods_map_to_reqwest() {
        assert_eq!(to_method(HttpMethod::Get), Method::GET);
        assert_eq!(to_method(HttpMethod::Patch), Method::PATCH);
        assert_eq!(to_method(HttpMethod::Head), Method::HEAD);
    }
}
