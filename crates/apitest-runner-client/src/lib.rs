//! HTTP client for the API testing server.
//!
//! Every backend call in the console funnels through [`RunnerClient`]: it
//! injects the auth token and the selected store name as headers, applies a
//! deliberate per-request timeout, and classifies every response through one
//! content-negotiated choke point. The batch-run endpoint streams its
//! results and is decoded incrementally, one JSON chunk per finished case.

mod process;
mod stream;
pub mod types;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use apitest_client_core::{ClientCache, StoreDescriptor, TestCaseResponse};

pub use process::{ParsedBody, process_response};
pub use stream::ChunkDecoder;
pub use types::{
    ConvertSuiteRequest, CreateTestCaseRequest, CreateTestSuiteRequest, DuplicateCaseRequest,
    DuplicateSuiteRequest, GenerateCodeRequest, ImportSource, MockConfigRequest,
    RunTestCaseRequest, RunTestSuiteRequest, Secret, StoreListResponse,
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const ENV_SERVER_URL: &str = "APITEST_SERVER_URL";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_ATTEMPTS: usize = 2;

pub const HEADER_AUTH: &str = "X-Auth";
pub const HEADER_STORE_NAME: &str = "X-Store-Name";
const HEADER_REQUEST_ID: &str = "x-request-id";

const PATH_GET_VERSION: &str = "/server.Runner/GetVersion";
const PATH_CREATE_TEST_SUITE: &str = "/server.Runner/CreateTestSuite";
const PATH_UPDATE_TEST_SUITE: &str = "/server.Runner/UpdateTestSuite";
const PATH_GET_TEST_SUITE: &str = "/server.Runner/GetTestSuite";
const PATH_DELETE_TEST_SUITE: &str = "/server.Runner/DeleteTestSuite";
const PATH_CONVERT_TEST_SUITE: &str = "/server.Runner/ConvertTestSuite";
const PATH_DUPLICATE_TEST_SUITE: &str = "/server.Runner/DuplicateTestSuite";
const PATH_GET_TEST_SUITE_YAML: &str = "/server.Runner/GetTestSuiteYaml";
const PATH_IMPORT_TEST_SUITE: &str = "/server.Runner/ImportTestSuite";
const PATH_CREATE_TEST_CASE: &str = "/server.Runner/CreateTestCase";
const PATH_UPDATE_TEST_CASE: &str = "/server.Runner/UpdateTestCase";
const PATH_GET_TEST_CASE: &str = "/server.Runner/GetTestCase";
const PATH_LIST_TEST_CASE: &str = "/server.Runner/ListTestCase";
const PATH_DELETE_TEST_CASE: &str = "/server.Runner/DeleteTestCase";
const PATH_DUPLICATE_TEST_CASE: &str = "/server.Runner/DuplicateTestCase";
const PATH_RUN_TEST_CASE: &str = "/server.Runner/RunTestCase";
const PATH_RUN_TEST_SUITE: &str = "/server.Runner/RunTestSuite";
const PATH_GENERATE_CODE: &str = "/server.Runner/GenerateCode";
const PATH_LIST_CODE_GENERATOR: &str = "/server.Runner/ListCodeGenerator";
const PATH_POPULAR_HEADERS: &str = "/server.Runner/PopularHeaders";
const PATH_GET_STORES: &str = "/server.Runner/GetStores";
const PATH_CREATE_STORE: &str = "/server.Runner/CreateStore";
const PATH_UPDATE_STORE: &str = "/server.Runner/UpdateStore";
const PATH_DELETE_STORE: &str = "/server.Runner/DeleteStore";
const PATH_VERIFY_STORE: &str = "/server.Runner/VerifyStore";
const PATH_GET_SECRETS: &str = "/server.Runner/GetSecrets";
const PATH_CREATE_SECRET: &str = "/server.Runner/CreateSecret";
const PATH_UPDATE_SECRET: &str = "/server.Runner/UpdateSecret";
const PATH_DELETE_SECRET: &str = "/server.Runner/DeleteSecret";
const PATH_FUNCTIONS_QUERY: &str = "/server.Runner/FunctionsQuery";
const PATH_GET_SUGGESTED_APIS: &str = "/server.Runner/GetSuggestedAPIs";
const PATH_MOCK_RELOAD: &str = "/server.Mock/Reload";
const PATH_MOCK_GET_CONFIG: &str = "/server.Mock/GetConfig";

#[derive(Debug, thiserror::Error)]
pub enum RunnerClientError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: StatusCode, message: String },
    #[error("transport failure: {message}")]
    Transport { message: String },
    #[error("failed to decode response body: {message}")]
    Decode { message: String },
    #[error("server base url must not be empty")]
    BaseUrlMissing,
    #[error("server base url must use http:// or https:// and include a host")]
    InvalidBaseUrl,
}

#[derive(Debug, Clone)]
pub struct RunnerClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub request_attempts: usize,
}

impl RunnerClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_attempts: DEFAULT_REQUEST_ATTEMPTS,
        }
    }

    /// Config from the environment: `APITEST_SERVER_URL` when set, the
    /// local default otherwise.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var(ENV_SERVER_URL)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Self::new(base_url)
    }
}

/// Which store a request targets: none, the cached selection, or an
/// explicitly named one.
enum StoreScope<'a> {
    Unscoped,
    Current,
    Named(&'a str),
}

#[derive(Clone)]
pub struct RunnerClient {
    base_url: String,
    timeout: Duration,
    request_attempts: usize,
    http: reqwest::Client,
    cache: ClientCache,
    // Read-through cache for API suggestions, keyed by store/suite.
    // Invalidated only by process restart.
    suggested: Arc<Mutex<HashMap<String, Value>>>,
}

impl RunnerClient {
    pub fn new(config: RunnerClientConfig, cache: ClientCache) -> Result<Self, RunnerClientError> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            request_attempts: config.request_attempts.max(1),
            http: reqwest::Client::new(),
            cache,
            suggested: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[must_use]
    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // --- server info ---

    /// The server version, whether the server reports it as plain text or
    /// wrapped in JSON.
    pub async fn version(&self) -> Result<String, RunnerClientError> {
        let parsed = self.call(PATH_GET_VERSION, StoreScope::Unscoped).await?;
        Ok(match parsed {
            ParsedBody::Text(text) => text,
            ParsedBody::Json(value) => value
                .get("message")
                .or_else(|| value.get("version"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        })
    }

    // --- test suites ---

    pub async fn create_test_suite(
        &self,
        store: &str,
        suite: &CreateTestSuiteRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_CREATE_TEST_SUITE, StoreScope::Named(store), suite)
            .await
    }

    /// Update a whole suite document. The document shape is owned by the
    /// server; it passes through untyped.
    pub async fn update_test_suite(&self, suite: &Value) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_UPDATE_TEST_SUITE, StoreScope::Current, suite)
            .await
    }

    pub async fn get_test_suite(&self, name: &str) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_GET_TEST_SUITE, StoreScope::Current, &json!({"name": name}))
            .await
    }

    pub async fn delete_test_suite(&self, name: &str) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_DELETE_TEST_SUITE, StoreScope::Current, &json!({"name": name}))
            .await
    }

    pub async fn convert_test_suite(
        &self,
        request: &ConvertSuiteRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_CONVERT_TEST_SUITE, StoreScope::Current, request)
            .await
    }

    pub async fn duplicate_test_suite(
        &self,
        request: &DuplicateSuiteRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_DUPLICATE_TEST_SUITE, StoreScope::Current, request)
            .await
    }

    /// The suite as raw YAML, from an explicitly named store.
    pub async fn test_suite_yaml(
        &self,
        store: &str,
        suite: &str,
    ) -> Result<String, RunnerClientError> {
        let parsed = self
            .call_with(
                PATH_GET_TEST_SUITE_YAML,
                StoreScope::Named(store),
                &json!({"name": suite}),
            )
            .await?;
        Ok(match parsed {
            ParsedBody::Text(text) => text,
            ParsedBody::Json(value) => value
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        })
    }

    pub async fn import_test_suite(
        &self,
        source: &ImportSource,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_IMPORT_TEST_SUITE,
            StoreScope::Named(&source.store),
            source,
        )
        .await
    }

    // --- test cases ---

    pub async fn create_test_case(
        &self,
        request: &CreateTestCaseRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_CREATE_TEST_CASE, StoreScope::Current, request)
            .await
    }

    pub async fn update_test_case(&self, case: &Value) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_UPDATE_TEST_CASE, StoreScope::Current, case)
            .await
    }

    pub async fn get_test_case(
        &self,
        suite: &str,
        testcase: &str,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_GET_TEST_CASE,
            StoreScope::Current,
            &json!({"suite": suite, "testcase": testcase}),
        )
        .await
    }

    pub async fn list_test_cases(
        &self,
        store: &str,
        suite: &str,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_LIST_TEST_CASE,
            StoreScope::Named(store),
            &json!({"name": suite}),
        )
        .await
    }

    pub async fn delete_test_case(
        &self,
        suite: &str,
        testcase: &str,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_DELETE_TEST_CASE,
            StoreScope::Current,
            &json!({"suite": suite, "testcase": testcase}),
        )
        .await
    }

    pub async fn duplicate_test_case(
        &self,
        request: &DuplicateCaseRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_DUPLICATE_TEST_CASE, StoreScope::Current, request)
            .await
    }

    /// Run one case. When `cache_key` is given the result is written through
    /// the per-case response cache for redisplay; a cache write failure is
    /// logged, not surfaced, since the run itself succeeded.
    pub async fn run_test_case(
        &self,
        request: &RunTestCaseRequest,
        cache_key: Option<&str>,
    ) -> Result<TestCaseResponse, RunnerClientError> {
        let response: TestCaseResponse = self
            .call_json(PATH_RUN_TEST_CASE, StoreScope::Current, request)
            .await?;
        if let Some(id) = cache_key {
            if let Err(error) = self.cache.set_test_case_response(id, &response) {
                warn!("failed to cache response for case {id}: {error}");
            }
        }
        Ok(response)
    }

    /// Run a whole suite, invoking `on_result` once per streamed result
    /// chunk as it arrives. A mid-stream transport error or an undecodable
    /// chunk aborts the loop and surfaces after the chunks already
    /// delivered; this call never retries. Returns the delivered count.
    pub async fn run_test_suite<F>(
        &self,
        request: &RunTestSuiteRequest,
        mut on_result: F,
    ) -> Result<usize, RunnerClientError>
    where
        F: FnMut(Value),
    {
        let url = self.endpoint(PATH_RUN_TEST_SUITE);
        // No per-request timeout here: the stream stays open as long as
        // cases keep finishing.
        let response = self
            .http
            .post(&url)
            .header(HEADER_AUTH, self.cache.auth_token())
            .header(HEADER_STORE_NAME, self.cache.current_store_name())
            .header(HEADER_REQUEST_ID, request_id())
            .json(request)
            .send()
            .await
            .map_err(|error| RunnerClientError::Transport {
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|error| RunnerClientError::Transport {
                    message: error.to_string(),
                })?;
            return Err(process::failure_error(status, &bytes));
        }

        let mut body = response.bytes_stream();
        let mut decoder = ChunkDecoder::new();
        let mut delivered = 0usize;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|error| RunnerClientError::Transport {
                message: error.to_string(),
            })?;
            debug!("batch-run chunk: {} bytes", chunk.len());
            for value in decoder.feed(&chunk)? {
                on_result(value);
                delivered += 1;
            }
        }
        if let Some(value) = decoder.finish()? {
            on_result(value);
            delivered += 1;
        }
        Ok(delivered)
    }

    // --- code generation ---

    pub async fn generate_code(
        &self,
        request: &GenerateCodeRequest,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_GENERATE_CODE, StoreScope::Current, request)
            .await
    }

    pub async fn list_code_generators(&self) -> Result<Value, RunnerClientError> {
        Ok(self
            .call(PATH_LIST_CODE_GENERATOR, StoreScope::Unscoped)
            .await?
            .into_json())
    }

    pub async fn popular_headers(&self) -> Result<Value, RunnerClientError> {
        Ok(self
            .call(PATH_POPULAR_HEADERS, StoreScope::Current)
            .await?
            .into_json())
    }

    // --- stores ---

    pub async fn stores(&self) -> Result<StoreListResponse, RunnerClientError> {
        let parsed = self.call(PATH_GET_STORES, StoreScope::Unscoped).await?;
        match parsed {
            ParsedBody::Json(value) => {
                serde_json::from_value(value).map_err(|error| RunnerClientError::Decode {
                    message: error.to_string(),
                })
            }
            ParsedBody::Text(_) => Err(RunnerClientError::Decode {
                message: "expected a JSON store list".to_string(),
            }),
        }
    }

    /// Fetch the store list and write it through the session registry,
    /// keeping whatever store was already selected.
    pub async fn refresh_stores(&self) -> Result<StoreListResponse, RunnerClientError> {
        let list = self.stores().await?;
        if let Err(error) = self.cache.replace_store_items(&list.data) {
            warn!("failed to cache store registry: {error}");
        }
        Ok(list)
    }

    pub async fn create_store(
        &self,
        store: &StoreDescriptor,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_CREATE_STORE, StoreScope::Unscoped, store)
            .await
    }

    pub async fn update_store(
        &self,
        store: &StoreDescriptor,
    ) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_UPDATE_STORE, StoreScope::Unscoped, store)
            .await
    }

    pub async fn delete_store(&self, name: &str) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_DELETE_STORE, StoreScope::Unscoped, &json!({"name": name}))
            .await
    }

    pub async fn verify_store(&self, name: &str) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_VERIFY_STORE, StoreScope::Unscoped, &json!({"name": name}))
            .await
    }

    // --- secrets ---

    pub async fn secrets(&self) -> Result<Value, RunnerClientError> {
        Ok(self
            .call(PATH_GET_SECRETS, StoreScope::Unscoped)
            .await?
            .into_json())
    }

    pub async fn create_secret(&self, secret: &Secret) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_CREATE_SECRET, StoreScope::Unscoped, secret)
            .await
    }

    pub async fn update_secret(&self, secret: &Secret) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_UPDATE_SECRET, StoreScope::Unscoped, secret)
            .await
    }

    pub async fn delete_secret(&self, name: &str) -> Result<Value, RunnerClientError> {
        self.call_value(PATH_DELETE_SECRET, StoreScope::Unscoped, &json!({"name": name}))
            .await
    }

    // --- misc ---

    pub async fn functions_query(&self, filter: &str) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_FUNCTIONS_QUERY,
            StoreScope::Unscoped,
            &json!({"name": filter}),
        )
        .await
    }

    /// API suggestions for a suite, via a read-through cache keyed by
    /// store/suite. Cached entries live until the process exits.
    pub async fn suggested_apis(&self, suite: &str) -> Result<Value, RunnerClientError> {
        let key = format!("{}/{suite}", self.cache.current_store_name());
        if let Some(cached) = self.lock_suggested().get(&key).cloned() {
            return Ok(cached);
        }
        let value = self
            .call_value(
                PATH_GET_SUGGESTED_APIS,
                StoreScope::Current,
                &json!({"name": suite}),
            )
            .await?;
        self.lock_suggested().insert(key, value.clone());
        Ok(value)
    }

    pub async fn reload_mock_server(&self, config: &str) -> Result<Value, RunnerClientError> {
        self.call_value(
            PATH_MOCK_RELOAD,
            StoreScope::Unscoped,
            &MockConfigRequest {
                config: config.to_string(),
            },
        )
        .await
    }

    pub async fn mock_config(&self) -> Result<Value, RunnerClientError> {
        Ok(self
            .call(PATH_MOCK_GET_CONFIG, StoreScope::Unscoped)
            .await?
            .into_json())
    }

    // --- dispatch plumbing ---

    fn lock_suggested(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.suggested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn call(
        &self,
        path: &str,
        scope: StoreScope<'_>,
    ) -> Result<ParsedBody, RunnerClientError> {
        self.dispatch(path, scope, None::<&Value>).await
    }

    async fn call_with<T>(
        &self,
        path: &str,
        scope: StoreScope<'_>,
        payload: &T,
    ) -> Result<ParsedBody, RunnerClientError>
    where
        T: Serialize + ?Sized,
    {
        self.dispatch(path, scope, Some(payload)).await
    }

    async fn call_value<T>(
        &self,
        path: &str,
        scope: StoreScope<'_>,
        payload: &T,
    ) -> Result<Value, RunnerClientError>
    where
        T: Serialize + ?Sized,
    {
        Ok(self.call_with(path, scope, payload).await?.into_json())
    }

    async fn call_json<T, Req>(
        &self,
        path: &str,
        scope: StoreScope<'_>,
        payload: &Req,
    ) -> Result<T, RunnerClientError>
    where
        T: DeserializeOwned,
        Req: Serialize + ?Sized,
    {
        match self.call_with(path, scope, payload).await? {
            ParsedBody::Json(value) => {
                serde_json::from_value(value).map_err(|error| RunnerClientError::Decode {
                    message: error.to_string(),
                })
            }
            ParsedBody::Text(text) => Err(RunnerClientError::Decode {
                message: format!("expected a JSON body, got {} bytes of text", text.len()),
            }),
        }
    }

    /// One unary dispatch: POST with injected headers, per-request timeout,
    /// and a retry loop around transport-level send failures.
    async fn dispatch<T>(
        &self,
        path: &str,
        scope: StoreScope<'_>,
        payload: Option<&T>,
    ) -> Result<ParsedBody, RunnerClientError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let store_name = match scope {
            StoreScope::Unscoped => None,
            StoreScope::Current => Some(self.cache.current_store_name()),
            StoreScope::Named(name) => Some(name.to_string()),
        };

        let mut last_error: Option<String> = None;
        for attempt in 0..self.request_attempts {
            let mut request = self
                .http
                .post(&url)
                .header(HEADER_AUTH, self.cache.auth_token())
                .header(HEADER_REQUEST_ID, request_id())
                .timeout(self.timeout);
            if let Some(store_name) = &store_name {
                request = request.header(HEADER_STORE_NAME, store_name.as_str());
            }
            if let Some(payload) = payload {
                request = request.json(payload);
            }

            debug!("dispatching {path} (attempt {attempt})");
            match request.send().await {
                Ok(response) => return process_http_response(response).await,
                Err(error) => {
                    last_error = Some(error.to_string());
                    if attempt + 1 >= self.request_attempts {
                        break;
                    }
                }
            }
        }

        Err(RunnerClientError::Transport {
            message: last_error.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

async fn process_http_response(
    response: reqwest::Response,
) -> Result<ParsedBody, RunnerClientError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| RunnerClientError::Transport {
            message: error.to_string(),
        })?;
    process_response(status, &content_type, &bytes)
}

fn request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}

fn normalize_base_url(raw: &str) -> Result<String, RunnerClientError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(RunnerClientError::BaseUrlMissing);
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(RunnerClientError::InvalidBaseUrl);
    }
    let Some((_, remainder)) = trimmed.split_once("://") else {
        return Err(RunnerClientError::InvalidBaseUrl);
    };
    if remainder.trim().is_empty() || remainder.starts_with('/') {
        return Err(RunnerClientError::InvalidBaseUrl);
    }
    Ok(trimmed.to_string())
}
