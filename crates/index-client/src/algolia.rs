use std::time::Duration;

use async_trait::async_trait;
use core_types::config::{ClientConfig, Credentials};
use core_types::{PartialRecord, SearchOptions, SearchPage};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{IndexError, IndexService};

const APP_ID_HEADER: &str = "x-algolia-application-id";
const API_KEY_HEADER: &str = "x-algolia-api-key";
const PARTIAL_UPDATE_ACTION: &str = "partialUpdateObjectNoCreate";

/// HTTPS client for one Algolia index.
///
/// Reads go to the DSN host and writes to the primary host unless the
/// configuration overrides them.
#[derive(Debug, Clone)]
pub struct AlgoliaIndex {
    http: Client,
    name: String,
    search_url: Url,
    batch_url: Url,
    batch_size: usize,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    #[serde(flatten)]
    options: &'a SearchOptions,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    requests: Vec<BatchOperation<'a>>,
}

#[derive(Serialize)]
struct BatchOperation<'a> {
    action: &'static str,
    body: &'a PartialRecord,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(rename = "taskID")]
    task_id: u64,
    #[serde(rename = "objectIDs", default)]
    object_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl AlgoliaIndex {
    pub fn new(
        credentials: &Credentials,
        index_name: &str,
        config: &ClientConfig,
    ) -> Result<Self, IndexError> {
        if index_name.is_empty() {
            return Err(IndexError::Config("index name must not be empty".into()));
        }

        let search_host = config
            .search_host
            .clone()
            .unwrap_or_else(|| format!("https://{}-dsn.algolia.net", credentials.app_id));
        let write_host = config
            .write_host
            .clone()
            .unwrap_or_else(|| format!("https://{}.algolia.net", credentials.app_id));

        let mut headers = HeaderMap::new();
        headers.insert(APP_ID_HEADER, header_value(&credentials.app_id)?);
        let mut key = header_value(&credentials.api_key)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            name: index_name.to_string(),
            search_url: index_url(&search_host, index_name, "query")?,
            batch_url: index_url(&write_host, index_name, "batch")?,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, IndexError> {
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(IndexError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }

    async fn submit_batch(&self, chunk: &[PartialRecord]) -> Result<(), IndexError> {
        let body = BatchBody {
            requests: chunk
                .iter()
                .map(|record| BatchOperation {
                    action: PARTIAL_UPDATE_ACTION,
                    body: record,
                })
                .collect(),
        };
        let response = self
            .http
            .post(self.batch_url.clone())
            .json(&body)
            .send()
            .await?;
        let ack: BatchResponse = Self::decode(response).await?;
        debug!(
            index = %self.name,
            task_id = ack.task_id,
            objects = ack.object_ids.len(),
            "partial update batch accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl IndexService for AlgoliaIndex {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Option<SearchPage>, IndexError> {
        let response = self
            .http
            .post(self.search_url.clone())
            .json(&SearchBody { query, options })
            .send()
            .await?;
        let page: SearchPage = Self::decode(response).await?;
        debug!(
            index = %self.name,
            page = options.page.unwrap_or(0),
            hits = page.hits.len(),
            nb_pages = page.nb_pages,
            "search page received"
        );
        Ok(Some(page))
    }

    async fn partial_update_objects(&self, records: Vec<PartialRecord>) -> Result<(), IndexError> {
        if records.is_empty() {
            debug!(index = %self.name, "no records to update");
            return Ok(());
        }

        let total = records.len();
        let mut applied = 0;
        for chunk in records.chunks(self.batch_size) {
            if let Err(err) = self.submit_batch(chunk).await {
                if applied == 0 {
                    return Err(err);
                }
                warn!(
                    index = %self.name,
                    applied,
                    total,
                    error = %err,
                    "partial update failed after earlier batches were applied"
                );
                return Err(IndexError::Incomplete {
                    applied,
                    total,
                    source: Box::new(err),
                });
            }
            applied += chunk.len();
        }
        Ok(())
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

fn header_value(raw: &str) -> Result<HeaderValue, IndexError> {
    HeaderValue::from_str(raw)
        .map_err(|e| IndexError::Config(format!("credential is not a valid header value: {e}")))
}

fn index_url(host: &str, index_name: &str, action: &str) -> Result<Url, IndexError> {
    let mut url =
        Url::parse(host).map_err(|e| IndexError::Config(format!("invalid host {host}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| IndexError::Config(format!("host cannot be a base url: {host}")))?
        .clear()
        .extend(["1", "indexes", index_name, action]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials {
            app_id: "APPID".into(),
            api_key: "secret".into(),
        }
    }

    fn local_config(server: &MockServer) -> ClientConfig {
        ClientConfig {
            search_host: Some(server.uri()),
            write_host: Some(server.uri()),
            timeout_secs: 5,
            batch_size: 2,
        }
    }

    fn records(n: usize) -> Vec<PartialRecord> {
        (1..=n)
            .map(|i| PartialRecord {
                object_id: i.to_string(),
                path: format!("p{i}"),
                parents: vec!["/".into()],
                dir: "/".into(),
            })
            .collect()
    }

    fn ack() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "taskID": 7, "objectIDs": ["1", "2"] }))
    }

    #[test]
    fn default_hosts_follow_app_id() {
        let index = AlgoliaIndex::new(&creds(), "my index", &ClientConfig::default()).unwrap();
        assert_eq!(
            index.search_url.as_str(),
            "https://appid-dsn.algolia.net/1/indexes/my%20index/query"
        );
        assert_eq!(
            index.batch_url.as_str(),
            "https://appid.algolia.net/1/indexes/my%20index/batch"
        );
        assert_eq!(index.name(), "my index");
    }

    #[test]
    fn rejects_empty_index_name_and_bad_host() {
        assert!(matches!(
            AlgoliaIndex::new(&creds(), "", &ClientConfig::default()),
            Err(IndexError::Config(_))
        ));
        let cfg = ClientConfig {
            search_host: Some("not a url".into()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            AlgoliaIndex::new(&creds(), "idx", &cfg),
            Err(IndexError::Config(_))
        ));
    }

    #[tokio::test]
    async fn search_posts_query_and_decodes_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/query"))
            .and(header(APP_ID_HEADER, "APPID"))
            .and(header(API_KEY_HEADER, "secret"))
            .and(body_partial_json(json!({
                "query": "",
                "attributesToRetrieve": ["objectID", "path"],
                "page": 1
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [{ "objectID": "1", "path": "ms/a" }],
                "nbHits": 1,
                "nbPages": 1,
                "page": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        let page = index
            .search("", &SearchOptions::rename_scan(Some(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.nb_pages, 1);
        assert_eq!(page.hits[0].path.as_deref(), Some("ms/a"));
    }

    #[tokio::test]
    async fn partial_update_is_chunked_by_batch_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/batch"))
            .and(header(API_KEY_HEADER, "secret"))
            .respond_with(ack())
            .expect(2)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        index.partial_update_objects(records(3)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let sizes: Vec<usize> = requests
            .iter()
            .map(|req| {
                let body: Value = req.body_json().unwrap();
                let ops = body["requests"].as_array().unwrap();
                assert!(ops.iter().all(|op| op["action"] == PARTIAL_UPDATE_ACTION));
                ops.len()
            })
            .collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[tokio::test]
    async fn later_chunk_failure_reports_applied_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/batch"))
            .respond_with(ack())
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/batch"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
            .expect(1)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        let err = index.partial_update_objects(records(3)).await.unwrap_err();
        match err {
            IndexError::Incomplete {
                applied,
                total,
                source,
            } => {
                assert_eq!((applied, total), (2, 3));
                assert!(matches!(*source, IndexError::Status { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_chunk_failure_is_returned_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/batch"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "bad" })))
            .expect(1)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        let err = index.partial_update_objects(records(3)).await.unwrap_err();
        assert!(matches!(err, IndexError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/idx/query"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "Invalid Application-ID or API key",
                "status": 403
            })))
            .expect(1)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        let err = index
            .search("", &SearchOptions::rename_scan(None))
            .await
            .unwrap_err();
        match err {
            IndexError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Invalid Application-ID or API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_boxed() {
        let cfg = ClientConfig {
            search_host: Some("http://127.0.0.1:9".into()),
            timeout_secs: 1,
            ..ClientConfig::default()
        };
        let index = AlgoliaIndex::new(&creds(), "idx", &cfg).unwrap();
        let err = index
            .search("", &SearchOptions::rename_scan(None))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Transport(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn empty_update_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ack())
            .expect(0)
            .mount(&server)
            .await;

        let index = AlgoliaIndex::new(&creds(), "idx", &local_config(&server)).unwrap();
        index.partial_update_objects(Vec::new()).await.unwrap();
    }
}
