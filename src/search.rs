//! Paginated search against the hosted search indexes.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{ApiClient, ResponseFormat, api_base};
use crate::error::ScopusError;
use crate::store::{DataStore, DirStore, query_file_name};

/// Hard ceiling on the number of results one `Search` retrieves, no matter
/// how many the index reports.
pub const MAX_RETRIEVED_RESULTS: usize = 5000;

/// The search indexes hosted behind `/content/search/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchIndex {
    Affiliation,
    Author,
    Scopus,
    ScienceDirect,
}

impl SearchIndex {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchIndex::Affiliation => "affiliation",
            SearchIndex::Author => "author",
            SearchIndex::Scopus => "scopus",
            SearchIndex::ScienceDirect => "sciencedirect",
        }
    }
}

/// One query against a search index, plus the result pages retrieved so far.
///
/// `query` and `index` are fixed at construction; [`uri`](Search::uri) is
/// derived from them on demand. Each call to [`execute`](Search::execute) or
/// [`execute_all`](Search::execute_all) restarts from scratch and overwrites
/// the previously retrieved results.
#[derive(Debug, Clone)]
pub struct Search {
    query: String,
    index: SearchIndex,
    base: std::borrow::Cow<'static, str>,
    results: Option<Vec<Value>>,
    total_results: Option<u64>,
}

impl Search {
    pub fn new(query: impl Into<String>, index: SearchIndex) -> Self {
        Self {
            query: query.into(),
            index,
            base: api_base(),
            results: None,
            total_results: None,
        }
    }

    /// Overrides the API host, e.g. for a mirror or a mock server.
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = std::borrow::Cow::Owned(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn index(&self) -> SearchIndex {
        self.index
    }

    /// Request URI for the first page. The query string is passed through
    /// verbatim; percent-encoding beyond what the transport applies is the
    /// caller's responsibility.
    pub fn uri(&self) -> String {
        format!(
            "{}/content/search/{}?query={}",
            self.base,
            self.index.as_str(),
            self.query
        )
    }

    /// Result records retrieved so far, in index order. `None` until a fetch
    /// has run.
    pub fn results(&self) -> Option<&[Value]> {
        self.results.as_deref()
    }

    /// Number of result records currently held. This can be smaller than
    /// [`total_results`](Search::total_results).
    pub fn result_count(&self) -> usize {
        self.results.as_ref().map(Vec::len).unwrap_or(0)
    }

    /// Number of matches the index reports for the query, which may exceed
    /// what a single `Search` is allowed to retrieve.
    pub fn total_results(&self) -> Option<u64> {
        self.total_results
    }

    /// True once every match the index reported has been retrieved.
    pub fn has_all_results(&self) -> bool {
        match (self.results.as_ref(), self.total_results) {
            (Some(results), Some(total)) => results.len() as u64 == total,
            _ => false,
        }
    }

    /// Retrieves the first page of results.
    pub async fn execute(&mut self, client: &ApiClient) -> Result<(), ScopusError> {
        self.run(client, false).await
    }

    /// Retrieves result pages by following each response's `next` link until
    /// every reported match is held or [`MAX_RETRIEVED_RESULTS`] is reached.
    pub async fn execute_all(&mut self, client: &ApiClient) -> Result<(), ScopusError> {
        self.run(client, true).await
    }

    async fn run(&mut self, client: &ApiClient, get_all: bool) -> Result<(), ScopusError> {
        let uri = self.uri();
        let mut page = fetch_page(client, &uri).await?;
        let total = page.parse_total(&uri)?;

        self.total_results = Some(total);
        let mut results = std::mem::take(&mut page.entries);

        if get_all {
            while (results.len() as u64) < total && results.len() < MAX_RETRIEVED_RESULTS {
                let next = page.next_link().map(str::to_string).ok_or_else(|| {
                    ScopusError::Api {
                        endpoint: uri.clone(),
                        message: format!(
                            "no 'next' link with {} of {total} results retrieved",
                            results.len()
                        ),
                    }
                })?;

                page = fetch_page(client, &next).await?;
                if page.entries.is_empty() {
                    warn!(uri = %next, "follow-up page carried no entries, stopping");
                    break;
                }
                results.append(&mut page.entries);
            }
        }

        info!(
            query = %self.query,
            index = self.index.as_str(),
            retrieved = results.len(),
            total,
            "search executed"
        );
        self.results = Some(results);
        Ok(())
    }

    /// Persists a summary of the retrieved results into `store`: the list of
    /// `pii` identifiers keyed by the query, or `"No results."` when any
    /// record lacks one. The file is named after the leading 100 characters
    /// of the query.
    pub fn write_to(&self, store: &dyn DataStore) -> Result<PathBuf, ScopusError> {
        let Some(results) = self.results.as_ref() else {
            warn!(query = %self.query, "no results to write");
            return Err(ScopusError::MissingData(self.query.clone()));
        };

        let piis: Option<Vec<Value>> = results
            .iter()
            .map(|record| {
                record
                    .get("pii")
                    .and_then(Value::as_str)
                    .map(|pii| Value::String(pii.to_string()))
            })
            .collect();

        let mut summary = serde_json::Map::new();
        summary.insert(
            self.query.clone(),
            match piis {
                Some(piis) => Value::Array(piis),
                None => Value::String("No results.".to_string()),
            },
        );

        store.put(&query_file_name(&self.query), &Value::Object(summary))
    }

    /// Persists the summary under `./data`.
    pub fn write(&self) -> Result<PathBuf, ScopusError> {
        self.write_to(&DirStore::new(std::env::current_dir()?.join("data")))
    }
}

async fn fetch_page(client: &ApiClient, uri: &str) -> Result<ResultsPage, ScopusError> {
    let value = client.exec_request(uri, ResponseFormat::Json).await?;
    let envelope: SearchEnvelope =
        serde_json::from_value(value).map_err(|source| ScopusError::ApiJson {
            endpoint: uri.to_string(),
            source,
        })?;
    Ok(envelope.results)
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "search-results")]
    results: ResultsPage,
}

#[derive(Debug, Deserialize)]
struct ResultsPage {
    // The OpenSearch envelope carries the count as a numeric string.
    #[serde(rename = "opensearch:totalResults")]
    total_results: Option<Value>,
    #[serde(default, rename = "entry")]
    entries: Vec<Value>,
    #[serde(default, rename = "link")]
    links: Vec<PageLink>,
}

impl ResultsPage {
    fn parse_total(&self, uri: &str) -> Result<u64, ScopusError> {
        let raw = self.total_results.as_ref().ok_or_else(|| ScopusError::Api {
            endpoint: uri.to_string(),
            message: "response carries no 'opensearch:totalResults'".to_string(),
        })?;

        let parsed = match raw {
            Value::String(s) => s.trim().parse::<u64>().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        parsed.ok_or_else(|| ScopusError::Api {
            endpoint: uri.to_string(),
            message: format!("unparseable 'opensearch:totalResults': {raw}"),
        })
    }

    fn next_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel.as_deref() == Some("next"))
            .and_then(|link| link.href.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct PageLink {
    #[serde(rename = "@ref")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> ApiClient {
        ApiClient::builder("test-key").base(base).build().unwrap()
    }

    fn entries(start: usize, len: usize) -> Vec<Value> {
        (start..start + len)
            .map(|i| {
                serde_json::json!({
                    "dc:identifier": format!("SCOPUS_ID:{i}"),
                    "pii": format!("S{i:09}")
                })
            })
            .collect()
    }

    fn page_body(total: u64, entries: Vec<Value>, next: Option<&str>) -> Value {
        let mut links = vec![serde_json::json!({"@ref": "self", "@href": "ignored"})];
        if let Some(next) = next {
            links.push(serde_json::json!({"@ref": "next", "@href": next}));
        }
        serde_json::json!({
            "search-results": {
                "opensearch:totalResults": total.to_string(),
                "entry": entries,
                "link": links
            }
        })
    }

    #[test]
    fn uri_is_derived_from_query_and_index() {
        let search = Search::new("heart attack AND stroke", SearchIndex::Scopus);
        assert_eq!(
            search.uri(),
            "https://api.elsevier.com/content/search/scopus?query=heart attack AND stroke"
        );
    }

    #[test]
    fn has_all_results_is_false_before_execution() {
        let search = Search::new("x", SearchIndex::Author);
        assert!(!search.has_all_results());
        assert_eq!(search.result_count(), 0);
        assert!(search.results().is_none());
    }

    #[tokio::test]
    async fn execute_retrieves_first_page_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(37, entries(0, 25), Some("unused"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        search.execute(&client).await.unwrap();

        assert_eq!(search.result_count(), 25);
        assert_eq!(search.total_results(), Some(37));
        assert!(search.result_count() as u64 <= search.total_results().unwrap());
        assert!(!search.has_all_results());
    }

    #[tokio::test]
    async fn execute_all_follows_next_links_until_complete() {
        let server = MockServer::start().await;
        let next = format!("{}/page/1", server.uri());
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_body(37, entries(0, 25), Some(&next))),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(37, entries(25, 12), None)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        search.execute_all(&client).await.unwrap();

        assert_eq!(search.result_count(), 37);
        assert_eq!(search.total_results(), Some(37));
        assert!(search.has_all_results());
    }

    #[tokio::test]
    async fn execute_all_stops_at_retrieval_ceiling() {
        let server = MockServer::start().await;
        let page_len = 1000;
        let total = 12_000;

        let first_next = format!("{}/page/1", server.uri());
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                total,
                entries(0, page_len),
                Some(&first_next),
            )))
            .expect(1)
            .mount(&server)
            .await;
        for page in 1..5 {
            let next = format!("{}/page/{}", server.uri(), page + 1);
            Mock::given(method("GET"))
                .and(path(format!("/page/{page}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                    total,
                    entries(page * page_len, page_len),
                    Some(&next),
                )))
                .expect(1)
                .mount(&server)
                .await;
        }

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        search.execute_all(&client).await.unwrap();

        assert_eq!(search.result_count(), MAX_RETRIEVED_RESULTS);
        assert_eq!(search.total_results(), Some(total));
        assert!(!search.has_all_results());
    }

    #[tokio::test]
    async fn execute_all_fails_when_next_link_is_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(50, entries(0, 25), None)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        let err = search.execute_all(&client).await.unwrap_err();

        assert!(matches!(err, ScopusError::Api { .. }));
        assert!(err.to_string().contains("next"));
    }

    #[tokio::test]
    async fn execute_all_stops_on_empty_follow_up_page() {
        let server = MockServer::start().await;
        let next = format!("{}/page/1", server.uri());
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_body(50, entries(0, 25), Some(&next))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(50, vec![], None)))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        search.execute_all(&client).await.unwrap();

        assert_eq!(search.result_count(), 25);
        assert!(!search.has_all_results());
    }

    #[tokio::test]
    async fn re_executing_overwrites_previous_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/search/scopus"))
            .and(query_param("query", "cancer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_body(37, entries(0, 25), Some("unused"))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search = Search::new("cancer", SearchIndex::Scopus).with_base(server.uri());
        search.execute(&client).await.unwrap();
        search.execute(&client).await.unwrap();

        assert_eq!(search.result_count(), 25);
    }

    #[tokio::test]
    async fn execute_accepts_numeric_total_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/search/author"))
            .and(query_param("query", "authlast(einstein)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "search-results": {
                    "opensearch:totalResults": 2,
                    "entry": [{"dc:identifier": "AUTHOR_ID:1"}, {"dc:identifier": "AUTHOR_ID:2"}]
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let mut search =
            Search::new("authlast(einstein)", SearchIndex::Author).with_base(server.uri());
        search.execute(&client).await.unwrap();

        assert_eq!(search.total_results(), Some(2));
        assert!(search.has_all_results());
    }

    #[test]
    fn write_to_persists_pii_summary_keyed_by_query() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());

        let mut search = Search::new("cancer", SearchIndex::ScienceDirect);
        search.results = Some(vec![
            serde_json::json!({"pii": "S000000001"}),
            serde_json::json!({"pii": "S000000002"}),
        ]);
        search.total_results = Some(2);

        let path = search.write_to(&store).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "cancer.json");
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, r#"{"cancer":["S000000001","S000000002"]}"#);
    }

    #[test]
    fn write_to_falls_back_when_any_record_lacks_pii() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());

        let mut search = Search::new("cancer", SearchIndex::ScienceDirect);
        search.results = Some(vec![
            serde_json::json!({"pii": "S000000001"}),
            serde_json::json!({"dc:identifier": "SCOPUS_ID:2"}),
        ]);

        let path = search.write_to(&store).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, r#"{"cancer":"No results."}"#);
    }

    #[test]
    fn write_to_without_execution_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());

        let search = Search::new("cancer", SearchIndex::Scopus);
        let err = search.write_to(&store).unwrap_err();
        assert!(matches!(err, ScopusError::MissingData(_)));
    }

    #[test]
    fn write_to_truncates_long_query_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirStore::new(tmp.path());

        let query = "q".repeat(140);
        let mut search = Search::new(query.clone(), SearchIndex::Scopus);
        search.results = Some(vec![]);

        let path = search.write_to(&store).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 100 + ".json".len());
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.get(&query).unwrap(), &serde_json::json!([]));
    }
}
