//! Civo API client
//!
//! A thin typed layer over `reqwest`: one method per API call that a resource
//! or data source needs. Every call is scoped to a region, sent as the
//! `region` query parameter on GET/DELETE and as a body field on POST/PUT.

mod catalog;
mod databases;
mod dns;
mod error;
mod firewalls;
mod instances;
mod kubernetes;
mod loadbalancers;
mod networks;
mod object_stores;
mod reserved_ips;
mod ssh_keys;
mod volumes;

pub use catalog::*;
pub use databases::*;
pub use dns::*;
pub use error::{ClientError, ClientResult};
pub use firewalls::*;
pub use instances::*;
pub use kubernetes::*;
pub use loadbalancers::*;
pub use networks::*;
pub use object_stores::*;
pub use reserved_ips::*;
pub use ssh_keys::*;
pub use volumes::*;

use log::debug;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.civo.com";

const PER_PAGE: u32 = 100;

/// Response body of action endpoints (`{"result": "success"}`)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimpleResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_reason: String,
}

/// One page of a paginated list endpoint
#[derive(Debug, Deserialize)]
pub struct PaginatedList<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct CivoClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    region: String,
}

impl CivoClient {
    pub fn new(
        token: impl Into<String>,
        region: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ClientResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::InvalidEndpoint(base_url));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("civoform/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token: token.into(),
            region: region.into(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Same client scoped to another region; `None` keeps the current one
    pub fn in_region(&self, region: Option<&str>) -> CivoClient {
        match region {
            Some(r) if !r.is_empty() && r != self.region => CivoClient {
                region: r.to_string(),
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!("{} {}{} (region {})", method, self.base_url, path, self.region);
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    /// Body with the client region merged in unless the caller set one
    fn with_region<B: Serialize>(&self, body: &B) -> ClientResult<serde_json::Value> {
        let mut value = serde_json::to_value(body).map_err(|source| ClientError::Decode {
            path: "request body".to_string(),
            source,
        })?;
        if let serde_json::Value::Object(map) = &mut value {
            map.entry("region")
                .or_insert_with(|| serde_json::Value::String(self.region.clone()));
        }
        Ok(value)
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        // Some action endpoints answer with an empty body
        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.get_query(path, &[]).await
    }

    pub(crate) async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ClientResult<T> {
        let request = self
            .request(Method::GET, path)
            .query(&[("region", self.region.as_str())])
            .query(query);
        self.send(path, request).await
    }

    /// Fetch every page of a paginated list
    pub(crate) async fn get_all<T: DeserializeOwned>(&self, path: &str) -> ClientResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let list: PaginatedList<T> = self
                .get_query(
                    path,
                    &[("page", page.to_string()), ("per_page", PER_PAGE.to_string())],
                )
                .await?;
            if list.items.is_empty() {
                break;
            }
            items.extend(list.items);
            if list.pages <= page {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    pub(crate) async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.request(Method::POST, path).json(&self.with_region(body)?);
        self.send(path, request).await
    }

    pub(crate) async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let request = self.request(Method::PUT, path).json(&self.with_region(body)?);
        self.send(path, request).await
    }

    pub(crate) async fn delete(&self, path: &str) -> ClientResult<SimpleResponse> {
        let request = self
            .request(Method::DELETE, path)
            .query(&[("region", self.region.as_str())]);
        self.send(path, request).await
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::testing::client;
    use super::*;

    #[test]
    fn rejects_endpoint_without_scheme() {
        assert!(matches!(
            CivoClient::new("t", "LON1", "api.civo.com"),
            Err(ClientError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn in_region_switches_only_when_different() {
        let client = CivoClient::new("t", "LON1", "https://api.civo.com/").unwrap();
        assert_eq!(client.in_region(None).region(), "LON1");
        assert_eq!(client.in_region(Some("")).region(), "LON1");
        assert_eq!(client.in_region(Some("NYC1")).region(), "NYC1");
        assert_eq!(client.base_url, "https://api.civo.com");
    }

    #[tokio::test]
    async fn get_sends_auth_and_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/sshkeys/abc"))
            .and(query_param("region", "LON1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc", "name": "laptop", "public_key": "ssh-ed25519 AAAA", "fingerprint": "SHA256:x"
            })))
            .mount(&server)
            .await;

        let key = client(&server).get_ssh_key("abc").await.unwrap();
        assert_eq!(key.name, "laptop");
    }

    #[tokio::test]
    async fn post_merges_region_into_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/sshkeys"))
            .and(body_partial_json(json!({"name": "laptop", "region": "LON1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "k1", "result": "success"})),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .create_ssh_key("laptop", "ssh-ed25519 AAAA")
            .await
            .unwrap();
        assert_eq!(result.id, "k1");
    }

    #[tokio::test]
    async fn pagination_is_followed_to_the_last_page() {
        let server = MockServer::start().await;
        for page in 1..=2 {
            Mock::given(method("GET"))
                .and(path("/v2/instances"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "page": page, "per_page": 100, "pages": 2,
                    "items": [{"id": format!("i{}", page), "hostname": format!("web-{}", page)}]
                })))
                .mount(&server)
                .await;
        }

        let instances = client(&server).list_instances().await.unwrap();
        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }

    #[tokio::test]
    async fn pagination_stops_at_an_empty_page() {
        let server = MockServer::start().await;
        let pages = [json!([{"id": "i1", "hostname": "web-1"}]), json!([]), json!([])];
        for (page, items) in pages.into_iter().enumerate() {
            let page = page + 1;
            Mock::given(method("GET"))
                .and(path("/v2/instances"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "page": page, "per_page": 100, "pages": 5, "items": items
                })))
                .expect(if page <= 2 { 1 } else { 0 })
                .mount(&server)
                .await;
        }

        let instances = client(&server).list_instances().await.unwrap();
        let ids: Vec<_> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1"]);
    }

    #[tokio::test]
    async fn api_errors_are_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/volumes/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": "database_volume_not_found", "reason": "The requested volume could not be found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_volume("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn empty_body_decodes_as_simple_response() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/networks/n1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = client(&server).delete_network("n1").await.unwrap();
        assert_eq!(result.result, "");
    }
}
