use crate::api::locators::Locators;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub struct CatalogClient {
    http: reqwest::Client,
    config: Arc<AppConfig>,
    locators: Locators,
}

impl CatalogClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let locators = Locators::new(&config);

        Ok(Self {
            http,
            config,
            locators,
        })
    }

    pub fn config(&self) -> &Arc<AppConfig> {
        &self.config
    }

    pub fn locators(&self) -> &Locators {
        &self.locators
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// GET an endpoint under the API prefix and decode its JSON body.
    pub async fn get_api<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = self.config.api_url(endpoint);
        self.get_json(&url, query).await
    }

    /// GET a path directly under the base URL and decode its JSON body.
    pub async fn get_base<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = self.config.base_url(path);
        self.get_json(&url, query).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        log::debug!("[catalog] GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .headers(Self::json_headers())
            .query(query)
            .send()
            .await?;
        let response = self.check_response(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check_response(&self, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(AppError::NotFound(response.url().path().to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(AppError::Catalog {
                status: status.as_u16(),
                message,
            })
        }
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }
}
