//! Outgoing backend request description.
//!
//! Requests are plain data so the pipeline can send the same request twice:
//! once with the token it had, and once more after a refresh.

use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::endpoints;

/// A request to the CMS backend, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl std::fmt::Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Login, register and refresh never trigger a refresh on 401: their 401
    /// means bad credentials, not an expired access token.
    #[must_use]
    pub fn is_auth_endpoint(&self) -> bool {
        let path = self.path.split('?').next().unwrap_or_default();
        endpoints::NO_REFRESH_SUFFIXES
            .iter()
            .any(|suffix| path.contains(suffix))
    }

    /// Resolve against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `url::ParseError` if the joined URL is invalid.
    pub fn url(&self, base_url: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), self.path))?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoint_detection() {
        assert!(ApiRequest::post(endpoints::LOGIN, Value::Null).is_auth_endpoint());
        assert!(ApiRequest::post(endpoints::REGISTER, Value::Null).is_auth_endpoint());
        assert!(ApiRequest::post(endpoints::REFRESH, Value::Null).is_auth_endpoint());
        assert!(!ApiRequest::get(endpoints::ME).is_auth_endpoint());
        assert!(!ApiRequest::post(endpoints::LOGOUT, Value::Null).is_auth_endpoint());
        assert!(!ApiRequest::get("/v1/admin/projects").is_auth_endpoint());
    }

    #[test]
    fn test_url_joins_base_and_query() {
        let request = ApiRequest::get("/v1/admin/projects")
            .with_query("page", 2)
            .with_query("limit", 10);
        let url = request.url("http://localhost:8080/api/").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/admin/projects?page=2&limit=10"
        );
    }

    #[test]
    fn test_url_without_query() {
        let url = ApiRequest::delete("/v1/admin/tags/7")
            .url("https://cms.example.com")
            .unwrap();
        assert_eq!(url.as_str(), "https://cms.example.com/v1/admin/tags/7");
        assert!(url.query().is_none());
    }
}
