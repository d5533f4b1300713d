use crate::config::GrabConfig;
use crate::error::FetchError;
use std::io::Read;

pub type HeaderList = Vec<(String, String)>;

/// Blocking GET capability shared by every worker of a crawl.
pub trait Fetcher: Sync {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>, FetchError>;

    /// Like `get`, but a body shorter than the declared `Content-Length` is an error.
    fn get_binary(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>, FetchError> {
        self.get(url, headers)
    }
}

/// Fixed identifying headers plus the crawl's `Referer`.
pub fn request_headers(user_agent: &str, referer: &str) -> HeaderList {
    vec![
        ("User-Agent".to_string(), user_agent.to_string()),
        ("Referer".to_string(), referer.to_string()),
    ]
}

pub fn check_content_length(declared: Option<u64>, received: usize) -> Result<(), FetchError> {
    match declared {
        Some(expected) if (received as u64) < expected => Err(FetchError::TruncatedDownload {
            expected,
            received: received as u64,
        }),
        _ => Ok(()),
    }
}

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(config: &GrabConfig) -> Self {
        let mut builder = ureq::Agent::config_builder();
        builder = builder
            .http_status_as_error(false)
            .timeout_global(Some(config.http_timeout()));
        let agent: ureq::Agent = builder.build().into();
        Self { agent }
    }

    fn call(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<ureq::http::Response<ureq::Body>, FetchError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .call()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Server(status));
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>, FetchError> {
        let mut response = self.call(url, headers)?;
        let mut data = Vec::new();
        response
            .body_mut()
            .as_reader()
            .read_to_end(&mut data)
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(data)
    }

    fn get_binary(&self, url: &str, headers: &[(String, String)]) -> Result<Vec<u8>, FetchError> {
        let mut response = self.call(url, headers)?;
        let declared = content_length(&response);
        let mut data = Vec::new();
        if let Err(err) = response.body_mut().as_reader().read_to_end(&mut data) {
            // A connection dropped mid-body is a short read, not a generic network failure.
            check_content_length(declared, data.len())?;
            return Err(FetchError::Network(err.to_string()));
        }
        check_content_length(declared, data.len())?;
        Ok(data)
    }
}

fn content_length(response: &ureq::http::Response<ureq::Body>) -> Option<u64> {
    response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
