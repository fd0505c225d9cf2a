//! Configuration builders for tests.

use crate::config::{BrunataConfig, InfluxConfig};
use crate::test_utils::mocks::{MockBrunataServerBuilder, TEST_CLIENT_ID, TEST_POLICY};

/// Builder for Brunata configurations pointed at a test server.
#[derive(Debug)]
pub struct TestBrunataConfigBuilder {
    config: BrunataConfig,
}

impl TestBrunataConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BrunataConfig {
                username: "user@example.com".to_string(),
                password: "secret".to_string(),
                base_url: "http://test.local".to_string(),
                auth_url: "http://test.local/tenant".to_string(),
                policy: TEST_POLICY.to_string(),
                client_id: TEST_CLIENT_ID.to_string(),
                request_timeout_sec: 10,
                metrics: None,
                tie_break: None,
            },
        }
    }

    /// Routes both the broker and the data API to the mock server.
    pub fn with_server(mut self, server: &MockBrunataServerBuilder) -> Self {
        self.config.base_url = server.url();
        self.config.auth_url = format!("{}/tenant", server.url());
        self
    }

    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.config.metrics = Some(metrics.into());
        self
    }

    pub fn with_tie_break(mut self, tie_break: impl Into<String>) -> Self {
        self.config.tie_break = Some(tie_break.into());
        self
    }

    pub fn build(self) -> BrunataConfig {
        self.config
    }
}

/// Builder for creating test InfluxDB configurations.
#[derive(Debug)]
pub struct TestInfluxConfigBuilder {
    url: String,
    org: String,
    token: String,
    bucket: String,
}

impl TestInfluxConfigBuilder {
    pub fn new() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            org: "test-org".to_string(),
            token: "test-token".to_string(),
            bucket: "test-bucket".to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn build(self) -> InfluxConfig {
        InfluxConfig {
            url: self.url,
            org: self.org,
            token: self.token,
            bucket: self.bucket,
        }
    }
}

/// A Brunata configuration for the given mock server.
pub fn test_brunata_config(server: &MockBrunataServerBuilder) -> BrunataConfig {
    TestBrunataConfigBuilder::new().with_server(server).build()
}

/// An InfluxDB configuration for the given mock server URL.
pub fn test_influx_config_with_url(url: impl Into<String>) -> InfluxConfig {
    TestInfluxConfigBuilder::new().with_url(url).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brunata_config_builder() {
        let config = TestBrunataConfigBuilder::new()
            .with_metrics("heat=Heating")
            .with_tie_break("sum")
            .build();

        assert_eq!(config.base_url, "http://test.local");
        assert_eq!(config.metrics.as_deref(), Some("heat=Heating"));
        assert!(config.metric_mapping().is_ok());
        assert!(config.tie_break().is_ok());
        assert!(config.endpoints().is_ok());
    }

    #[test]
    fn test_influx_config_builder() {
        let config = TestInfluxConfigBuilder::new()
            .with_url("http://influx.local")
            .with_bucket("my-bucket")
            .build();

        assert_eq!(config.url, "http://influx.local");
        assert_eq!(config.org, "test-org");
        assert_eq!(config.bucket, "my-bucket");
    }
}
