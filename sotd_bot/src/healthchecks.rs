use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{event, Level};

use sotd_common::prelude::*;
use sotd_storage::prelude::*;

use crate::catalog::spotify::SpotifyClient;

#[derive(Serialize, Debug)]
pub struct HealthCheck {
    pub time: i64,
    pub check_type: CheckType,
    pub success: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum CheckType {
    Storage,
    Catalog,
}

/// A missing song store is healthy, it gets created on the first change.
pub fn check_storage(path: &Path) -> HealthCheck {
    let start = Utc::now();
    event!(Level::TRACE, %start, "Starting storage health check");

    let result = Store::read_document(path);
    if let Err(error) = &result {
        event!(Level::WARN, %error, "Storage health check failed");
    }

    HealthCheck {
        check_type: CheckType::Storage,
        time: (Utc::now() - start).num_milliseconds(),
        success: result.is_ok(),
    }
}

pub async fn check_catalog(catalog: &SpotifyClient) -> HealthCheck {
    let start = Utc::now();
    event!(Level::TRACE, %start, "Starting catalog health check");

    let result = catalog.check_credentials().await;
    if let Err(error) = &result {
        event!(Level::WARN, %error, "Catalog health check failed");
    }

    HealthCheck {
        check_type: CheckType::Catalog,
        time: (Utc::now() - start).num_milliseconds(),
        success: result.is_ok(),
    }
}

pub async fn perform_healthchecks(config: &SotdConfig) -> Result<String> {
    event!(Level::DEBUG, "Performing health checks");

    let catalog = SpotifyClient::new(config);
    let checks = vec![
        check_storage(Path::new(&config.data_file)),
        check_catalog(&catalog).await,
    ];

    let result = serde_json::to_string_pretty(&checks)
        .with_context(|| "Error serializing health check json")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_is_healthy() {
        let dir = tempfile::tempdir().unwrap();

        let check = check_storage(&dir.path().join("sotd_data.json"));

        assert_eq!(CheckType::Storage, check.check_type);
        assert!(check.success);
    }

    #[test]
    fn corrupt_store_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sotd_data.json");
        std::fs::write(&path, "[1, 2").unwrap();

        assert!(!check_storage(&path).success);
    }
}
