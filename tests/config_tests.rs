//! Configuration loading from the shipped TOML file and the environment.

use route_orchestrator::config::{ConfigManager, OrchestratorConfig};
use std::path::Path;

const SHIPPED_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/route-orchestrator.toml");

#[test]
fn test_shipped_config_matches_defaults() {
    let manager = ConfigManager::load_from_file(Path::new(SHIPPED_CONFIG)).unwrap();
    assert_eq!(manager.config(), &OrchestratorConfig::default());
}

#[test]
fn test_environment_overrides_file() {
    // The only test in this binary that touches the environment
    std::env::set_var("ROUTE_ORCHESTRATOR__RETRY__MAX_ATTEMPTS", "5");
    std::env::set_var("ROUTE_ORCHESTRATOR__TIMEOUTS__CANCEL_MS", "750");

    let loaded = ConfigManager::load_with_env(Some(Path::new(SHIPPED_CONFIG)));

    std::env::remove_var("ROUTE_ORCHESTRATOR__RETRY__MAX_ATTEMPTS");
    std::env::remove_var("ROUTE_ORCHESTRATOR__TIMEOUTS__CANCEL_MS");

    let config = loaded.unwrap().into_config();
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.timeouts.cancel_ms, 750);
    assert_eq!(config.timeouts.schedule_ms, 500);
}
