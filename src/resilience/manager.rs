//! # Circuit Breaker Manager
//!
//! One breaker per named dependency, created lazily on first use. Provides
//! centralized operator overrides and metrics aggregation.

use crate::resilience::{CircuitBreaker, CircuitBreakerConfig, SystemCircuitBreakerMetrics};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug)]
pub struct CircuitBreakerManager {
    /// Collection of circuit breakers by component name
    circuit_breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,

    default_config: CircuitBreakerConfig,

    /// Per-component overrides of `default_config`
    component_configs: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerManager {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            circuit_breakers: Arc::new(RwLock::new(HashMap::new())),
            default_config,
            component_configs: HashMap::new(),
        }
    }

    /// Use a dedicated configuration for `component`
    pub fn with_component_config(
        mut self,
        component: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.component_configs.insert(component.into(), config);
        self
    }

    pub fn config_for_component(&self, component: &str) -> &CircuitBreakerConfig {
        self.component_configs
            .get(component)
            .unwrap_or(&self.default_config)
    }

    /// Get or create circuit breaker for a component
    pub async fn get_circuit_breaker(&self, component_name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.circuit_breakers.read().await;
            if let Some(breaker) = breakers.get(component_name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.circuit_breakers.write().await;

        // Double-check pattern (another task might have created it)
        if let Some(breaker) = breakers.get(component_name) {
            return Arc::clone(breaker);
        }

        let breaker = Arc::new(CircuitBreaker::new(
            component_name,
            self.config_for_component(component_name).clone(),
        ));
        breakers.insert(component_name.to_string(), Arc::clone(&breaker));

        info!(
            component = component_name,
            total_circuit_breakers = breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Get all circuit breaker names
    pub async fn list_components(&self) -> Vec<String> {
        let breakers = self.circuit_breakers.read().await;
        let mut names: Vec<String> = breakers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Force a component's circuit open, creating the breaker if needed
    pub async fn force_open(&self, component_name: &str) {
        self.get_circuit_breaker(component_name).await.force_open();
    }

    /// Force a component's circuit closed; unknown components are ignored
    pub async fn force_closed(&self, component_name: &str) {
        let breakers = self.circuit_breakers.read().await;
        match breakers.get(component_name) {
            Some(breaker) => breaker.force_closed(),
            None => warn!(
                component = component_name,
                "Cannot force-close unknown circuit breaker"
            ),
        }
    }

    pub async fn system_metrics(&self) -> SystemCircuitBreakerMetrics {
        let breakers = self.circuit_breakers.read().await;
        SystemCircuitBreakerMetrics::new(
            breakers
                .iter()
                .map(|(name, breaker)| (name.clone(), breaker.metrics()))
                .collect(),
        )
    }
}
