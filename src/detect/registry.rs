use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::{DetectionEngine, SharedEngine};
use super::backends::StubEngine;

/// Named detection engines available to the host.
///
/// Engines are wrapped in `Mutex` because `DetectionEngine::detect` takes `&mut self`.
pub struct EngineRegistry {
    engines: HashMap<String, SharedEngine>,
    default_name: Option<String>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
            default_name: None,
        }
    }

    /// Registry with the engines that need no model files.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(StubEngine::new());
        registry
    }

    /// Register an engine. The first registered engine becomes the default.
    pub fn register<E: DetectionEngine + 'static>(&mut self, engine: E) {
        let name = engine.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.engines.insert(name, Arc::new(Mutex::new(engine)));
    }

    /// Set default engine by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.engines.contains_key(name) {
            return Err(anyhow!("detection engine '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedEngine> {
        self.engines.get(name).cloned()
    }

    pub fn default_engine(&self) -> Option<SharedEngine> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered engine names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve `name` and run its warm-up hook.
    pub fn prepare(&self, name: &str) -> Result<SharedEngine> {
        let engine = self
            .get(name)
            .ok_or_else(|| anyhow!("unknown detection engine '{}' (have: {:?})", name, self.list()))?;
        engine
            .lock()
            .map_err(|_| anyhow!("engine lock poisoned"))?
            .warm_up()
            .map_err(|e| anyhow!("warm up {}: {}", name, e))?;
        Ok(engine)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
