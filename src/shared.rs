// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Thread-safe handle to a [`HubConfig`]
//!
//! Loads and setters take the write lock; descriptor and token builders
//! take the read lock. A lock poisoned by a panicking writer is reported
//! as [`HubConfigError::LockPoisoned`].

use crate::{
    descriptor::{ConnectionDescriptor, DeploymentTarget},
    error::{HubConfigError, Result},
    hub_config::HubConfig,
    role::DatabaseRole,
    source::ConfigurationSource,
    tokens::{TokenEngine, TokenMap},
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone, Default)]
pub struct SharedHubConfig {
    inner: Arc<RwLock<HubConfig>>,
}

impl From<HubConfig> for SharedHubConfig {
    fn from(config: HubConfig) -> Self {
        SharedHubConfig {
            inner: Arc::new(RwLock::new(config)),
        }
    }
}

impl SharedHubConfig {
    pub fn new(config: HubConfig) -> Self {
        SharedHubConfig::from(config)
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, HubConfig>> {
        self.inner.read().map_err(|_| HubConfigError::LockPoisoned)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, HubConfig>> {
        self.inner.write().map_err(|_| HubConfigError::LockPoisoned)
    }

    pub fn load(&self, source: Option<ConfigurationSource>) -> Result<()> {
        self.write()?.load(source)
    }

    /// Run `f` with exclusive access to the configuration
    ///
    /// `f` works on a copy that replaces the configuration only when `f`
    /// returns `Ok`.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut HubConfig) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.write()?;
        let mut staged = (*guard).clone();
        let value = f(&mut staged)?;
        *guard = staged;
        Ok(value)
    }

    pub fn build_connection_descriptor(
        &self,
        role: DatabaseRole,
        target: &dyn DeploymentTarget,
    ) -> Result<ConnectionDescriptor> {
        self.read()?.build_connection_descriptor(role, target)
    }

    pub fn build_token_map(&self, existing: TokenMap) -> Result<TokenMap> {
        self.read()?.build_token_map(existing)
    }

    pub fn build_token_map_with(
        &self,
        engine: &TokenEngine,
        existing: TokenMap,
    ) -> Result<TokenMap> {
        engine.build_token_map(&*self.read()?, existing)
    }

    /// Copy of the current configuration
    pub fn snapshot(&self) -> Result<HubConfig> {
        Ok(self.read()?.clone())
    }
}
