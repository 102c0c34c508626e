// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Database role configuration for a data hub deployment
//!
//! A [`HubConfig`] resolves the logical database roles of a hub (staging
//! and final content, jobs, modules, triggers and schemas) into database
//! names, application server settings, forest counts and TLS material.
//! Overrides are read from `.properties` files through
//! [`ConfigurationSource`]. The resolved state is exposed as connection
//! descriptors for the database client and as the `%%token%%` map used by
//! the deployment step.

pub mod defaults;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod hub_config;
pub mod loader;
pub mod registry;
pub mod role;
pub mod security;
pub mod shared;
pub mod source;
pub mod tokens;

pub use descriptor::{ConnectionDescriptor, DeploymentTarget, StaticTarget};
pub use error::{HubConfigError, Result};
pub use hub_config::{GlobalSettings, HubConfig, HubIdentity};
pub use registry::RoleRegistry;
pub use role::{AuthMethod, DatabaseRole, Scheme, Tier};
pub use shared::SharedHubConfig;
pub use source::ConfigurationSource;
pub use tokens::{PasswordPolicy, TokenEngine, TokenMap};
