// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

use crate::role::{AuthMethod, DatabaseRole, Scheme};

pub static DEFAULT_STAGING_NAME: &str = "data-hub-STAGING";
pub static DEFAULT_FINAL_NAME: &str = "data-hub-FINAL";
pub static DEFAULT_JOB_NAME: &str = "data-hub-JOBS";
pub static DEFAULT_STAGING_MODULES_DB_NAME: &str = "data-hub-MODULES";
pub static DEFAULT_FINAL_MODULES_DB_NAME: &str = "data-hub-MODULES";
pub static DEFAULT_STAGING_TRIGGERS_DB_NAME: &str =
    "data-hub-staging-TRIGGERS";
pub static DEFAULT_FINAL_TRIGGERS_DB_NAME: &str = "data-hub-final-TRIGGERS";
pub static DEFAULT_STAGING_SCHEMAS_DB_NAME: &str = "data-hub-staging-SCHEMAS";
pub static DEFAULT_FINAL_SCHEMAS_DB_NAME: &str = "data-hub-final-SCHEMAS";

pub static DEFAULT_STAGING_PORT: u16 = 8010;
pub static DEFAULT_FINAL_PORT: u16 = 8011;
pub static DEFAULT_JOB_PORT: u16 = 8013;

pub static DEFAULT_AUTH_METHOD: AuthMethod = AuthMethod::Digest;
pub static DEFAULT_SCHEME: Scheme = Scheme::Http;

/// Forests per host for the staging and final content databases
pub static DEFAULT_FORESTS_PER_HOST: u32 = 3;
/// Forests per host for every other database
pub static DEFAULT_AUX_FORESTS_PER_HOST: u32 = 1;

pub static DEFAULT_ROLE_NAME: &str = "data-hub-role";
pub static DEFAULT_USER_NAME: &str = "data-hub-user";
pub static DEFAULT_ADMIN_ROLE_NAME: &str = "hub-admin-role";
pub static DEFAULT_ADMIN_USER_NAME: &str = "hub-admin-user";

pub static DEFAULT_HOST: &str = "localhost";
pub static DEFAULT_CUSTOM_FOREST_PATH: &str = "forests";
pub static DEFAULT_MODULE_PERMISSIONS: &str =
    "rest-reader,read,rest-writer,insert,rest-writer,update,rest-extension-user,execute";
pub static DEFAULT_HUB_VERSION: &str = "4.0.0";

pub static HUB_MODULES_DEPLOY_TIMESTAMPS_PROPERTIES: &str =
    "hub-modules-deploy-timestamps.properties";
pub static USER_MODULES_DEPLOY_TIMESTAMPS_PROPERTIES: &str =
    "user-modules-deploy-timestamps.properties";
pub static USER_CONTENT_DEPLOY_TIMESTAMPS_PROPERTIES: &str =
    "user-content-deploy-timestamps.properties";

/// Compiled-in database name for a role
pub fn default_database_name(role: DatabaseRole) -> &'static str {
    match role.canonical() {
        DatabaseRole::Staging => DEFAULT_STAGING_NAME,
        DatabaseRole::Final => DEFAULT_FINAL_NAME,
        DatabaseRole::Job | DatabaseRole::Trace => DEFAULT_JOB_NAME,
        DatabaseRole::StagingModules => DEFAULT_STAGING_MODULES_DB_NAME,
        DatabaseRole::FinalModules => DEFAULT_FINAL_MODULES_DB_NAME,
        DatabaseRole::StagingTriggers => DEFAULT_STAGING_TRIGGERS_DB_NAME,
        DatabaseRole::FinalTriggers => DEFAULT_FINAL_TRIGGERS_DB_NAME,
        DatabaseRole::StagingSchemas => DEFAULT_STAGING_SCHEMAS_DB_NAME,
        DatabaseRole::FinalSchemas => DEFAULT_FINAL_SCHEMAS_DB_NAME,
    }
}

/// Compiled-in application server port, for roles that have one
pub fn default_port(role: DatabaseRole) -> Option<u16> {
    match role.canonical() {
        DatabaseRole::Staging => Some(DEFAULT_STAGING_PORT),
        DatabaseRole::Final => Some(DEFAULT_FINAL_PORT),
        DatabaseRole::Job => Some(DEFAULT_JOB_PORT),
        _ => None,
    }
}
