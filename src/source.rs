// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Key/value override sources
//!
//! A [`ConfigurationSource`] is the flat string map the loader reads
//! overrides from. It is usually read from the project's
//! `gradle.properties` file, optionally layered with the environment
//! specific `gradle-<env>.properties` file.

use crate::error::{HubConfigError, Result};
use ini::{Ini, ParseOption};
use log::*;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

pub static BASE_PROPERTIES_FILE: &str = "gradle.properties";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigurationSource {
    entries: BTreeMap<String, String>,
}

impl ConfigurationSource {
    pub fn new() -> Self {
        ConfigurationSource::default()
    }

    /// Read `key=value` pairs from a properties file
    ///
    /// Quotes and backslashes are kept as written, since values such as
    /// passwords and Windows paths are taken literally.
    pub fn from_properties_file(path: &Path) -> Result<Self> {
        let opt = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let conf = Ini::load_from_file_opt(path, opt).map_err(|source| {
            HubConfigError::PropertiesFile {
                path: path.display().to_string(),
                source,
            }
        })?;

        let mut entries = BTreeMap::new();
        for (_, section) in conf.iter() {
            for (key, value) in section.iter() {
                let _ = entries.insert(key.to_string(), value.to_string());
            }
        }
        debug!(
            "Read {} properties from {}",
            entries.len(),
            path.display()
        );

        Ok(ConfigurationSource { entries })
    }

    /// Read `gradle.properties` from the project directory, overlaid with
    /// `gradle-<env>.properties` when `env` is given and the file exists
    pub fn from_environment(
        project_dir: &Path,
        env: Option<&str>,
    ) -> Result<Self> {
        let mut source = ConfigurationSource::from_properties_file(
            &project_dir.join(BASE_PROPERTIES_FILE),
        )?;

        if let Some(env) = env {
            let overlay = environment_properties_file(project_dir, env);
            if overlay.is_file() {
                source.merge(ConfigurationSource::from_properties_file(
                    &overlay,
                )?);
            } else {
                debug!(
                    "No properties file for environment '{env}' at {}, skipping",
                    overlay.display()
                );
            }
        }

        Ok(source)
    }

    /// Layer `other` over this source. Keys present in both take the value
    /// from `other`.
    pub fn merge(&mut self, other: ConfigurationSource) {
        self.entries.extend(other.entries);
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of `key` with surrounding whitespace removed. Blank values
    /// count as unset.
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Path of the properties overlay for `env`
pub fn environment_properties_file(project_dir: &Path, env: &str) -> PathBuf {
    project_dir.join(format!("gradle-{env}.properties"))
}

// Values may hold passwords, so only the keys are printed
impl fmt::Debug for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationSource")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigurationSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ConfigurationSource {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
