// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Keylime Authors

//! Deployment token map
//!
//! The deployment step replaces `%%name%%` placeholders in its manifests
//! with the values of a [`TokenMap`]. The [`TokenEngine`] projects a
//! [`HubConfig`] into such a map, fills in two freshly generated
//! passwords and passes through extra `ml*` settings from the loaded
//! source so manifests can use them without further support here.

use crate::{
    error::{HubConfigError, Result},
    hub_config::HubConfig,
    loader::is_recognized_key,
    role::DatabaseRole,
};
use log::*;
use openssl::rand::rand_bytes;
use regex::Regex;
use std::collections::BTreeMap;

pub type TokenMap = BTreeMap<String, String>;

/// Source keys matching this pattern are passed through to the token map
pub static DEFAULT_PASS_THROUGH_PATTERN: &str = "^ml[A-Z].+";

pub static HUB_USER_PASSWORD_TOKEN: &str = "%%mlHubUserPassword%%";
pub static HUB_ADMIN_USER_PASSWORD_TOKEN: &str = "%%mlHubAdminUserPassword%%";

/// Longest password a [`PasswordPolicy`] may ask for
pub static MAX_PASSWORD_LENGTH: usize = 4096;

/// Placeholder for a property key
pub fn placeholder(key: &str) -> String {
    format!("%%{key}%%")
}

/// Placeholder for a numeric property key, emitted already quoted so the
/// quotes around it in JSON manifests are replaced as well
pub fn quoted_placeholder(key: &str) -> String {
    format!("\"%%{key}%%\"")
}

/// Shape of the generated passwords
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub length: usize,
    /// Lowest and highest ASCII code point that may appear, inclusive
    pub min_code_point: u8,
    pub max_code_point: u8,
    /// Characters never used even though they are in range
    pub excluded: Vec<char>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        PasswordPolicy {
            length: 20,
            min_code_point: 33,
            max_code_point: 126,
            excluded: vec!['"', '\\'],
        }
    }
}

impl PasswordPolicy {
    /// The characters passwords are drawn from
    pub fn alphabet(&self) -> Vec<u8> {
        (self.min_code_point..=self.max_code_point)
            .filter(|b| b.is_ascii())
            .filter(|b| !self.excluded.contains(&char::from(*b)))
            .collect()
    }

    fn validate(&self) -> Result<Vec<u8>> {
        if self.length == 0 {
            return Err(HubConfigError::InvalidPolicy(
                "password length must be greater than zero".to_string(),
            ));
        }
        if self.length > MAX_PASSWORD_LENGTH {
            return Err(HubConfigError::InvalidPolicy(format!(
                "password length {} exceeds {MAX_PASSWORD_LENGTH}",
                self.length
            )));
        }
        let alphabet = self.alphabet();
        if alphabet.is_empty() {
            return Err(HubConfigError::InvalidPolicy(format!(
                "no characters left between code points {} and {}",
                self.min_code_point, self.max_code_point
            )));
        }
        Ok(alphabet)
    }

    /// Generate one password, uniformly over the alphabet
    pub fn generate(&self) -> Result<String> {
        let alphabet = self.validate()?;
        // Bytes at or above the largest multiple of the alphabet size are
        // rejected so every character is equally likely
        let n = alphabet.len();
        let limit = 256 - (256 % n);

        let mut password = String::with_capacity(self.length);
        let mut buf = [0u8; 64];
        while password.len() < self.length {
            rand_bytes(&mut buf).map_err(|source| {
                HubConfigError::tls("failed to generate random bytes", source)
            })?;
            for b in buf.iter().map(|b| *b as usize) {
                if b < limit && password.len() < self.length {
                    password.push(char::from(alphabet[b % n]));
                }
            }
        }
        Ok(password)
    }
}

/// Builds token maps from a hub configuration
#[derive(Debug, Clone)]
pub struct TokenEngine {
    policy: PasswordPolicy,
    pass_through: Regex,
}

impl TokenEngine {
    pub fn new(policy: PasswordPolicy, pass_through: &str) -> Result<Self> {
        let _ = policy.validate()?;
        let pass_through = Regex::new(pass_through).map_err(|e| {
            HubConfigError::InvalidPolicy(format!(
                "invalid pass-through pattern '{pass_through}': {e}"
            ))
        })?;
        Ok(TokenEngine {
            policy,
            pass_through,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        TokenEngine::new(PasswordPolicy::default(), DEFAULT_PASS_THROUGH_PATTERN)
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Merge the tokens of `config` into `existing`
    ///
    /// Tokens already present in `existing` keep their value, except the
    /// two generated passwords which are replaced on every call.
    pub fn build_token_map(
        &self,
        config: &HubConfig,
        existing: TokenMap,
    ) -> Result<TokenMap> {
        let mut tokens = existing;
        let registry = config.registry();

        let mut fill = |key: String, value: String| {
            let _ = tokens.entry(key).or_insert(value);
        };

        let globals = config.globals();
        fill(placeholder("mlHost"), globals.host.clone());

        for role in [DatabaseRole::Staging, DatabaseRole::Final, DatabaseRole::Job]
        {
            let prefix = role.property_prefix();
            fill(
                placeholder(&format!("{prefix}AppserverName")),
                registry.server_name(role)?.to_string(),
            );
            fill(
                quoted_placeholder(&format!("{prefix}Port")),
                registry.port(role)?.to_string(),
            );
            fill(
                placeholder(&format!("{prefix}Auth")),
                registry.auth_method(role)?.to_string(),
            );
        }

        for role in DatabaseRole::STORED {
            let prefix = role.property_prefix();
            fill(
                placeholder(&format!("{prefix}DbName")),
                registry.database_name(role).to_string(),
            );
            fill(
                placeholder(&format!("{prefix}ForestsPerHost")),
                registry.forests_per_host(role).to_string(),
            );
        }

        let identity = config.identity();
        fill(placeholder("mlHubUserRole"), identity.hub_role_name.clone());
        fill(placeholder("mlHubUserName"), identity.hub_user_name.clone());
        fill(
            placeholder("mlHubAdminRole"),
            identity.hub_admin_role_name.clone(),
        );
        fill(
            placeholder("mlHubAdminUserName"),
            identity.hub_admin_user_name.clone(),
        );

        fill(
            placeholder("mlCustomForestPath"),
            globals.custom_forest_path.clone(),
        );
        fill(placeholder("mlHubVersion"), globals.hub_version.clone());

        // Keys the loader parsed are represented by their typed settings
        for (key, value) in config.source().iter() {
            if self.pass_through.is_match(key) && !is_recognized_key(key) {
                fill(placeholder(key), value.to_string());
            }
        }

        let _ = tokens.insert(
            HUB_USER_PASSWORD_TOKEN.to_string(),
            self.policy.generate()?,
        );
        let _ = tokens.insert(
            HUB_ADMIN_USER_PASSWORD_TOKEN.to_string(),
            self.policy.generate()?,
        );

        debug!("Built token map with {} tokens", tokens.len());
        Ok(tokens)
    }
}

impl HubConfig {
    /// Build the token map with the default password policy and
    /// pass-through pattern
    pub fn build_token_map(&self, existing: TokenMap) -> Result<TokenMap> {
        TokenEngine::with_defaults()?.build_token_map(self, existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{defaults::*, source::ConfigurationSource};

    fn loaded(pairs: &[(&str, &str)]) -> HubConfig {
        let mut config = HubConfig::new();
        let source: ConfigurationSource = pairs.iter().copied().collect();
        config.load(Some(source)).unwrap(); //#[allow_ci]
        config
    }

    #[test]
    fn test_default_policy_alphabet() {
        let alphabet = PasswordPolicy::default().alphabet();
        assert_eq!(alphabet.len(), 92);
        assert!(!alphabet.contains(&b'"'));
        assert!(!alphabet.contains(&b'\\'));
        assert!(!alphabet.contains(&b' '));
        assert!(alphabet.contains(&b'!'));
        assert!(alphabet.contains(&b'~'));
    }

    #[test]
    fn test_generate_password() {
        let policy = PasswordPolicy::default();
        let a = policy.generate().unwrap(); //#[allow_ci]
        let b = policy.generate().unwrap(); //#[allow_ci]
        assert_eq!(a.chars().count(), 20);
        assert_ne!(a, b);
        for c in a.chars().chain(b.chars()) {
            assert!(('!'..='~').contains(&c));
            assert!(c != '"' && c != '\\');
        }
    }

    #[test]
    fn test_custom_policy() {
        let policy = PasswordPolicy {
            length: 64,
            min_code_point: b'a',
            max_code_point: b'c',
            excluded: vec!['b'],
        };
        let p = policy.generate().unwrap(); //#[allow_ci]
        assert_eq!(p.len(), 64);
        assert!(p.chars().all(|c| c == 'a' || c == 'c'));
    }

    #[test]
    fn test_invalid_policy() {
        let empty = PasswordPolicy {
            min_code_point: b'a',
            max_code_point: b'a',
            excluded: vec!['a'],
            ..Default::default()
        };
        assert!(matches!(
            empty.generate(),
            Err(HubConfigError::InvalidPolicy(_))
        ));

        let zero = PasswordPolicy {
            length: 0,
            ..Default::default()
        };
        assert!(TokenEngine::new(zero, DEFAULT_PASS_THROUGH_PATTERN).is_err());

        assert!(matches!(
            TokenEngine::new(PasswordPolicy::default(), "^ml[A-Z"),
            Err(HubConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_password_length_bound() {
        let huge = PasswordPolicy {
            length: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(
            huge.generate(),
            Err(HubConfigError::InvalidPolicy(_))
        ));
        assert!(matches!(
            TokenEngine::new(huge, DEFAULT_PASS_THROUGH_PATTERN),
            Err(HubConfigError::InvalidPolicy(_))
        ));

        let longest = PasswordPolicy {
            length: MAX_PASSWORD_LENGTH,
            ..Default::default()
        };
        let p = longest.generate().unwrap(); //#[allow_ci]
        assert_eq!(p.len(), MAX_PASSWORD_LENGTH);
    }

    #[test]
    fn test_defaults_token_map() {
        let config = HubConfig::new();
        let tokens = config.build_token_map(TokenMap::new()).unwrap(); //#[allow_ci]

        assert_eq!(tokens["%%mlStagingDbName%%"], DEFAULT_STAGING_NAME);
        assert_eq!(tokens["\"%%mlStagingPort%%\""], "8010");
        assert_eq!(tokens["\"%%mlFinalPort%%\""], "8011");
        assert_eq!(tokens["\"%%mlJobPort%%\""], "8013");
        assert_eq!(tokens["%%mlStagingAppserverName%%"], DEFAULT_STAGING_NAME);
        assert_eq!(tokens["%%mlFinalAuth%%"], "digest");
        assert_eq!(tokens["%%mlStagingForestsPerHost%%"], "3");
        assert_eq!(tokens["%%mlJobForestsPerHost%%"], "1");
        assert_eq!(
            tokens["%%mlFinalSchemasDbName%%"],
            DEFAULT_FINAL_SCHEMAS_DB_NAME
        );
        assert_eq!(tokens["%%mlStagingModulesForestsPerHost%%"], "1");
        assert_eq!(tokens["%%mlHubUserRole%%"], DEFAULT_ROLE_NAME);
        assert_eq!(tokens["%%mlHubUserName%%"], DEFAULT_USER_NAME);
        assert_eq!(tokens["%%mlHubAdminRole%%"], DEFAULT_ADMIN_ROLE_NAME);
        assert_eq!(tokens["%%mlHubAdminUserName%%"], DEFAULT_ADMIN_USER_NAME);
        assert_eq!(tokens["%%mlCustomForestPath%%"], "forests");
        assert_eq!(tokens["%%mlHubVersion%%"], DEFAULT_HUB_VERSION);
        assert_eq!(tokens[HUB_USER_PASSWORD_TOKEN].len(), 20);
        assert_eq!(tokens[HUB_ADMIN_USER_PASSWORD_TOKEN].len(), 20);
        assert!(!tokens.contains_key("%%mlStagingPort%%"));
        assert_eq!(tokens["%%mlHost%%"], DEFAULT_HOST);
    }

    #[test]
    fn test_existing_tokens_win_except_passwords() {
        let config = HubConfig::new();
        let existing: TokenMap = [
            ("%%mlStagingDbName%%", "caller-db"),
            ("%%mlHubVersion%%", "9.9.9"),
            (HUB_USER_PASSWORD_TOKEN, "stale"),
            ("%%unrelated%%", "kept"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let tokens = config.build_token_map(existing).unwrap(); //#[allow_ci]
        assert_eq!(tokens["%%mlStagingDbName%%"], "caller-db");
        assert_eq!(tokens["%%mlHubVersion%%"], "9.9.9");
        assert_eq!(tokens["%%unrelated%%"], "kept");
        assert_ne!(tokens[HUB_USER_PASSWORD_TOKEN], "stale");
    }

    #[test]
    fn test_passwords_fresh_per_call() {
        let config = HubConfig::new();
        let engine = TokenEngine::with_defaults().unwrap(); //#[allow_ci]
        let a = engine.build_token_map(&config, TokenMap::new()).unwrap(); //#[allow_ci]
        let b = engine.build_token_map(&config, TokenMap::new()).unwrap(); //#[allow_ci]

        assert_ne!(
            (&a[HUB_USER_PASSWORD_TOKEN], &a[HUB_ADMIN_USER_PASSWORD_TOKEN]),
            (&b[HUB_USER_PASSWORD_TOKEN], &b[HUB_ADMIN_USER_PASSWORD_TOKEN])
        );
        assert_ne!(a[HUB_USER_PASSWORD_TOKEN], a[HUB_ADMIN_USER_PASSWORD_TOKEN]);

        let strip = |mut m: TokenMap| {
            let _ = m.remove(HUB_USER_PASSWORD_TOKEN);
            let _ = m.remove(HUB_ADMIN_USER_PASSWORD_TOKEN);
            m
        };
        assert_eq!(strip(a), strip(b));
    }

    #[test]
    fn test_pass_through() {
        let config = loaded(&[
            ("mlCustomFeatureX", "foo"),
            ("mlStagingDbName", "my-staging"),
            ("customLower", "skipped"),
            ("mlx", "skipped"),
        ]);
        let tokens = config.build_token_map(TokenMap::new()).unwrap(); //#[allow_ci]

        assert_eq!(tokens["%%mlCustomFeatureX%%"], "foo");
        assert_eq!(tokens["%%mlStagingDbName%%"], "my-staging");
        assert!(!tokens.contains_key("%%customLower%%"));
        assert!(!tokens.contains_key("%%mlx%%"));
    }

    #[test]
    fn test_recognized_keys_not_passed_through() {
        let config = loaded(&[
            ("mlPassword", "runtime-secret"),
            ("mlUsername", "admin"),
            ("mlStagingCertPassword", "cert-secret"),
            ("mlStagingPort", "8110"),
            ("mlCustomFeatureX", "foo"),
        ]);
        let tokens = config.build_token_map(TokenMap::new()).unwrap(); //#[allow_ci]

        assert!(!tokens.contains_key("%%mlPassword%%"));
        assert!(!tokens.contains_key("%%mlUsername%%"));
        assert!(!tokens.contains_key("%%mlStagingCertPassword%%"));
        assert!(!tokens.contains_key("%%mlStagingPort%%"));
        assert_eq!(tokens["\"%%mlStagingPort%%\""], "8110");
        assert_eq!(tokens["%%mlCustomFeatureX%%"], "foo");
        assert!(!tokens.values().any(|v| v.contains("secret")));
    }

    #[test]
    fn test_pass_through_does_not_replace_present_tokens() {
        let config = loaded(&[("mlHubVersion", "from-source")]);
        let config = config.with_hub_version("5.1.0");
        let tokens = config.build_token_map(TokenMap::new()).unwrap(); //#[allow_ci]
        assert_eq!(tokens["%%mlHubVersion%%"], "5.1.0");
    }

    #[test]
    fn test_custom_pass_through_pattern() {
        let config = loaded(&[("mlCustomFeatureX", "foo"), ("appColor", "blue")]);
        let engine =
            TokenEngine::new(PasswordPolicy::default(), "^app[A-Z]").unwrap(); //#[allow_ci]
        let tokens = engine.build_token_map(&config, TokenMap::new()).unwrap(); //#[allow_ci]
        assert_eq!(tokens["%%appColor%%"], "blue");
        assert!(!tokens.contains_key("%%mlCustomFeatureX%%"));
    }

    #[test]
    fn test_staging_host() {
        let mut config = HubConfig::new();
        config.globals_mut().host = "staging.example.org".to_string();
        let tokens = config.build_token_map(TokenMap::new()).unwrap(); //#[allow_ci]
        assert_eq!(tokens["%%mlHost%%"], "staging.example.org");
    }
}
