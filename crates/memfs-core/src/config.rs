// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Instance configuration
//!
//! An `FsConfig` fixes everything platform-specific about an instance. It can
//! be built from a preset, adjusted with `with_*` methods, or read from a
//! string-keyed JSON environment map layered over the preset for its flavor.

use serde::{Deserialize, Serialize};
use serde_json::Value as J;

use crate::error::{FsError, FsResult};
use crate::path::parse_components;
use crate::policy::{CaseSensitivity, Flavor, PathPolicy};
use crate::types::PermissionSet;

pub const DEFAULT_MAX_SYMLINK_HOPS: u32 = 40;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    pub flavor: Flavor,
    /// Overrides the flavor's name comparison rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitivity: Option<CaseSensitivity>,
    pub roots: Vec<String>,
    pub current_working_directory: String,
    pub default_owner: String,
    pub default_group: String,
    pub default_file_permissions: PermissionSet,
    pub default_directory_permissions: PermissionSet,
    pub max_symlink_hops: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::posix()
    }
}

impl FsConfig {
    /// Single `/` root, case-sensitive names, `basic`/`owner`/`posix` views
    pub fn posix() -> Self {
        Self {
            flavor: Flavor::Posix,
            case_sensitivity: None,
            roots: vec!["/".to_string()],
            current_working_directory: "/".to_string(),
            default_owner: "root".to_string(),
            default_group: "root".to_string(),
            default_file_permissions: PermissionSet::from_mode(0o644),
            default_directory_permissions: PermissionSet::from_mode(0o755),
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
        }
    }

    /// `C:\` root, case-insensitive names, `basic`/`owner`/`dos` views
    pub fn windows() -> Self {
        Self {
            flavor: Flavor::Windows,
            roots: vec!["C:\\".to_string()],
            current_working_directory: "C:\\".to_string(),
            default_owner: "user".to_string(),
            default_group: "users".to_string(),
            ..Self::posix()
        }
    }

    pub fn for_flavor(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Posix => Self::posix(),
            Flavor::Windows => Self::windows(),
        }
    }

    pub fn with_case_sensitivity(mut self, case: CaseSensitivity) -> Self {
        self.case_sensitivity = Some(case);
        self
    }

    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_current_working_directory(mut self, cwd: impl Into<String>) -> Self {
        self.current_working_directory = cwd.into();
        self
    }

    pub fn with_default_owner(mut self, owner: impl Into<String>) -> Self {
        self.default_owner = owner.into();
        self
    }

    pub fn with_default_group(mut self, group: impl Into<String>) -> Self {
        self.default_group = group.into();
        self
    }

    pub fn with_default_file_permissions(mut self, permissions: PermissionSet) -> Self {
        self.default_file_permissions = permissions;
        self
    }

    pub fn with_default_directory_permissions(mut self, permissions: PermissionSet) -> Self {
        self.default_directory_permissions = permissions;
        self
    }

    pub fn with_max_symlink_hops(mut self, hops: u32) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    pub fn policy(&self) -> PathPolicy {
        PathPolicy::new(
            self.flavor,
            self.case_sensitivity
                .unwrap_or_else(|| self.flavor.default_case_sensitivity()),
        )
    }

    pub fn validate(&self) -> FsResult<()> {
        let policy = self.policy();
        if self.roots.is_empty() {
            return Err(FsError::InvalidConfig("at least one root is required".to_string()));
        }
        let mut keys = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            let (root_element, names) = parse_components(&policy, root)
                .map_err(|e| FsError::InvalidConfig(format!("root {root}: {e}")))?;
            let Some(root_element) = root_element.filter(|_| names.is_empty()) else {
                return Err(FsError::InvalidConfig(format!("not a root: {root}")));
            };
            if keys.contains(&root_element.key) {
                return Err(FsError::InvalidConfig(format!("duplicate root: {root}")));
            }
            keys.push(root_element.key);
        }

        let (cwd_root, _) = parse_components(&policy, &self.current_working_directory)
            .map_err(|e| FsError::InvalidConfig(format!("working directory: {e}")))?;
        match cwd_root {
            Some(root) if keys.contains(&root.key) => {}
            _ => {
                return Err(FsError::InvalidConfig(format!(
                    "working directory {} is not under a configured root",
                    self.current_working_directory
                )))
            }
        }

        if self.max_symlink_hops == 0 {
            return Err(FsError::InvalidConfig("max_symlink_hops must be positive".to_string()));
        }
        if self.default_owner.is_empty() || self.default_group.is_empty() {
            return Err(FsError::InvalidConfig("default owner and group must be named".to_string()));
        }
        Ok(())
    }

    /// Flat JSON map of every setting
    pub fn to_environment(&self) -> FsResult<J> {
        serde_json::to_value(self).map_err(|e| FsError::InvalidConfig(e.to_string()))
    }

    /// Read a configuration from an environment map. Missing keys take the
    /// preset value for the map's `flavor` (POSIX when absent); unknown keys
    /// are rejected.
    pub fn from_environment(env: &J) -> FsResult<Self> {
        let J::Object(overrides) = env else {
            return Err(FsError::InvalidConfig("environment must be a JSON object".to_string()));
        };
        let flavor = match overrides.get("flavor") {
            Some(value) => serde_json::from_value::<Flavor>(value.clone())
                .map_err(|e| FsError::InvalidConfig(format!("flavor: {e}")))?,
            None => Flavor::Posix,
        };

        let mut merged = Self::for_flavor(flavor).to_environment()?;
        if let J::Object(base) = &mut merged {
            for (key, value) in overrides {
                base.insert(key.clone(), value.clone());
            }
        }
        let config: Self = serde_json::from_value(merged)
            .map_err(|e| FsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presets_validate() {
        FsConfig::posix().validate().unwrap();
        FsConfig::windows().validate().unwrap();
        FsConfig::windows()
            .with_roots(["C:\\", "D:\\"])
            .validate()
            .unwrap();
    }

    #[test]
    fn invalid_roots_are_rejected() {
        let bad = FsConfig::windows().with_roots(["/"]);
        assert!(matches!(bad.validate(), Err(FsError::InvalidConfig(_))));
        let dup = FsConfig::windows().with_roots(["C:\\", "c:\\"]);
        assert!(matches!(dup.validate(), Err(FsError::InvalidConfig(_))));
        let nested = FsConfig::posix().with_roots(["/a"]);
        assert!(matches!(nested.validate(), Err(FsError::InvalidConfig(_))));
        let cwd = FsConfig::windows().with_current_working_directory("D:\\work");
        assert!(matches!(cwd.validate(), Err(FsError::InvalidConfig(_))));
    }

    #[test]
    fn environment_layers_over_flavor_preset() {
        let env = json!({
            "flavor": "windows",
            "roots": ["C:\\", "E:\\"],
            "default_file_permissions": "rw-------"
        });
        let config = FsConfig::from_environment(&env).unwrap();
        assert_eq!(config.flavor, Flavor::Windows);
        assert_eq!(config.roots, ["C:\\", "E:\\"]);
        assert_eq!(config.current_working_directory, "C:\\");
        assert_eq!(config.default_file_permissions.to_string(), "rw-------");
    }

    #[test]
    fn environment_round_trips() {
        let config = FsConfig::posix()
            .with_current_working_directory("/home/user")
            .with_case_sensitivity(CaseSensitivity::Insensitive);
        let env = config.to_environment().unwrap();
        assert!(env.is_object());
        assert_eq!(env["default_file_permissions"], "rw-r--r--");
        assert_eq!(FsConfig::from_environment(&env).unwrap(), config);
    }

    #[test]
    fn unknown_environment_keys_fail() {
        let env = json!({ "flavour": "posix" });
        assert!(matches!(
            FsConfig::from_environment(&env),
            Err(FsError::InvalidConfig(_))
        ));
        let env = json!({ "default_file_permissions": "rwz------" });
        assert!(FsConfig::from_environment(&env).is_err());
    }
}
