/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use graft_interface::{Host, ProjectOptions, Property};
use tracing::debug;

use crate::{config::SpliceConfig, ConfigurationError};

pub const JETIFIER_ENABLED: &str = "android.enableJetifier";
pub const JETIFIER_IGNORE_LIST: &str = "android.jetifier.ignorelist";
pub const JETIFIER_LEGACY_IGNORE_LIST: &str = "android.jetifier.blacklist";

/// Checked when the plugin is applied; the platform plugin has to come first.
pub fn ensure_platform_plugin(host: &dyn Host, config: &SpliceConfig) -> Result<(), ConfigurationError> {
    if config.platform_plugins.iter().any(|id| host.has_plugin(id)) {
        Ok(())
    } else {
        Err(ConfigurationError::MissingPlatformPlugin {
            plugin: config.plugin_name.clone(),
        })
    }
}

/// Jetifier rewrites the bytecode of dependencies, and it cannot process the language runtime.
/// When it is on, the runtime has to be on its ignore list.
pub fn ensure_rewriting_ignores_runtime(
    options: &ProjectOptions,
    config: &SpliceConfig,
) -> Result<(), ConfigurationError> {
    if !options.get_bool(JETIFIER_ENABLED)? {
        return Ok(());
    }
    let key = if options.get(JETIFIER_IGNORE_LIST).is_some() {
        JETIFIER_IGNORE_LIST
    } else {
        JETIFIER_LEGACY_IGNORE_LIST
    };
    if options
        .get_list(key)
        .iter()
        .any(|entry| entry.starts_with(&config.language))
    {
        debug!("{} excludes {} from jetifier", key, config.language);
        return Ok(());
    }
    Err(ConfigurationError::RewritingNotIgnored {
        key: JETIFIER_IGNORE_LIST.to_owned(),
        prefix: config.language.clone(),
    })
}

/// Only meaningful after the user's configuration blocks ran, since the version is assigned there.
pub fn ensure_version_declared(
    version: &Property<String>,
    config: &SpliceConfig,
) -> Result<String, ConfigurationError> {
    match version.get() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigurationError::MissingVersion {
            property: config.version_property.clone(),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn jetifier_off_needs_nothing() {
        let options = ProjectOptions::new().with(JETIFIER_ENABLED, "false");
        assert!(ensure_rewriting_ignores_runtime(&options, &SpliceConfig::default()).is_ok());
    }

    #[test]
    fn jetifier_on_without_ignore_list() {
        let options = ProjectOptions::new().with(JETIFIER_ENABLED, "true");
        let err = ensure_rewriting_ignores_runtime(&options, &SpliceConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::RewritingNotIgnored { .. }));
        assert!(err.to_string().contains("android.jetifier.ignorelist=scala"));
    }

    #[test]
    fn jetifier_on_with_ignore_list() {
        let config = SpliceConfig::default();
        let current = ProjectOptions::new()
            .with(JETIFIER_ENABLED, "true")
            .with(JETIFIER_IGNORE_LIST, "bcprov, scala-library");
        assert!(ensure_rewriting_ignores_runtime(&current, &config).is_ok());
        let legacy = ProjectOptions::new()
            .with(JETIFIER_ENABLED, "true")
            .with(JETIFIER_LEGACY_IGNORE_LIST, "scala");
        assert!(ensure_rewriting_ignores_runtime(&legacy, &config).is_ok());
    }

    #[test]
    fn unparseable_flag() {
        let options = ProjectOptions::new().with(JETIFIER_ENABLED, "maybe");
        let err = ensure_rewriting_ignores_runtime(&options, &SpliceConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidOption(_)));
    }

    #[test]
    fn version() {
        let config = SpliceConfig::default();
        let version = Property::new("scalaVersion");
        let err = ensure_version_declared(&version, &config).unwrap_err();
        assert!(err.to_string().starts_with("scala.scalaVersion property needs to be specified"));
        version.set("2.13.12".to_owned());
        assert_eq!(ensure_version_declared(&version, &config).unwrap(), "2.13.12");
    }
}
