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

use std::{
    collections::{BTreeMap, HashSet},
    fmt::{self, Display},
    path::PathBuf,
};

use thiserror::Error;

use crate::provider::{Provider, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    pub fn new<G, A, V>(group: G, artifact: A, version: V) -> Coordinate
    where
        G: Into<String>,
        A: Into<String>,
        V: Into<String>,
    {
        Coordinate {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

#[derive(Debug, Clone)]
pub enum Dependency {
    /// An external module, resolved lazily.
    Module(Provider<Coordinate>),
    /// Every file under `root` matching the glob `include`.
    FileTree { root: PathBuf, include: String },
}

#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("no configuration named '{0}'")]
    UnknownConfiguration(String),
    #[error("could not resolve a dependency of '{configuration}'")]
    Unresolved {
        configuration: String,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Clone)]
struct Declared {
    key: String,
    dependency: Dependency,
}

/// Named configurations and the dependencies declared in them.
#[derive(Debug, Default, Clone)]
pub struct DependencyHandler {
    configurations: BTreeMap<String, Vec<Declared>>,
    keys: HashSet<(String, String)>,
}

impl DependencyHandler {
    pub fn new() -> DependencyHandler {
        DependencyHandler::default()
    }

    pub fn declare_configuration<S: Into<String>>(&mut self, name: S) {
        self.configurations.entry(name.into()).or_default();
    }

    pub fn has_configuration(&self, name: &str) -> bool {
        self.configurations.contains_key(name)
    }

    /// Declares `dependency` in `configuration` unless something was already declared there under
    /// `key`. Returns whether it was added.
    pub fn add(
        &mut self,
        configuration: &str,
        key: &str,
        dependency: Dependency,
    ) -> Result<bool, DependencyError> {
        let declared = self
            .configurations
            .get_mut(configuration)
            .ok_or_else(|| DependencyError::UnknownConfiguration(configuration.to_owned()))?;
        if !self
            .keys
            .insert((configuration.to_owned(), key.to_owned()))
        {
            return Ok(false);
        }
        declared.push(Declared {
            key: key.to_owned(),
            dependency,
        });
        Ok(true)
    }

    pub fn dependencies(&self, configuration: &str) -> Vec<&Dependency> {
        self.configurations
            .get(configuration)
            .map(|d| d.iter().map(|d| &d.dependency).collect())
            .unwrap_or_default()
    }

    pub fn keys(&self, configuration: &str) -> Vec<&str> {
        self.configurations
            .get(configuration)
            .map(|d| d.iter().map(|d| d.key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Resolves every module dependency of `configuration`. File trees are not modules and are
    /// left out.
    pub fn resolve_modules(&self, configuration: &str) -> Result<Vec<Coordinate>, DependencyError> {
        self.dependencies(configuration)
            .into_iter()
            .filter_map(|d| match d {
                Dependency::Module(p) => Some(p),
                Dependency::FileTree { .. } => None,
            })
            .map(|p| {
                p.get().map_err(|source| DependencyError::Unresolved {
                    configuration: configuration.to_owned(),
                    source,
                })
            })
            .collect()
    }
}
