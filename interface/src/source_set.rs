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
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::dependency::DependencyHandler;

/// An ordered set of source directories.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectorySet {
    dirs: Vec<PathBuf>,
}

impl DirectorySet {
    pub fn new() -> DirectorySet {
        DirectorySet::default()
    }

    /// Returns false if `dir` was already in the set.
    pub fn add<P: Into<PathBuf>>(&mut self, dir: P) -> bool {
        let dir = dir.into();
        if self.dirs.contains(&dir) {
            return false;
        }
        self.dirs.push(dir);
        true
    }

    pub fn contains<P: AsRef<Path>>(&self, dir: P) -> bool {
        self.dirs.iter().any(|d| d == dir.as_ref())
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    name: String,
    pub java: DirectorySet,
    extensions: BTreeMap<String, DirectorySet>,
}

impl SourceSet {
    pub fn new<S: Into<String>>(name: S) -> SourceSet {
        SourceSet {
            name: name.into(),
            java: DirectorySet::new(),
            extensions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory set a language attached to this source set, if any.
    pub fn extension(&self, language: &str) -> Option<&DirectorySet> {
        self.extensions.get(language)
    }

    pub fn extension_or_insert(&mut self, language: &str) -> &mut DirectorySet {
        self.extensions.entry(language.to_owned()).or_default()
    }

    pub fn implementation_configuration_name(&self) -> String {
        if self.name == "main" {
            "implementation".to_owned()
        } else {
            format!("{}Implementation", self.name)
        }
    }
}

pub type SourceSetRule = Arc<dyn Fn(&mut SourceSet, &mut DependencyHandler) + Send + Sync>;

/// Source sets in declaration order. Rules registered with `configure_each` run against every
/// source set, including those created afterwards.
#[derive(Default, Clone)]
pub struct SourceSetContainer {
    sets: Vec<SourceSet>,
    rules: Vec<SourceSetRule>,
}

impl std::fmt::Debug for SourceSetContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSetContainer")
            .field("sets", &self.sets)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl SourceSetContainer {
    pub fn new() -> SourceSetContainer {
        SourceSetContainer::default()
    }

    pub fn configure_each(&mut self, rule: SourceSetRule, deps: &mut DependencyHandler) {
        for set in self.sets.iter_mut() {
            rule(set, deps);
        }
        self.rules.push(rule);
    }

    /// Creates `name`, or returns the existing set of that name.
    pub fn create(&mut self, name: &str, deps: &mut DependencyHandler) -> &mut SourceSet {
        let index = match self.sets.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                let mut set = SourceSet::new(name);
                for rule in &self.rules {
                    rule(&mut set, deps);
                }
                self.sets.push(set);
                self.sets.len() - 1
            }
        };
        &mut self.sets[index]
    }

    pub fn get(&self, name: &str) -> Option<&SourceSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceSet> {
        self.sets.iter()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
