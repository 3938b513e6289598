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

use std::sync::Arc;

use graft_interface::{Coordinate, Dependency, DependencyHandler, Host, Property, SourceSet};
use tracing::debug;

use crate::config::{language_major, SpliceConfig};

/// The standard library every source set compiling the language needs at run time.
pub fn runtime_library(config: &SpliceConfig, version: &str) -> Coordinate {
    let artifact = if language_major(version) == Some(3) {
        format!("{}3-library_3", config.language)
    } else {
        format!("{}-library", config.language)
    };
    Coordinate::new(config.runtime_group.as_str(), artifact, version)
}

/// Registers the language's source directory and runtime library with every source set the host
/// has or will have. Safe to run any number of times.
pub fn augment_source_sets(host: &mut dyn Host, config: &SpliceConfig, version: &Property<String>) {
    let project_dir = host.project_dir().to_owned();
    let language = config.language.clone();
    let runtime = {
        let config = config.clone();
        version
            .provider()
            .map(move |v| runtime_library(&config, &v))
    };
    let key = format!("{}-runtime-library", language);

    host.configure_each_source_set(Arc::new(move |set: &mut SourceSet, deps: &mut DependencyHandler| {
        let dir = project_dir.join("src").join(set.name()).join(&language);
        if dir.is_dir() {
            set.java.add(dir.clone());
            set.extension_or_insert(&language).add(dir);
        } else {
            debug!("no {} directory for source set {}", language, set.name());
        }

        let configuration = set.implementation_configuration_name();
        if !deps.has_configuration(&configuration) {
            debug!("no configuration {} for source set {}", configuration, set.name());
            return;
        }
        if let Err(e) = deps.add(&configuration, &key, Dependency::Module(runtime.clone())) {
            debug!("could not add {} runtime to {}: {}", language, configuration, e);
        }
    }));
}
