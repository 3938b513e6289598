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

//! A plugin that lets Android variants compile Scala.
//!
//! Applying [`ScalaAndroidPlugin`] checks that the host can take it and teaches every source set
//! about `src/<set>/scala`. Once the build script has run, each variant with a primary compile
//! task gets a Scala compile task spliced in front of it.

use std::{path::PathBuf, sync::Arc};

use graft_interface::{
    DependencyError, Host, HostError, OptionsError, Plugin, Property, ProviderError,
};
use graft_tasks::TaskError;
use thiserror::Error;
use tracing::debug;

pub mod classpath;
pub mod compile_task;
pub mod config;
pub mod incremental;
pub mod precondition;
pub mod source_sets;
pub mod splicer;
pub mod strip_task;

pub use compile_task::{CompileRequest, LanguageCompiler};
pub use config::{ClasspathMode, SourceMode, SpliceConfig};
pub use splicer::{SpliceOutcome, Splicer};

/// A project the plugin cannot work with. Reported before any task is touched.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error(
        "You must apply the Android plugin or the Android library plugin before using the {plugin} plugin"
    )]
    MissingPlatformPlugin { plugin: String },
    #[error("{key} does not exclude {prefix} libraries from jetifier; add `{key}={prefix}` to gradle.properties")]
    RewritingNotIgnored { key: String, prefix: String },
    #[error("{property} property needs to be specified. See https://docs.gradle.org/8.13/userguide/scala_plugin.html#sec:scala_version")]
    MissingVersion { property: String },
    #[error("invalid project option")]
    InvalidOption(#[from] OptionsError),
}

#[derive(Error, Debug)]
pub enum SpliceError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error("could not resolve the classpath of {task}")]
    Classpath {
        task: String,
        #[source]
        source: ProviderError,
    },
    #[error("could not scan {}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub struct ScalaAndroidPlugin {
    config: SpliceConfig,
    scala_version: Property<String>,
    compiler: Arc<dyn LanguageCompiler>,
}

impl ScalaAndroidPlugin {
    pub fn new(compiler: Arc<dyn LanguageCompiler>) -> ScalaAndroidPlugin {
        ScalaAndroidPlugin::with_config(SpliceConfig::default(), compiler)
    }

    pub fn with_config(config: SpliceConfig, compiler: Arc<dyn LanguageCompiler>) -> ScalaAndroidPlugin {
        ScalaAndroidPlugin {
            scala_version: Property::new(config.version_property.as_str()),
            config,
            compiler,
        }
    }

    /// Assigned by the build script, read once it has run.
    pub fn scala_version(&self) -> &Property<String> {
        &self.scala_version
    }

    pub fn config(&self) -> &SpliceConfig {
        &self.config
    }
}

impl Plugin for ScalaAndroidPlugin {
    type Error = SpliceError;

    fn apply(&self, host: &mut dyn Host) -> Result<(), SpliceError> {
        precondition::ensure_platform_plugin(&*host, &self.config)?;
        precondition::ensure_rewriting_ignores_runtime(host.options(), &self.config)?;
        source_sets::augment_source_sets(host, &self.config, &self.scala_version);
        Ok(())
    }

    fn after_evaluate(&self, host: &mut dyn Host) -> Result<(), SpliceError> {
        let version = precondition::ensure_version_declared(&self.scala_version, &self.config)?;
        let splicer = Splicer::new(&self.config, &version, self.compiler.clone());
        for variant in host.variants() {
            let outcome = splicer.splice(host, variant.as_ref())?;
            debug!("{}: {:?}", variant.name(), outcome);
        }
        Ok(())
    }
}
