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

//! The contract between a build host and the plugins it loads.
//!
//! Configuration happens in two phases. [`Plugin::apply`] runs first and may only record
//! structural facts and lazy values; user configuration blocks run next; then
//! [`Plugin::after_evaluate`] runs once everything the user may assign has been assigned.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use graft_tasks::{TaskError, TaskGraph, TaskId};
use thiserror::Error;

pub mod dependency;
pub mod options;
pub mod provider;
pub mod source_set;
pub mod variant;

#[cfg(any(test, feature = "testing"))]
pub mod project;

pub use dependency::{Coordinate, Dependency, DependencyError, DependencyHandler};
pub use options::{OptionsError, ProjectOptions};
pub use provider::{Classpath, Property, Provider, ProviderError};
pub use source_set::{DirectorySet, SourceSet, SourceSetContainer, SourceSetRule};
pub use variant::{
    capitalized, BytecodeRegistration, PrimaryCompile, RegistrationToken, Variant, VariantKind,
};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("no variant named '{0}'")]
    UnknownVariant(String),
    #[error("'{0}' is not a primary compile task")]
    NotACompileTask(String),
    #[error(transparent)]
    Task(#[from] TaskError),
}

pub trait Host {
    fn has_plugin(&self, id: &str) -> bool;

    fn options(&self) -> &ProjectOptions;

    fn project_dir(&self) -> &Path;

    fn build_dir(&self) -> &Path;

    /// Runs `rule` against every source set, now and as they are added.
    fn configure_each_source_set(&mut self, rule: SourceSetRule);

    fn source_set(&self, name: &str) -> Option<&SourceSet>;

    fn dependencies(&self) -> &DependencyHandler;

    fn dependencies_mut(&mut self) -> &mut DependencyHandler;

    fn tasks(&self) -> &TaskGraph;

    fn tasks_mut(&mut self) -> &mut TaskGraph;

    fn variants(&self) -> Vec<Arc<dyn Variant>>;

    fn primary_compile(&self, task: TaskId) -> Option<&PrimaryCompile>;

    fn primary_compile_mut(&mut self, task: TaskId) -> Option<&mut PrimaryCompile>;

    fn boot_classpath(&self) -> Provider<Classpath>;

    /// The files of a resolvable configuration, if the host has one by that name.
    fn configuration_files(&self, name: &str) -> Option<Provider<Classpath>>;

    /// Admits `output`, produced by `task`, into `variant`'s bytecode. Registering the same task
    /// twice has no further effect.
    fn register_bytecode(
        &mut self,
        variant: &str,
        task: TaskId,
        output: PathBuf,
        mode: BytecodeRegistration,
    ) -> Result<Option<RegistrationToken>, HostError>;
}

pub trait Plugin {
    type Error: std::error::Error + Send + Sync + 'static;

    fn apply(&self, host: &mut dyn Host) -> Result<(), Self::Error>;

    fn after_evaluate(&self, host: &mut dyn Host) -> Result<(), Self::Error>;
}
