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

//! Adds the secondary compile task to a variant's graph.
//!
//! The secondary task takes over the primary task's inputs and dependencies, and the primary task
//! then depends on it, so everything that consumed the primary's classes also sees the secondary
//! language's classes once the output is registered with the variant. A variant without a single
//! source file of the secondary language keeps its graph as it was, apart from a disabled task.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use graft_interface::{Classpath, Dependency, Host, HostError, Provider, Variant};
use graft_tasks::{Task, TaskId};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    classpath::{compose, ClasspathInputs},
    compile_task::{
        ClasspathBinding, LanguageCompiler, SecondaryCompileAction, SecondaryCompileSpec,
    },
    config::{expand, ClasspathMode, SourceMode, SpliceConfig},
    incremental::incremental_paths,
    strip_task::{accessor_outputs, ensure_strip_task},
    SpliceError,
};

pub const COMPILE_TASK_TYPE: &str = "ScalaCompile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceOutcome {
    /// The variant has no primary compile task.
    Skipped,
    /// The secondary task exists but has nothing to compile.
    Disabled { task: String },
    Enabled { task: String },
}

pub struct Splicer<'a> {
    config: &'a SpliceConfig,
    version: &'a str,
    compiler: Arc<dyn LanguageCompiler>,
}

impl<'a> Splicer<'a> {
    pub fn new(
        config: &'a SpliceConfig,
        version: &'a str,
        compiler: Arc<dyn LanguageCompiler>,
    ) -> Splicer<'a> {
        Splicer {
            config,
            version,
            compiler,
        }
    }

    pub fn splice(
        &self,
        host: &mut dyn Host,
        variant: &dyn Variant,
    ) -> Result<SpliceOutcome, SpliceError> {
        let name = variant.name();
        if self.config.expose_accessors_to_ide {
            self.expose_accessors(host, name)?;
        }

        let primary_name = match variant.primary_compile_task() {
            Some(task) => task,
            None => {
                debug!("{:?} variant {} has no primary compile task", variant.kind(), name);
                return Ok(SpliceOutcome::Skipped);
            }
        };
        let primary = match host.tasks().find(&primary_name) {
            Some(id) => id,
            None => {
                debug!("variant {} declares {} but it is not registered", name, primary_name);
                return Ok(SpliceOutcome::Skipped);
            }
        };
        let (primary_classpath, processor_path) = match host.primary_compile(primary) {
            Some(compile) => (
                compile.classpath.clone(),
                compile.annotation_processor_path.clone(),
            ),
            None => return Err(HostError::NotACompileTask(primary_name).into()),
        };

        let task_name = self.config.secondary_task_name(&primary_name, name);
        let destination = self.config.destination(host.build_dir(), name);
        let (sources, secondary_dirs) = self.sources(host, variant);
        let secondary = match host.tasks().find(&task_name) {
            Some(id) => id,
            None => host.tasks_mut().register(
                Task::new(task_name.as_str(), COMPILE_TASK_TYPE)
                    .with_outputs(vec![destination.clone()]),
            )?,
        };

        if !contains_sources(&sources, &self.config.source_extension)? {
            host.tasks_mut().task_mut(secondary).set_enabled(false);
            debug!("{} has no .{} sources, disabled", task_name, self.config.source_extension);
            return Ok(SpliceOutcome::Disabled { task: task_name });
        }
        host.tasks_mut().task_mut(secondary).set_enabled(true);

        let token = host.register_bytecode(
            name,
            secondary,
            destination.clone(),
            self.config.bytecode_registration,
        )?;

        let resources = variant
            .resource_artifact_task()
            .and_then(|t| host.tasks().find(&t));
        let accessors = if self.config.needs_stripped_accessors(self.version) {
            let (strip, derived) = ensure_strip_task(host, self.config, name, resources)?;
            host.tasks_mut().depends_on(secondary, strip)?;
            vec![derived]
        } else {
            resources
                .map(|id| accessor_outputs(&*host, self.config, id))
                .unwrap_or_default()
        };

        let classpath = compose(ClasspathInputs {
            accessors: Some(accessors),
            accessor_name: self.config.accessor_artifact.clone(),
            primary: primary_classpath,
            variant: variant.compile_classpath(token),
            boot: host.boot_classpath(),
            exclude: vec![destination.clone()],
        });
        let classpath = match self.config.classpath_mode {
            ClasspathMode::Eager => ClasspathBinding::Resolved(classpath.get().map_err(|source| {
                SpliceError::Classpath {
                    task: task_name.clone(),
                    source,
                }
            })?),
            ClasspathMode::Deferred => ClasspathBinding::Pending(classpath),
        };
        let toolchain_classpath = host
            .configuration_files(&self.config.toolchain_configuration)
            .unwrap_or_else(|| {
                debug!("no {} configuration", self.config.toolchain_configuration);
                Provider::of(Classpath::new())
            });

        let spec = SecondaryCompileSpec {
            task: task_name.clone(),
            variant: name.to_owned(),
            incremental: incremental_paths(
                host.build_dir(),
                &self.config.language,
                name,
                &task_name,
            ),
            destination,
            sources,
            source_extension: self.config.source_extension.clone(),
            classpath,
            annotation_processor_path: processor_path,
            toolchain_classpath,
        };
        host.tasks_mut()
            .task_mut(secondary)
            .set_action(Arc::new(SecondaryCompileAction::new(
                spec,
                self.compiler.clone(),
            )));

        self.rewire(host, name, primary, secondary, secondary_dirs)?;
        info!(
            "spliced {} before {} in {:?} variant {}",
            task_name,
            primary_name,
            variant.kind(),
            name
        );
        Ok(SpliceOutcome::Enabled { task: task_name })
    }

    /// Sources of the secondary compile, and the directories that only hold the secondary
    /// language.
    fn sources(&self, host: &dyn Host, variant: &dyn Variant) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let sets: Vec<_> = variant
            .source_sets()
            .iter()
            .filter_map(|s| host.source_set(s))
            .collect();
        let mut own = vec![];
        for set in &sets {
            if let Some(dirs) = set.extension(&self.config.language) {
                push_unique(&mut own, dirs.dirs().iter().cloned());
            }
        }
        let sources = match self.config.source_mode {
            SourceMode::Joint => {
                let mut all = vec![];
                for set in &sets {
                    push_unique(&mut all, set.java.dirs().iter().cloned());
                }
                push_unique(&mut all, variant.java_source_directories());
                all
            }
            SourceMode::Split => own.clone(),
        };
        (sources, own)
    }

    fn rewire(
        &self,
        host: &mut dyn Host,
        variant: &str,
        primary: TaskId,
        secondary: TaskId,
        secondary_dirs: Vec<PathBuf>,
    ) -> Result<(), SpliceError> {
        let inherited: Vec<TaskId> = host
            .tasks()
            .dependencies(primary)
            .into_iter()
            .filter(|d| *d != secondary)
            .collect();
        let tasks = host.tasks_mut();
        for dependency in inherited {
            tasks.depends_on(secondary, dependency)?;
        }
        tasks.depends_on(primary, secondary)?;
        if self.config.source_mode == SourceMode::Joint {
            let resources = expand(&self.config.resources_task_template, variant);
            tasks.must_run_after_if_present(primary, &resources)?;
        }
        for template in &self.config.consumer_templates {
            tasks.depends_on_if_present(&expand(template, variant), secondary)?;
        }

        let compile = host
            .primary_compile_mut(primary)
            .ok_or_else(|| HostError::NotACompileTask(variant.to_owned()))?;
        match self.config.source_mode {
            SourceMode::Joint => compile.sources.clear(),
            SourceMode::Split => push_unique(&mut compile.excluded, secondary_dirs),
        }
        Ok(())
    }

    fn expose_accessors(&self, host: &mut dyn Host, variant: &str) -> Result<(), SpliceError> {
        let configuration = format!("{}CompileOnly", variant);
        if !host.dependencies().has_configuration(&configuration) {
            return Ok(());
        }
        let root = host.build_dir().to_owned();
        let include = format!("**/{}/**/{}", variant, self.config.accessor_artifact);
        host.dependencies_mut().add(
            &configuration,
            &format!("{}-ide-accessors", self.config.language),
            Dependency::FileTree { root, include },
        )?;
        Ok(())
    }
}

fn push_unique<I: IntoIterator<Item = PathBuf>>(into: &mut Vec<PathBuf>, paths: I) {
    for path in paths {
        if !into.contains(&path) {
            into.push(path);
        }
    }
}

/// True if any of `dirs` holds a file with `extension`. Missing directories hold nothing.
pub fn contains_sources(dirs: &[PathBuf], extension: &str) -> Result<bool, SpliceError> {
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|source| SpliceError::Scan {
                path: dir.clone(),
                source,
            })?;
            if entry.file_type().is_file() && has_extension(entry.path(), extension) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().map_or(false, |e| e == extension)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn finds_nested_sources() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("com").join("example");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Main.java"), "class Main {}").unwrap();
        let dirs = vec![dir.path().to_owned(), dir.path().join("missing")];
        assert!(!contains_sources(&dirs, "scala").unwrap());
        fs::write(nested.join("Util.scala"), "object Util").unwrap();
        assert!(contains_sources(&dirs, "scala").unwrap());
    }

    #[test]
    fn directories_named_like_sources_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("weird.scala")).unwrap();
        assert!(!contains_sources(&[dir.path().to_owned()], "scala").unwrap());
    }
}
