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

//! An in-memory host, laid out like an Android project.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use graft_tasks::{ExecutionReport, Plan, Task, TaskError, TaskGraph, TaskId};
use tracing::debug;

use crate::{
    capitalized, BytecodeRegistration, Classpath, DependencyHandler, Host, HostError, Plugin,
    PrimaryCompile, ProjectOptions, Provider, RegistrationToken, SourceSet, SourceSetContainer,
    SourceSetRule, Variant, VariantKind,
};

#[derive(Debug, Default)]
struct VariantState {
    classpath: Vec<PathBuf>,
    generated: Vec<(RegistrationToken, PathBuf)>,
    classes: Vec<PathBuf>,
    processor_path: Vec<PathBuf>,
}

fn lock(state: &Mutex<VariantState>) -> std::sync::MutexGuard<'_, VariantState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct ProjectVariant {
    name: String,
    kind: VariantKind,
    primary: Option<String>,
    generated_sources: Vec<PathBuf>,
    source_sets: Vec<String>,
    resource_task: Option<String>,
    state: Arc<Mutex<VariantState>>,
}

impl Variant for ProjectVariant {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VariantKind {
        self.kind
    }

    fn primary_compile_task(&self) -> Option<String> {
        self.primary.clone()
    }

    fn compile_classpath(&self, exclude: Option<RegistrationToken>) -> Provider<Classpath> {
        let state = self.state.clone();
        Provider::from_fn(move || {
            let state = lock(&state);
            let mut classpath: Classpath = state.classpath.iter().cloned().collect();
            for (token, path) in &state.generated {
                if Some(*token) != exclude {
                    classpath.push(path.clone());
                }
            }
            Ok(classpath)
        })
    }

    fn java_source_directories(&self) -> Vec<PathBuf> {
        self.generated_sources.clone()
    }

    fn source_sets(&self) -> Vec<String> {
        self.source_sets.clone()
    }

    fn resource_artifact_task(&self) -> Option<String> {
        self.resource_task.clone()
    }
}

pub struct Project {
    project_dir: PathBuf,
    build_dir: PathBuf,
    plugins: HashSet<String>,
    options: ProjectOptions,
    source_sets: SourceSetContainer,
    dependencies: DependencyHandler,
    tasks: TaskGraph,
    variants: Vec<Arc<ProjectVariant>>,
    compiles: HashMap<TaskId, PrimaryCompile>,
    boot_classpath: Vec<PathBuf>,
    configuration_files: HashMap<String, Vec<PathBuf>>,
    registrations: HashMap<(String, TaskId), Option<RegistrationToken>>,
    next_token: u64,
}

impl Project {
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> Project {
        let project_dir = project_dir.into();
        let mut project = Project {
            build_dir: project_dir.join("build"),
            project_dir,
            plugins: HashSet::new(),
            options: ProjectOptions::new(),
            source_sets: SourceSetContainer::new(),
            dependencies: DependencyHandler::new(),
            tasks: TaskGraph::new(),
            variants: vec![],
            compiles: HashMap::new(),
            boot_classpath: vec![],
            configuration_files: HashMap::new(),
            registrations: HashMap::new(),
            next_token: 0,
        };
        project.add_source_set("main");
        project
    }

    pub fn with_plugin(mut self, id: &str) -> Project {
        self.plugins.insert(id.to_owned());
        self
    }

    pub fn with_options(mut self, options: ProjectOptions) -> Project {
        self.options = options;
        self
    }

    pub fn with_boot_classpath<P: Into<PathBuf>>(mut self, paths: Vec<P>) -> Project {
        self.boot_classpath = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_configuration_files<P: Into<PathBuf>>(mut self, name: &str, paths: Vec<P>) -> Project {
        self.configuration_files
            .insert(name.to_owned(), paths.into_iter().map(Into::into).collect());
        self
    }

    /// Creates a source set together with its implementation and compile-only configurations.
    pub fn add_source_set(&mut self, name: &str) -> &mut SourceSet {
        let compile_only = if name == "main" {
            "compileOnly".to_owned()
        } else {
            format!("{}CompileOnly", name)
        };
        self.dependencies.declare_configuration(compile_only);
        self.dependencies
            .declare_configuration(SourceSet::new(name).implementation_configuration_name());
        let set = self.source_sets.create(name, &mut self.dependencies);
        set.java
            .add(self.project_dir.join("src").join(name).join("java"));
        set
    }

    pub fn source_sets(&self) -> &SourceSetContainer {
        &self.source_sets
    }

    pub fn r_jar(&self, variant: &str) -> PathBuf {
        self.build_dir
            .join("intermediates")
            .join("compile_and_runtime_not_namespaced_r_class_jar")
            .join(variant)
            .join("R.jar")
    }

    /// Adds a variant the way the Android plugin lays one out: a source set of the same name, a
    /// resource pipeline producing `R.jar`, a javac task and the consumers of its classes.
    pub fn add_android_variant(
        &mut self,
        name: &str,
        kind: VariantKind,
    ) -> Result<Arc<ProjectVariant>, HostError> {
        self.add_source_set(name);
        let v = capitalized(name);
        let r_jar = self.r_jar(name);

        let pre = self.tasks.register(Task::new(format!("pre{}Build", v), "Default"))?;
        let generate = self.tasks.register(
            Task::new(format!("generate{}RFile", v), "GenerateRFile")
                .with_outputs(vec![r_jar.clone()]),
        )?;
        self.tasks
            .register(Task::new(format!("process{}Resources", v), "ProcessResources"))?;
        let destination = self
            .build_dir
            .join("intermediates")
            .join("javac")
            .join(name)
            .join("classes");
        let compile_name = format!("compile{}JavaWithJavac", v);
        let compile = self.tasks.register(
            Task::new(compile_name.clone(), "JavaCompile").with_outputs(vec![destination.clone()]),
        )?;
        self.tasks.depends_on(compile, pre)?;
        self.tasks.depends_on(compile, generate)?;
        for consumer in &[
            format!("dexBuilder{}", v),
            format!("bundle{}ClassesToCompileJar", v),
        ] {
            let id = self.tasks.register(Task::new(consumer.as_str(), "Default"))?;
            self.tasks.depends_on(id, compile)?;
        }
        let assemble = self.tasks.register(Task::new(format!("assemble{}", v), "Default"))?;
        let dex = self.tasks.named(&format!("dexBuilder{}", v))?;
        self.tasks.depends_on(assemble, dex)?;

        let generated_sources = vec![self
            .build_dir
            .join("generated")
            .join("source")
            .join("buildConfig")
            .join(name)];
        let state = Arc::new(Mutex::new(VariantState {
            classpath: vec![r_jar],
            ..VariantState::default()
        }));
        let variant = Arc::new(ProjectVariant {
            name: name.to_owned(),
            kind,
            primary: Some(compile_name),
            generated_sources: generated_sources.clone(),
            source_sets: vec!["main".to_owned(), name.to_owned()],
            resource_task: Some(format!("generate{}RFile", v)),
            state: state.clone(),
        });

        let mut sources: Vec<PathBuf> = variant
            .source_sets
            .iter()
            .filter_map(|s| self.source_sets.get(s))
            .flat_map(|s| s.java.dirs().to_vec())
            .collect();
        sources.extend(generated_sources);
        let processors = state.clone();
        self.compiles.insert(
            compile,
            PrimaryCompile {
                classpath: variant.compile_classpath(None),
                annotation_processor_path: Provider::from_fn(move || {
                    Ok(lock(&processors).processor_path.iter().cloned().collect())
                }),
                sources,
                excluded: vec![],
                destination,
            },
        );
        self.variants.push(variant.clone());
        Ok(variant)
    }

    /// A variant that compiles nothing, like a test variant with no code of its own.
    pub fn add_bare_variant(&mut self, name: &str, kind: VariantKind) -> Arc<ProjectVariant> {
        let variant = Arc::new(ProjectVariant {
            name: name.to_owned(),
            kind,
            primary: None,
            generated_sources: vec![],
            source_sets: vec![],
            resource_task: None,
            state: Arc::new(Mutex::new(VariantState::default())),
        });
        self.variants.push(variant.clone());
        variant
    }

    fn variant(&self, name: &str) -> Result<&Arc<ProjectVariant>, HostError> {
        self.variants
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| HostError::UnknownVariant(name.to_owned()))
    }

    pub fn add_variant_classpath<P: Into<PathBuf>>(
        &mut self,
        variant: &str,
        paths: Vec<P>,
    ) -> Result<(), HostError> {
        let variant = self.variant(variant)?;
        lock(&variant.state)
            .classpath
            .extend(paths.into_iter().map(Into::into));
        Ok(())
    }

    pub fn set_annotation_processor_path<P: Into<PathBuf>>(
        &mut self,
        variant: &str,
        paths: Vec<P>,
    ) -> Result<(), HostError> {
        let variant = self.variant(variant)?;
        lock(&variant.state).processor_path = paths.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Class directories appended to the variant's bytecode by plugins.
    pub fn appended_classes(&self, variant: &str) -> Result<Vec<PathBuf>, HostError> {
        Ok(lock(&self.variant(variant)?.state).classes.clone())
    }

    /// Applies `plugin`, runs `configure` as the user's build script would, then finishes the
    /// plugin's configuration.
    pub fn evaluate<P, F>(&mut self, plugin: &P, configure: F) -> Result<(), P::Error>
    where
        P: Plugin,
        F: FnOnce(&mut Project),
    {
        plugin.apply(self)?;
        configure(self);
        plugin.after_evaluate(self)
    }

    /// Runs `targets` and everything they need.
    pub fn execute(&self, targets: &[&str]) -> Result<ExecutionReport, TaskError> {
        let ids = targets
            .iter()
            .map(|t| self.tasks.named(t))
            .collect::<Result<Vec<_>, _>>()?;
        let plan = Plan::for_targets(&self.tasks, &ids);
        graft_tasks::execute(&self.tasks, &plan, graft_tasks::default_parallelism())
    }
}

impl Host for Project {
    fn has_plugin(&self, id: &str) -> bool {
        self.plugins.contains(id)
    }

    fn options(&self) -> &ProjectOptions {
        &self.options
    }

    fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    fn configure_each_source_set(&mut self, rule: SourceSetRule) {
        self.source_sets.configure_each(rule, &mut self.dependencies);
    }

    fn source_set(&self, name: &str) -> Option<&SourceSet> {
        self.source_sets.get(name)
    }

    fn dependencies(&self) -> &DependencyHandler {
        &self.dependencies
    }

    fn dependencies_mut(&mut self) -> &mut DependencyHandler {
        &mut self.dependencies
    }

    fn tasks(&self) -> &TaskGraph {
        &self.tasks
    }

    fn tasks_mut(&mut self) -> &mut TaskGraph {
        &mut self.tasks
    }

    fn variants(&self) -> Vec<Arc<dyn Variant>> {
        self.variants
            .iter()
            .map(|v| v.clone() as Arc<dyn Variant>)
            .collect()
    }

    fn primary_compile(&self, task: TaskId) -> Option<&PrimaryCompile> {
        self.compiles.get(&task)
    }

    fn primary_compile_mut(&mut self, task: TaskId) -> Option<&mut PrimaryCompile> {
        self.compiles.get_mut(&task)
    }

    fn boot_classpath(&self) -> Provider<Classpath> {
        Provider::of(self.boot_classpath.iter().cloned().collect())
    }

    fn configuration_files(&self, name: &str) -> Option<Provider<Classpath>> {
        self.configuration_files
            .get(name)
            .map(|files| Provider::of(files.iter().cloned().collect()))
    }

    fn register_bytecode(
        &mut self,
        variant: &str,
        task: TaskId,
        output: PathBuf,
        mode: BytecodeRegistration,
    ) -> Result<Option<RegistrationToken>, HostError> {
        let key = (variant.to_owned(), task);
        if let Some(token) = self.registrations.get(&key) {
            return Ok(*token);
        }
        let state = self.variant(variant)?.state.clone();
        let token = match mode {
            BytecodeRegistration::AppendToClasses => {
                lock(&state).classes.push(output);
                None
            }
            BytecodeRegistration::PreCompileGenerated => {
                let token = RegistrationToken(self.next_token);
                self.next_token += 1;
                lock(&state).generated.push((token, output));
                Some(token)
            }
        };
        debug!(
            "registered output of {} in {} as {:?}",
            self.tasks.task(task).name(),
            variant,
            mode
        );
        self.registrations.insert(key, token);
        Ok(token)
    }
}
