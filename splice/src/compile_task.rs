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

use std::{fs, path::PathBuf, sync::Arc};

use anyhow::Context;
use graft_interface::{Classpath, Provider, ProviderError};
use graft_tasks::TaskAction;
use tracing::debug;

use crate::incremental::IncrementalPaths;

#[derive(Debug, Clone)]
pub enum ClasspathBinding {
    Resolved(Classpath),
    /// Bound when the task runs.
    Pending(Provider<Classpath>),
}

impl ClasspathBinding {
    pub fn bind(&self) -> Result<Classpath, ProviderError> {
        match self {
            ClasspathBinding::Resolved(classpath) => Ok(classpath.clone()),
            ClasspathBinding::Pending(provider) => provider.get(),
        }
    }
}

/// Configuration of one secondary compile, as wired while splicing.
#[derive(Debug, Clone)]
pub struct SecondaryCompileSpec {
    pub task: String,
    pub variant: String,
    pub destination: PathBuf,
    pub sources: Vec<PathBuf>,
    pub source_extension: String,
    pub classpath: ClasspathBinding,
    pub annotation_processor_path: Provider<Classpath>,
    pub toolchain_classpath: Provider<Classpath>,
    pub incremental: IncrementalPaths,
}

/// A secondary compile with every lazy input resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    pub task: String,
    pub variant: String,
    pub destination: PathBuf,
    pub sources: Vec<PathBuf>,
    pub source_extension: String,
    pub classpath: Classpath,
    pub annotation_processor_path: Classpath,
    pub toolchain_classpath: Classpath,
    pub incremental: IncrementalPaths,
}

impl SecondaryCompileSpec {
    pub fn bind(&self) -> Result<CompileRequest, ProviderError> {
        Ok(CompileRequest {
            task: self.task.clone(),
            variant: self.variant.clone(),
            destination: self.destination.clone(),
            sources: self.sources.clone(),
            source_extension: self.source_extension.clone(),
            classpath: self.classpath.bind()?,
            annotation_processor_path: self.annotation_processor_path.get()?,
            toolchain_classpath: self.toolchain_classpath.get()?,
            incremental: self.incremental.clone(),
        })
    }
}

/// Runs the secondary language's compiler.
pub trait LanguageCompiler: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> anyhow::Result<()>;
}

pub struct SecondaryCompileAction {
    spec: SecondaryCompileSpec,
    compiler: Arc<dyn LanguageCompiler>,
}

impl SecondaryCompileAction {
    pub fn new(spec: SecondaryCompileSpec, compiler: Arc<dyn LanguageCompiler>) -> Self {
        SecondaryCompileAction { spec, compiler }
    }
}

impl TaskAction for SecondaryCompileAction {
    fn execute(&self) -> anyhow::Result<()> {
        let request = self
            .spec
            .bind()
            .with_context(|| format!("resolving the inputs of {}", self.spec.task))?;
        debug!(
            "{}: {} classpath entries",
            request.task,
            request.classpath.len()
        );
        fs::create_dir_all(&request.destination)
            .with_context(|| format!("creating {}", request.destination.display()))?;
        if let Some(state_dir) = request.incremental.analysis.parent() {
            fs::create_dir_all(state_dir)
                .with_context(|| format!("creating {}", state_dir.display()))?;
        }
        self.compiler.compile(&request)
    }
}
