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

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use graft_interface::Host;
use graft_strip::{strip_final_modifiers, StripOptions};
use graft_tasks::{Task, TaskAction, TaskId};

use crate::{
    config::{expand, SpliceConfig},
    SpliceError,
};

pub const STRIP_TASK_TYPE: &str = "StripFinalModifier";

pub struct StripAction {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    options: StripOptions,
}

impl TaskAction for StripAction {
    fn execute(&self) -> anyhow::Result<()> {
        strip_final_modifiers(&self.inputs, &self.output, self.options)
            .with_context(|| format!("writing {}", self.output.display()))?;
        Ok(())
    }
}

/// Finds or registers the task deriving `variant`'s subclassable accessor jar, and returns it with
/// the jar's path. Its inputs are the accessor jars `resources` declares, if there is such a task.
pub fn ensure_strip_task(
    host: &mut dyn Host,
    config: &SpliceConfig,
    variant: &str,
    resources: Option<TaskId>,
) -> Result<(TaskId, PathBuf), SpliceError> {
    let output = config.derived_artifact(host.build_dir(), variant);
    let name = expand(&config.strip_task_template, variant);
    if let Some(id) = host.tasks().find(&name) {
        return Ok((id, output));
    }

    let inputs: Vec<PathBuf> = resources
        .map(|id| accessor_outputs(&*host, config, id))
        .unwrap_or_default();
    let action = StripAction {
        inputs,
        output: output.clone(),
        options: StripOptions {
            erase_field_constants: config.erase_field_constants,
        },
    };
    let tasks = host.tasks_mut();
    let id = tasks.register(
        Task::new(name, STRIP_TASK_TYPE)
            .with_outputs(vec![output.clone()])
            .with_action(Arc::new(action)),
    )?;
    if let Some(resources) = resources {
        tasks.depends_on(id, resources)?;
    }
    Ok((id, output))
}

/// The declared outputs of `task` named like the accessor artifact.
pub fn accessor_outputs(host: &dyn Host, config: &SpliceConfig, task: TaskId) -> Vec<PathBuf> {
    host.tasks()
        .task(task)
        .outputs()
        .iter()
        .filter(|p| {
            p.file_name()
                .map_or(false, |n| n == config.accessor_artifact.as_str())
        })
        .cloned()
        .collect()
}
