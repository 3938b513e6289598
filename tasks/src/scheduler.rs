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
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    pool::{PoolJob, WorkerPool},
    TaskAction, TaskError, TaskGraph, TaskId,
};

/// The tasks needed to build some targets, in an order that honours every edge between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    order: Vec<TaskId>,
}

impl Plan {
    pub fn for_targets(graph: &TaskGraph, targets: &[TaskId]) -> Plan {
        // Requested tasks pull in what they depend on and what finalizes them. must-run-after
        // only orders, it never pulls anything in.
        let mut included = HashSet::new();
        let mut stack: Vec<TaskId> = targets.to_vec();
        while let Some(id) = stack.pop() {
            if included.insert(id) {
                stack.extend(graph.dependencies(id));
                stack.extend(graph.finalizers(id));
            }
        }

        let mut waiting_on: HashMap<TaskId, usize> = HashMap::new();
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        for &id in &included {
            let before: HashSet<TaskId> = graph
                .runs_before(id)
                .into_iter()
                .filter(|b| included.contains(b))
                .collect();
            waiting_on.insert(id, before.len());
            for b in before {
                dependents.entry(b).or_default().push(id);
            }
        }

        // Ties are broken by name so plans are stable from run to run.
        let mut ready: BTreeMap<&str, TaskId> = waiting_on
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| (graph.task(*id).name(), *id))
            .collect();
        let mut order = Vec::with_capacity(included.len());
        while let Some((_, id)) = ready.pop_first() {
            order.push(id);
            for dependent in dependents.get(&id).into_iter().flatten() {
                let count = waiting_on
                    .get_mut(dependent)
                    .expect("dependents are always included");
                *count -= 1;
                if *count == 0 {
                    ready.insert(graph.task(*dependent).name(), *dependent);
                }
            }
        }
        debug_assert_eq!(order.len(), included.len(), "task graph has a cycle");
        Plan { order }
    }

    pub fn order(&self) -> &[TaskId] {
        &self.order
    }

    pub fn names<'a>(&self, graph: &'a TaskGraph) -> Vec<&'a str> {
        self.order.iter().map(|id| graph.task(*id).name()).collect()
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.order.iter().position(|t| *t == id)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// In completion order.
    pub executed: Vec<String>,
    /// Disabled tasks and tasks with no action.
    pub skipped: Vec<String>,
}

struct ActionJob {
    id: TaskId,
    action: Arc<dyn TaskAction>,
}

impl PoolJob for ActionJob {
    type Result = (TaskId, anyhow::Result<()>);

    fn run(&self) -> Self::Result {
        (self.id, self.action.execute())
    }
}

pub fn default_parallelism() -> usize {
    num_cpus::get()
}

struct Progress {
    waiting_on: HashMap<TaskId, usize>,
    dependents: HashMap<TaskId, Vec<TaskId>>,
    ready: VecDeque<TaskId>,
}

impl Progress {
    fn new(graph: &TaskGraph, plan: &Plan) -> Progress {
        let included: HashSet<TaskId> = plan.order().iter().copied().collect();
        let mut waiting_on = HashMap::new();
        let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut ready = VecDeque::new();
        for &id in plan.order() {
            let before: HashSet<TaskId> = graph
                .runs_before(id)
                .into_iter()
                .filter(|b| included.contains(b))
                .collect();
            if before.is_empty() {
                ready.push_back(id);
            }
            waiting_on.insert(id, before.len());
            for b in before {
                dependents.entry(b).or_default().push(id);
            }
        }
        Progress {
            waiting_on,
            dependents,
            ready,
        }
    }

    fn finish(&mut self, id: TaskId) {
        for dependent in self.dependents.remove(&id).into_iter().flatten() {
            if let Some(count) = self.waiting_on.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push_back(dependent);
                }
            }
        }
    }
}

/// Runs every task of `plan` on up to `parallelism` workers. The first failure stops any further
/// task from starting; tasks already running are allowed to finish. Nothing is retried.
pub fn execute(
    graph: &TaskGraph,
    plan: &Plan,
    parallelism: usize,
) -> Result<ExecutionReport, TaskError> {
    let pool = WorkerPool::with_capacity(parallelism);
    let outcome = pool.run(|s| {
        let mut progress = Progress::new(graph, plan);
        let mut report = ExecutionReport::default();
        let mut in_flight = 0;
        let mut failure: Option<TaskError> = None;
        loop {
            while failure.is_none() && in_flight < s.capacity() {
                let id = match progress.ready.pop_front() {
                    Some(id) => id,
                    None => break,
                };
                let task = graph.task(id);
                match task.action() {
                    Some(action) if task.is_enabled() => {
                        debug!("starting {}", task.name());
                        s.enqueue(ActionJob {
                            id,
                            action: action.clone(),
                        });
                        in_flight += 1;
                    }
                    _ => {
                        debug!("skipping {}", task.name());
                        report.skipped.push(task.name().to_owned());
                        progress.finish(id);
                    }
                }
            }

            if in_flight == 0 {
                break;
            }

            match s.rx.recv() {
                Ok((id, result)) => {
                    in_flight -= 1;
                    let name = graph.task(id).name();
                    match result {
                        Ok(()) => {
                            report.executed.push(name.to_owned());
                            progress.finish(id);
                        }
                        Err(e) => {
                            if failure.is_none() {
                                failure = Some(TaskError::Failed {
                                    task: name.to_owned(),
                                    source: e.into(),
                                });
                            }
                        }
                    }
                }
                Err(_) => return Err(TaskError::Panicked),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => {
                info!(
                    "executed {} tasks, skipped {}",
                    report.executed.len(),
                    report.skipped.len()
                );
                Ok(report)
            }
        }
    });
    outcome.unwrap_or(Err(TaskError::Panicked))
}
