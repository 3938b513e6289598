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

//! The host's task graph, as seen by plugins.
//!
//! Tasks are addressed by name. Edges always point from the task that declares them to the task
//! they mention, so `a depends on b` is stored as `a -> b` and `a finalized by b` as `a -> b`
//! even though in the latter `b` runs second. [`TaskGraph::runs_before`] is the single place that
//! knows how each edge kind translates to ordering.

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Display},
    path::PathBuf,
    sync::Arc,
};

use petgraph::{
    stable_graph::{NodeIndex, StableGraph},
    visit::EdgeRef,
    Direction,
};
use thiserror::Error;

mod pool;
mod scheduler;

pub use scheduler::{default_parallelism, execute, ExecutionReport, Plan};

pub type TaskId = NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Edge {
    DependsOn,
    MustRunAfter,
    FinalizedBy,
}

impl Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::DependsOn => write!(f, "depends on"),
            Edge::MustRunAfter => write!(f, "must run after"),
            Edge::FinalizedBy => write!(f, "finalized by"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("a task named '{0}' is already registered")]
    Duplicate(String),
    #[error("no task named '{0}'")]
    Unknown(String),
    #[error("'{from}' {kind} '{to}' would introduce a cycle")]
    Cycle { from: String, kind: Edge, to: String },
    #[error("task '{task}' failed")]
    Failed {
        task: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("a worker panicked while executing tasks")]
    Panicked,
}

/// The body of a task. Runs on a worker thread during the execution phase.
pub trait TaskAction: Send + Sync {
    fn execute(&self) -> anyhow::Result<()>;
}

pub struct Task {
    name: String,
    type_name: String,
    enabled: bool,
    outputs: Vec<PathBuf>,
    action: Option<Arc<dyn TaskAction>>,
}

impl Task {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, type_name: T) -> Task {
        Task {
            name: name.into(),
            type_name: type_name.into(),
            enabled: true,
            outputs: vec![],
            action: None,
        }
    }

    pub fn with_action(mut self, action: Arc<dyn TaskAction>) -> Task {
        self.action = Some(action);
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Task {
        self.outputs = outputs;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn action(&self) -> Option<&Arc<dyn TaskAction>> {
        self.action.as_ref()
    }

    pub fn set_action(&mut self, action: Arc<dyn TaskAction>) {
        self.action = Some(action);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("enabled", &self.enabled)
            .field("outputs", &self.outputs)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TaskGraph {
    graph: StableGraph<Task, Edge>,
    by_name: HashMap<String, TaskId>,
}

impl TaskGraph {
    pub fn new() -> TaskGraph {
        TaskGraph::default()
    }

    pub fn register(&mut self, task: Task) -> Result<TaskId, TaskError> {
        if self.by_name.contains_key(task.name()) {
            return Err(TaskError::Duplicate(task.name().to_owned()));
        }
        let name = task.name().to_owned();
        let id = self.graph.add_node(task);
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).copied()
    }

    pub fn named(&self, name: &str) -> Result<TaskId, TaskError> {
        self.find(name)
            .ok_or_else(|| TaskError::Unknown(name.to_owned()))
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.graph[id]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.graph[id]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> + '_ {
        self.graph
            .node_indices()
            .map(move |id| (id, &self.graph[id]))
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if the edge was added, false if it already existed.
    pub fn depends_on(&mut self, task: TaskId, dependency: TaskId) -> Result<bool, TaskError> {
        self.add_edge(task, dependency, Edge::DependsOn)
    }

    pub fn must_run_after(&mut self, task: TaskId, other: TaskId) -> Result<bool, TaskError> {
        self.add_edge(task, other, Edge::MustRunAfter)
    }

    pub fn finalized_by(&mut self, task: TaskId, finalizer: TaskId) -> Result<bool, TaskError> {
        self.add_edge(task, finalizer, Edge::FinalizedBy)
    }

    /// `name` depends on `dependency`, if a task called `name` exists.
    pub fn depends_on_if_present(
        &mut self,
        name: &str,
        dependency: TaskId,
    ) -> Result<bool, TaskError> {
        match self.find(name) {
            Some(task) => self.depends_on(task, dependency),
            None => Ok(false),
        }
    }

    /// `task` must run after `name`, if a task called `name` exists.
    pub fn must_run_after_if_present(
        &mut self,
        task: TaskId,
        name: &str,
    ) -> Result<bool, TaskError> {
        match self.find(name) {
            Some(other) => self.must_run_after(task, other),
            None => Ok(false),
        }
    }

    pub fn has_edge(&self, from: TaskId, to: TaskId, kind: Edge) -> bool {
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && *e.weight() == kind)
    }

    /// Tasks `task` declares a depends-on edge to, ordered by name.
    pub fn dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.targets(task, Edge::DependsOn)
    }

    pub fn finalizers(&self, task: TaskId) -> Vec<TaskId> {
        self.targets(task, Edge::FinalizedBy)
    }

    fn targets(&self, task: TaskId, kind: Edge) -> Vec<TaskId> {
        let mut targets: Vec<TaskId> = self
            .graph
            .edges_directed(task, Direction::Outgoing)
            .filter(|e| *e.weight() == kind)
            .map(|e| e.target())
            .collect();
        targets.sort_by(|a, b| self.graph[*a].name().cmp(self.graph[*b].name()));
        targets
    }

    /// Tasks that have to finish before `task` may start, whatever edge kind says so.
    pub fn runs_before(&self, task: TaskId) -> Vec<TaskId> {
        let declared = self
            .graph
            .edges_directed(task, Direction::Outgoing)
            .filter(|e| *e.weight() != Edge::FinalizedBy)
            .map(|e| e.target());
        let finalized = self
            .graph
            .edges_directed(task, Direction::Incoming)
            .filter(|e| *e.weight() == Edge::FinalizedBy)
            .map(|e| e.source());
        declared.chain(finalized).collect()
    }

    /// True if `later` transitively has to wait for `earlier`.
    pub fn is_ordered_after(&self, later: TaskId, earlier: TaskId) -> bool {
        let mut stack = self.runs_before(later);
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == earlier {
                return true;
            }
            if seen.insert(node) {
                stack.extend(self.runs_before(node));
            }
        }
        false
    }

    fn add_edge(&mut self, from: TaskId, to: TaskId, kind: Edge) -> Result<bool, TaskError> {
        if self.has_edge(from, to, kind) {
            return Ok(false);
        }
        let (later, earlier) = match kind {
            Edge::FinalizedBy => (to, from),
            _ => (from, to),
        };
        if later == earlier || self.is_ordered_after(earlier, later) {
            return Err(TaskError::Cycle {
                from: self.graph[from].name().to_owned(),
                kind,
                to: self.graph[to].name().to_owned(),
            });
        }
        self.graph.add_edge(from, to, kind);
        Ok(true)
    }
}

impl Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.by_name.keys().collect();
        names.sort();
        for name in names {
            let id = self.by_name[name];
            let task = &self.graph[id];
            write!(f, "{} ({})", task.name(), task.type_name())?;
            if !task.is_enabled() {
                write!(f, " [disabled]")?;
            }
            writeln!(f)?;
            let mut edges: Vec<(Edge, &str)> = self
                .graph
                .edges_directed(id, Direction::Outgoing)
                .map(|e| (*e.weight(), self.graph[e.target()].name()))
                .collect();
            edges.sort();
            for (kind, target) in edges {
                writeln!(f, "  {} {}", kind, target)?;
            }
        }
        Ok(())
    }
}
