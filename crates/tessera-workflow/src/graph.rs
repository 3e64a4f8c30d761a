use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::WorkflowError;
use crate::task::TaskSpec;

/// A validated task graph with its batch plan.
#[derive(Debug, Clone)]
pub struct Graph {
  tasks: BTreeMap<String, TaskSpec>,
  /// Adjacency list: task -> tasks that depend on it.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: task -> its predecessors.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Tasks with no predecessors.
  entry_points: Vec<String>,
  /// The single task nothing depends on.
  terminal: String,
  /// Kahn levels: every task's predecessors sit in earlier batches.
  batches: Vec<Vec<String>>,
}

impl Graph {
  /// Validate `specs` and compile the batch plan.
  pub fn new(specs: Vec<TaskSpec>) -> Result<Self, WorkflowError> {
    let mut tasks = BTreeMap::new();
    for spec in specs {
      if tasks.contains_key(&spec.name) {
        return Err(WorkflowError::DuplicateTask(spec.name));
      }
      tasks.insert(spec.name.clone(), spec);
    }

    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for name in tasks.keys() {
      adjacency.entry(name.clone()).or_default();
      reverse_adjacency.entry(name.clone()).or_default();
    }

    for spec in tasks.values() {
      let mut seen = HashSet::new();
      for predecessor in &spec.depends_on {
        if predecessor == &spec.name {
          return Err(WorkflowError::SelfDependency(spec.name.clone()));
        }
        if !tasks.contains_key(predecessor) {
          return Err(WorkflowError::UnknownPredecessor {
            task: spec.name.clone(),
            predecessor: predecessor.clone(),
          });
        }
        if !seen.insert(predecessor.as_str()) {
          continue;
        }
        adjacency
          .entry(predecessor.clone())
          .or_default()
          .push(spec.name.clone());
        reverse_adjacency
          .entry(spec.name.clone())
          .or_default()
          .push(predecessor.clone());
      }
    }

    detect_cycle(&tasks, &adjacency)?;

    let entry_points: Vec<String> = tasks
      .keys()
      .filter(|name| reverse_adjacency.get(*name).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();
    if entry_points.is_empty() {
      return Err(WorkflowError::NoEntryPoints);
    }

    let mut terminals: Vec<String> = tasks
      .keys()
      .filter(|name| adjacency.get(*name).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();
    if terminals.len() != 1 {
      return Err(WorkflowError::TerminalCount { found: terminals });
    }
    let terminal = terminals.swap_remove(0);

    let batches = kahn_levels(&tasks, &adjacency, &reverse_adjacency);

    Ok(Self {
      tasks,
      adjacency,
      reverse_adjacency,
      entry_points,
      terminal,
      batches,
    })
  }

  pub fn get(&self, name: &str) -> Option<&TaskSpec> {
    self.tasks.get(name)
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  pub fn task_names(&self) -> impl Iterator<Item = &str> {
    self.tasks.keys().map(String::as_str)
  }

  /// Tasks with no predecessors.
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  pub fn terminal(&self) -> &str {
    &self.terminal
  }

  /// Tasks that depend on `name`.
  pub fn downstream(&self, name: &str) -> &[String] {
    self
      .adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Predecessors of `name`.
  pub fn upstream(&self, name: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Whether `name` waits on more than one predecessor.
  pub fn is_join_point(&self, name: &str) -> bool {
    self.upstream(name).len() > 1
  }

  /// The batch plan, in execution order. Names within a batch are sorted.
  pub fn batches(&self) -> &[Vec<String>] {
    &self.batches
  }

  /// The loop applied between passes: from the terminal task back to the
  /// entry tasks. Never part of topological execution.
  pub fn back_edge(&self) -> (&str, &[String]) {
    (&self.terminal, &self.entry_points)
  }
}

/// Check for cycles using DFS.
fn detect_cycle(
  tasks: &BTreeMap<String, TaskSpec>,
  adjacency: &HashMap<String, Vec<String>>,
) -> Result<(), WorkflowError> {
  #[derive(Clone, Copy, PartialEq)]
  enum Color {
    White,
    Gray,
    Black,
  }

  fn dfs<'a>(
    node: &'a str,
    adjacency: &'a HashMap<String, Vec<String>>,
    color: &mut HashMap<&'a str, Color>,
  ) -> Option<&'a str> {
    color.insert(node, Color::Gray);
    if let Some(neighbors) = adjacency.get(node) {
      for neighbor in neighbors {
        match color.get(neighbor.as_str()) {
          Some(Color::Gray) => return Some(neighbor.as_str()),
          Some(Color::White) => {
            if let Some(found) = dfs(neighbor, adjacency, color) {
              return Some(found);
            }
          }
          _ => {}
        }
      }
    }
    color.insert(node, Color::Black);
    None
  }

  let mut color: HashMap<&str, Color> = tasks.keys().map(|n| (n.as_str(), Color::White)).collect();
  for name in tasks.keys() {
    if color.get(name.as_str()) == Some(&Color::White) {
      if let Some(found) = dfs(name, adjacency, &mut color) {
        return Err(WorkflowError::CycleDetected(found.to_string()));
      }
    }
  }
  Ok(())
}

/// Group tasks by dependency depth. Only called on acyclic graphs.
fn kahn_levels(
  tasks: &BTreeMap<String, TaskSpec>,
  adjacency: &HashMap<String, Vec<String>>,
  reverse_adjacency: &HashMap<String, Vec<String>>,
) -> Vec<Vec<String>> {
  let mut remaining: HashMap<&str, usize> = tasks
    .keys()
    .map(|n| (n.as_str(), reverse_adjacency.get(n).map_or(0, Vec::len)))
    .collect();

  let mut current: Vec<&str> = tasks
    .keys()
    .map(String::as_str)
    .filter(|n| remaining.get(n) == Some(&0))
    .collect();

  let mut batches = Vec::new();
  while !current.is_empty() {
    let mut next = Vec::new();
    for name in &current {
      for downstream in adjacency.get(*name).into_iter().flatten() {
        if let Some(count) = remaining.get_mut(downstream.as_str()) {
          *count -= 1;
          if *count == 0 {
            next.push(downstream.as_str());
          }
        }
      }
    }
    current.sort_unstable();
    batches.push(current.iter().map(|n| n.to_string()).collect());
    current = next;
  }
  batches
}
