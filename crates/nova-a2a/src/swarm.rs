//! SwarmCoordinator (C15): discover capable agents, recruit them into a
//! swarm session via task proposals, assign sub-tasks, and reassign on
//! failure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::agent_registry::AgentRegistry;
use crate::error::A2AError;
use crate::negotiator::TaskNegotiator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTaskState {
    Pending,
    Assigned,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SubTask {
    pub id: String,
    pub description: Value,
    pub assignee: Option<String>,
    pub state: SubTaskState,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmStatus {
    Recruiting,
    Active,
    Completed,
    Failed,
}

pub struct SwarmSession {
    pub id: String,
    pub coordinator: String,
    pub description: Value,
    pub members: Mutex<Vec<String>>,
    /// Agents discovered as capable when the swarm was created, proposed a
    /// `task-proposal` and awaiting (or past) negotiation.
    pub candidates: Vec<String>,
    pub sub_tasks: Mutex<HashMap<String, SubTask>>,
    pub max_attempts: u32,
    activated: AtomicBool,
}

impl SwarmSession {
    /// `Recruiting` until the first agent joins (`activated`), regardless of
    /// how many sub-tasks are queued; thereafter derived from sub-task state.
    pub fn status(&self) -> SwarmStatus {
        if !self.activated.load(Ordering::SeqCst) {
            return SwarmStatus::Recruiting;
        }
        let tasks = self.sub_tasks.lock().unwrap();
        if tasks.is_empty() {
            return SwarmStatus::Active;
        }
        if tasks.values().any(|t| t.state == SubTaskState::Failed) {
            return SwarmStatus::Failed;
        }
        if tasks.values().all(|t| t.state == SubTaskState::Completed) {
            return SwarmStatus::Completed;
        }
        SwarmStatus::Active
    }
}

pub struct SwarmCoordinator {
    registry: std::sync::Arc<AgentRegistry>,
    negotiator: std::sync::Arc<TaskNegotiator>,
    sessions: Mutex<HashMap<String, std::sync::Arc<SwarmSession>>>,
}

impl SwarmCoordinator {
    pub fn new(
        registry: std::sync::Arc<AgentRegistry>,
        negotiator: std::sync::Arc<TaskNegotiator>,
    ) -> Self {
        Self {
            registry,
            negotiator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a swarm session: discovers agents carrying at least one of
    /// `required_capabilities` (excluding the coordinator itself), queues
    /// `sub_task_descriptions` as pending sub-tasks, and broadcasts a
    /// `task-proposal` negotiation to each capable agent.
    pub fn create_swarm(
        &self,
        coordinator: &str,
        description: Value,
        required_capabilities: &[String],
        sub_task_descriptions: Vec<Value>,
        max_attempts: u32,
        deadline_ms: u64,
        now_ms: u64,
    ) -> std::sync::Arc<SwarmSession> {
        let id = Uuid::new_v4().to_string();

        let candidates: Vec<String> = self
            .registry
            .list()
            .into_iter()
            .filter(|card| card.agent_id != coordinator)
            .filter(|card| {
                required_capabilities.is_empty()
                    || card
                        .capabilities
                        .iter()
                        .any(|cap| required_capabilities.contains(cap))
            })
            .map(|card| card.agent_id)
            .collect();

        let session = std::sync::Arc::new(SwarmSession {
            id: id.clone(),
            coordinator: coordinator.to_string(),
            description: description.clone(),
            members: Mutex::new(Vec::new()),
            candidates: candidates.clone(),
            sub_tasks: Mutex::new(HashMap::new()),
            max_attempts,
            activated: AtomicBool::new(false),
        });
        self.sessions.lock().unwrap().insert(id.clone(), session.clone());

        for sub_task in sub_task_descriptions {
            let _ = self.add_sub_task(&id, sub_task);
        }

        for candidate in &candidates {
            self.negotiator.propose(
                coordinator,
                candidate,
                json!({"swarm_id": id, "description": description}),
                deadline_ms,
                now_ms,
            );
        }

        session
    }

    pub fn get_swarm(&self, id: &str) -> Result<std::sync::Arc<SwarmSession>, A2AError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| A2AError::SwarmNotFound(id.to_string()))
    }

    /// Adds `agent_id` to the session (idempotent), auto-assigns it the
    /// first still-`Pending` sub-task if one exists, and activates the
    /// session (`Recruiting` -> derived status) on the first join.
    pub fn join_swarm(&self, swarm_id: &str, agent_id: &str) -> Result<(), A2AError> {
        let session = self.get_swarm(swarm_id)?;
        let mut members = session.members.lock().unwrap();
        let is_first = members.is_empty();
        if !members.iter().any(|m| m == agent_id) {
            members.push(agent_id.to_string());
        }
        drop(members);
        session.activated.store(true, Ordering::SeqCst);

        if is_first || true {
            let pending_id = {
                let tasks = session.sub_tasks.lock().unwrap();
                tasks
                    .values()
                    .find(|t| t.state == SubTaskState::Pending)
                    .map(|t| t.id.clone())
            };
            if let Some(pending_id) = pending_id {
                self.assign_sub_task(swarm_id, &pending_id, agent_id)?;
            }
        }
        Ok(())
    }

    pub fn add_sub_task(&self, swarm_id: &str, description: Value) -> Result<String, A2AError> {
        let session = self.get_swarm(swarm_id)?;
        let id = Uuid::new_v4().to_string();
        session.sub_tasks.lock().unwrap().insert(
            id.clone(),
            SubTask {
                id: id.clone(),
                description,
                assignee: None,
                state: SubTaskState::Pending,
                attempts: 0,
            },
        );
        Ok(id)
    }

    pub fn assign_sub_task(&self, swarm_id: &str, sub_task_id: &str, agent_id: &str) -> Result<(), A2AError> {
        let session = self.get_swarm(swarm_id)?;
        let mut tasks = session.sub_tasks.lock().unwrap();
        let task = tasks
            .get_mut(sub_task_id)
            .ok_or_else(|| A2AError::SubTaskNotFound(sub_task_id.to_string()))?;
        task.assignee = Some(agent_id.to_string());
        task.state = SubTaskState::Assigned;
        task.attempts += 1;
        Ok(())
    }

    pub fn complete_sub_task(&self, swarm_id: &str, sub_task_id: &str) -> Result<(), A2AError> {
        let session = self.get_swarm(swarm_id)?;
        let mut tasks = session.sub_tasks.lock().unwrap();
        let task = tasks
            .get_mut(sub_task_id)
            .ok_or_else(|| A2AError::SubTaskNotFound(sub_task_id.to_string()))?;
        task.state = SubTaskState::Completed;
        Ok(())
    }

    /// Marks a sub-task failed; if under `max_attempts` it is reset to
    /// `Pending` (unassigned) for reassignment, otherwise it stays `Failed`.
    pub fn fail_sub_task(&self, swarm_id: &str, sub_task_id: &str) -> Result<SubTaskState, A2AError> {
        let session = self.get_swarm(swarm_id)?;
        let mut tasks = session.sub_tasks.lock().unwrap();
        let task = tasks
            .get_mut(sub_task_id)
            .ok_or_else(|| A2AError::SubTaskNotFound(sub_task_id.to_string()))?;
        if task.attempts < session.max_attempts {
            task.state = SubTaskState::Pending;
            task.assignee = None;
        } else {
            task.state = SubTaskState::Failed;
        }
        Ok(task.state)
    }
}
