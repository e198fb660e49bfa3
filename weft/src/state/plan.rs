//! `Plan` and `Step`: created by the `plan_create` tool, mutated only by the
//! executor (status transitions) and replanner (step list revision).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// 1-based.
    pub id: u32,
    pub title: String,
    pub status: StepStatus,
}

impl Step {
    pub fn pending(id: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: StepStatus::Pending,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// 8-hex.
    pub plan_id: String,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(title: impl Into<String>, step_titles: Vec<String>) -> Self {
        let steps = step_titles
            .into_iter()
            .enumerate()
            .map(|(i, t)| Step::pending((i + 1) as u32, t))
            .collect();
        Self {
            plan_id: crate::memory::short_hex_id(),
            title: title.into(),
            steps,
        }
    }

    pub fn step_mut(&mut self, id: u32) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_plan_numbers_steps_from_one() {
        let p = Plan::new("t", vec!["a".into(), "b".into()]);
        assert_eq!(p.steps[0].id, 1);
        assert_eq!(p.steps[1].id, 2);
        assert!(p.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(p.plan_id.len(), 8);
    }
}
