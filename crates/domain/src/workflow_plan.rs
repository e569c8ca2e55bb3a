//! Reconciles the steps of an environment workflow with its delivery targets.
//!
//! Users may edit generated workflows (reorder steps, add suspend or notify
//! steps). When the targets of an environment change, only the deploy steps
//! whose targets were removed or added are touched and every other step is
//! kept in place.
//!
//! A plan links each deploy step to the placement policies it uses and each
//! policy to the `cluster/namespace` targets it covers. Comparing the plan of
//! the stored workflow with the plan derived from the current targets marks
//! every step and policy with an [`EditState`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::application::ApplicationPolicy;
use crate::policy::{
    ENV_BINDING_POLICY_TYPE, EnvBindingSpec, TOPOLOGY_POLICY_TYPE, TopologyPolicySpec,
    decode_properties,
};
use crate::workflow::{
    DEPLOY_CLOUD_RESOURCE_STEP_TYPE, DEPLOY_STEP_TYPE, DEPLOY2ENV_STEP_TYPE, WorkflowStep,
};

/// Edit applied to a planned step or policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditState {
    /// Left as stored.
    #[default]
    Keep,
    /// Added from the desired plan.
    New,
    /// Replaced by the desired version.
    Update,
    /// Removed.
    Delete,
    /// Kept with some of its policies removed.
    Modify,
}

/// A placement policy referenced by planned steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPolicy {
    /// Policy name.
    pub name: String,
    /// Policy type.
    pub policy_type: String,
    /// `cluster/namespace` pairs covered by the policy.
    pub targets: Vec<String>,
    /// Edit state.
    pub state: EditState,
}

/// A workflow step with the policies it deploys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// Step name.
    pub name: String,
    /// Step type.
    pub step_type: String,
    /// Indexes into the plan's policies.
    policies: Vec<usize>,
    /// Edit state.
    pub state: EditState,
}

/// Policies to persist after reconciling a workflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyChanges {
    /// Policies to add.
    pub created: Vec<ApplicationPolicy>,
    /// Policies to overwrite.
    pub updated: Vec<ApplicationPolicy>,
    /// Policies to delete.
    pub deleted: Vec<ApplicationPolicy>,
}

/// Steps and policies of one workflow, with their edit states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowPlan {
    steps: Vec<PlannedStep>,
    policies: Vec<PlannedPolicy>,
}

fn scoped_targets(step_type: &str, targets: &[String]) -> Vec<String> {
    if step_type == DEPLOY_CLOUD_RESOURCE_STEP_TYPE {
        return targets.iter().map(|target| format!("c-{target}")).collect();
    }
    targets.to_vec()
}

fn is_within(set: &HashSet<String>, targets: &[String]) -> bool {
    !targets.is_empty() && targets.iter().all(|target| set.contains(target))
}

impl WorkflowPlan {
    /// Builds the plan of a workflow from its steps and the application's
    /// placement policies.
    ///
    /// Policies with undecodable properties are ignored. `deploy2env` and
    /// `deploy-cloud-resource` steps whose env entry is unknown are left out.
    #[must_use]
    pub fn from_steps(steps: &[WorkflowStep], policies: &[ApplicationPolicy]) -> Self {
        let mut plan = Self::default();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for policy in policies {
            match policy.policy_type.as_str() {
                TOPOLOGY_POLICY_TYPE => {
                    let Ok(topology) = decode_properties::<TopologyPolicySpec>(&policy.properties)
                    else {
                        continue;
                    };
                    let targets = topology
                        .clusters
                        .iter()
                        .map(|cluster| format!("{cluster}/{}", topology.namespace))
                        .collect();
                    by_key.insert(policy.name.clone(), plan.policies.len());
                    plan.policies.push(PlannedPolicy {
                        name: policy.name.clone(),
                        policy_type: policy.policy_type.clone(),
                        targets,
                        state: EditState::Keep,
                    });
                }
                ENV_BINDING_POLICY_TYPE => {
                    let Ok(binding) = decode_properties::<EnvBindingSpec>(&policy.properties)
                    else {
                        continue;
                    };
                    for env in &binding.envs {
                        by_key.insert(format!("{}-{}", policy.name, env.name), plan.policies.len());
                        plan.policies.push(PlannedPolicy {
                            name: policy.name.clone(),
                            policy_type: policy.policy_type.clone(),
                            targets: vec![env.placement_target()],
                            state: EditState::Keep,
                        });
                    }
                }
                _ => {}
            }
        }

        for step in steps {
            let policies = match step.step_type.as_str() {
                DEPLOY_STEP_TYPE => step
                    .deploy_policies()
                    .iter()
                    .filter_map(|name| by_key.get(name).copied())
                    .collect(),
                DEPLOY2ENV_STEP_TYPE | DEPLOY_CLOUD_RESOURCE_STEP_TYPE => {
                    let policy = step.property_str("policy");
                    let env = step.property_str("env");
                    let found = (!policy.is_empty())
                        .then(|| by_key.get(&format!("{policy}-{env}")).copied())
                        .flatten();
                    match found {
                        Some(index) => vec![index],
                        None => continue,
                    }
                }
                _ => Vec::new(),
            };

            plan.steps.push(PlannedStep {
                name: step.name.clone(),
                step_type: step.step_type.clone(),
                policies,
                state: EditState::Keep,
            });
        }

        plan
    }

    /// Returns the planned steps in output order.
    #[must_use]
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Returns the policies referenced by a step.
    pub fn step_policies<'a>(
        &'a self,
        step: &'a PlannedStep,
    ) -> impl Iterator<Item = &'a PlannedPolicy> + 'a {
        step.policies
            .iter()
            .filter_map(|index| self.policies.get(*index))
    }

    fn targets_of(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(|step| {
                self.step_policies(step)
                    .flat_map(|policy| scoped_targets(&step.step_type, &policy.targets))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Compares the stored plan with the desired plan.
    ///
    /// Stored steps keep their order and are marked `Keep`, `Modify` or
    /// `Delete`. Desired steps that deploy to new targets follow them marked
    /// `New`, except cloud-resource steps which go first.
    #[must_use]
    pub fn compare(existing: WorkflowPlan, desired: WorkflowPlan) -> WorkflowPlan {
        let old_targets: HashSet<String> = existing.targets_of().into_iter().collect();
        let new_targets: HashSet<String> = desired.targets_of().into_iter().collect();
        let removed: HashSet<String> = old_targets.difference(&new_targets).cloned().collect();
        let added: HashSet<String> = new_targets.difference(&old_targets).cloned().collect();

        let offset = existing.policies.len();
        let mut policies = existing.policies;
        policies.extend(desired.policies);

        let mut ordered: VecDeque<PlannedStep> = VecDeque::new();
        let mut has_cloud_step = false;

        for mut step in existing.steps {
            let mut deleted = 0;
            for index in &step.policies {
                let Some(policy) = policies.get_mut(*index) else {
                    continue;
                };
                if is_within(&removed, &scoped_targets(&step.step_type, &policy.targets)) {
                    policy.state = EditState::Delete;
                    deleted += 1;
                }
            }
            if deleted != 0 && deleted == step.policies.len() {
                step.state = EditState::Delete;
            } else if deleted != 0 {
                step.state = EditState::Modify;
            }
            has_cloud_step |= step.step_type == DEPLOY_CLOUD_RESOURCE_STEP_TYPE;
            ordered.push_back(step);
        }

        for mut step in desired.steps {
            step.policies = step.policies.iter().map(|index| index + offset).collect();
            let mut is_new = false;
            for index in &step.policies {
                let Some(policy) = policies.get_mut(*index) else {
                    continue;
                };
                if is_within(&added, &scoped_targets(&step.step_type, &policy.targets)) {
                    policy.state = if policy.policy_type == ENV_BINDING_POLICY_TYPE && has_cloud_step
                    {
                        EditState::Update
                    } else {
                        EditState::New
                    };
                    is_new = true;
                }
            }
            if !is_new {
                continue;
            }
            step.state = EditState::New;
            if step.step_type == DEPLOY_CLOUD_RESOURCE_STEP_TYPE {
                ordered.push_front(step);
            } else {
                ordered.push_back(step);
            }
        }

        WorkflowPlan {
            steps: ordered.into(),
            policies,
        }
    }

    /// Produces the workflow steps to store from a compared plan.
    #[must_use]
    pub fn resolve_steps(
        &self,
        desired: &[WorkflowStep],
        existing: &[WorkflowStep],
    ) -> Vec<WorkflowStep> {
        let existing_by_name: HashMap<&str, &WorkflowStep> =
            existing.iter().map(|step| (step.name.as_str(), step)).collect();
        let desired_by_name: HashMap<&str, &WorkflowStep> =
            desired.iter().map(|step| (step.name.as_str(), step)).collect();

        let mut resolved = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step.state {
                EditState::Keep => {
                    if let Some(found) = existing_by_name.get(step.name.as_str()) {
                        resolved.push((*found).clone());
                    }
                }
                EditState::New | EditState::Update => {
                    if let Some(found) = desired_by_name.get(step.name.as_str()) {
                        resolved.push((*found).clone());
                    }
                }
                EditState::Modify if step.step_type == DEPLOY_STEP_TYPE => {
                    let Some(found) = existing_by_name.get(step.name.as_str()) else {
                        continue;
                    };
                    let remaining: Vec<serde_json::Value> = self
                        .step_policies(step)
                        .filter(|policy| policy.state != EditState::Delete)
                        .map(|policy| serde_json::Value::String(policy.name.clone()))
                        .collect();
                    let mut modified = (*found).clone();
                    modified
                        .properties
                        .insert("policies".to_owned(), serde_json::Value::Array(remaining));
                    resolved.push(modified);
                }
                EditState::Modify | EditState::Delete => {}
            }
        }

        resolved
    }

    /// Splits the policies of a compared plan into the ones to create,
    /// update and delete.
    ///
    /// Several steps may share one env-binding policy; such a policy is not
    /// deleted while any step still keeps it.
    #[must_use]
    pub fn policy_changes(
        &self,
        existing: &[ApplicationPolicy],
        desired: &[ApplicationPolicy],
    ) -> PolicyChanges {
        let mut deleted: BTreeSet<&str> = BTreeSet::new();
        let mut created: HashSet<&str> = HashSet::new();
        let mut updated: HashSet<&str> = HashSet::new();
        let mut kept: HashSet<&str> = HashSet::new();

        for step in &self.steps {
            for policy in self.step_policies(step) {
                let name = policy.name.as_str();
                let is_env_binding = policy.policy_type == ENV_BINDING_POLICY_TYPE;
                match policy.state {
                    EditState::Delete => {
                        if is_env_binding && kept.contains(name) {
                            continue;
                        }
                        deleted.insert(name);
                    }
                    EditState::New => {
                        created.insert(name);
                    }
                    EditState::Update => {
                        updated.insert(name);
                    }
                    EditState::Keep | EditState::Modify => {
                        kept.insert(name);
                        if is_env_binding {
                            deleted.remove(name);
                        }
                    }
                }
            }
        }

        let mut changes = PolicyChanges::default();
        for policy in existing {
            if deleted.remove(policy.name.as_str()) {
                changes.deleted.push(policy.clone());
            }
        }
        for policy in desired {
            let name = policy.name.as_str();
            if updated.remove(name) {
                created.remove(name);
                changes.updated.push(policy.clone());
            } else if created.remove(name) {
                changes.created.push(policy.clone());
            }
        }

        changes
    }
}
