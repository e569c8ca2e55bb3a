use serde_json::{Value, json};
use tracing::{error, info, warn};
use vela_console_core::{AppError, AppResult};
use vela_console_domain::{
    Application, ApplicationComponent, ApplicationPolicy, ClusterSelector,
    DEPLOY_CLOUD_RESOURCE_STEP_TYPE, DEPLOY_STEP_TYPE, ENV_BINDING_POLICY_DEFAULT_NAME,
    ENV_BINDING_POLICY_TYPE, Env, EnvBinding, EnvBindingSpec, EnvComponentPatch, EnvConfig,
    EnvPatch, EnvPlacement, JsonObject, NamespaceSelector, TOPOLOGY_POLICY_TYPE, Target,
    TopologyPolicySpec, WorkflowPlan, WorkflowStep, encode_properties, env_workflow_name,
};

use super::WorkflowService;
use crate::datastore_ports::{FilterOptions, ListOptions};

const CLOUD_RESOURCE_STEP_SUFFIX: &str = "-cloud-resource";

/// Steps and placement policies generated for one environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvWorkflow {
    /// Deploy steps in target order.
    pub steps: Vec<WorkflowStep>,
    /// Policies the steps reference.
    pub policies: Vec<ApplicationPolicy>,
}

fn encode<T: serde::Serialize>(value: &T) -> AppResult<JsonObject> {
    encode_properties(value)
        .map_err(|error| AppError::Internal(format!("failed to encode policy properties: {error}")))
}

fn deploy_step(name: &str, step_type: &str, properties: Value) -> WorkflowStep {
    let target = name.trim_end_matches(CLOUD_RESOURCE_STEP_SUFFIX);
    WorkflowStep {
        name: name.to_owned(),
        alias: format!("Deploy To {target}"),
        description: format!("deploy app to delivery target {target}"),
        step_type: step_type.to_owned(),
        depends_on: Vec::new(),
        properties: match properties {
            Value::Object(object) => object,
            _ => JsonObject::new(),
        },
    }
}

fn cloud_resource_patch(
    component: &ApplicationComponent,
    env: &Env,
    target: &Target,
) -> EnvComponentPatch {
    let mut provider_ref = JsonObject::new();
    provider_ref.insert(
        "name".to_owned(),
        Value::String(target.variable_str("providerName").unwrap_or("default").to_owned()),
    );
    if let Some(namespace) = target.variable_str("providerNamespace") {
        provider_ref.insert("namespace".to_owned(), Value::String(namespace.to_owned()));
    }

    let mut properties = JsonObject::new();
    properties.insert("providerRef".to_owned(), Value::Object(provider_ref));
    properties.insert(
        "writeConnectionSecretToRef".to_owned(),
        json!({
            "name": format!("{}-{}", component.name, env.name),
            "namespace": env.namespace,
        }),
    );
    if let Some(region) = target.variable.get("region") {
        properties.insert("region".to_owned(), region.clone());
    }

    EnvComponentPatch {
        name: component.name.clone(),
        component_type: component.component_type.clone(),
        properties,
    }
}

impl WorkflowService {
    async fn env_targets(&self, env: &Env) -> AppResult<Vec<Target>> {
        if env.targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut targets = self
            .store
            .list(
                &Target {
                    project: env.project.clone(),
                    ..Target::default()
                },
                &ListOptions::filtered(
                    FilterOptions::default().with_in("name", env.targets.clone()),
                ),
            )
            .await?;
        targets.sort_by_key(|target| {
            env.targets
                .iter()
                .position(|name| name == &target.name)
                .unwrap_or(usize::MAX)
        });
        Ok(targets)
    }

    /// Generates the deploy steps and placement policies of an application
    /// for the targets of an environment.
    ///
    /// Cloud-resource components deploy through one env-binding policy and a
    /// `deploy-cloud-resource` step per target. Other components deploy
    /// through one topology policy and a `deploy` step per target.
    pub async fn generate_env_workflow(
        &self,
        app: &Application,
        env: &Env,
    ) -> AppResult<EnvWorkflow> {
        let targets = self.env_targets(env).await?;
        let components = self
            .store
            .list(
                &ApplicationComponent {
                    app_primary_key: app.name.clone(),
                    ..ApplicationComponent::default()
                },
                &ListOptions::default(),
            )
            .await?;

        let mut cloud_components = Vec::new();
        for component in &components {
            if self
                .definition_service
                .is_cloud_resource(&component.component_type)
                .await?
            {
                cloud_components.push(component);
            }
        }

        let mut generated = EnvWorkflow::default();

        if !cloud_components.is_empty() {
            let policy_name = format!("{ENV_BINDING_POLICY_DEFAULT_NAME}-{}", env.name);
            let mut spec = EnvBindingSpec::default();
            for target in &targets {
                let placement = target
                    .cluster
                    .as_ref()
                    .map(|cluster| EnvPlacement {
                        cluster_selector: Some(ClusterSelector {
                            name: cluster.cluster_name.clone(),
                        }),
                        namespace_selector: Some(NamespaceSelector {
                            name: cluster.namespace.clone(),
                        }),
                    })
                    .unwrap_or_default();
                spec.envs.push(EnvConfig {
                    name: target.name.clone(),
                    placement,
                    patch: EnvPatch {
                        components: cloud_components
                            .iter()
                            .map(|component| cloud_resource_patch(component, env, target))
                            .collect(),
                    },
                });
                generated.steps.push(deploy_step(
                    &format!("{}{CLOUD_RESOURCE_STEP_SUFFIX}", target.name),
                    DEPLOY_CLOUD_RESOURCE_STEP_TYPE,
                    json!({ "policy": policy_name, "env": target.name }),
                ));
            }

            generated.policies.push(ApplicationPolicy {
                description: "auto generated".to_owned(),
                policy_type: ENV_BINDING_POLICY_TYPE.to_owned(),
                properties: encode(&spec)?,
                env_name: env.name.clone(),
                ..ApplicationPolicy::key(app.name.as_str(), policy_name)
            });
        }

        if cloud_components.len() < components.len() || components.is_empty() {
            for target in &targets {
                let Some(cluster) = &target.cluster else {
                    continue;
                };
                generated.steps.push(deploy_step(
                    &target.name,
                    DEPLOY_STEP_TYPE,
                    json!({ "policies": [target.name] }),
                ));
                generated.policies.push(ApplicationPolicy {
                    description: format!("auto generated by the target {}", target.name),
                    policy_type: TOPOLOGY_POLICY_TYPE.to_owned(),
                    properties: encode(&TopologyPolicySpec {
                        clusters: vec![cluster.cluster_name.clone()],
                        namespace: cluster.namespace.clone(),
                    })?,
                    env_name: env.name.clone(),
                    ..ApplicationPolicy::key(app.name.as_str(), target.name.as_str())
                });
            }
        }

        Ok(generated)
    }

    /// Reconciles the stored environment workflow with the current targets.
    ///
    /// Steps for removed targets are dropped, steps for added targets are
    /// appended, and every other step is kept as edited. Placement policies
    /// follow the steps. Policy write failures are logged and skipped. An
    /// application without a workflow for the environment is left alone.
    pub async fn update_env_workflow(&self, app: &Application, env: &Env) -> AppResult<()> {
        let Some(mut workflow) = self
            .get_workflow(app, &env_workflow_name(&env.name))
            .await?
        else {
            return Ok(());
        };

        let desired = self.generate_env_workflow(app, env).await?;
        let existing_policies = self
            .store
            .list(
                &ApplicationPolicy {
                    app_primary_key: app.name.clone(),
                    ..ApplicationPolicy::default()
                },
                &ListOptions::filtered(FilterOptions::default().with_in(
                    "type",
                    vec![
                        TOPOLOGY_POLICY_TYPE.to_owned(),
                        ENV_BINDING_POLICY_TYPE.to_owned(),
                    ],
                )),
            )
            .await?;

        let plan = WorkflowPlan::compare(
            WorkflowPlan::from_steps(&workflow.steps, &existing_policies),
            WorkflowPlan::from_steps(&desired.steps, &desired.policies),
        );
        workflow.steps = plan.resolve_steps(&desired.steps, &workflow.steps);
        let workflow = self.store.put(workflow).await?;

        let changes = plan.policy_changes(&existing_policies, &desired.policies);
        for policy in &changes.deleted {
            if let Err(err) = self.store.delete(policy).await {
                error!(app = %app.name, policy = %policy.name, error = %err, "failed to delete policy");
            }
        }
        if !changes.created.is_empty()
            && let Err(err) = self.store.batch_add(changes.created.clone()).await
        {
            error!(app = %app.name, error = %err, "failed to create policies");
        }
        for policy in changes.updated {
            let name = policy.name.clone();
            if let Err(err) = self.store.put(policy).await {
                error!(app = %app.name, policy = %name, error = %err, "failed to update policy");
            }
        }

        info!(
            app = %app.name,
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            "updated environment workflow"
        );
        Ok(())
    }

    /// Reconciles the environment workflows of every binding of an
    /// application. A failing environment is logged and the rest still run.
    pub async fn update_app_env_workflow(&self, app: &Application) -> AppResult<()> {
        let bindings = self
            .store
            .list(
                &EnvBinding {
                    app_primary_key: app.name.clone(),
                    ..EnvBinding::default()
                },
                &ListOptions::default(),
            )
            .await?;

        for binding in bindings {
            let Some(env) = self.store.get(&Env::key(binding.name.as_str())).await? else {
                warn!(app = %app.name, env = %binding.name, "env binding of a missing environment");
                continue;
            };
            if let Err(err) = self.update_env_workflow(app, &env).await {
                error!(app = %app.name, env = %env.name, error = %err, "failed to update the env workflow");
            }
        }
        Ok(())
    }
}
