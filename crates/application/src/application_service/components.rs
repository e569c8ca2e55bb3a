use serde_json::Value;
use tracing::info;
use vela_console_core::{AppError, AppResult, NonEmptyString, UserIdentity};
use vela_console_domain::{
    Application, ApplicationComponent, ApplicationTrait, JsonObject, SCALER_TRAIT_TYPE,
    Timestamps, WEBSERVICE_COMPONENT_TYPE,
};

use super::ApplicationService;
use crate::datastore_ports::ListOptions;

/// Input payload for adding a component to an application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateComponentInput {
    /// Component name, unique within the application.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// ComponentDefinition name.
    pub component_type: String,
    /// Definition parameters.
    pub properties: JsonObject,
    /// Components deployed before this one.
    pub depends_on: Vec<String>,
}

/// Input payload for updating a component. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateComponentInput {
    /// New display alias.
    pub alias: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement parameters.
    pub properties: Option<JsonObject>,
    /// Replacement dependencies.
    pub depends_on: Option<Vec<String>>,
}

/// Input payload for attaching a trait to a component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTraitInput {
    /// TraitDefinition name, unique per component.
    pub trait_type: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Trait parameters.
    pub properties: JsonObject,
}

/// Input payload for updating a trait.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateTraitInput {
    /// New display alias.
    pub alias: String,
    /// New description.
    pub description: String,
    /// Replacement parameters.
    pub properties: JsonObject,
}

fn default_traits(component_type: &str) -> Vec<ApplicationTrait> {
    if component_type != WEBSERVICE_COMPONENT_TYPE {
        return Vec::new();
    }

    let now = chrono::Utc::now();
    vec![ApplicationTrait {
        trait_type: SCALER_TRAIT_TYPE.to_owned(),
        alias: "Set Replicas".to_owned(),
        description: "Adjust the number of application instance.".to_owned(),
        properties: JsonObject::from_iter([("replicas".to_owned(), Value::from(1))]),
        timestamps: Timestamps {
            create_time: Some(now),
            update_time: Some(now),
        },
    }]
}

impl ApplicationService {
    pub(super) async fn add_component(
        &self,
        actor: &UserIdentity,
        app: &Application,
        input: CreateComponentInput,
        main: bool,
    ) -> AppResult<ApplicationComponent> {
        let name = NonEmptyString::required("component name", input.name)?;
        self.definition_service
            .get_component_definition(&input.component_type)
            .await?;

        let key = ApplicationComponent::key(app.name.as_str(), name.as_str());
        if self.store.is_exist(&key).await? {
            return Err(AppError::Conflict("the component name is exist".to_owned()));
        }

        let component = self
            .store
            .add(ApplicationComponent {
                alias: input.alias,
                description: input.description,
                traits: default_traits(&input.component_type),
                component_type: input.component_type,
                main,
                properties: input.properties,
                depends_on: input.depends_on,
                creator: actor.subject().to_owned(),
                ..key
            })
            .await?;

        info!(app = %app.name, component = %component.name, component_type = %component.component_type, "added component");
        Ok(component)
    }

    /// Adds a component and re-plans the environment workflows, since a
    /// cloud-resource component changes how the application deploys.
    pub async fn create_component(
        &self,
        actor: &UserIdentity,
        app: &Application,
        input: CreateComponentInput,
    ) -> AppResult<ApplicationComponent> {
        let component = self.add_component(actor, app, input, false).await?;
        self.workflow_service.update_app_env_workflow(app).await?;
        Ok(component)
    }

    /// Updates a component.
    pub async fn update_component(
        &self,
        app: &Application,
        name: &str,
        input: UpdateComponentInput,
    ) -> AppResult<ApplicationComponent> {
        let mut component = self.detail_component(app, name).await?;
        if let Some(alias) = input.alias {
            component.alias = alias;
        }
        if let Some(description) = input.description {
            component.description = description;
        }
        if let Some(properties) = input.properties {
            component.properties = properties;
        }
        if let Some(depends_on) = input.depends_on {
            component.depends_on = depends_on;
        }
        self.store.put(component).await
    }

    /// Lists the components of an application, oldest first.
    pub async fn list_components(&self, app: &Application) -> AppResult<Vec<ApplicationComponent>> {
        let mut components = self
            .store
            .list(
                &ApplicationComponent {
                    app_primary_key: app.name.clone(),
                    ..ApplicationComponent::default()
                },
                &ListOptions::default(),
            )
            .await?;
        components.sort_by(|left, right| left.timestamps.create_time.cmp(&right.timestamps.create_time));
        Ok(components)
    }

    /// Returns one component.
    pub async fn detail_component(
        &self,
        app: &Application,
        name: &str,
    ) -> AppResult<ApplicationComponent> {
        self.store
            .get(&ApplicationComponent::key(app.name.as_str(), name))
            .await?
            .ok_or_else(|| AppError::NotFound("the component is not exist".to_owned()))
    }

    /// Deletes a component other than the main one and re-plans the
    /// environment workflows.
    pub async fn delete_component(&self, app: &Application, name: &str) -> AppResult<()> {
        let component = self.detail_component(app, name).await?;
        if component.main {
            return Err(AppError::Validation(
                "the main component can not be deleted".to_owned(),
            ));
        }
        self.store.delete(&component).await?;
        self.workflow_service.update_app_env_workflow(app).await?;

        info!(app = %app.name, component = %name, "deleted component");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Traits
    // ------------------------------------------------------------------

    /// Attaches a trait to a component.
    pub async fn create_application_trait(
        &self,
        app: &Application,
        component_name: &str,
        input: CreateTraitInput,
    ) -> AppResult<ApplicationTrait> {
        let mut component = self.detail_component(app, component_name).await?;
        let trait_type = NonEmptyString::required("trait type", input.trait_type)?;
        if component
            .traits
            .iter()
            .any(|existing| existing.trait_type == trait_type)
        {
            return Err(AppError::Conflict("the trait is exist".to_owned()));
        }

        let now = chrono::Utc::now();
        let created = ApplicationTrait {
            trait_type,
            alias: input.alias,
            description: input.description,
            properties: input.properties,
            timestamps: Timestamps {
                create_time: Some(now),
                update_time: Some(now),
            },
        };
        component.traits.push(created.clone());
        self.store.put(component).await?;
        Ok(created)
    }

    /// Replaces the parameters of a trait.
    pub async fn update_application_trait(
        &self,
        app: &Application,
        component_name: &str,
        trait_type: &str,
        input: UpdateTraitInput,
    ) -> AppResult<ApplicationTrait> {
        let mut component = self.detail_component(app, component_name).await?;
        let existing = component
            .traits
            .iter_mut()
            .find(|existing| existing.trait_type == trait_type)
            .ok_or_else(|| AppError::NotFound("the trait is not exist".to_owned()))?;

        existing.alias = input.alias;
        existing.description = input.description;
        existing.properties = input.properties;
        existing.timestamps.update_time = Some(chrono::Utc::now());
        let updated = existing.clone();

        self.store.put(component).await?;
        Ok(updated)
    }

    /// Detaches a trait from a component.
    pub async fn delete_application_trait(
        &self,
        app: &Application,
        component_name: &str,
        trait_type: &str,
    ) -> AppResult<()> {
        let mut component = self.detail_component(app, component_name).await?;
        let before = component.traits.len();
        component
            .traits
            .retain(|existing| existing.trait_type != trait_type);
        if component.traits.len() == before {
            return Err(AppError::NotFound("the trait is not exist".to_owned()));
        }
        self.store.put(component).await?;
        Ok(())
    }
}
