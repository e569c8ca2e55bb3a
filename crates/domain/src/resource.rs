//! Resource-path naming and matching for role-based access control.
//!
//! Every protected API resource lives in a fixed tree (projects own
//! applications, applications own components, ...). Permissions name the
//! resources they cover with slash-separated `type:value` segments where `*`
//! is a wildcard, for example `project:team-a/application:*/*`.

use std::fmt::{Display, Formatter};

use vela_console_core::{AppError, AppResult};

use crate::security::{Permission, PermissionEffect};

/// Wildcard accepted for resource types, values and actions.
pub const WILDCARD: &str = "*";

struct ResourceNode {
    kind: &'static str,
    path_name: Option<&'static str>,
    children: &'static [ResourceNode],
}

const fn leaf(kind: &'static str, path_name: Option<&'static str>) -> ResourceNode {
    ResourceNode {
        kind,
        path_name,
        children: &[],
    }
}

static RESOURCE_TREE: &[ResourceNode] = &[
    ResourceNode {
        kind: "project",
        path_name: Some("projectName"),
        children: &[
            ResourceNode {
                kind: "application",
                path_name: Some("appName"),
                children: &[
                    ResourceNode {
                        kind: "component",
                        path_name: Some("compName"),
                        children: &[leaf("trait", Some("traitType"))],
                    },
                    ResourceNode {
                        kind: "workflow",
                        path_name: Some("workflowName"),
                        children: &[leaf("record", Some("record"))],
                    },
                    leaf("policy", Some("policyName")),
                    leaf("revision", Some("revision")),
                    leaf("envBinding", Some("envName")),
                    leaf("trigger", None),
                ],
            },
            leaf("environment", Some("envName")),
            leaf("workflow", Some("workflowName")),
            leaf("role", None),
            leaf("projectUser", None),
            leaf("applicationTemplate", None),
            leaf("permission", None),
            leaf("config", Some("configName")),
        ],
    },
    ResourceNode {
        kind: "cluster",
        path_name: Some("clusterName"),
        children: &[leaf("namespace", None)],
    },
    leaf("addon", Some("addonName")),
    leaf("addonRegistry", Some("addonRegName")),
    leaf("target", Some("targetName")),
    leaf("user", None),
    leaf("role", None),
    leaf("permission", None),
    leaf("systemSetting", None),
    leaf("definition", Some("definitionName")),
    ResourceNode {
        kind: "configType",
        path_name: Some("configType"),
        children: &[leaf("config", Some("name"))],
    },
];

fn render_segment(node: &ResourceNode) -> String {
    match node.path_name {
        Some(path_name) => format!("{}:{{{path_name}}}", node.kind),
        None => format!("{}:{WILDCARD}", node.kind),
    }
}

fn collect_paths<'a>(
    nodes: &'a [ResourceNode],
    prefix: &mut Vec<&'a ResourceNode>,
    output: &mut Vec<Vec<&'a ResourceNode>>,
) {
    for node in nodes {
        prefix.push(node);
        output.push(prefix.clone());
        collect_paths(node.children, prefix, output);
        prefix.pop();
    }
}

/// Resolves a short resource path to its full templated resource name.
///
/// A root resource name resolves directly. Any other path resolves to the
/// single tree node whose path from the root ends with the given segments.
/// For example `component` resolves to
/// `project:{projectName}/application:{appName}/component:{compName}`.
pub fn resolve_resource_path(resource: &str) -> AppResult<String> {
    if let Some(root) = RESOURCE_TREE.iter().find(|node| node.kind == resource) {
        return Ok(render_segment(root));
    }

    let wanted: Vec<&str> = resource.split('/').collect();
    let mut paths = Vec::new();
    collect_paths(RESOURCE_TREE, &mut Vec::new(), &mut paths);

    let mut resolved: Vec<String> = paths
        .iter()
        .filter(|path| {
            path.len() >= wanted.len()
                && path[path.len() - wanted.len()..]
                    .iter()
                    .zip(&wanted)
                    .all(|(node, kind)| node.kind == *kind)
        })
        .map(|path| {
            path.iter()
                .map(|node| render_segment(node))
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    resolved.dedup();

    match resolved.len() {
        1 => Ok(resolved.remove(0)),
        0 => Err(AppError::Validation(format!(
            "there is no resource {resource}"
        ))),
        _ => Err(AppError::Validation(format!(
            "the resource name {resource} is not unique"
        ))),
    }
}

/// Checks that a permission resource pattern names a path of the resource
/// tree. Each segment is `type` or `type:value`, and `*` is accepted in
/// either position. A `*` type covers everything below it.
pub fn validate_resource_pattern(pattern: &str) -> AppResult<()> {
    let invalid = || AppError::Validation(format!("invalid resource pattern '{pattern}'"));
    let mut level = RESOURCE_TREE;

    for segment in pattern.split('/') {
        let (kind, value) = segment.split_once(':').unwrap_or((segment, WILDCARD));
        if kind.trim().is_empty() || value.trim().is_empty() {
            return Err(invalid());
        }
        if kind == WILDCARD {
            return Ok(());
        }
        let node = level.iter().find(|node| node.kind == kind).ok_or_else(|| {
            AppError::Validation(format!("there is no resource {kind} in '{pattern}'"))
        })?;
        level = node.children;
    }

    Ok(())
}

/// Replaces every `{param}` placeholder with its value, or `*` when unset.
pub fn fill_path_params<'a>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let Some(length) = rest[start..].find('}') else {
            break;
        };
        output.push_str(&rest[..start]);
        let key = &rest[start + 1..start + length];
        match lookup(key) {
            Some(value) if !value.is_empty() => output.push_str(value),
            _ => output.push_str(WILDCARD),
        }
        rest = &rest[start + length + 1..];
    }

    output.push_str(rest);
    output
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResourceSegment {
    kind: String,
    value: String,
}

/// A parsed resource name such as `project:team-a/application:*`.
///
/// Parsed names end with an empty terminal segment, so a pattern only covers
/// resources of exactly its own depth unless it ends with a `*` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceName {
    segments: Vec<ResourceSegment>,
}

impl ResourceName {
    /// Parses a slash-separated resource name. A bare type means `type:*`.
    #[must_use]
    pub fn parse(resource: &str) -> Self {
        let mut segments: Vec<ResourceSegment> = resource
            .split('/')
            .map(|part| match part.split_once(':') {
                Some((kind, value)) => ResourceSegment {
                    kind: kind.to_owned(),
                    value: value.to_owned(),
                },
                None => ResourceSegment {
                    kind: part.to_owned(),
                    value: WILDCARD.to_owned(),
                },
            })
            .collect();
        segments.push(ResourceSegment {
            kind: String::new(),
            value: String::new(),
        });

        Self { segments }
    }

    /// Returns whether this pattern covers the given resource.
    #[must_use]
    pub fn matches(&self, resource: &ResourceName) -> bool {
        let mut targets = resource.segments.iter();
        for pattern in &self.segments {
            let Some(target) = targets.next() else {
                return false;
            };
            if pattern.kind == WILDCARD {
                return true;
            }
            if pattern.kind != target.kind {
                return false;
            }
            if pattern.value != target.value && pattern.value != WILDCARD {
                return false;
            }
        }

        true
    }
}

impl Display for ResourceName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .segments
            .iter()
            .take_while(|segment| !segment.kind.is_empty())
            .map(|segment| format!("{}:{}", segment.kind, segment.value))
            .collect::<Vec<_>>()
            .join("/");
        formatter.write_str(&rendered)
    }
}

/// A request to perform actions on one concrete resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResourceAction {
    resource: ResourceName,
    actions: Vec<String>,
}

impl RequestResourceAction {
    /// Builds a request from a templated resource name and path parameters.
    #[must_use]
    pub fn new<'a>(
        template: &str,
        lookup: impl Fn(&str) -> Option<&'a str>,
        actions: &[&str],
    ) -> Self {
        Self {
            resource: ResourceName::parse(&fill_path_params(template, lookup)),
            actions: actions.iter().map(|action| (*action).to_owned()).collect(),
        }
    }

    /// Returns the concrete resource name.
    #[must_use]
    pub fn resource(&self) -> &ResourceName {
        &self.resource
    }

    /// Returns the requested actions.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    fn is_covered_by(&self, permission: &Permission) -> bool {
        let actions_match = permission.actions.iter().any(|action| action == WILDCARD)
            || self
                .actions
                .iter()
                .all(|action| permission.actions.contains(action));
        if !actions_match {
            return false;
        }

        permission
            .resources
            .iter()
            .any(|pattern| ResourceName::parse(pattern).matches(&self.resource))
    }

    /// Evaluates the request against a permission set.
    ///
    /// A covering deny refuses the request even when an allow also covers it.
    #[must_use]
    pub fn is_allowed_by(&self, permissions: &[Permission]) -> bool {
        let mut allowed = false;
        for permission in permissions.iter().filter(|p| self.is_covered_by(p)) {
            match permission.effect {
                PermissionEffect::Deny => return false,
                PermissionEffect::Allow => allowed = true,
            }
        }

        allowed
    }
}

#[cfg(test)]
mod tests;
