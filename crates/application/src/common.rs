//! Shared projections returned by several services.

use chrono::{DateTime, Utc};
use vela_console_domain::Project;

/// A resource name with its display alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameAlias {
    /// Resource name.
    pub name: String,
    /// Display alias.
    pub alias: String,
}

impl NameAlias {
    /// Creates a name/alias pair.
    #[must_use]
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

/// One page of a list query with the unpaged total.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    /// Items of the requested page.
    pub items: Vec<T>,
    /// Number of items across all pages.
    pub total: u64,
}

/// Project summary with its owner resolved to a name and alias.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectBase {
    /// Project name.
    pub name: String,
    /// Display alias.
    pub alias: String,
    /// Free-form description.
    pub description: String,
    /// Owner user.
    pub owner: NameAlias,
    /// Creation time.
    pub create_time: Option<DateTime<Utc>>,
    /// Last update time.
    pub update_time: Option<DateTime<Utc>>,
}

impl ProjectBase {
    /// Builds a summary from a project and the owner's alias.
    #[must_use]
    pub fn new(project: Project, owner_alias: impl Into<String>) -> Self {
        Self {
            owner: NameAlias::new(project.owner, owner_alias),
            name: project.name,
            alias: project.alias,
            description: project.description,
            create_time: project.timestamps.create_time,
            update_time: project.timestamps.update_time,
        }
    }
}
