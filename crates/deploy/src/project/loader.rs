use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use super::Project;

/// Loads projects from a projects directory and caches them by name.
#[derive(Debug)]
pub struct ProjectLoader {
    root: PathBuf,
    projects: Mutex<HashMap<String, Arc<Project>>>,
}

impl ProjectLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            projects: Mutex::new(HashMap::new()),
        }
    }

    /// The projects directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `name`, reading its definition on first use.
    pub fn load(&self, name: &str) -> anyhow::Result<Arc<Project>> {
        if let Some(project) = self.cached(name) {
            return Ok(project);
        }

        let project = Arc::new(Project::load(name, &self.root.join(name))?);
        tracing::debug!(project = %name, mode = %project.mode(), "Loaded project");

        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), project.clone());

        Ok(project)
    }

    /// Register an already constructed project under its name.
    pub fn insert(&self, project: Project) -> Arc<Project> {
        let project = Arc::new(project);
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.name().to_string(), project.clone());
        project
    }

    fn cached(&self, name: &str) -> Option<Arc<Project>> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
