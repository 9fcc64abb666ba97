//! Variant catalog: the closed set of workflow variants the search and the
//! generator may choose from, plus the registry that turns a variant into a
//! runnable [`Workflow`].

pub mod executor;
pub mod templates;
pub mod transformations;

pub use executor::{DeclarativeWorkflow, Toolbox};

use crate::domain::errors::ConfigError;
use crate::domain::ports::Workflow;
use crate::domain::workflow::{VariantBody, WorkflowSpec, WorkflowVariant};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use templates::{ContrarianWorkflow, MomentumWorkflow, builtin_templates};

pub struct VariantCatalog {
    variants: Vec<WorkflowVariant>,
    registry: HashMap<String, Arc<dyn Workflow>>,
    toolbox: Arc<Toolbox>,
}

impl VariantCatalog {
    pub fn builder(toolbox: Arc<Toolbox>) -> CatalogBuilder {
        CatalogBuilder {
            variants: Vec::new(),
            registry: HashMap::new(),
            toolbox,
        }
    }

    /// Built-in templates plus the `momentum` and `contrarian` callables
    pub fn with_builtins(toolbox: Arc<Toolbox>) -> Result<Self, ConfigError> {
        Self::builder(toolbox).builtins().build()
    }

    /// Entries in registration order
    pub fn variants(&self) -> &[WorkflowVariant] {
        &self.variants
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Runnable form of `variant`.
    ///
    /// Declarative bodies always resolve, which is what lets
    /// transformation-derived variants run without being catalog entries.
    pub fn resolve(&self, variant: &WorkflowVariant) -> Result<Arc<dyn Workflow>, ConfigError> {
        match &variant.body {
            VariantBody::Registered { name } => {
                self.registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownVariant { id: name.clone() })
            }
            VariantBody::Declarative(spec) => Ok(Arc::new(DeclarativeWorkflow::new(
                spec.clone(),
                Arc::clone(&self.toolbox),
            ))),
        }
    }
}

pub struct CatalogBuilder {
    variants: Vec<WorkflowVariant>,
    registry: HashMap<String, Arc<dyn Workflow>>,
    toolbox: Arc<Toolbox>,
}

impl CatalogBuilder {
    pub fn builtins(mut self) -> Self {
        for variant in builtin_templates() {
            self.variants.push(variant);
        }
        self.register("momentum", Arc::new(MomentumWorkflow::default()))
            .register("contrarian", Arc::new(ContrarianWorkflow))
    }

    /// Adds a callable under `name` and a catalog entry with the same id
    pub fn register(mut self, name: &str, workflow: Arc<dyn Workflow>) -> Self {
        self.registry.insert(name.to_string(), workflow);
        self.variants.push(WorkflowVariant::registered(name, name));
        self
    }

    pub fn declarative(mut self, id: &str, spec: WorkflowSpec) -> Self {
        self.variants.push(WorkflowVariant::declarative(id, spec));
        self
    }

    pub fn variant(mut self, variant: WorkflowVariant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn build(self) -> Result<VariantCatalog, ConfigError> {
        if self.variants.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant.id.as_str()) {
                return Err(ConfigError::DuplicateVariant {
                    id: variant.id.clone(),
                });
            }
            if let VariantBody::Registered { name } = &variant.body
                && !self.registry.contains_key(name)
            {
                return Err(ConfigError::UnknownVariant { id: name.clone() });
            }
        }

        Ok(VariantCatalog {
            variants: self.variants,
            registry: self.registry,
            toolbox: self.toolbox,
        })
    }
}
