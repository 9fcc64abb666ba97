use crate::application::catalog::VariantCatalog;
use crate::domain::workflow::{Transformation, WorkflowVariant};
use std::sync::Arc;

/// Fixed, indexed set of moves the search tree expands with.
///
/// Children remember the index of the action that created them, so the
/// order returned here must be stable for the lifetime of a search.
pub trait ActionSpace: Send + Sync {
    fn len(&self) -> usize;

    fn label(&self, action: usize) -> String;

    /// Variant reached by taking `action` from `from`, `None` for an
    /// index outside the space.
    fn apply(&self, from: &WorkflowVariant, action: usize) -> Option<WorkflowVariant>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether nodes at `depth` (root = 0) may get children
    fn expands_at(&self, _depth: usize) -> bool {
        true
    }
}

/// Each action jumps to one whole catalog variant
pub struct CatalogActions {
    catalog: Arc<VariantCatalog>,
}

impl CatalogActions {
    pub fn new(catalog: Arc<VariantCatalog>) -> Self {
        Self { catalog }
    }
}

impl ActionSpace for CatalogActions {
    fn len(&self) -> usize {
        self.catalog.len()
    }

    fn label(&self, action: usize) -> String {
        self.catalog
            .variants()
            .get(action)
            .map(|v| v.id.clone())
            .unwrap_or_default()
    }

    fn apply(&self, _from: &WorkflowVariant, action: usize) -> Option<WorkflowVariant> {
        self.catalog.variants().get(action).cloned()
    }

    // Picking a whole variant below another one is the same move again
    fn expands_at(&self, depth: usize) -> bool {
        depth == 0
    }
}

/// Each action edits the node's variant
pub struct TransformationActions {
    transformations: Vec<Transformation>,
}

impl TransformationActions {
    pub fn new(transformations: Vec<Transformation>) -> Self {
        Self { transformations }
    }
}

impl Default for TransformationActions {
    fn default() -> Self {
        Self::new(Transformation::ALL.to_vec())
    }
}

impl ActionSpace for TransformationActions {
    fn len(&self) -> usize {
        self.transformations.len()
    }

    fn label(&self, action: usize) -> String {
        self.transformations
            .get(action)
            .map(|t| t.as_str().to_string())
            .unwrap_or_default()
    }

    fn apply(&self, from: &WorkflowVariant, action: usize) -> Option<WorkflowVariant> {
        self.transformations.get(action).map(|t| t.apply(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::templates::technical_template;

    #[test]
    fn test_transformation_actions_cover_all_edits() {
        let actions = TransformationActions::default();
        assert_eq!(actions.len(), 8);
        assert_eq!(actions.label(5), "add_ensemble");

        let base = WorkflowVariant::declarative("technical", technical_template());
        let child = actions.apply(&base, 5).unwrap();
        assert_eq!(child.id, "technical+add_ensemble");
        assert!(actions.apply(&base, 8).is_none());
    }
}
