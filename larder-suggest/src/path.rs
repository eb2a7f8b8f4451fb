//! Hierarchical location path resolution.

use larder_core::{
    LarderResult, LocationGraph, LocationId, SuggestConfig, ValidationError,
};
use std::collections::HashSet;

/// Builds root-to-leaf path strings such as `"Kitchen > Fridge > Top Shelf"`.
#[derive(Debug, Clone)]
pub struct PathResolver<G> {
    graph: G,
    delimiter: String,
    max_depth: usize,
}

impl<G: LocationGraph> PathResolver<G> {
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            delimiter: SuggestConfig::DEFAULT_PATH_DELIMITER.to_string(),
            max_depth: SuggestConfig::DEFAULT_MAX_PATH_DEPTH,
        }
    }

    pub fn with_config(graph: G, config: &SuggestConfig) -> Self {
        Self {
            graph,
            delimiter: config.path_delimiter.clone(),
            max_depth: config.max_path_depth,
        }
    }

    /// Resolve the full path of `location_id`.
    ///
    /// Walks parent links iteratively. Returns `Ok(None)` when the location
    /// does not exist. A parent id that does not resolve ends the walk, so the
    /// path starts at the highest reachable ancestor.
    ///
    /// # Errors
    ///
    /// - `ValidationError::CircularReference` if the parent chain loops
    /// - `ValidationError::ConstraintViolation` if the chain is deeper than
    ///   the configured maximum
    /// - any error from the underlying [`LocationGraph`]
    pub fn resolve_path(&self, location_id: LocationId) -> LarderResult<Option<String>> {
        let Some(mut current) = self.graph.node(location_id)? else {
            return Ok(None);
        };

        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut names = Vec::new();

        loop {
            chain.push(current.id);
            if !visited.insert(current.id) {
                return Err(ValidationError::CircularReference { ids: chain }.into());
            }
            if names.len() == self.max_depth {
                return Err(ValidationError::ConstraintViolation {
                    constraint: "max_path_depth".to_string(),
                    reason: format!(
                        "location {} is nested deeper than {} levels",
                        location_id, self.max_depth
                    ),
                }
                .into());
            }
            names.push(current.name);

            let Some(parent_id) = current.parent_id else {
                break;
            };
            match self.graph.node(parent_id)? {
                Some(parent) => current = parent,
                None => break,
            }
        }

        names.reverse();
        Ok(Some(names.join(&self.delimiter)))
    }
}
