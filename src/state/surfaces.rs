use std::{
    collections::HashSet,
    sync::{PoisonError, RwLock},
};

use crate::dto::surfaces::{SurfaceKind, VisibleSurface};

/// Answers "which surfaces of this kind are open, and for which court".
pub trait SurfaceVisibility: Send + Sync {
    fn visible(&self, kind: SurfaceKind) -> Vec<VisibleSurface>;
}

/// Visible-surface set reported by the view layer.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: RwLock<HashSet<VisibleSurface>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set, returning how many surfaces are now visible.
    pub fn replace(&self, surfaces: impl IntoIterator<Item = VisibleSurface>) -> usize {
        let mut guard = self.surfaces.write().unwrap_or_else(PoisonError::into_inner);
        *guard = surfaces.into_iter().collect();
        guard.len()
    }

    pub fn snapshot(&self) -> Vec<VisibleSurface> {
        self.surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }
}

impl SurfaceVisibility for SurfaceRegistry {
    fn visible(&self, kind: SurfaceKind) -> Vec<VisibleSurface> {
        self.surfaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|surface| surface.kind == kind)
            .copied()
            .collect()
    }
}
