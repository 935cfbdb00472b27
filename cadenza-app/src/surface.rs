use cadenza_core::{Surface, ViewSurface, ViewType};
use std::sync::Arc;
use tracing::trace;

/// View lookup for a process with nothing rendered.
///
/// Every query misses, so the navigator still records history and emits
/// `ViewChanged` but skips the stacking choreography.
pub struct DetachedSurface;

impl ViewSurface for DetachedSurface {
    fn query_surface(&self, view: ViewType) -> Option<Arc<dyn Surface>> {
        trace!("No surface attached for {}", view);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_view_is_missing() {
        for view in ViewType::ALL {
            assert!(DetachedSurface.query_surface(view).is_none());
        }
        assert!(DetachedSurface.surface_by_id("user").is_none());
    }
}
