/// Startup backend selection
///
/// Backend crates register a factory per [`BackendType`]; `select` walks the
/// configured preference list and returns the first renderer that starts.
/// The Null backend is always available and needs no factory.

use crate::error::{Error, Result};
use crate::renderer::{BackendType, NullRenderer, Renderer, RendererConfig};

/// Factory building one backend; may borrow the window it renders to
pub type RendererFactory<'a> = Box<dyn FnOnce(&RendererConfig) -> Result<Box<dyn Renderer>> + 'a>;

pub struct BackendSelector<'a> {
    factories: Vec<(BackendType, RendererFactory<'a>)>,
}

impl<'a> Default for BackendSelector<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BackendSelector<'a> {
    pub fn new() -> Self {
        Self { factories: Vec::new() }
    }

    /// Register (or replace) the factory for a backend
    pub fn register<F>(&mut self, backend: BackendType, factory: F) -> &mut Self
    where
        F: FnOnce(&RendererConfig) -> Result<Box<dyn Renderer>> + 'a,
    {
        self.factories.retain(|(b, _)| *b != backend);
        self.factories.push((backend, Box::new(factory)));
        self
    }

    pub fn is_registered(&self, backend: BackendType) -> bool {
        backend == BackendType::Null || self.factories.iter().any(|(b, _)| *b == backend)
    }

    fn take_factory(&mut self, backend: BackendType) -> Option<RendererFactory<'a>> {
        let index = self.factories.iter().position(|(b, _)| *b == backend)?;
        Some(self.factories.remove(index).1)
    }

    /// Build exactly one renderer
    ///
    /// Backends are tried in `config.backend_preference` order. Unregistered
    /// backends are skipped, failing ones are logged and skipped. When none
    /// starts, the Null backend is used if `allow_null_fallback` is set.
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` listing every failure when no backend
    /// could be created.
    pub fn select(mut self, config: &RendererConfig) -> Result<Box<dyn Renderer>> {
        let mut failures: Vec<String> = Vec::new();

        for &backend in &config.backend_preference {
            if backend == BackendType::Null {
                crate::engine_info!("nebula::BackendSelector", "Using Null backend (requested)");
                return Ok(Box::new(NullRenderer::new(config)));
            }
            let Some(factory) = self.take_factory(backend) else {
                crate::engine_debug!("nebula::BackendSelector", "{} backend not registered, skipping", backend);
                continue;
            };
            match factory(config) {
                Ok(renderer) => {
                    crate::engine_info!("nebula::BackendSelector", "Selected {} backend", backend);
                    return Ok(renderer);
                }
                Err(e) => {
                    crate::engine_warn!("nebula::BackendSelector", "{} backend failed to start: {}", backend, e);
                    failures.push(format!("{}: {}", backend, e));
                }
            }
        }

        if config.allow_null_fallback {
            crate::engine_warn!(
                "nebula::BackendSelector",
                "No preferred backend available, falling back to Null backend"
            );
            return Ok(Box::new(NullRenderer::new(config)));
        }

        let details = if failures.is_empty() {
            "no preferred backend is registered".to_string()
        } else {
            failures.join("; ")
        };
        crate::engine_error!("nebula::BackendSelector", "No renderer backend could be created: {}", details);
        Err(Error::InitializationFailed(format!("No renderer backend could be created: {}", details)))
    }
}

#[cfg(test)]
#[path = "backend_selector_tests.rs"]
mod tests;
