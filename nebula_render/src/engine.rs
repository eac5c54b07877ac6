/// Nebula Engine - process-wide logger and the active renderer singleton
///
/// The logger is global and thread-safe. The renderer lives on the rendering
/// thread: it is created there, used there and never shared with other
/// threads, so it is kept in thread-local storage behind `Rc<RefCell<..>>`.
/// A process-wide claim keeps it to one renderer across all threads.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

use crate::error::{Error, Result};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use crate::renderer::{BackendSelector, Renderer, RendererConfig};

/// Shared handle to the active renderer
pub type SharedRenderer = Rc<RefCell<Box<dyn Renderer>>>;

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Set while some thread holds the renderer
static RENDERER_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Per-thread engine state
#[derive(Default)]
struct EngineState {
    initialized: bool,
    renderer: Option<SharedRenderer>,
}

impl EngineState {
    /// Empty the renderer slot, releasing the process-wide claim
    fn take_renderer(&mut self) -> Option<SharedRenderer> {
        let renderer = self.renderer.take();
        if renderer.is_some() {
            RENDERER_CLAIMED.store(false, Ordering::Release);
        }
        renderer
    }
}

impl Drop for EngineState {
    // Thread exit without shutdown
    fn drop(&mut self) {
        self.take_renderer();
    }
}

thread_local! {
    static ENGINE_STATE: RefCell<EngineState> = RefCell::new(EngineState::default());
}

// ===== PUBLIC API =====

/// Engine singleton manager
///
/// Exactly one renderer is active in the process, owned by the thread that
/// created it; replacing it requires `destroy_renderer` first (no hot-swap).
///
/// # Example
///
/// ```no_run
/// use nebula_render::nebula::{Engine, render::{BackendSelector, RendererConfig}};
///
/// Engine::initialize()?;
/// let config = RendererConfig::default();
/// let renderer = Engine::select_renderer(BackendSelector::new(), &config)?;
/// renderer.borrow_mut().present()?;
/// Engine::shutdown();
/// # Ok::<(), nebula_render::nebula::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Log an error before handing it back
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("nebula::Engine", "Initialization failed: {}", msg);
            }
            _ => {
                crate::engine_error!("nebula::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn renderer_exists_error() -> Error {
        Self::log_and_return_error(Error::InitializationFailed(
            "Renderer already exists. Call Engine::destroy_renderer() first.".to_string(),
        ))
    }

    fn require_no_renderer(state: &EngineState) -> Result<()> {
        if state.renderer.is_some() || RENDERER_CLAIMED.load(Ordering::Acquire) {
            return Err(Self::renderer_exists_error());
        }
        Ok(())
    }

    fn require_initialized(state: &EngineState) -> Result<()> {
        if state.initialized {
            Ok(())
        } else {
            Err(Self::log_and_return_error(Error::InitializationFailed(
                "Engine not initialized. Call Engine::initialize() first.".to_string(),
            )))
        }
    }

    /// Initialize the engine on the current thread (idempotent)
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.with(|state| state.borrow_mut().initialized = true);
        Ok(())
    }

    pub fn is_initialized() -> bool {
        ENGINE_STATE.with(|state| state.borrow().initialized)
    }

    /// Drop the renderer and return to the uninitialized state
    ///
    /// Renderer references still held elsewhere keep it alive until dropped.
    pub fn shutdown() {
        let renderer = ENGINE_STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.initialized = false;
            state.take_renderer()
        });
        drop(renderer);
    }

    /// Register a renderer as the active one
    ///
    /// # Errors
    ///
    /// - The engine is not initialized
    /// - A renderer already exists, on this thread or another
    pub fn create_renderer<R: Renderer + 'static>(renderer: R) -> Result<SharedRenderer> {
        Self::install_renderer(Box::new(renderer))
    }

    /// Register an already boxed renderer (the output of a `BackendSelector`)
    pub fn install_renderer(renderer: Box<dyn Renderer>) -> Result<SharedRenderer> {
        let backend = renderer.backend_type();
        let shared = ENGINE_STATE.with(|state| {
            let mut state = state.borrow_mut();
            Self::require_initialized(&state)?;
            if state.renderer.is_some()
                || RENDERER_CLAIMED
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                return Err(Self::renderer_exists_error());
            }
            let shared: SharedRenderer = Rc::new(RefCell::new(renderer));
            state.renderer = Some(shared.clone());
            Ok(shared)
        })?;

        crate::engine_info!("nebula::Engine", "{} renderer singleton created", backend);
        Ok(shared)
    }

    /// Pick a backend with `selector` and register the result
    pub fn select_renderer(selector: BackendSelector<'_>, config: &RendererConfig) -> Result<SharedRenderer> {
        ENGINE_STATE.with(|state| {
            let state = state.borrow();
            Self::require_initialized(&state)?;
            Self::require_no_renderer(&state)
        })?;
        let renderer = selector.select(config)?;
        Self::install_renderer(renderer)
    }

    /// Get the active renderer
    pub fn renderer() -> Result<SharedRenderer> {
        ENGINE_STATE.with(|state| {
            let state = state.borrow();
            Self::require_initialized(&state)?;
            state.renderer.clone().ok_or_else(|| {
                Self::log_and_return_error(Error::InitializationFailed(
                    "Renderer not created. Call Engine::create_renderer() first.".to_string(),
                ))
            })
        })
    }

    pub fn has_renderer() -> bool {
        ENGINE_STATE.with(|state| state.borrow().renderer.is_some())
    }

    /// Remove the active renderer, allowing a new one to be created
    pub fn destroy_renderer() -> Result<()> {
        let renderer = ENGINE_STATE.with(|state| {
            let mut state = state.borrow_mut();
            Self::require_initialized(&state)?;
            Ok::<_, Error>(state.take_renderer())
        })?;

        if renderer.is_some() {
            drop(renderer);
            crate::engine_info!("nebula::Engine", "Renderer singleton destroyed");
        }
        Ok(())
    }

    // ===== LOGGING API =====

    /// Replace the logger for the whole process
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(mut lock) = logger_lock.write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        Self::set_logger(DefaultLogger);
    }

    /// Used by engine_trace!/engine_debug!/engine_info!/engine_warn!
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: None,
            line: None,
        });
    }

    /// Used by engine_error!/engine_err! to attach the call site
    pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        Self::dispatch(LogEntry {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            file: Some(file),
            line: Some(line),
        });
    }

    fn dispatch(entry: LogEntry) {
        let logger_lock = LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)));
        if let Ok(lock) = logger_lock.read() {
            lock.log(&entry);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
