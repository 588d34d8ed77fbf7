//! Cross-platform threading abstraction using rayon.
//!
//! Jobs are fire-and-forget: the submitter never waits. Results travel back
//! over a channel owned by whoever submitted the job (see
//! [`TileRegistry`](crate::TileRegistry)), so the executor itself holds no
//! result state.
//!
//! - `Rayon`: rayon's global pool (native, wasm-bindgen-rayon, emscripten)
//! - `Pool`: a dedicated pool with a fixed thread count
//! - `Inline`: runs the job on the calling thread. For headless tools, tests
//!   and targets without threads.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Where generation jobs run.
#[derive(Clone, Default)]
pub enum Executor {
  /// rayon's global thread pool.
  #[default]
  Rayon,
  /// A dedicated thread pool.
  Pool(Arc<ThreadPool>),
  /// Synchronously, on the submitting thread.
  Inline,
}

impl Executor {
  /// Build a dedicated pool. `0` lets rayon pick the thread count.
  pub fn with_threads(num_threads: usize) -> Result<Self, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new()
      .num_threads(num_threads)
      .thread_name(|index| format!("terrain-gen-{index}"))
      .build()?;
    tracing::debug!(threads = pool.current_num_threads(), "terrain generation pool created");
    Ok(Executor::Pool(Arc::new(pool)))
  }

  /// Submit a job (non-blocking unless `Inline`).
  pub fn spawn<F>(&self, work: F)
  where
    F: FnOnce() + Send + 'static,
  {
    match self {
      Executor::Rayon => rayon::spawn(work),
      Executor::Pool(pool) => pool.spawn(work),
      Executor::Inline => work(),
    }
  }

  /// Number of threads that may run jobs concurrently.
  pub fn num_threads(&self) -> usize {
    match self {
      Executor::Rayon => rayon::current_num_threads(),
      Executor::Pool(pool) => pool.current_num_threads(),
      Executor::Inline => 1,
    }
  }

  /// True if jobs complete before `spawn` returns.
  pub fn is_inline(&self) -> bool {
    matches!(self, Executor::Inline)
  }
}

impl std::fmt::Debug for Executor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Executor::Rayon => write!(f, "Executor::Rayon"),
      Executor::Pool(pool) => write!(f, "Executor::Pool({} threads)", pool.current_num_threads()),
      Executor::Inline => write!(f, "Executor::Inline"),
    }
  }
}

// =============================================================================
// Tests
// =============================================================================
