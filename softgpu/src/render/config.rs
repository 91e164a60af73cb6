//! Types used in pipeline configuration

/// Thread pool to use for multithreaded rendering
///
/// Most users will use the global Rayon pool, but it's possible to provide your
/// own as well.
pub enum ThreadPool {
    /// User-provided pool
    Custom(rayon::ThreadPool),
    /// Global Rayon pool
    Global,
}

impl ThreadPool {
    /// Runs a function across the thread pool
    pub fn run<F: FnOnce() -> V + Send, V: Send>(&self, f: F) -> V {
        match self {
            ThreadPool::Custom(p) => p.install(f),
            ThreadPool::Global => f(),
        }
    }

    /// Returns the number of threads in the pool
    pub fn thread_count(&self) -> usize {
        match self {
            ThreadPool::Custom(p) => p.current_num_threads(),
            ThreadPool::Global => rayon::current_num_threads(),
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadPool::Custom(p) => {
                write!(f, "Custom({} threads)", p.current_num_threads())
            }
            ThreadPool::Global => write!(f, "Global"),
        }
    }
}

/// Settings for a pipeline invocation
#[derive(Debug)]
pub struct PipelineConfig {
    /// Thread pool for vertex shading and rasterization
    ///
    /// If this is `None`, all work is done on the calling thread.
    pub threads: Option<ThreadPool>,

    /// Height of the horizontal bands which are rasterized in parallel
    ///
    /// Each band is owned by a single worker, which walks every triangle in
    /// submission order; values of 0 are treated as 1.
    pub band_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: Some(ThreadPool::Global),
            band_rows: 16,
        }
    }
}

impl PipelineConfig {
    /// Builds a configuration which does all work on the calling thread
    pub fn single_threaded() -> Self {
        Self {
            threads: None,
            ..Self::default()
        }
    }

    /// Returns the number of threads used by this configuration
    pub fn thread_count(&self) -> usize {
        self.threads.as_ref().map(|t| t.thread_count()).unwrap_or(1)
    }
}
