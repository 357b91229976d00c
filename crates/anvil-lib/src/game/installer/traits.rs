use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;

/// Downloads one library file into place.
///
/// Implementations validate `sha1` when given and must not leave a partial
/// file at `dest` on failure.
pub trait LibraryFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        sha1: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Which pipe a line of processor output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives processor output line by line.
pub type OutputCallback = Arc<dyn Fn(OutputStream, &str) + Send + Sync>;

/// A fully resolved processor command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub classpath: String,
    pub main_class: String,
    pub args: Vec<String>,
}

/// Spawns a processor, streams its output and waits for it to exit.
pub trait ProcessRunner: Send + Sync {
    /// Resolves to the exit code, `None` when the process was terminated by a signal.
    fn run<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        output: OutputCallback,
    ) -> BoxFuture<'a, crate::Result<Option<i32>>>;
}
