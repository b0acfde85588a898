use std::future::Future;

use crate::error::{io_err, PipelineError};

/// Build a multi-thread tokio runtime and block the current thread on `fut`.
pub fn start_blocking<F, T>(fut: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("autograde-worker")
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(fut)
}
