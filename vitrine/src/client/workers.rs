use std::sync::Arc;

use rayon::ThreadPool;
use tokio::sync::oneshot;

// A self-contained unit of blocking work: opening repositories and
// chewing through their object stores never runs on the async side.
pub(crate) trait Command {
    type Output;

    fn exec(self) -> Self::Output;
}

#[derive(Clone)]
pub(crate) struct Workers {
    pool: Arc<ThreadPool>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Error {
    WorkerGone,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::WorkerGone => write!(f, "worker dropped the reply channel"),
        }
    }
}

impl Workers {
    pub(crate) fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    pub(crate) async fn execute<C>(&self, cmd: C) -> Result<C::Output, Error>
    where
        C: Command + Send + 'static,
        C::Output: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        self.pool.spawn(move || {
            // receiver may have hung up already; nothing to do then
            let _ignored = result_tx.send(cmd.exec());
        });
        result_rx.await.map_err(|_discarded| Error::WorkerGone)
    }
}
