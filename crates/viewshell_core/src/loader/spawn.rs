//! Detached task spawning for background loads.

use futures::future::{FutureExt, LocalBoxFuture};
use log::debug;

/// Runs a future without the caller awaiting it.
///
/// Implementations must not panic: `preload` is a hint and never fails.
pub trait TaskSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>);
}

/// Polls the task once on the caller's stack.
///
/// Works without any executor. Immediately ready fetches complete here; an
/// unfinished load stays in the loader table and the next `resolve` for the
/// same resource drives it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSpawner;

impl TaskSpawner for InlineSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>) {
        if task.now_or_never().is_none() {
            debug!("event=task_spawn module=loader status=deferred spawner=inline");
        }
    }
}

/// Spawns onto the current `tokio::task::LocalSet`.
///
/// Only install this on a loader that is used from inside a `LocalSet`;
/// `tokio::task::spawn_local` panics anywhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSetSpawner;

impl TaskSpawner for LocalSetSpawner {
    fn spawn_detached(&self, task: LocalBoxFuture<'static, ()>) {
        // Dropping the handle detaches the task.
        drop(tokio::task::spawn_local(task));
    }
}

#[cfg(test)]
mod tests {
    use super::{InlineSpawner, TaskSpawner};
    use futures::future::{self, FutureExt};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn inline_spawner_runs_ready_work_without_an_executor() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        InlineSpawner.spawn_detached(
            async move {
                flag.set(true);
            }
            .boxed_local(),
        );
        assert!(ran.get());
    }

    #[test]
    fn inline_spawner_drops_pending_work_without_panicking() {
        InlineSpawner.spawn_detached(future::pending::<()>().boxed_local());
    }
}
