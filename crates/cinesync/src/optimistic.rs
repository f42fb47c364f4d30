use std::fmt::Display;
use std::future::Future;

/// Applies a local change before a remote mutation settles.
///
/// `apply` runs immediately, then `mutation` is awaited. When it fails,
/// `rollback` undoes the local change and the error is returned unchanged.
pub async fn optimistic<T, E, A, M, B>(apply: A, mutation: M, rollback: B) -> Result<T, E>
where
    A: FnOnce(),
    M: Future<Output = Result<T, E>>,
    B: FnOnce(),
    E: Display,
{
    apply();
    match mutation.await {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(error = %e, "Mutation failed, rolling back local change");
            rollback();
            Err(e)
        }
    }
}
