use tbs_api::{CancellationToken, TbsError, TbsResult};

/// Race a fallible future against a cancellation token.
///
/// Resolves to [TbsError::Cancelled] as soon as the token is cancelled,
/// dropping the inner future. The token is checked first, so an already
/// cancelled request never polls the inner future.
pub(crate) async fn or_cancel<T>(
    cancel: &CancellationToken,
    fut: impl std::future::Future<Output = TbsResult<T>>,
) -> TbsResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TbsError::Cancelled),
        r = fut => r,
    }
}
