//! Ordered-candidate fallback.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use crate::error::Result;

/// Try `attempt` on each candidate in order and return the first one that
/// succeeds.
///
/// `Ok(false)` and recoverable errors move on to the next candidate;
/// anything else is returned immediately. `Ok(None)` when every candidate
/// was tried without success.
pub async fn first_success<C, I, F, Fut>(candidates: I, mut attempt: F) -> Result<Option<C>>
where
    I: IntoIterator<Item = C>,
    C: Display,
    F: FnMut(&C) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for candidate in candidates {
        match attempt(&candidate).await {
            Ok(true) => return Ok(Some(candidate)),
            Ok(false) => debug!("No conversion to {candidate}"),
            Err(e) if e.is_recoverable() => warn!("Conversion to {candidate} failed: {e}"),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContentError;
    use filetag_asset_store::AssetId;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_first_success_wins() {
        let mut tried = Vec::new();
        let winner = first_success(["webp", "gif", "jpeg", "png"], |c| {
            tried.push(c.to_string());
            let ok = *c == "jpeg";
            async move { Ok(ok) }
        })
        .await
        .unwrap();

        assert_eq!(winner, Some("jpeg"));
        assert_eq!(tried, vec!["webp", "gif", "jpeg"]);
    }

    #[tokio::test]
    async fn test_recoverable_errors_are_skipped() {
        let winner = first_success(["webp", "gif"], |c| {
            let result = if *c == "webp" {
                Err(ContentError::tool_failure("magick", "no decode delegate"))
            } else {
                Ok(true)
            };
            async move { result }
        })
        .await
        .unwrap();
        assert_eq!(winner, Some("gif"));
    }

    #[tokio::test]
    async fn test_fatal_errors_stop_the_loop() {
        let mut tried = 0;
        let err = first_success(["webp", "gif"], |_| {
            tried += 1;
            async { Err(ContentError::AssetNotFound(AssetId(1))) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ContentError::AssetNotFound(_)));
        assert_eq!(tried, 1);
    }

    #[tokio::test]
    async fn test_nothing_succeeds() {
        let winner = first_success(Vec::<String>::new(), |_| async { Ok(true) })
            .await
            .unwrap();
        assert_eq!(winner, None);

        let winner = first_success(["a", "b"], |_| async { Ok(false) }).await.unwrap();
        assert_eq!(winner, None);
    }
}
