//! Chaining single-stage converters into one multi-stage converter.
//!
//! Stages exchange whole buffers: each stage runs to completion before the
//! next one starts, and the previous intermediate buffer is released as soon
//! as the following stage has consumed it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::converter::{Converter, SharedConverter};
use crate::error::{ContentError, Result};

/// A converter made of two or more stages.
pub struct Pipe {
    stages: Vec<SharedConverter>,
}

/// Compose `stages` into a single converter.
///
/// A single stage is rejected rather than passed through, since it almost
/// always means the caller meant to add another one.
pub fn pipe(stages: Vec<SharedConverter>) -> Result<SharedConverter> {
    if stages.len() < 2 {
        return Err(ContentError::InvalidPipe(stages.len()));
    }
    Ok(Arc::new(Pipe { stages }))
}

#[async_trait]
impl Converter for Pipe {
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        let (first, rest) = self
            .stages
            .split_first()
            .ok_or(ContentError::InvalidPipe(0))?;

        let mut buffer = first.convert(input).await?;
        for (index, stage) in rest.iter().enumerate() {
            trace!("pipe stage {} consumed {} bytes", index + 1, buffer.len());
            buffer = stage.convert(&buffer).await?;
        }
        Ok(buffer)
    }

    fn describe(&self) -> String {
        self.stages
            .iter()
            .map(|stage| stage.describe())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::from_fn;
    use pretty_assertions::assert_eq;

    fn upper() -> SharedConverter {
        from_fn("upper", |input| Ok(input.to_ascii_uppercase()))
    }

    fn reverse() -> SharedConverter {
        from_fn("reverse", |input| Ok(input.iter().rev().copied().collect()))
    }

    #[test]
    fn test_single_stage_is_rejected() {
        let err = pipe(vec![upper()]).err().unwrap();
        assert!(matches!(err, ContentError::InvalidPipe(1)));
        assert!(matches!(pipe(Vec::new()), Err(ContentError::InvalidPipe(0))));
    }

    #[tokio::test]
    async fn test_two_stages_match_manual_chaining() {
        let input = b"thumbnail";
        let manual = reverse().convert(&upper().convert(input).await.unwrap()).await.unwrap();

        let piped = pipe(vec![upper(), reverse()]).unwrap();
        assert_eq!(piped.convert(input).await.unwrap(), manual);
        assert_eq!(piped.describe(), "upper | reverse");
    }

    #[tokio::test]
    async fn test_middle_stages_run_in_order() {
        let append = |suffix: &'static str| {
            from_fn(suffix, move |input| {
                let mut out = input.to_vec();
                out.extend_from_slice(suffix.as_bytes());
                Ok(out)
            })
        };
        let piped = pipe(vec![append("a"), append("b"), append("c"), append("d")]).unwrap();
        assert_eq!(piped.convert(b">").await.unwrap(), b">abcd".to_vec());
    }

    #[tokio::test]
    async fn test_stage_error_stops_the_pipe() {
        let failing = from_fn("fail", |_| Err(ContentError::tool_failure("fake", "bad input")));
        let piped = pipe(vec![failing, upper()]).unwrap();
        let err = piped.convert(b"x").await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
