//! The converter capability every adapter provides.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Turns the full bytes of a source file into the full bytes of a rendition.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input`, returning the converted bytes.
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Short label for logs.
    fn describe(&self) -> String {
        "converter".to_string()
    }
}

/// Shared handle stored in registries.
pub type SharedConverter = Arc<dyn Converter>;

impl fmt::Debug for dyn Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Converter({})", self.describe())
    }
}

/// Converter backed by a synchronous closure.
pub struct FnConverter<F> {
    label: String,
    func: F,
}

#[async_trait]
impl<F> Converter for FnConverter<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
{
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        (self.func)(input)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Wrap a closure as a shared converter.
pub fn from_fn<F>(label: impl Into<String>, func: F) -> SharedConverter
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    Arc::new(FnConverter {
        label: label.into(),
        func,
    })
}
