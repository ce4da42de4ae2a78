//! Shared engines, initialized once and handed to every worker.

use crate::error::{CuratorError, Result};
use crate::sink::ChunkSink;
use crate::stt::Transcriber;
use once_cell::sync::OnceCell;
use std::sync::Arc;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// Holds the transcriber and the sink behind one-time initialization cells.
///
/// Construct with factories and call [`ResourceContext::warm_up`] before the
/// first batch so that loading failures stop the run instead of surfacing as
/// per-record errors.
pub struct ResourceContext {
    transcriber: OnceCell<Arc<dyn Transcriber>>,
    sink: OnceCell<Arc<dyn ChunkSink>>,
    transcriber_factory: Option<Factory<dyn Transcriber>>,
    sink_factory: Option<Factory<dyn ChunkSink>>,
}

impl std::fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field(
                "transcriber",
                &self.transcriber.get().map(|t| t.model_name().to_string()),
            )
            .field("sink", &self.sink.get().map(|s| s.name().to_string()))
            .finish()
    }
}

impl ResourceContext {
    /// Lazily build both engines on first use.
    pub fn new<T, S>(transcriber_factory: T, sink_factory: S) -> Self
    where
        T: Fn() -> Result<Arc<dyn Transcriber>> + Send + Sync + 'static,
        S: Fn() -> Result<Arc<dyn ChunkSink>> + Send + Sync + 'static,
    {
        Self {
            transcriber: OnceCell::new(),
            sink: OnceCell::new(),
            transcriber_factory: Some(Box::new(transcriber_factory)),
            sink_factory: Some(Box::new(sink_factory)),
        }
    }

    /// Use engines that are already built.
    pub fn from_parts(transcriber: Arc<dyn Transcriber>, sink: Arc<dyn ChunkSink>) -> Self {
        Self {
            transcriber: OnceCell::with_value(transcriber),
            sink: OnceCell::with_value(sink),
            transcriber_factory: None,
            sink_factory: None,
        }
    }

    pub fn transcriber(&self) -> Result<&Arc<dyn Transcriber>> {
        self.transcriber.get_or_try_init(|| match &self.transcriber_factory {
            Some(factory) => factory(),
            None => Err(CuratorError::Other("no transcriber configured".to_string())),
        })
    }

    pub fn sink(&self) -> Result<&Arc<dyn ChunkSink>> {
        self.sink.get_or_try_init(|| match &self.sink_factory {
            Some(factory) => factory(),
            None => Err(CuratorError::Other("no sink configured".to_string())),
        })
    }

    /// Build both engines now and check the transcriber can run.
    pub fn warm_up(&self) -> Result<()> {
        let transcriber = self.transcriber()?;
        if !transcriber.is_ready() {
            return Err(CuratorError::ConfigInvalidValue {
                key: "stt.model".to_string(),
                message: format!("transcriber '{}' is not ready", transcriber.model_name()),
            });
        }
        let sink = self.sink()?;
        tracing::info!(
            model = transcriber.model_name(),
            sink = sink.name(),
            "resources ready"
        );
        Ok(())
    }
}
