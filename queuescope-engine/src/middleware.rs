//! Middleware chain.
//!
//! Middleware wraps the transform stage. Each entry receives the samples and
//! a [`Next`] continuation; calling `next.run(..)` hands control to the rest
//! of the chain, returning without calling it short-circuits.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::error::{BoxError, EngineError};
use crate::hooks::{Registration, DEFAULT_MAX_HOOKS, DEFAULT_PRIORITY};
use crate::payload::{HookContext, PipelineData};

type Handler =
    Arc<dyn Fn(PipelineData, HookContext, Next) -> BoxFuture<'static, Result<PipelineData, BoxError>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MiddlewareOptions {
    pub priority: i32,
    pub name: Option<String>,
}

impl Default for MiddlewareOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            name: None,
        }
    }
}

impl MiddlewareOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

struct MiddlewareEntry {
    id: u64,
    name: String,
    priority: i32,
    handler: Handler,
}

type Chain = Arc<Vec<Arc<MiddlewareEntry>>>;

/// Error raised inside the chain, tagged with the middleware that raised it.
#[derive(Debug, Error)]
#[error("{message}")]
struct Failed {
    name: String,
    message: String,
}

/// The rest of the chain after the current middleware.
pub struct Next {
    chain: Chain,
    index: usize,
}

impl Next {
    /// Run the remaining middleware. At the end of the chain the data is
    /// returned unchanged.
    pub async fn run(self, data: PipelineData, ctx: HookContext) -> Result<PipelineData, BoxError> {
        let Some(entry) = self.chain.get(self.index).cloned() else {
            return Ok(data);
        };
        let next = Next {
            chain: self.chain,
            index: self.index + 1,
        };
        (entry.handler)(data, ctx, next).await.map_err(|e| {
            if e.is::<Failed>() {
                e
            } else {
                Box::new(Failed {
                    name: entry.name.clone(),
                    message: e.to_string(),
                }) as BoxError
            }
        })
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len().saturating_sub(self.index))
            .finish()
    }
}

struct ChainInner {
    entries: RwLock<Chain>,
    next_id: AtomicU64,
    max: usize,
}

impl ChainInner {
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|e| e.id == id) {
            return false;
        }
        let next: Vec<_> = entries.iter().filter(|e| e.id != id).cloned().collect();
        *entries = Arc::new(next);
        true
    }
}

/// Ordered middleware around the transform stage. Clones share entries.
#[derive(Clone)]
pub struct MiddlewareChain {
    inner: Arc<ChainInner>,
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOOKS)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.inner.entries.read().iter().map(|e| e.name.clone()).collect();
        f.debug_struct("MiddlewareChain").field("entries", &names).finish()
    }
}

impl MiddlewareChain {
    pub fn new(max: usize) -> Self {
        Self {
            inner: Arc::new(ChainInner {
                entries: RwLock::new(Arc::new(Vec::new())),
                next_id: AtomicU64::new(1),
                max,
            }),
        }
    }

    /// Add a middleware. It is placed after every entry with the same or a
    /// lower priority.
    pub fn use_middleware<F, Fut>(
        &self,
        handler: F,
        options: MiddlewareOptions,
    ) -> Result<Registration, EngineError>
    where
        F: Fn(PipelineData, HookContext, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PipelineData, BoxError>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let name = options.name.unwrap_or_else(|| format!("middleware-{id}"));
        let entry = Arc::new(MiddlewareEntry {
            id,
            name: name.clone(),
            priority: options.priority,
            handler: Arc::new(move |data, ctx, next| handler(data, ctx, next).boxed()),
        });

        {
            let mut entries = self.inner.entries.write();
            if entries.len() >= self.inner.max {
                return Err(EngineError::HookLimitExceeded {
                    point: "middleware".into(),
                    limit: self.inner.max,
                });
            }
            let at = entries
                .iter()
                .position(|e| e.priority > options.priority)
                .unwrap_or(entries.len());
            let mut next: Vec<_> = entries.iter().cloned().collect();
            next.insert(at, entry);
            *entries = Arc::new(next);
        }

        debug!(middleware = %name, priority = options.priority, "registered middleware");

        let weak: Weak<ChainInner> = Arc::downgrade(&self.inner);
        Ok(Registration::new(
            id,
            name,
            Box::new(move |id| weak.upgrade().is_some_and(|inner| inner.remove(id))),
        ))
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the chain over `data`. The result must be the same payload kind.
    pub async fn execute(&self, data: PipelineData, ctx: HookContext) -> Result<PipelineData, EngineError> {
        let chain = self.inner.entries.read().clone();
        if chain.is_empty() {
            return Ok(data);
        }

        let expected = data.kind();
        let next = Next { chain, index: 0 };
        let out = next.run(data, ctx).await.map_err(|e| match e.downcast::<Failed>() {
            Ok(failed) => EngineError::Middleware {
                name: failed.name,
                message: failed.message,
            },
            Err(other) => EngineError::Middleware {
                name: "unknown".into(),
                message: other.to_string(),
            },
        })?;

        if out.kind() != expected {
            return Err(EngineError::Middleware {
                name: "chain".into(),
                message: format!("returned {} where {expected} was expected", out.kind()),
            });
        }
        Ok(out)
    }
}
