//! The hook registry.
//!
//! Hooks are async handlers attached to named extension points. At each
//! point they run in ascending priority order (ties by registration order),
//! each under a timeout, and each may replace the payload or pass it through.
//!
//! A failing hook never takes the pipeline down by default: its output is
//! discarded, the last good payload carries on, and the failure is logged,
//! broadcast to subscribers and handed to hooks on the `error` point. With
//! `stop_on_error` the first failure aborts instead.
//!
//! Registration is copy-on-iterate: each point holds an immutable
//! `Arc<Vec<_>>` that registration replaces wholesale, so an execution in
//! flight keeps iterating the list it started with.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{BoxError, EngineError, HookError};
use crate::payload::{FailureNotice, HookContext, PipelineData};

/// Default hook priority. Lower runs first.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Default cap on hooks per extension point.
pub const DEFAULT_MAX_HOOKS: usize = 100;

/// Default per-hook timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const EVENT_CAPACITY: usize = 64;

/// Named stages where hooks can be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionPoint {
    PreTransform,
    PostTransform,
    PreValidate,
    PostValidate,
    PreAggregate,
    PostAggregate,
    PreEntityCreate,
    PostEntityCreate,
    PreEnrich,
    PostEnrich,
    PreOptimize,
    PostOptimize,
    PreRelationshipCreate,
    PostRelationshipCreate,
    PreWindowRotate,
    PostWindowRotate,
    Error,
    ValidationError,
    TransformationError,
}

impl ExtensionPoint {
    pub const ALL: [ExtensionPoint; 19] = [
        ExtensionPoint::PreTransform,
        ExtensionPoint::PostTransform,
        ExtensionPoint::PreValidate,
        ExtensionPoint::PostValidate,
        ExtensionPoint::PreAggregate,
        ExtensionPoint::PostAggregate,
        ExtensionPoint::PreEntityCreate,
        ExtensionPoint::PostEntityCreate,
        ExtensionPoint::PreEnrich,
        ExtensionPoint::PostEnrich,
        ExtensionPoint::PreOptimize,
        ExtensionPoint::PostOptimize,
        ExtensionPoint::PreRelationshipCreate,
        ExtensionPoint::PostRelationshipCreate,
        ExtensionPoint::PreWindowRotate,
        ExtensionPoint::PostWindowRotate,
        ExtensionPoint::Error,
        ExtensionPoint::ValidationError,
        ExtensionPoint::TransformationError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionPoint::PreTransform => "pre-transform",
            ExtensionPoint::PostTransform => "post-transform",
            ExtensionPoint::PreValidate => "pre-validate",
            ExtensionPoint::PostValidate => "post-validate",
            ExtensionPoint::PreAggregate => "pre-aggregate",
            ExtensionPoint::PostAggregate => "post-aggregate",
            ExtensionPoint::PreEntityCreate => "pre-entity-create",
            ExtensionPoint::PostEntityCreate => "post-entity-create",
            ExtensionPoint::PreEnrich => "pre-enrich",
            ExtensionPoint::PostEnrich => "post-enrich",
            ExtensionPoint::PreOptimize => "pre-optimize",
            ExtensionPoint::PostOptimize => "post-optimize",
            ExtensionPoint::PreRelationshipCreate => "pre-relationship-create",
            ExtensionPoint::PostRelationshipCreate => "post-relationship-create",
            ExtensionPoint::PreWindowRotate => "pre-window-rotate",
            ExtensionPoint::PostWindowRotate => "post-window-rotate",
            ExtensionPoint::Error => "error",
            ExtensionPoint::ValidationError => "validation-error",
            ExtensionPoint::TransformationError => "transformation-error",
        }
    }
}

impl fmt::Display for ExtensionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionPoint {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExtensionPoint::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EngineError::InvalidExtensionPoint(s.to_string()))
    }
}

/// What a hook returns: `Some` replaces the payload, `None` passes it through.
pub type HookResult = Result<Option<PipelineData>, BoxError>;

type Handler = Arc<dyn Fn(PipelineData, HookContext) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Per-hook registration options.
#[derive(Debug, Clone)]
pub struct HookOptions {
    pub priority: i32,
    /// Overrides the registry default.
    pub timeout: Option<Duration>,
    /// Run at most once, then unregister.
    pub once: bool,
    pub name: Option<String>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            timeout: None,
            once: false,
            name: None,
        }
    }
}

impl HookOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

struct HookEntry {
    id: u64,
    name: String,
    priority: i32,
    timeout: Option<Duration>,
    once: bool,
    claimed: AtomicBool,
    handler: Handler,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .finish()
    }
}

type HookList = Arc<Vec<Arc<HookEntry>>>;

/// A failed hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub point: ExtensionPoint,
    pub hook: String,
    pub error: HookError,
}

impl HookFailure {
    pub fn notice(&self) -> FailureNotice {
        FailureNotice::new(self.point, self.hook.clone(), self.error.to_string())
    }
}

/// Events broadcast to [`HookRegistry::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum HookEvent {
    Failed(HookFailure),
}

/// Result of running the hooks at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRun {
    /// The last good payload.
    pub data: PipelineData,
    pub failures: Vec<HookFailure>,
}

/// Handle returned by registration. Dropping it leaves the hook in place.
pub struct Registration {
    id: u64,
    label: String,
    remove: Box<dyn Fn(u64) -> bool + Send + Sync>,
}

impl Registration {
    pub(crate) fn new(id: u64, label: String, remove: Box<dyn Fn(u64) -> bool + Send + Sync>) -> Self {
        Self { id, label, remove }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the hook. Returns `false` if it was already gone.
    pub fn unregister(self) -> bool {
        (self.remove)(self.id)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

struct RegistryInner {
    points: RwLock<BTreeMap<ExtensionPoint, HookList>>,
    next_id: AtomicU64,
    max_per_point: usize,
    default_timeout: Duration,
    stop_on_error: bool,
    events: broadcast::Sender<HookEvent>,
}

impl RegistryInner {
    fn snapshot(&self, point: ExtensionPoint) -> HookList {
        self.points.read().get(&point).cloned().unwrap_or_default()
    }

    fn remove(&self, point: ExtensionPoint, id: u64) -> bool {
        let mut points = self.points.write();
        let Some(current) = points.get(&point) else {
            return false;
        };
        if !current.iter().any(|h| h.id == id) {
            return false;
        }
        let next: Vec<_> = current.iter().filter(|h| h.id != id).cloned().collect();
        points.insert(point, Arc::new(next));
        true
    }
}

/// Caller-owned hook registry. Clones share the same hooks.
///
/// # Example
///
/// ```rust
/// use queuescope_engine::{ExtensionPoint, HookContext, HookOptions, HookRegistry, PipelineData};
///
/// # tokio_test_block(async {
/// let registry = HookRegistry::new();
///
/// let registration = registry
///     .register(
///         ExtensionPoint::PostEntityCreate,
///         |data: PipelineData, _ctx: HookContext| async move { Ok(Some(data)) },
///         HookOptions::default().name("passthrough"),
///     )
///     .unwrap();
///
/// let run = registry
///     .execute_hooks(
///         ExtensionPoint::PostEntityCreate,
///         PipelineData::Entities(Vec::new()),
///         HookContext::new(ExtensionPoint::PostEntityCreate, 1),
///     )
///     .await
///     .unwrap();
/// assert!(run.failures.is_empty());
/// assert!(registration.unregister());
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct HookRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points = self.inner.points.read();
        f.debug_struct("HookRegistry")
            .field("hooks", &points.values().map(|v| v.len()).sum::<usize>())
            .field("max_per_point", &self.inner.max_per_point)
            .field("stop_on_error", &self.inner.stop_on_error)
            .finish()
    }
}

impl HookRegistry {
    /// A registry with default limits.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HookRegistryBuilder {
        HookRegistryBuilder::default()
    }

    /// Attach a handler to an extension point.
    pub fn register<F, Fut>(
        &self,
        point: ExtensionPoint,
        handler: F,
        options: HookOptions,
    ) -> Result<Registration, EngineError>
    where
        F: Fn(PipelineData, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let name = options.name.unwrap_or_else(|| format!("hook-{id}"));
        let entry = Arc::new(HookEntry {
            id,
            name: name.clone(),
            priority: options.priority,
            timeout: options.timeout,
            once: options.once,
            claimed: AtomicBool::new(false),
            handler: Arc::new(move |data, ctx| handler(data, ctx).boxed()),
        });

        {
            let mut points = self.inner.points.write();
            let current = points.get(&point).cloned().unwrap_or_default();
            if current.len() >= self.inner.max_per_point {
                return Err(EngineError::HookLimitExceeded {
                    point: point.to_string(),
                    limit: self.inner.max_per_point,
                });
            }
            let mut next: Vec<_> = current.iter().cloned().collect();
            next.push(entry);
            // Stable: equal priorities keep registration order
            next.sort_by_key(|h| (h.priority, h.id));
            points.insert(point, Arc::new(next));
        }

        debug!(%point, hook = %name, priority = options.priority, "registered hook");

        let weak: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        Ok(Registration::new(
            id,
            format!("{point}:{name}"),
            Box::new(move |id| weak.upgrade().is_some_and(|inner| inner.remove(point, id))),
        ))
    }

    /// Attach a handler to an extension point given by name.
    pub fn register_named<F, Fut>(
        &self,
        point: &str,
        handler: F,
        options: HookOptions,
    ) -> Result<Registration, EngineError>
    where
        F: Fn(PipelineData, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.register(point.parse()?, handler, options)
    }

    /// Number of hooks at a point.
    pub fn hook_count(&self, point: ExtensionPoint) -> usize {
        self.inner.snapshot(point).len()
    }

    /// Receive hook failure events.
    pub fn subscribe(&self) -> broadcast::Receiver<HookEvent> {
        self.inner.events.subscribe()
    }

    pub fn stop_on_error(&self) -> bool {
        self.inner.stop_on_error
    }

    /// Run every hook at `point` over `data`.
    pub async fn execute_hooks(
        &self,
        point: ExtensionPoint,
        data: PipelineData,
        ctx: HookContext,
    ) -> Result<HookRun, EngineError> {
        let hooks = self.inner.snapshot(point);
        let mut data = data;
        let mut failures = Vec::new();

        for hook in hooks.iter() {
            let outcome = match self.invoke(point, hook, &data, &ctx).await {
                Some(outcome) => outcome,
                None => continue,
            };

            match outcome {
                Ok(Some(next)) => data = next,
                Ok(None) => {}
                Err(error) => {
                    let failure = HookFailure {
                        point,
                        hook: hook.name.clone(),
                        error,
                    };
                    warn!(%point, hook = %failure.hook, error = %failure.error, "hook failed");
                    // No receivers is fine
                    let _ = self.inner.events.send(HookEvent::Failed(failure.clone()));

                    if self.inner.stop_on_error {
                        return Err(EngineError::HookAborted {
                            point: point.to_string(),
                            hook: failure.hook,
                            source: failure.error,
                        });
                    }
                    if point != ExtensionPoint::Error {
                        self.notify_error_hooks(&failure, &ctx).await;
                    }
                    failures.push(failure);
                }
            }
        }

        Ok(HookRun { data, failures })
    }

    /// Hand a failure to the `error` hooks. Their own failures are only logged.
    async fn notify_error_hooks(&self, failure: &HookFailure, ctx: &HookContext) {
        let point = ExtensionPoint::Error;
        let hooks = self.inner.snapshot(point);
        let data = PipelineData::Failure(failure.notice());
        let ctx = ctx.at(point);

        for hook in hooks.iter() {
            if let Some(Err(error)) = self.invoke(point, hook, &data, &ctx).await {
                warn!(hook = %hook.name, %error, "error hook failed");
            }
        }
    }

    /// Run one hook. `None` means a `once` hook was already claimed.
    async fn invoke(
        &self,
        point: ExtensionPoint,
        hook: &HookEntry,
        data: &PipelineData,
        ctx: &HookContext,
    ) -> Option<Result<Option<PipelineData>, HookError>> {
        if hook.once && hook.claimed.swap(true, Ordering::AcqRel) {
            return None;
        }

        let timeout = hook.timeout.unwrap_or(self.inner.default_timeout);
        let result = tokio::time::timeout(timeout, (hook.handler)(data.clone(), ctx.clone())).await;

        if hook.once {
            self.inner.remove(point, hook.id);
        }

        Some(match result {
            Err(_) => Err(HookError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(HookError::Execution(e.to_string())),
            Ok(Ok(None)) => Ok(None),
            Ok(Ok(Some(next))) if next.kind() == data.kind() => Ok(Some(next)),
            Ok(Ok(Some(next))) => Err(HookError::PayloadMismatch {
                expected: data.kind(),
                actual: next.kind(),
            }),
        })
    }
}

/// Builder for `HookRegistry`.
#[derive(Debug)]
pub struct HookRegistryBuilder {
    max_per_point: usize,
    default_timeout: Duration,
    stop_on_error: bool,
}

impl Default for HookRegistryBuilder {
    fn default() -> Self {
        Self {
            max_per_point: DEFAULT_MAX_HOOKS,
            default_timeout: DEFAULT_TIMEOUT,
            stop_on_error: false,
        }
    }
}

impl HookRegistryBuilder {
    pub fn max_hooks_per_point(mut self, max: usize) -> Self {
        self.max_per_point = max;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn build(self) -> HookRegistry {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        HookRegistry {
            inner: Arc::new(RegistryInner {
                points: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                max_per_point: self.max_per_point,
                default_timeout: self.default_timeout,
                stop_on_error: self.stop_on_error,
                events,
            }),
        }
    }
}
