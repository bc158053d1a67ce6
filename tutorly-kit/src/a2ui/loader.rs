//! A2UI Screen Loader
//!
//! Fetches screen payloads from a [`ScreenSource`], decodes and validates
//! them, and always hands back *some* tree. Failures are never propagated:
//! the loader serves, in order, the last good tree for the screen, a fallback
//! registered for it, or a built-in "content unavailable" tree, and reports
//! the swallowed error next to it.
//!
//! Consecutive failures halve the next attempt's timeout (down to a floor).
//! Past a threshold the circuit opens and the source is left alone for a
//! cooldown period.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::error::{LoadError, ValidationError};
use super::node::ComponentNode;
use super::validator::{validate, ValidationLimits, ValidationMetrics};
use super::value::UiValue;

/// Upper bound on a single attempt, keeping every load under five seconds
pub const MAX_TIMEOUT_MS: u64 = 4500;

/// Where screen payloads come from.
///
/// A source only fetches; retry and fallback policy belong to the loader.
pub trait ScreenSource: Send + Sync {
    /// Fetch the raw JSON payload of a screen
    fn fetch(&self, screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>>;
}

/// Screens held in memory, mostly for tests and bundled content.
#[derive(Debug, Clone, Default)]
pub struct StaticScreenSource {
    screens: HashMap<String, String>,
}

impl StaticScreenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_screen(mut self, screen_id: impl Into<String>, json: impl Into<String>) -> Self {
        self.insert(screen_id, json);
        self
    }

    pub fn insert(&mut self, screen_id: impl Into<String>, json: impl Into<String>) {
        self.screens.insert(screen_id.into(), json.into());
    }
}

impl ScreenSource for StaticScreenSource {
    fn fetch(&self, screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>> {
        let result = self
            .screens
            .get(screen_id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(screen_id.to_string()));
        Box::pin(async move { result })
    }
}

/// Reads `<dir>/<screen id>.json`.
#[derive(Debug, Clone)]
pub struct FileScreenSource {
    dir: PathBuf,
}

impl FileScreenSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileScreenSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, screen_id: &str) -> Option<PathBuf> {
        let acceptable = !screen_id.is_empty()
            && screen_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !screen_id.starts_with('.');
        acceptable.then(|| self.dir.join(format!("{}.json", screen_id)))
    }
}

impl ScreenSource for FileScreenSource {
    fn fetch(&self, screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>> {
        let screen_id = screen_id.to_string();
        let path = self.path_for(&screen_id);

        Box::pin(async move {
            let Some(path) = path else {
                return Err(LoadError::NotFound(screen_id));
            };
            async_fs::read_to_string(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LoadError::NotFound(screen_id),
                _ => LoadError::Transport(format!("{}: {}", path.display(), e)),
            })
        })
    }
}

/// Loader timing and circuit breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    /// Timeout of an attempt after a success
    pub timeout_ms: u64,
    /// Backoff never shortens the timeout below this
    pub min_timeout_ms: u64,
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// How long an open circuit stays open
    pub cooldown_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            timeout_ms: 3000,
            min_timeout_ms: 250,
            failure_threshold: 3,
            cooldown_ms: 30_000,
        }
    }
}

impl LoaderConfig {
    /// Bring values into a workable range
    pub fn sanitized(self) -> Self {
        let timeout_ms = self.timeout_ms.clamp(1, MAX_TIMEOUT_MS);
        LoaderConfig {
            timeout_ms,
            min_timeout_ms: self.min_timeout_ms.clamp(1, timeout_ms),
            failure_threshold: self.failure_threshold.max(1),
            cooldown_ms: self.cooldown_ms,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Where a loaded tree came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenOrigin {
    /// Freshly fetched and validated
    Remote,
    /// Last good tree for this screen
    Cached,
    /// Registered or built-in fallback
    Fallback,
}

/// The outcome of [`ScreenLoader::load_screen`]
#[derive(Debug, Clone)]
pub struct LoadedScreen {
    pub screen_id: String,
    pub root: ComponentNode,
    pub origin: ScreenOrigin,
    pub metrics: ValidationMetrics,
    /// Set whenever the tree is not a fresh fetch
    pub error: Option<LoadError>,
    pub elapsed: Duration,
}

impl LoadedScreen {
    pub fn is_fresh(&self) -> bool {
        self.origin == ScreenOrigin::Remote
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    /// Source is skipped until the cooldown runs out
    Open { remaining: Duration },
    /// Cooldown is over; the next attempt decides
    HalfOpen,
}

#[derive(Debug, Default)]
struct Breaker {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Loads screens with timeouts, caching and a circuit breaker.
///
/// # Example
///
/// ```rust,ignore
/// let loader = ScreenLoader::new(
///     Arc::new(FileScreenSource::new("screens")),
///     LoaderConfig::default(),
///     ValidationLimits::default(),
/// );
///
/// let screen = loader.load_screen("home").await;
/// if let Some(error) = &screen.error {
///     log::warn!("Showing {:?} content: {}", screen.origin, error);
/// }
/// ```
pub struct ScreenLoader {
    source: Arc<dyn ScreenSource>,
    config: LoaderConfig,
    limits: ValidationLimits,
    breaker: Mutex<Breaker>,
    cache: Mutex<HashMap<String, (ComponentNode, ValidationMetrics)>>,
    fallbacks: HashMap<String, (ComponentNode, ValidationMetrics)>,
}

impl ScreenLoader {
    pub fn new(source: Arc<dyn ScreenSource>, config: LoaderConfig, limits: ValidationLimits) -> Self {
        ScreenLoader {
            source,
            config: config.sanitized(),
            limits,
            breaker: Mutex::new(Breaker::default()),
            cache: Mutex::new(HashMap::new()),
            fallbacks: HashMap::new(),
        }
    }

    /// Register the tree served for a screen when it cannot be loaded and
    /// nothing is cached. The tree is validated up front.
    pub fn add_fallback(
        &mut self,
        screen_id: impl Into<String>,
        root: ComponentNode,
    ) -> Result<(), ValidationError> {
        let metrics = validate(&root, self.limits)?;
        self.fallbacks.insert(screen_id.into(), (root, metrics));
        Ok(())
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn limits(&self) -> ValidationLimits {
        self.limits
    }

    /// Load a screen. Never fails; see [`LoadedScreen::error`].
    pub async fn load_screen(&self, screen_id: &str) -> LoadedScreen {
        let started = Instant::now();

        let result = match self.admit() {
            Ok(timeout) => self.fetch_and_validate(screen_id, timeout).await,
            Err(remaining) => Err(LoadError::CircuitOpen(remaining)),
        };

        match result {
            Ok((root, metrics)) => {
                self.record_success();
                self.cache().insert(screen_id.to_string(), (root.clone(), metrics));
                ::log::info!(
                    "[A2UI loader] Loaded {} ({} components, depth {})",
                    screen_id,
                    metrics.total_components,
                    metrics.max_depth
                );
                LoadedScreen {
                    screen_id: screen_id.to_string(),
                    root,
                    origin: ScreenOrigin::Remote,
                    metrics,
                    error: None,
                    elapsed: started.elapsed(),
                }
            }
            Err(error) => {
                if !matches!(error, LoadError::CircuitOpen(_)) {
                    self.record_failure();
                }
                let (root, metrics, origin) = self.fallback_for(screen_id);
                ::log::warn!(
                    "[A2UI loader] Serving {:?} content for {}: {}",
                    origin,
                    screen_id,
                    error
                );
                LoadedScreen {
                    screen_id: screen_id.to_string(),
                    root,
                    origin,
                    metrics,
                    error: Some(error),
                    elapsed: started.elapsed(),
                }
            }
        }
    }

    async fn fetch_and_validate(
        &self,
        screen_id: &str,
        timeout: Duration,
    ) -> Result<(ComponentNode, ValidationMetrics), LoadError> {
        let payload = tokio::time::timeout(timeout, self.source.fetch(screen_id))
            .await
            .map_err(|_| LoadError::Timeout(timeout))??;

        let root = ComponentNode::from_json(&payload)?;
        let metrics = validate(&root, self.limits)?;
        Ok((root, metrics))
    }

    /// Timeout for the next attempt, or the remaining cooldown if the
    /// circuit is open.
    fn admit(&self) -> Result<Duration, Duration> {
        let mut breaker = self.breaker();
        if let Some(open_until) = breaker.open_until {
            let now = Instant::now();
            if open_until > now {
                return Err(open_until - now);
            }
            breaker.open_until = None;
            ::log::info!("[A2UI loader] Circuit half-open, trying the source again");
        }
        Ok(self.timeout_after(breaker.consecutive_failures))
    }

    fn timeout_after(&self, failures: u32) -> Duration {
        let halved = self.config.timeout() / 2u32.saturating_pow(failures.min(16));
        halved.max(self.config.min_timeout())
    }

    fn record_success(&self) {
        let mut breaker = self.breaker();
        if breaker.consecutive_failures > 0 {
            ::log::info!("[A2UI loader] Source recovered after {} failures", breaker.consecutive_failures);
        }
        *breaker = Breaker::default();
    }

    fn record_failure(&self) {
        let mut breaker = self.breaker();
        breaker.consecutive_failures = breaker.consecutive_failures.saturating_add(1);
        if breaker.consecutive_failures >= self.config.failure_threshold {
            breaker.open_until = Some(Instant::now() + self.config.cooldown());
            ::log::info!(
                "[A2UI loader] Circuit opened after {} failures, cooling down for {:?}",
                breaker.consecutive_failures,
                self.config.cooldown()
            );
        }
    }

    fn fallback_for(&self, screen_id: &str) -> (ComponentNode, ValidationMetrics, ScreenOrigin) {
        if let Some((root, metrics)) = self.cache().get(screen_id) {
            return (root.clone(), *metrics, ScreenOrigin::Cached);
        }
        if let Some((root, metrics)) = self.fallbacks.get(screen_id) {
            return (root.clone(), *metrics, ScreenOrigin::Fallback);
        }
        let root = content_unavailable(screen_id);
        let metrics = validate(&root, self.limits).unwrap_or_default();
        (root, metrics, ScreenOrigin::Fallback)
    }

    /// Number of failures since the last success
    pub fn consecutive_failures(&self) -> u32 {
        self.breaker().consecutive_failures
    }

    /// Timeout the next attempt will use
    pub fn current_timeout(&self) -> Duration {
        self.timeout_after(self.breaker().consecutive_failures)
    }

    pub fn circuit_state(&self) -> CircuitState {
        let breaker = self.breaker();
        match breaker.open_until {
            Some(open_until) => {
                let now = Instant::now();
                if open_until > now {
                    CircuitState::Open {
                        remaining: open_until - now,
                    }
                } else {
                    CircuitState::HalfOpen
                }
            }
            None => CircuitState::Closed,
        }
    }

    /// Whether a good tree is cached for the screen
    pub fn is_cached(&self, screen_id: &str) -> bool {
        self.cache().contains_key(screen_id)
    }

    pub fn invalidate(&self, screen_id: &str) {
        self.cache().remove(screen_id);
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    fn breaker(&self) -> MutexGuard<'_, Breaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, (ComponentNode, ValidationMetrics)>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScreenLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenLoader")
            .field("config", &self.config)
            .field("limits", &self.limits)
            .field("circuit", &self.circuit_state())
            .finish_non_exhaustive()
    }
}

/// Built-in tree shown when a screen has nothing better to offer. Its button
/// navigates back to the same screen.
pub fn content_unavailable(screen_id: &str) -> ComponentNode {
    let retry = UiValue::from(serde_json::json!({
        "actionId": "retry",
        "actionType": "navigate",
        "params": {"screenId": screen_id},
    }));

    ComponentNode::new("content-unavailable", "column")
        .with_prop("alignment", "center")
        .with_child(
            ComponentNode::new("content-unavailable-title", "text")
                .with_prop("text", "Content unavailable")
                .with_prop("style", "heading"),
        )
        .with_child(
            ComponentNode::new("content-unavailable-body", "text")
                .with_prop("text", "This lesson could not be loaded right now."),
        )
        .with_child(
            ComponentNode::new("content-unavailable-retry", "button")
                .with_prop("label", "Try again")
                .with_prop("action", retry),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const HOME: &str = r#"{"id": "home", "type": "column", "children": [
        {"id": "title", "type": "text", "props": {"text": "Welcome back"}}
    ]}"#;

    /// Answers with `HOME` unless told to fail; counts calls
    #[derive(Default)]
    struct FlakySource {
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScreenSource for FlakySource {
        fn fetch(&self, _screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failing = self.failing.load(Ordering::SeqCst);
            Box::pin(async move {
                if failing {
                    Err(LoadError::Status(503))
                } else {
                    Ok(HOME.to_string())
                }
            })
        }
    }

    struct SlowSource(Duration);

    impl ScreenSource for SlowSource {
        fn fetch(&self, _screen_id: &str) -> BoxFuture<'static, Result<String, LoadError>> {
            let delay = self.0;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(HOME.to_string())
            })
        }
    }

    fn loader(source: Arc<dyn ScreenSource>, config: LoaderConfig) -> ScreenLoader {
        ScreenLoader::new(source, config, ValidationLimits::default())
    }

    #[tokio::test]
    async fn test_load_success() {
        let source = StaticScreenSource::new().with_screen("home", HOME);
        let loader = loader(Arc::new(source), LoaderConfig::default());

        let screen = loader.load_screen("home").await;
        assert_eq!(screen.origin, ScreenOrigin::Remote);
        assert!(screen.error.is_none());
        assert_eq!(screen.root.id(), "home");
        assert_eq!(screen.metrics.total_components, 2);
        assert!(loader.is_cached("home"));
    }

    #[tokio::test]
    async fn test_unknown_screen_gets_fallback_in_time() {
        let loader = loader(Arc::new(StaticScreenSource::new()), LoaderConfig::default());

        let screen = loader.load_screen("unknown").await;
        assert_eq!(screen.origin, ScreenOrigin::Fallback);
        assert_eq!(screen.error, Some(LoadError::NotFound("unknown".to_string())));
        assert_eq!(screen.root.id(), "content-unavailable");
        assert!(screen.elapsed < Duration::from_secs(5));

        let retry = screen.root.find("content-unavailable-retry").unwrap();
        let action = retry.prop("action").unwrap();
        assert_eq!(
            action.get("params").and_then(|p| p.get("screenId")).and_then(UiValue::as_str),
            Some("unknown")
        );
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let config = LoaderConfig {
            timeout_ms: 50,
            min_timeout_ms: 10,
            ..Default::default()
        };
        let loader = loader(Arc::new(SlowSource(Duration::from_millis(500))), config);

        let screen = loader.load_screen("home").await;
        assert_eq!(screen.error, Some(LoadError::Timeout(Duration::from_millis(50))));
        assert!(screen.elapsed < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_cached_tree_served_after_failure() {
        let source = Arc::new(FlakySource::default());
        let loader = loader(source.clone(), LoaderConfig::default());

        assert!(loader.load_screen("home").await.is_fresh());

        source.failing.store(true, Ordering::SeqCst);
        let screen = loader.load_screen("home").await;
        assert_eq!(screen.origin, ScreenOrigin::Cached);
        assert_eq!(screen.error, Some(LoadError::Status(503)));
        assert_eq!(screen.root.id(), "home");
    }

    #[tokio::test]
    async fn test_registered_fallback() {
        let mut loader = loader(Arc::new(StaticScreenSource::new()), LoaderConfig::default());
        loader
            .add_fallback("home", ComponentNode::new("offline-home", "text").with_prop("text", "Offline"))
            .unwrap();

        let screen = loader.load_screen("home").await;
        assert_eq!(screen.origin, ScreenOrigin::Fallback);
        assert_eq!(screen.root.id(), "offline-home");
    }

    #[tokio::test]
    async fn test_invalid_payloads_fall_back() {
        let mut deep = String::new();
        for i in 0..55 {
            deep.push_str(&format!(r#"{{"id": "n{}", "type": "column", "children": ["#, i));
        }
        deep.push_str(r#"{"id": "leaf", "type": "text"}"#);
        for _ in 0..55 {
            deep.push_str("]}");
        }

        let source = StaticScreenSource::new()
            .with_screen("broken", r#"{"id": "x", "type": "text", "props": {"text": "unterminated}}"#)
            .with_screen("deep", deep);
        let loader = loader(Arc::new(source), LoaderConfig::default());

        let broken = loader.load_screen("broken").await;
        assert!(matches!(broken.error, Some(LoadError::Invalid(ValidationError::Decode(_)))));

        let deep = loader.load_screen("deep").await;
        assert!(matches!(
            deep.error,
            Some(LoadError::Invalid(ValidationError::DepthLimitExceeded { .. }))
        ));
        assert_eq!(deep.origin, ScreenOrigin::Fallback);
    }

    #[tokio::test]
    async fn test_backoff_shortens_timeout() {
        let source = Arc::new(FlakySource::default());
        source.failing.store(true, Ordering::SeqCst);
        let config = LoaderConfig {
            failure_threshold: 10,
            ..Default::default()
        };
        let loader = loader(source.clone(), config);

        assert_eq!(loader.current_timeout(), Duration::from_millis(3000));
        loader.load_screen("home").await;
        assert_eq!(loader.current_timeout(), Duration::from_millis(1500));
        loader.load_screen("home").await;
        assert_eq!(loader.current_timeout(), Duration::from_millis(750));
        for _ in 0..5 {
            loader.load_screen("home").await;
        }
        assert_eq!(loader.current_timeout(), Duration::from_millis(250));

        source.failing.store(false, Ordering::SeqCst);
        loader.load_screen("home").await;
        assert_eq!(loader.consecutive_failures(), 0);
        assert_eq!(loader.current_timeout(), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_circuit_opens_and_recovers() {
        let source = Arc::new(FlakySource::default());
        source.failing.store(true, Ordering::SeqCst);
        let config = LoaderConfig {
            cooldown_ms: 50,
            ..Default::default()
        };
        let loader = loader(source.clone(), config);

        for _ in 0..3 {
            loader.load_screen("home").await;
        }
        assert!(matches!(loader.circuit_state(), CircuitState::Open { .. }));

        // Served without contacting the source
        let screen = loader.load_screen("home").await;
        assert!(matches!(screen.error, Some(LoadError::CircuitOpen(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(loader.circuit_state(), CircuitState::HalfOpen);

        source.failing.store(false, Ordering::SeqCst);
        let screen = loader.load_screen("home").await;
        assert!(screen.is_fresh());
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(loader.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let source = Arc::new(FlakySource::default());
        source.failing.store(true, Ordering::SeqCst);
        let config = LoaderConfig {
            failure_threshold: 1,
            cooldown_ms: 20,
            ..Default::default()
        };
        let loader = loader(source.clone(), config);

        loader.load_screen("home").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        loader.load_screen("home").await;

        assert!(matches!(loader.circuit_state(), CircuitState::Open { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = std::env::temp_dir().join(format!("tutorly-screens-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("home.json"), HOME).unwrap();

        let source = FileScreenSource::new(&dir);
        assert_eq!(source.fetch("home").await.unwrap(), HOME);
        assert_eq!(
            source.fetch("missing").await,
            Err(LoadError::NotFound("missing".to_string()))
        );
        assert_eq!(
            source.fetch("../etc/passwd").await,
            Err(LoadError::NotFound("../etc/passwd".to_string()))
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_sanitized() {
        let config = LoaderConfig {
            timeout_ms: 60_000,
            min_timeout_ms: 0,
            failure_threshold: 0,
            cooldown_ms: 10,
        }
        .sanitized();

        assert_eq!(config.timeout_ms, MAX_TIMEOUT_MS);
        assert_eq!(config.min_timeout_ms, 1);
        assert_eq!(config.failure_threshold, 1);
    }
}
