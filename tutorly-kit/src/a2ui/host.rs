//! A2UI Host
//!
//! Owns the screen currently on display and wires the loader, capability
//! negotiator, render dispatcher and action pipeline together. Navigation
//! actions go through the pipeline like any other action and swap the
//! current screen when their load resolves.
//!
//! Host events are delivered over a channel and polled by the UI loop.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::runtime::Handle;

use super::action::{Action, ActionType};
use super::capability::{CapabilityNegotiator, PermissionProvider};
use super::config::RuntimeConfig;
use super::error::{ActionError, LoadError};
use super::loader::{LoadedScreen, ScreenLoader, ScreenOrigin, ScreenSource};
use super::pipeline::{handler_fn, ActionPipeline, PipelineConfig, PushOutcome};
use super::registry::ComponentRegistry;
use super::render::{Element, RenderDispatcher, RenderedElement};

/// Events from the screen host
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// A freshly fetched screen is now current
    ScreenLoaded { screen_id: String },
    /// A cached or fallback tree is now current
    FallbackShown {
        screen_id: String,
        origin: ScreenOrigin,
        error: LoadError,
    },
    /// An action never made it into the pipeline
    ActionRejected { action_id: String, reason: String },
}

struct Shared {
    loader: ScreenLoader,
    negotiator: CapabilityNegotiator,
    dispatcher: RenderDispatcher,
    current: RwLock<Option<Arc<LoadedScreen>>>,
    events: Sender<HostEvent>,
}

impl Shared {
    async fn load(&self, screen_id: &str) -> Arc<LoadedScreen> {
        let loaded = Arc::new(self.loader.load_screen(screen_id).await);

        let event = match &loaded.error {
            None => HostEvent::ScreenLoaded {
                screen_id: loaded.screen_id.clone(),
            },
            Some(error) => HostEvent::FallbackShown {
                screen_id: loaded.screen_id.clone(),
                origin: loaded.origin,
                error: error.clone(),
            },
        };

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        // Receiver dropped means nobody is listening
        let _ = self.events.send(event);
        loaded
    }

    fn current(&self) -> Option<Arc<LoadedScreen>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The screen host for a session.
///
/// # Example
///
/// ```rust,ignore
/// let mut host = ScreenHost::from_config(
///     Handle::current(),
///     Arc::new(FileScreenSource::new("screens")),
///     Arc::new(config.permissions()),
///     &config,
/// );
///
/// host.load("home").await;
/// host.tap("start-lesson")?;
/// host.pipeline().wait_idle().await;
///
/// for event in host.poll_all() {
///     log::info!("{:?}", event);
/// }
/// println!("{}", host.render().map(|r| r.outline()).unwrap_or_default());
/// ```
pub struct ScreenHost {
    shared: Arc<Shared>,
    pipeline: ActionPipeline,
    event_receiver: Option<Receiver<HostEvent>>,
}

impl ScreenHost {
    /// Create a host. A navigate handler is registered on the new pipeline.
    pub fn new(
        runtime: Handle,
        loader: ScreenLoader,
        negotiator: CapabilityNegotiator,
        dispatcher: RenderDispatcher,
        pipeline_config: PipelineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            loader,
            negotiator,
            dispatcher,
            current: RwLock::new(None),
            events: tx,
        });

        let pipeline = ActionPipeline::new(runtime, pipeline_config);
        let navigator = shared.clone();
        pipeline.register_handler(
            ActionType::Navigate,
            handler_fn(move |action: Action| {
                let shared = navigator.clone();
                async move {
                    let screen_id = action
                        .param_str("screenId")
                        .unwrap_or(&action.action_id)
                        .to_string();
                    ::log::info!("[A2UI] Navigating to {}", screen_id);
                    shared.load(&screen_id).await;
                    Ok::<_, ActionError>(())
                }
            }),
        );

        ScreenHost {
            shared,
            pipeline,
            event_receiver: Some(rx),
        }
    }

    /// Create a host with the standard catalogue and renderers
    pub fn from_config(
        runtime: Handle,
        source: Arc<dyn ScreenSource>,
        permissions: Arc<dyn PermissionProvider>,
        config: &RuntimeConfig,
    ) -> Self {
        let loader = ScreenLoader::new(source, config.loader, config.limits);
        let negotiator = CapabilityNegotiator::new(ComponentRegistry::with_standard_catalog(), permissions);
        Self::new(
            runtime,
            loader,
            negotiator,
            RenderDispatcher::with_standard_renderers(),
            config.pipeline,
        )
    }

    pub fn pipeline(&self) -> &ActionPipeline {
        &self.pipeline
    }

    pub fn negotiator(&self) -> &CapabilityNegotiator {
        &self.shared.negotiator
    }

    pub fn loader(&self) -> &ScreenLoader {
        &self.shared.loader
    }

    /// Load a screen right away, bypassing the pipeline, and make it current
    pub async fn load(&self, screen_id: &str) -> Arc<LoadedScreen> {
        self.shared.load(screen_id).await
    }

    /// Queue navigation to a screen
    pub fn navigate(&self, screen_id: &str) -> Result<PushOutcome, ActionError> {
        let action =
            Action::new(screen_id, "", ActionType::Navigate).with_param("screenId", screen_id);
        self.dispatch(action)
    }

    pub fn current_screen(&self) -> Option<Arc<LoadedScreen>> {
        self.shared.current()
    }

    /// Render the current screen against the latest capability snapshot.
    ///
    /// Negotiates first if that has not happened yet.
    pub fn render(&self) -> Option<RenderedElement> {
        let screen = self.shared.current()?;
        let snapshot = self.shared.negotiator.negotiate(false);
        Some(self.shared.dispatcher.render(&screen.root, &snapshot))
    }

    /// Renegotiate after a permission change and re-render the current
    /// screen. The tree was validated when it loaded and is not checked again.
    pub fn renegotiate(&self) -> Option<RenderedElement> {
        let snapshot = self.shared.negotiator.negotiate(true);
        let screen = self.shared.current()?;
        Some(self.shared.dispatcher.render(&screen.root, &snapshot))
    }

    /// Fire the action bound to a component on the current screen.
    ///
    /// Only controls the rendered screen actually shows can fire: disabled
    /// buttons and placeholders refuse the tap.
    pub fn tap(&self, component_id: &str) -> Result<PushOutcome, ActionError> {
        let action = self.action_for(component_id).inspect_err(|e| {
            let _ = self.shared.events.send(HostEvent::ActionRejected {
                action_id: String::new(),
                reason: e.to_string(),
            });
        })?;
        self.dispatch(action)
    }

    fn action_for(&self, component_id: &str) -> Result<Action, ActionError> {
        let screen = self
            .shared
            .current()
            .ok_or_else(|| ActionError::UnknownComponent(component_id.to_string()))?;
        let snapshot = self.shared.negotiator.negotiate(false);
        let rendered = self.shared.dispatcher.render(&screen.root, &snapshot);
        let element = &rendered
            .find(component_id)
            .ok_or_else(|| ActionError::UnknownComponent(component_id.to_string()))?
            .element;

        match element {
            Element::Placeholder { .. } | Element::Button { enabled: false, .. } => {
                Err(ActionError::NotInteractive(component_id.to_string()))
            }
            _ => element
                .action()
                .map(|binding| binding.to_action(component_id))
                .ok_or_else(|| ActionError::NoActionBinding(component_id.to_string())),
        }
    }

    /// Enqueue an action, reporting anything that does not get in
    pub fn dispatch(&self, action: Action) -> Result<PushOutcome, ActionError> {
        let action_id = action.action_id.clone();
        let outcome = self.pipeline.enqueue(action);

        let rejection = match &outcome {
            Ok(PushOutcome::Rejected(_)) => Some("action queue is full".to_string()),
            Err(e) => Some(e.to_string()),
            Ok(_) => None,
        };
        if let Some(reason) = rejection {
            ::log::warn!("[A2UI] Action {} rejected: {}", action_id, reason);
            let _ = self
                .shared
                .events
                .send(HostEvent::ActionRejected { action_id, reason });
        }

        outcome
    }

    /// Poll for pending events (non-blocking)
    pub fn poll(&mut self) -> Option<HostEvent> {
        let rx = self.event_receiver.as_ref()?;
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.event_receiver = None;
                None
            }
        }
    }

    /// Poll all pending events
    pub fn poll_all(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.poll() {
            events.push(event);
        }
        events
    }

    /// Stop accepting actions; queued ones are discarded
    pub fn shutdown(&self) {
        self.pipeline.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2ui::capability::{GrantedPermissions, Permission};
    use crate::a2ui::loader::StaticScreenSource;
    use crate::a2ui::registry::ElementType;

    const HOME: &str = r#"{"id": "home", "type": "column", "children": [
        {"id": "title", "type": "text", "props": {"text": "Fractions", "style": "title"}},
        {"id": "photo", "type": "cameraCapture", "props": {"prompt": "Snap your worksheet"}},
        {"id": "start", "type": "button", "props": {
            "label": "Start",
            "action": {"actionId": "open-lesson", "actionType": "navigate", "params": {"screenId": "lesson-1"}}
        }},
        {"id": "broken-link", "type": "button", "props": {
            "label": "Missing",
            "action": {"actionId": "nowhere", "actionType": "navigate"}
        }},
        {"id": "hint", "type": "checkbox", "props": {"label": "Show hints", "action": "toggle-hints"}}
    ]}"#;

    const LESSON: &str = r#"{"id": "lesson", "type": "card", "props": {"title": "Lesson 1"}, "children": [
        {"id": "intro", "type": "text", "props": {"text": "A fraction is part of a whole."}}
    ]}"#;

    fn host() -> (ScreenHost, Arc<GrantedPermissions>) {
        let source = StaticScreenSource::new()
            .with_screen("home", HOME)
            .with_screen("lesson-1", LESSON);
        let permissions = Arc::new(GrantedPermissions::default());
        let host = ScreenHost::from_config(
            Handle::current(),
            Arc::new(source),
            permissions.clone(),
            &RuntimeConfig::default(),
        );
        (host, permissions)
    }

    #[tokio::test]
    async fn test_load_and_render() {
        let (mut host, _) = host();
        assert!(host.render().is_none());

        let loaded = host.load("home").await;
        assert!(loaded.is_fresh());
        assert_eq!(
            host.poll_all(),
            vec![HostEvent::ScreenLoaded {
                screen_id: "home".to_string()
            }]
        );

        let rendered = host.render().unwrap();
        assert_eq!(rendered.children.len(), 5);
        let photo = rendered.find("photo").unwrap();
        assert_eq!(photo.substituted_for, Some(ElementType::CameraCapture));
        assert!(matches!(photo.element, Element::ImageUpload { .. }));
    }

    #[tokio::test]
    async fn test_renegotiate_after_grant() {
        let (host, permissions) = host();
        host.load("home").await;
        host.render();

        permissions.grant(Permission::Camera);
        // The old snapshot stays in effect until renegotiation
        assert!(host.render().unwrap().find("photo").unwrap().substituted_for.is_some());

        let rendered = host.renegotiate().unwrap();
        let photo = rendered.find("photo").unwrap();
        assert!(photo.substituted_for.is_none());
        assert!(matches!(photo.element, Element::CameraCapture { .. }));
    }

    #[tokio::test]
    async fn test_tap_navigates() {
        let (mut host, _) = host();
        host.load("home").await;

        let outcome = host.tap("start").unwrap();
        assert_eq!(outcome, PushOutcome::Queued);
        host.pipeline().wait_idle().await;

        let current = host.current_screen().unwrap();
        assert_eq!(current.screen_id, "lesson-1");
        assert_eq!(current.root.id(), "lesson");
        assert_eq!(
            host.poll_all(),
            vec![
                HostEvent::ScreenLoaded {
                    screen_id: "home".to_string()
                },
                HostEvent::ScreenLoaded {
                    screen_id: "lesson-1".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_navigate_without_screen_id_uses_action_id() {
        let (mut host, _) = host();
        host.load("home").await;
        host.poll_all();

        host.tap("broken-link").unwrap();
        host.pipeline().wait_idle().await;

        let current = host.current_screen().unwrap();
        assert_eq!(current.screen_id, "nowhere");
        assert_eq!(current.origin, ScreenOrigin::Fallback);
        assert_eq!(
            host.poll_all(),
            vec![HostEvent::FallbackShown {
                screen_id: "nowhere".to_string(),
                origin: ScreenOrigin::Fallback,
                error: LoadError::NotFound("nowhere".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_tap_errors() {
        let (mut host, _) = host();
        assert_eq!(
            host.tap("start"),
            Err(ActionError::UnknownComponent("start".to_string()))
        );

        host.load("home").await;
        host.poll_all();

        assert_eq!(
            host.tap("ghost"),
            Err(ActionError::UnknownComponent("ghost".to_string()))
        );
        assert_eq!(
            host.tap("title"),
            Err(ActionError::NoActionBinding("title".to_string()))
        );

        let events = host.poll_all();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, HostEvent::ActionRejected { .. })));
    }

    #[tokio::test]
    async fn test_tap_ignores_inert_controls() {
        let quiz = r#"{"id": "quiz", "type": "column", "children": [
            {"id": "submit", "type": "button", "props": {
                "label": "Submit", "enabled": false, "action": "submit-answer"
            }},
            {"id": "orb", "type": "hologram", "props": {"action": "spin"}},
            {"id": "next", "type": "button", "props": {"label": "Next", "action": "next-question"}}
        ]}"#;
        let source = StaticScreenSource::new().with_screen("quiz", quiz);
        let mut host = ScreenHost::from_config(
            Handle::current(),
            Arc::new(source),
            Arc::new(GrantedPermissions::default()),
            &RuntimeConfig::default(),
        );
        host.load("quiz").await;
        host.poll_all();

        assert_eq!(
            host.tap("submit"),
            Err(ActionError::NotInteractive("submit".to_string()))
        );
        assert_eq!(
            host.tap("orb"),
            Err(ActionError::NotInteractive("orb".to_string()))
        );
        assert_eq!(host.tap("next"), Ok(PushOutcome::Queued));

        host.pipeline().wait_idle().await;
        let diagnostics = host.pipeline().diagnostics();
        assert_eq!(diagnostics.completed, 1);
        assert_eq!(host.poll_all().len(), 2);
    }

    #[tokio::test]
    async fn test_interaction_handler_receives_tap() {
        let (host, _) = host();
        host.load("home").await;

        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        host.pipeline().register_handler(
            ActionType::UiInteraction,
            handler_fn(move |action: Action| {
                tx.lock().unwrap().send(action).unwrap();
                async { Ok::<_, ActionError>(()) }
            }),
        );

        host.tap("hint").unwrap();
        host.pipeline().wait_idle().await;

        let action = rx.try_recv().unwrap();
        assert_eq!(action.action_id, "toggle-hints");
        assert_eq!(action.component_id, "hint");
    }

    #[tokio::test]
    async fn test_shutdown_rejects_navigation() {
        let (mut host, _) = host();
        host.shutdown();

        assert_eq!(host.navigate("home"), Err(ActionError::ShutDown));
        assert!(matches!(
            host.poll_all().as_slice(),
            [HostEvent::ActionRejected { .. }]
        ));
    }
}
