//! Auth view-state
//!
//! Tracks whether a user is signed in and whether the auth overlay is open.
//! The cached session is only ever replaced from session change
//! notifications (or the initial one-shot read); sign-out does not clear it
//! locally. Overlay visibility is explicit state; the `#auth` location
//! fragment is kept in step through [`ViewStateController::sync_fragment`]
//! and [`ViewStateController::fragment`].

use crate::backend::{AuthBackend, Session, Subscription, User};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fragment token that means "auth overlay open"
pub const AUTH_FRAGMENT: &str = "auth";

pub const MIN_PASSWORD_LEN: usize = 6;

pub const SIGN_IN_SUCCESS: &str = "Signed in successfully!";
pub const SIGN_UP_SUCCESS: &str = "Account created successfully! You can now sign in.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// Message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, text: text.into() }
    }
}

/// Result of a form submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Succeeded,
    Failed,
    /// Another submission was still in flight; nothing was sent
    Ignored,
}

/// Snapshot of the overlay for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayState {
    pub open: bool,
    pub mode: AuthMode,
    pub message: Option<Notice>,
    pub submitting: bool,
}

/// Clears the in-flight flag when the submission finishes, however it finishes
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Derives `authenticated` and `overlay open` and runs the auth form actions
pub struct ViewStateController {
    auth: Arc<dyn AuthBackend>,
    session: Arc<RwLock<Option<Session>>>,
    open: RwLock<bool>,
    mode: RwLock<AuthMode>,
    message: RwLock<Option<Notice>>,
    submitting: AtomicBool,
    close_delay: Duration,
    subscription: Mutex<Option<Subscription>>,
}

impl ViewStateController {
    /// Subscribe to session changes, then take the one-shot current session
    pub async fn init(auth: Arc<dyn AuthBackend>, close_delay: Duration) -> Self {
        let session = Arc::new(RwLock::new(None));

        let cache = session.clone();
        let subscription = auth.on_session_change(Box::new(move |next: Option<Session>| {
            tracing::debug!(
                "Session changed: {}",
                next.as_ref().map(|s| s.user.id.as_str()).unwrap_or("signed out")
            );
            *cache.write() = next;
        }));

        let current = auth.current_session().await;
        *session.write() = current;

        Self {
            auth,
            session,
            open: RwLock::new(false),
            mode: RwLock::new(AuthMode::SignIn),
            message: RwLock::new(None),
            submitting: AtomicBool::new(false),
            close_delay,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Release the session subscription; the cached session stops updating
    pub fn teardown(&self) {
        if self.subscription.lock().take().is_some() {
            tracing::debug!("View-state subscription released");
        }
    }

    /// A cached session past its expiry counts as signed out
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn session(&self) -> Option<Session> {
        let now = chrono::Utc::now().timestamp();
        self.session.read().clone().filter(|s| !s.is_expired(now))
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    // ========================================================================
    // Overlay
    // ========================================================================

    pub fn is_overlay_open(&self) -> bool {
        *self.open.read()
    }

    pub fn open_overlay(&self) {
        *self.message.write() = None;
        *self.open.write() = true;
    }

    pub fn close_overlay(&self) {
        *self.open.write() = false;
    }

    /// Apply a location fragment (`"#auth"`, `"auth"`, `""`, ...)
    pub fn sync_fragment(&self, fragment: &str) {
        let wants_open = fragment.trim_start_matches('#') == AUTH_FRAGMENT;
        if wants_open != self.is_overlay_open() {
            if wants_open {
                self.open_overlay();
            } else {
                self.close_overlay();
            }
        }
    }

    /// Fragment to write back to the address bar
    pub fn fragment(&self) -> String {
        if self.is_overlay_open() {
            format!("#{}", AUTH_FRAGMENT)
        } else {
            String::new()
        }
    }

    pub fn mode(&self) -> AuthMode {
        *self.mode.read()
    }

    /// Switch between sign-in and sign-up, clearing any message
    pub fn toggle_mode(&self) {
        let mut mode = self.mode.write();
        *mode = match *mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        *self.message.write() = None;
    }

    pub fn message(&self) -> Option<Notice> {
        self.message.read().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    pub fn overlay(&self) -> OverlayState {
        OverlayState {
            open: self.is_overlay_open(),
            mode: self.mode(),
            message: self.message(),
            submitting: self.is_submitting(),
        }
    }

    fn set_message(&self, notice: Notice) {
        *self.message.write() = Some(notice);
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Sign in; on success the overlay closes after the configured delay
    pub async fn sign_in(&self, email: &str, password: &str) -> SubmitOutcome {
        let Some(guard) = SubmitGuard::acquire(&self.submitting) else {
            tracing::debug!("Sign-in ignored: submission already in flight");
            return SubmitOutcome::Ignored;
        };
        *self.message.write() = None;

        let result = self.auth.sign_in_with_password(email, password).await;
        drop(guard);

        match result {
            Ok(()) => {
                tracing::info!("Signed in as {}", email);
                self.set_message(Notice::success(SIGN_IN_SUCCESS));

                if !self.close_delay.is_zero() {
                    tokio::time::sleep(self.close_delay).await;
                }
                self.close_overlay();
                SubmitOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!("Sign-in failed for {}: {}", email, e);
                self.set_message(Notice::error(e.user_message()));
                SubmitOutcome::Failed
            }
        }
    }

    /// Create an account; switches to sign-in mode but does not sign in
    pub async fn sign_up(&self, email: &str, password: &str) -> SubmitOutcome {
        if let Err(msg) = validate_sign_up(email, password) {
            self.set_message(Notice::error(msg));
            return SubmitOutcome::Failed;
        }

        let Some(guard) = SubmitGuard::acquire(&self.submitting) else {
            tracing::debug!("Sign-up ignored: submission already in flight");
            return SubmitOutcome::Ignored;
        };
        *self.message.write() = None;

        let result = self.auth.sign_up(email, password).await;
        drop(guard);

        match result {
            Ok(()) => {
                tracing::info!("Account created for {}", email);
                *self.mode.write() = AuthMode::SignIn;
                self.set_message(Notice::success(SIGN_UP_SUCCESS));
                SubmitOutcome::Succeeded
            }
            Err(e) => {
                tracing::warn!("Sign-up failed for {}: {}", email, e);
                self.set_message(Notice::error(e.user_message()));
                SubmitOutcome::Failed
            }
        }
    }

    /// Ask the backend to end the session; the cache clears on the notification
    pub async fn sign_out(&self) -> SubmitOutcome {
        match self.auth.sign_out().await {
            Ok(()) => SubmitOutcome::Succeeded,
            Err(e) => {
                tracing::warn!("Sign-out failed: {}", e);
                self.set_message(Notice::error(e.user_message()));
                SubmitOutcome::Failed
            }
        }
    }
}

/// Checked before any network call
pub fn validate_sign_up(email: &str, password: &str) -> std::result::Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email address is required".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;

    async fn controller(delay: Duration) -> (Arc<InMemoryBackend>, ViewStateController) {
        let backend = Arc::new(InMemoryBackend::new());
        let controller = ViewStateController::init(backend.clone(), delay).await;
        (backend, controller)
    }

    #[tokio::test]
    async fn test_short_password_rejected_before_network() {
        let (backend, controller) = controller(Duration::ZERO).await;

        let outcome = controller.sign_up("trader@example.com", "abc12").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert_eq!(backend.calls.sign_ups(), 0);
        assert_eq!(controller.message().unwrap().kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let (backend, controller) = controller(Duration::ZERO).await;
        controller.sync_fragment("#auth");
        controller.toggle_mode();
        assert_eq!(controller.mode(), AuthMode::SignUp);

        let outcome = controller.sign_up("trader@example.com", "abc123").await;
        assert_eq!(outcome, SubmitOutcome::Succeeded);
        assert_eq!(controller.mode(), AuthMode::SignIn);
        assert_eq!(controller.message(), Some(Notice::success(SIGN_UP_SUCCESS)));
        assert!(!controller.is_authenticated());
        assert!(controller.is_overlay_open());

        let outcome = controller.sign_in("trader@example.com", "abc123").await;
        assert_eq!(outcome, SubmitOutcome::Succeeded);
        assert!(controller.is_authenticated());
        assert!(!controller.is_overlay_open());
        assert_eq!(controller.fragment(), "");
        assert_eq!(backend.calls.sign_ins(), 1);
    }

    #[tokio::test]
    async fn test_overlay_closes_after_delay() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("trader@example.com", "abc123").await.unwrap();
        let controller =
            Arc::new(ViewStateController::init(backend.clone(), Duration::from_millis(200)).await);
        controller.open_overlay();

        let task = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.sign_in("trader@example.com", "abc123").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.is_authenticated());
        assert!(controller.is_overlay_open());
        assert_eq!(controller.message(), Some(Notice::success(SIGN_IN_SUCCESS)));

        assert_eq!(task.await.unwrap(), SubmitOutcome::Succeeded);
        assert!(!controller.is_overlay_open());
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_overlay_and_backend_message() {
        let (_backend, controller) = controller(Duration::ZERO).await;
        controller.open_overlay();

        let outcome = controller.sign_in("nobody@example.com", "secret1").await;

        assert_eq!(outcome, SubmitOutcome::Failed);
        assert!(controller.is_overlay_open());
        assert_eq!(
            controller.message(),
            Some(Notice::error("Invalid login credentials"))
        );
    }

    #[tokio::test]
    async fn test_concurrent_submission_ignored() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("trader@example.com", "abc123").await.unwrap();
        backend.set_auth_latency(Duration::from_millis(200));
        let controller = Arc::new(ViewStateController::init(backend.clone(), Duration::ZERO).await);

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.sign_in("trader@example.com", "abc123").await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.is_submitting());
        assert_eq!(
            controller.sign_in("trader@example.com", "abc123").await,
            SubmitOutcome::Ignored
        );
        assert_eq!(
            controller.sign_up("other@example.com", "abc123").await,
            SubmitOutcome::Ignored
        );

        assert_eq!(first.await.unwrap(), SubmitOutcome::Succeeded);
        assert!(!controller.is_submitting());
        assert!(controller.is_authenticated());
        assert_eq!(backend.calls.sign_ins(), 1);
        assert_eq!(backend.calls.sign_ups(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_signed_out() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("trader@example.com", "abc123").await.unwrap();
        backend.set_session_ttl(Some(Duration::from_secs(2)));
        let controller = ViewStateController::init(backend.clone(), Duration::ZERO).await;

        assert_eq!(
            controller.sign_in("trader@example.com", "abc123").await,
            SubmitOutcome::Succeeded
        );
        assert!(controller.is_authenticated());

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(!controller.is_authenticated());
        assert!(controller.user().is_none());
        assert!(backend.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_via_notification() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("trader@example.com", "abc123").await.unwrap();
        backend.sign_in_with_password("trader@example.com", "abc123").await.unwrap();

        let controller = ViewStateController::init(backend.clone(), Duration::ZERO).await;
        assert!(controller.is_authenticated());

        assert_eq!(controller.sign_out().await, SubmitOutcome::Succeeded);
        assert!(!controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_teardown_stops_updates() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.sign_up("trader@example.com", "abc123").await.unwrap();

        let controller = ViewStateController::init(backend.clone(), Duration::ZERO).await;
        controller.teardown();

        backend.sign_in_with_password("trader@example.com", "abc123").await.unwrap();
        assert!(!controller.is_authenticated());
    }

    #[tokio::test]
    async fn test_fragment_sync() {
        let (_backend, controller) = controller(Duration::ZERO).await;

        controller.sync_fragment("auth");
        assert!(controller.is_overlay_open());
        assert_eq!(controller.fragment(), "#auth");

        controller.sync_fragment("#research");
        assert!(!controller.is_overlay_open());
        assert_eq!(controller.fragment(), "");
    }

    #[test]
    fn test_validate_sign_up() {
        assert!(validate_sign_up("a@b.com", "abc123").is_ok());
        assert!(validate_sign_up("a@b.com", "abc12").is_err());
        assert!(validate_sign_up("  ", "abc123").is_err());
    }
}
