//! Authentication commands

use crate::state::AppState;
use crate::view_state::{Notice, OverlayState, SubmitOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    /// True when the request was dropped because one was already in flight
    pub ignored: bool,
    pub overlay: OverlayState,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub user_id: String,
    pub email: Option<String>,
}

fn respond(state: &AppState, outcome: SubmitOutcome) -> SubmitResponse {
    SubmitResponse {
        success: outcome == SubmitOutcome::Succeeded,
        ignored: outcome == SubmitOutcome::Ignored,
        overlay: state.view.overlay(),
    }
}

/// Submit the overlay form in sign-in mode
pub async fn sign_in(state: &AppState, request: CredentialsRequest) -> SubmitResponse {
    tracing::info!("Sign-in submitted for {}", request.email);
    let outcome = state.view.sign_in(&request.email, &request.password).await;
    respond(state, outcome)
}

/// Submit the overlay form in sign-up mode
pub async fn sign_up(state: &AppState, request: CredentialsRequest) -> SubmitResponse {
    tracing::info!("Sign-up submitted for {}", request.email);
    let outcome = state.view.sign_up(&request.email, &request.password).await;
    respond(state, outcome)
}

/// Header "Sign Out" button
pub async fn sign_out(state: &AppState) -> Option<Notice> {
    tracing::info!("User sign-out");
    match state.view.sign_out().await {
        SubmitOutcome::Failed => state.view.message(),
        _ => None,
    }
}

/// Header "Sign In" button; returns the fragment to put in the address bar
pub fn open_auth(state: &AppState) -> String {
    state.view.open_overlay();
    state.view.fragment()
}

/// Overlay close button
pub fn close_auth(state: &AppState) -> String {
    state.view.close_overlay();
    state.view.fragment()
}

/// "Already have an account?" / "Don't have an account?" link
pub fn toggle_auth_mode(state: &AppState) -> OverlayState {
    state.view.toggle_mode();
    state.view.overlay()
}

/// Address bar fragment changed (navigation, back button, deep link)
pub fn sync_location(state: &AppState, fragment: &str) -> OverlayState {
    state.view.sync_fragment(fragment);
    state.view.overlay()
}

pub fn check_session(state: &AppState) -> bool {
    state.is_authenticated()
}

pub fn get_current_user(state: &AppState) -> Option<UserInfo> {
    state.view.user().map(|u| UserInfo {
        user_id: u.id,
        email: u.email,
    })
}

pub fn get_overlay(state: &AppState) -> OverlayState {
    state.view.overlay()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::view_state::{AuthMode, NoticeKind};
    use std::sync::Arc;
    use std::time::Duration;

    fn creds(email: &str, password: &str) -> CredentialsRequest {
        CredentialsRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_sign_in_scenario() {
        let backend = Arc::new(InMemoryBackend::with_site_schema());
        let state = AppState::with_backend(backend, Duration::from_millis(20)).await;

        assert!(sync_location(&state, "#auth").open);
        let overlay = toggle_auth_mode(&state);
        assert_eq!(overlay.mode, AuthMode::SignUp);

        let response = sign_up(&state, creds("trader@example.com", "abc123")).await;
        assert!(response.success);
        assert_eq!(response.overlay.mode, AuthMode::SignIn);
        assert!(response.overlay.open);
        assert_eq!(response.overlay.message.unwrap().kind, NoticeKind::Success);
        assert!(!check_session(&state));

        let response = sign_in(&state, creds("trader@example.com", "abc123")).await;
        assert!(response.success);
        assert!(!response.overlay.open);
        assert!(check_session(&state));
        assert_eq!(
            get_current_user(&state).unwrap().email.as_deref(),
            Some("trader@example.com")
        );

        assert!(sign_out(&state).await.is_none());
        assert!(!check_session(&state));
    }

    #[tokio::test]
    async fn test_open_and_close_write_fragment() {
        let backend = Arc::new(InMemoryBackend::new());
        let state = AppState::with_backend(backend, Duration::ZERO).await;

        assert_eq!(open_auth(&state), "#auth");
        assert!(get_overlay(&state).open);
        assert_eq!(close_auth(&state), "");
        assert!(!get_overlay(&state).open);
    }
}
