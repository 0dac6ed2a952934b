//! Application router configuration with protected and unprotected route
//! definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{
        auth_guard, auth_guard_hx, get_forgot_password_page, get_log_in_page, get_log_out,
        get_sign_up_page, get_verify_page, post_forgot_password, post_log_in,
        post_reset_password, post_reset_verify, post_sign_up, post_verify,
    },
    dashboard::get_dashboard_page,
    endpoints,
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    profile::{get_profile_page, update_profile_endpoint},
    transaction::{create_transaction_endpoint, delete_transaction_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    // The dashboard is deliberately unprotected: anonymous visitors get
    // the all-zero summary instead of a redirect.
    let unprotected_routes = Router::new()
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(endpoints::SIGN_UP_VIEW, get(get_sign_up_page))
        .route(endpoints::SIGN_UP_API, post(post_sign_up))
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::VERIFY_VIEW, get(get_verify_page))
        .route(endpoints::VERIFY_API, post(post_verify))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(
            endpoints::FORGOT_PASSWORD_VIEW,
            get(get_forgot_password_page),
        )
        .route(endpoints::FORGOT_PASSWORD_API, post(post_forgot_password))
        .route(endpoints::RESET_VERIFY_API, post(post_reset_verify))
        .route(endpoints::RESET_PASSWORD_API, post(post_reset_password))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::PROFILE_VIEW, get(get_profile_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // These routes need the HX-Redirect header for auth redirects to work
    // properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(
                endpoints::TRANSACTIONS_API,
                post(create_transaction_endpoint),
            )
            .route(
                endpoints::DELETE_TRANSACTION,
                delete(delete_transaction_endpoint),
            )
            .route(endpoints::PROFILE_API, post(update_profile_endpoint))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .nest_service(endpoints::MEDIA, ServeDir::new(state.avatar_dir.clone()))
        .fallback(get_404_not_found)
        .with_state(state)
}

#[cfg(test)]
mod routing_tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{
        AppState, Config, LowBalancePolicy, build_router, endpoints,
        test_utils::RecordingNotifier,
    };

    fn test_app_state() -> AppState {
        let config = Config {
            cookie_secret: "foobar".to_owned(),
            smtp_host: "smtp.example.com".to_owned(),
            smtp_username: "user".to_owned(),
            smtp_password: "pass".to_owned(),
            email_sender: "Ledgerly <noreply@example.com>".to_owned(),
            otp_expiry: time::Duration::minutes(10),
            low_balance: LowBalancePolicy::default(),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let sent = Arc::new(std::sync::Mutex::new(Vec::new()));

        AppState::new(
            Connection::open_in_memory().unwrap(),
            &config,
            std::env::temp_dir().join("ledgerly_routing_tests"),
            Arc::new(RecordingNotifier::new(sent)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn anonymous_dashboard_is_reachable() {
        let server = TestServer::new(build_router(test_app_state()));

        server.get(endpoints::DASHBOARD_VIEW).await.assert_status_ok();
    }

    #[tokio::test]
    async fn profile_page_redirects_anonymous_clients_to_log_in() {
        let server = TestServer::new(build_router(test_app_state()));

        let response = server.get(endpoints::PROFILE_VIEW).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn recording_a_transaction_anonymously_redirects_into_log_in_flow() {
        let server = TestServer::new(build_router(test_app_state()));
        let form = [
            ("direction", "expense"),
            ("amount", "10"),
            ("category", "food"),
            ("channel", "cash"),
            ("date", "2024-01-15"),
        ];

        let response = server.post(endpoints::TRANSACTIONS_API).form(&form).await;

        response.assert_status_ok();
        assert_eq!(response.header("hx-redirect"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let server = TestServer::new(build_router(test_app_state()));

        server
            .get("/definitely/not/a/page")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn auth_pages_are_reachable() {
        let server = TestServer::new(build_router(test_app_state()));

        for page in [
            endpoints::SIGN_UP_VIEW,
            endpoints::LOG_IN_VIEW,
            endpoints::FORGOT_PASSWORD_VIEW,
        ] {
            server.get(page).await.assert_status_ok();
        }
    }
}
