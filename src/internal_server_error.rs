//! The 500 page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::html::error_view;

/// The text shown on the internal server error page.
pub(crate) struct InternalServerErrorPageTemplate {
    /// A short description of what went wrong.
    pub(crate) description: &'static str,
    /// A suggestion for what the user can do about it.
    pub(crate) fix: &'static str,
}

impl Default for InternalServerErrorPageTemplate {
    fn default() -> Self {
        Self {
            description: "Sorry, something went wrong.",
            fix: "Try again later or check the server logs",
        }
    }
}

/// Route handler for the internal server error page.
pub(crate) async fn get_internal_server_error_page() -> Response {
    render_internal_server_error(Default::default())
}

/// Build a 500 response showing `template`.
pub(crate) fn render_internal_server_error(template: InternalServerErrorPageTemplate) -> Response {
    let page = error_view("Error", "500", template.description, template.fix);

    (StatusCode::INTERNAL_SERVER_ERROR, page).into_response()
}
