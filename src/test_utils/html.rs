//! Helpers for asserting on rendered HTML in tests.

use axum::{body::Body, http::Response};
use scraper::Html;

/// Read the response body and parse it as a full HTML document.
pub(crate) async fn parse_html_document(response: Response<Body>) -> Html {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not read response body");
    let text = String::from_utf8_lossy(&body).to_string();

    Html::parse_document(&text)
}

/// Assert that scraper did not record any parse errors for `document`.
#[track_caller]
pub(crate) fn assert_valid_html(document: &Html) {
    assert!(
        document.errors.is_empty(),
        "HTML should not contain errors, got {:?}",
        document.errors
    );
}

/// Assert that the response body contains an error paragraph whose text
/// includes `message`.
///
/// Substring matching is used because some messages, e.g. the password
/// strength feedback, have a variable suffix.
pub(crate) async fn assert_fragment_has_error_message(response: Response<Body>, message: &str) {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Could not read response body");
    let text = String::from_utf8_lossy(&body).to_string();
    let fragment = Html::parse_fragment(&text);
    let error_selector = scraper::Selector::parse("p.text-red-500").unwrap();

    let error_texts: Vec<String> = fragment
        .select(&error_selector)
        .map(|error| error.text().collect::<String>().trim().to_owned())
        .collect();

    assert!(
        error_texts.iter().any(|error| error.contains(message)),
        "expected an error message containing \"{message}\", got {error_texts:?}"
    );
}
