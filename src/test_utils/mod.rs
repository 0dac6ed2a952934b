#![allow(missing_docs)]

pub(crate) mod html;
pub(crate) mod notifier;

pub(crate) use html::{
    assert_fragment_has_error_message, assert_valid_html, parse_html_document,
};
pub(crate) use notifier::{FailingNotifier, RecordingNotifier, SentEmail};
