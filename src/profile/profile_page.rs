//! The profile page.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    account::{Account, AccountId, get_account_by_id},
    endpoints,
    html::{
        FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, base, form_error,
        submit_button,
    },
    navigation::NavBar,
    profile::core::{Profile, check_username_cooldown, get_or_create_profile},
};

/// The state needed for displaying the profile page.
#[derive(Debug, Clone)]
pub(crate) struct ProfilePageState {
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ProfilePageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Display the logged-in user's profile with the edit form.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn get_profile_page(
    State(state): State<ProfilePageState>,
    Extension(account_id): Extension<AccountId>,
) -> Response {
    let connection = state
        .db_connection
        .lock()
        .expect("Could not acquire database lock");

    let account = match get_account_by_id(account_id, &connection) {
        Ok(account) => account,
        Err(error) => return error.into_response(),
    };

    let profile = match get_or_create_profile(account_id, &connection) {
        Ok(profile) => profile,
        Err(error) => return error.into_response(),
    };

    profile_view(&account, &profile).into_response()
}

/// Render the profile page, optionally with an error message above the
/// form. Also used by the edit endpoint to re-render after a failed edit.
pub(crate) fn profile_view_with_error(
    account: &Account,
    profile: &Profile,
    error_message: Option<&str>,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::PROFILE_VIEW);
    let cooldown_note = match check_username_cooldown(profile, OffsetDateTime::now_utc()) {
        Err(Error::UsernameCooldown(date)) => Some(format!(
            "You can change your username again on {date}."
        )),
        _ => None,
    };

    let content = html! {
        (nav_bar.render())

        div class=(PAGE_CONTAINER_STYLE)
        {
            img
                src=(profile.avatar_url())
                alt="avatar"
                class="w-24 h-24 rounded-full object-cover my-4";

            h1 class="text-2xl font-bold" { (profile.full_name) }
            p class="text-gray-500 dark:text-gray-400" { "@" (account.username) }
            p class="text-gray-500 dark:text-gray-400" { (account.email) }

            form
                hx-post=(endpoints::PROFILE_API)
                hx-encoding="multipart/form-data"
                class="space-y-4 md:space-y-6 w-full max-w-md mt-8"
            {
                @if let Some(error_message) = error_message
                {
                    (form_error(error_message))
                }

                div
                {
                    label for="full_name" class=(FORM_LABEL_STYLE) { "Full name" }
                    input
                        type="text"
                        name="full_name"
                        id="full_name"
                        value=(profile.full_name)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="username" class=(FORM_LABEL_STYLE) { "Username" }
                    input
                        type="text"
                        name="username"
                        id="username"
                        value=(account.username)
                        required
                        class=(FORM_TEXT_INPUT_STYLE);

                    @if let Some(note) = &cooldown_note
                    {
                        p class="text-sm text-gray-500 dark:text-gray-400" { (note) }
                    }
                }

                div
                {
                    label for="avatar" class=(FORM_LABEL_STYLE) { "Avatar" }
                    input
                        type="file"
                        name="avatar"
                        id="avatar"
                        accept="image/*"
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                (submit_button("Save"))
            }
        }
    };

    base("Profile", &[], &content)
}

fn profile_view(account: &Account, profile: &Profile) -> Markup {
    profile_view_with_error(account, profile, None)
}
