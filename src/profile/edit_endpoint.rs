//! The endpoint for editing the profile.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    account::{AccountId, find_account_by_username, get_account_by_id, set_username},
    endpoints,
    html::form_error,
    profile::core::{
        check_username_cooldown, get_or_create_profile, record_username_change, set_avatar,
        set_full_name,
    },
    profile::profile_page::profile_view_with_error,
};

/// The state needed to edit a profile.
#[derive(Debug, Clone)]
pub(crate) struct EditProfileState {
    /// The database connection.
    pub(crate) db_connection: Arc<Mutex<Connection>>,
    /// Where uploaded avatar images are written.
    pub(crate) avatar_dir: PathBuf,
}

impl FromRef<AppState> for EditProfileState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            avatar_dir: state.avatar_dir.clone(),
        }
    }
}

/// The fields collected from the multipart edit form.
#[derive(Default)]
struct EditProfileForm {
    full_name: String,
    username: String,
    avatar: Option<(String, Vec<u8>)>,
}

async fn read_form(multipart: &mut Multipart) -> Result<EditProfileForm, Error> {
    let mut form = EditProfileForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::Validation(error.to_string()))?
    {
        match field.name() {
            Some("full_name") => {
                form.full_name = field
                    .text()
                    .await
                    .map_err(|error| Error::Validation(error.to_string()))?;
            }
            Some("username") => {
                form.username = field
                    .text()
                    .await
                    .map_err(|error| Error::Validation(error.to_string()))?;
            }
            Some("avatar") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| Error::Validation(error.to_string()))?;

                if !bytes.is_empty() {
                    form.avatar = Some((file_name, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

const ALLOWED_AVATAR_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

fn avatar_file_name(account_id: AccountId, uploaded_name: &str) -> String {
    let extension = uploaded_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .filter(|extension| ALLOWED_AVATAR_EXTENSIONS.contains(&extension.as_str()))
        .unwrap_or_else(|| "png".to_owned());

    format!("account_{}.{extension}", account_id.as_i64())
}

/// A route handler for updating the profile.
///
/// Accepts a multipart form with the display name, the username and an
/// optional avatar image. The username is only written when it actually
/// changed, and a change inside the 30-day cooldown is rejected without
/// touching the change timestamp.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub(crate) async fn update_profile_endpoint(
    State(state): State<EditProfileState>,
    Extension(account_id): Extension<AccountId>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(error) => {
            return (StatusCode::BAD_REQUEST, form_error(&error.to_string())).into_response();
        }
    };

    let full_name = form.full_name.trim();
    let username = form.username.trim();

    if full_name.is_empty() || username.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            form_error("Your name and username must not be empty."),
        )
            .into_response();
    }

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

    if username != account.username {
        let now = OffsetDateTime::now_utc();

        if let Err(error) = check_username_cooldown(&profile, now) {
            return profile_view_with_error(&account, &profile, Some(&error.to_string()))
                .into_response();
        }

        match find_account_by_username(username, &connection) {
            Ok(Some(_)) => {
                return profile_view_with_error(
                    &account,
                    &profile,
                    Some(&Error::UsernameTaken.to_string()),
                )
                .into_response();
            }
            Ok(None) => {}
            Err(error) => return error.into_response(),
        }

        if let Err(error) = set_username(account_id, username, &connection) {
            return error.into_response();
        }
        if let Err(error) = record_username_change(account_id, now, &connection) {
            return error.into_response();
        }
    }

    if let Err(error) = set_full_name(account_id, full_name, &connection) {
        return error.into_response();
    }

    if let Some((uploaded_name, bytes)) = &form.avatar {
        let file_name = avatar_file_name(account_id, uploaded_name);

        if let Err(error) = std::fs::create_dir_all(&state.avatar_dir)
            .and_then(|_| std::fs::write(state.avatar_dir.join(&file_name), bytes))
        {
            tracing::error!("Could not save avatar image: {error}");
            return profile_view_with_error(
                &account,
                &profile,
                Some("We could not save your avatar. Please try again."),
            )
            .into_response();
        }

        if let Err(error) = set_avatar(account_id, &file_name, &connection) {
            return error.into_response();
        }
    }

    (
        HxRedirect(endpoints::PROFILE_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
