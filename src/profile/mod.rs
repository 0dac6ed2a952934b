//! The profile page and edit operations.

mod core;
mod edit_endpoint;
mod profile_page;

pub use self::core::insert_profile;
pub(crate) use self::core::{create_profile_table, set_full_name};
pub(crate) use edit_endpoint::update_profile_endpoint;
pub(crate) use profile_page::get_profile_page;

#[cfg(test)]
pub(crate) use self::core::{get_profile, record_username_change};
