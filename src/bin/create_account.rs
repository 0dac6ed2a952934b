//! A utility for creating an account directly against the database file,
//! e.g. for setting up the first account without going through email
//! verification. The account is created active, with its profile, in the
//! same explicit steps the web sign-up uses.

use std::{error::Error, io, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use ledgerly::{
    PasswordHash, ValidatedPassword, initialize_db, insert_account, insert_profile,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The username for the new account.
    #[arg(long)]
    username: String,

    /// The email address for the new account.
    #[arg(long)]
    email: String,

    /// The display name for the new account's profile.
    #[arg(long, default_value = "")]
    full_name: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let db_path = Path::new(&args.db_path);

    let password_hash = match prompt_password_hash() {
        Some(password_hash) => password_hash,
        None => return Ok(()),
    };

    let connection = Connection::open(db_path)?;
    initialize_db(&connection)?;

    let account = insert_account(
        &args.username,
        &args.email,
        &password_hash,
        true,
        &connection,
    )?;
    insert_profile(account.id, &args.full_name, &connection)?;

    println!("Created account '{}' <{}>.", account.username, account.email);

    Ok(())
}

fn prompt_password_hash() -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = match rpassword::prompt_password("Enter a password: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                eprintln!("Could not read password from stdin: {error}");
                return None;
            }
        };

        let validated_password = match ValidatedPassword::new(&first_password) {
            Ok(password) => password,
            Err(error) => {
                eprintln!("{error}");
                continue;
            }
        };

        let second_password = match rpassword::prompt_password("Enter the same password again: ") {
            Ok(string) => string,
            Err(_) => return None,
        };

        if first_password != second_password {
            eprintln!("The passwords do not match, try again.");
            continue;
        }

        match PasswordHash::new(validated_password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => return Some(password_hash),
            Err(error) => {
                eprintln!("Could not hash the password: {error}");
                exit(1);
            }
        }
    }
}
