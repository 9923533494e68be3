//! Prints an Argon2 PHC hash for use in `AUTH_USERS`.

use std::io::BufRead;

use anyhow::Context;
use clap::Parser;
use todo_api::auth::password::hash_password;

#[derive(Parser, Debug)]
#[command(name = "hash_password", about = "Hash a password for the AUTH_USERS setting")]
struct Args {
    /// Password to hash; read from the first line of stdin when omitted
    password: Option<String>,

    /// Print a complete `username:hash` entry
    #[arg(short, long)]
    username: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let password = match args.password {
        Some(p) => p,
        None => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("read password from stdin")?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    anyhow::ensure!(!password.is_empty(), "password must not be empty");

    let hash = hash_password(&password)?;
    match args.username {
        Some(username) => println!("{username}:{hash}"),
        None => println!("{hash}"),
    }
    Ok(())
}
