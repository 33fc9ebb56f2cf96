//! Inspect or change the persisted session without starting the calendar.
//!
//! Usage: kalenteri-session <status|login|signup|logout> [email] [password]

use kalenteri::config::Config;
use kalenteri::error::validation_error;
use kalenteri::startup;
use std::env;

const USAGE: &str = "usage: kalenteri-session <status | login <email> <password> | signup <email> <password> | logout>";

#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = Config::load()?;
    let session = startup::build_session(&config)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        ["status"] | [] => match session.hydrate().await {
            Some(user) => println!("Logged in as {} ({})", user.email, user.id),
            None => println!("Not logged in"),
        },
        ["login", email, password] => {
            let user = session.login(email, password).await?;
            println!("Logged in as {}, token saved", user.email);
        }
        ["signup", email, password] => {
            let user = session.signup(email, password).await?;
            println!("Created account {}, token saved", user.email);
        }
        ["logout"] => {
            session.logout().await?;
            println!("Persisted session removed");
        }
        _ => return Err(validation_error(USAGE).into()),
    }

    Ok(())
}
