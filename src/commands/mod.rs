use chrono::NaiveDate;
use kalenteri::components::{CalendarController, SessionStore};
use kalenteri::config::Config;
use kalenteri::error::{validation_error, CalResult, Error};
use kalenteri::utils::time::{format_time, parse_time};
use rust_i18n::t;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

// Export submodules
pub mod auth;
pub mod calendar;

/// Shared state for all commands
pub struct CommandContext {
    pub config: Config,
    pub session: SessionStore,
    pub calendar: CalendarController,
}

/// Type alias for command result
pub type CommandResult = CalResult<()>;

/// Field of an event changed by `edit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Title,
    Date,
    Time,
    End,
    Description,
}

/// A parsed prompt line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Signup { email: String, password: String },
    Logout,
    Whoami,
    Previous,
    Next,
    Today,
    Goto(NaiveDate),
    Show,
    Day(NaiveDate),
    Add {
        date: NaiveDate,
        time: String,
        title: String,
    },
    Edit {
        id: String,
        field: EventField,
        value: String,
    },
    Delete(String),
    All,
    Help,
    Quit,
}

impl Command {
    /// Calendar commands need a logged in user
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. }
                | Command::Signup { .. }
                | Command::Logout
                | Command::Whoami
                | Command::Help
                | Command::Quit
        )
    }
}

/// Parse one prompt line. Blank lines yield `None`.
pub fn parse(line: &str) -> CalResult<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "login" | "signup" => {
            let [email, password] = rest.as_slice() else {
                return Err(validation_error("usage: login|signup <email> <password>"));
            };
            let (email, password) = (email.to_string(), password.to_string());
            if name.eq_ignore_ascii_case("login") {
                Command::Login { email, password }
            } else {
                Command::Signup { email, password }
            }
        }
        "logout" => Command::Logout,
        "whoami" => Command::Whoami,
        "prev" | "p" => Command::Previous,
        "next" | "n" => Command::Next,
        "today" | "t" => Command::Today,
        "show" | "s" => Command::Show,
        "all" => Command::All,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "goto" => Command::Goto(parse_date(single(&rest, "goto <YYYY-MM-DD>")?)?),
        "day" => Command::Day(parse_date(single(&rest, "day <YYYY-MM-DD>")?)?),
        "delete" => Command::Delete(single(&rest, "delete <id>")?.to_string()),
        "add" => parse_add(&rest)?,
        "edit" => parse_edit(&rest)?,
        other => return Err(validation_error(&format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn single<'a>(args: &[&'a str], usage: &str) -> CalResult<&'a str> {
    match args {
        [value] => Ok(*value),
        _ => Err(validation_error(&format!("usage: {}", usage))),
    }
}

fn parse_date(raw: &str) -> CalResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| validation_error(&format!("'{}' is not a YYYY-MM-DD date", raw)))
}

/// Normalise a user supplied time to the "hh:mm AM/PM" form the store uses
fn parse_clock(raw: &str) -> CalResult<String> {
    parse_time(raw)
        .map(format_time)
        .ok_or_else(|| validation_error(&format!("'{}' is not a time", raw)))
}

/// Split a leading time off `args`, joining a separate AM/PM word
fn take_time<'a>(args: &'a [&'a str]) -> CalResult<(String, &'a [&'a str])> {
    let Some((first, rest)) = args.split_first() else {
        return Err(validation_error("a time is required"));
    };
    match rest.split_first() {
        Some((meridiem, tail))
            if meridiem.eq_ignore_ascii_case("am") || meridiem.eq_ignore_ascii_case("pm") =>
        {
            Ok((parse_clock(&format!("{} {}", first, meridiem))?, tail))
        }
        _ => Ok((parse_clock(first)?, rest)),
    }
}

fn parse_add(args: &[&str]) -> CalResult<Command> {
    const USAGE: &str = "usage: add <YYYY-MM-DD> <time> <title>";

    let Some((date, rest)) = args.split_first() else {
        return Err(validation_error(USAGE));
    };
    let date = parse_date(date)?;
    let (time, title) = take_time(rest)?;
    if title.is_empty() {
        return Err(validation_error(USAGE));
    }

    Ok(Command::Add {
        date,
        time,
        title: title.join(" "),
    })
}

fn parse_edit(args: &[&str]) -> CalResult<Command> {
    const USAGE: &str = "usage: edit <id> <title|date|time|end|desc> <value>";

    let [id, field, value @ ..] = args else {
        return Err(validation_error(USAGE));
    };
    if value.is_empty() {
        return Err(validation_error(USAGE));
    }

    let field = match field.to_ascii_lowercase().as_str() {
        "title" => EventField::Title,
        "date" => EventField::Date,
        "time" => EventField::Time,
        "end" => EventField::End,
        "desc" | "description" => EventField::Description,
        other => return Err(validation_error(&format!("unknown field '{}'", other))),
    };

    let value = value.join(" ");
    // Check the value now so a typo does not cost a round trip
    match field {
        EventField::Date => {
            parse_date(&value)?;
        }
        EventField::Time | EventField::End => {
            parse_clock(&value)?;
        }
        EventField::Title | EventField::Description => {}
    }

    Ok(Command::Edit {
        id: id.to_string(),
        field,
        value,
    })
}

/// Execute a command. Returns `false` when the prompt should close.
pub async fn dispatch(ctx: &mut CommandContext, command: Command) -> CalResult<bool> {
    if command.needs_session() {
        if ctx.session.is_loading() {
            println!("{}", t!("session_restoring"));
            return Ok(true);
        }
        if !ctx.session.is_authenticated() {
            println!("{}", t!("login_required"));
            return Ok(true);
        }
    }

    match command {
        Command::Login { email, password } => auth::login(ctx, &email, &password).await?,
        Command::Signup { email, password } => auth::signup(ctx, &email, &password).await?,
        Command::Logout => auth::logout(ctx).await?,
        Command::Whoami => auth::whoami(ctx),
        Command::Previous => calendar::previous(ctx).await?,
        Command::Next => calendar::next(ctx).await?,
        Command::Today => calendar::today(ctx).await?,
        Command::Goto(date) => calendar::goto(ctx, date).await?,
        Command::Show => calendar::show(ctx).await?,
        Command::Day(date) => calendar::day(ctx, date).await?,
        Command::Add { date, time, title } => calendar::add(ctx, date, time, title).await?,
        Command::Edit { id, field, value } => calendar::edit(ctx, &id, field, value).await?,
        Command::Delete(id) => calendar::delete(ctx, &id).await?,
        Command::All => calendar::all(ctx).await?,
        Command::Help => println!("{}", t!("help")),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

/// Print a failed command's error for the user
pub fn report(err: &Error) {
    match err {
        Error::Auth(_) => println!("{}", t!("auth_expired")),
        Error::Validation(message) => println!("{}", t!("invalid_input", message = message)),
        other => println!("{}", t!("command_failed", message = other.to_string())),
    }
}

/// Read commands from stdin until `quit` or end of input
pub async fn run(mut ctx: CommandContext) -> CalResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", t!("welcome"));
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            debug!("End of input");
            break;
        };

        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                report(&e);
                continue;
            }
        };

        match dispatch(&mut ctx, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("Command failed: {}", e);
                report(&e);
            }
        }
    }

    println!("{}", t!("goodbye"));
    Ok(())
}
