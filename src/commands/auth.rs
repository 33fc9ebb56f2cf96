use crate::commands::{CommandContext, CommandResult};
use rust_i18n::t;
use tracing::info;

/// Log in and show the current month
pub async fn login(ctx: &mut CommandContext, email: &str, password: &str) -> CommandResult {
    let user = ctx.session.login(email, password).await?;
    println!("{}", t!("logged_in", email = user.email));
    super::calendar::today(ctx).await
}

/// Create an account, log in to it and show the current month
pub async fn signup(ctx: &mut CommandContext, email: &str, password: &str) -> CommandResult {
    let user = ctx.session.signup(email, password).await?;
    info!("Created account {}", user.email);
    println!("{}", t!("signed_up", email = user.email));
    super::calendar::today(ctx).await
}

pub async fn logout(ctx: &mut CommandContext) -> CommandResult {
    if !ctx.session.is_authenticated() {
        println!("{}", t!("not_logged_in"));
    }
    ctx.session.logout().await?;
    ctx.calendar.clear_selection();
    ctx.calendar.cache().reset().await?;
    println!("{}", t!("logged_out"));
    Ok(())
}

pub fn whoami(ctx: &CommandContext) {
    if ctx.session.is_loading() {
        println!("{}", t!("session_restoring"));
        return;
    }
    match ctx.session.user() {
        Some(user) => println!("{}", t!("whoami", email = user.email, id = user.id)),
        None => println!("{}", t!("not_logged_in")),
    }
}
