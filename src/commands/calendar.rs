use crate::commands::{CommandContext, CommandResult, EventField};
use chrono::NaiveDate;
use kalenteri::components::event_cache::{CacheState, SelectOutcome};
use kalenteri::components::Event;
use kalenteri::error::validation_error;
use kalenteri::utils::time::{default_end_time, duration_between, format_duration};
use rust_i18n::t;

pub async fn previous(ctx: &mut CommandContext) -> CommandResult {
    let outcome = ctx.calendar.previous_month().await?;
    render(ctx, outcome).await
}

pub async fn next(ctx: &mut CommandContext) -> CommandResult {
    let outcome = ctx.calendar.next_month().await?;
    render(ctx, outcome).await
}

pub async fn today(ctx: &mut CommandContext) -> CommandResult {
    ctx.calendar.set_today(ctx.config.today());
    let outcome = ctx.calendar.today().await?;
    render(ctx, outcome).await
}

pub async fn goto(ctx: &mut CommandContext, date: NaiveDate) -> CommandResult {
    let outcome = ctx.calendar.go_to_date(date).await?;
    render(ctx, outcome).await
}

/// Show the displayed month, loading it if needed
pub async fn show(ctx: &mut CommandContext) -> CommandResult {
    let outcome = ctx.calendar.load().await?;
    render(ctx, outcome).await
}

/// Agenda of one day
pub async fn day(ctx: &mut CommandContext, date: NaiveDate) -> CommandResult {
    if !ctx.calendar.displayed().contains(date) {
        ctx.calendar.go_to_date(date).await?;
    }

    let events = ctx.calendar.events_for_day(date).await?;
    println!("{}", date.format("%A %Y-%m-%d"));
    if events.is_empty() {
        println!("  {}", t!("no_events"));
    }
    for event in &events {
        println!("  {}", describe(event));
    }
    Ok(())
}

pub async fn add(ctx: &mut CommandContext, date: NaiveDate, time: String, title: String) -> CommandResult {
    // Events are created against a loaded month
    ctx.calendar.go_to_date(date).await?;

    let mut draft = ctx.calendar.select_day(date);
    draft.end_time = default_end_time(&time).unwrap_or_default();
    draft.time = time;
    draft.title = title;

    let event = ctx.calendar.save(draft).await?;
    println!("{}", t!("event_created", id = event.id, summary = describe(&event)));
    Ok(())
}

pub async fn edit(ctx: &mut CommandContext, id: &str, field: EventField, value: String) -> CommandResult {
    if ctx.calendar.select_event(id).await.is_err() {
        // Not in the displayed month, open the month it lives in
        let event = ctx.calendar.cache().get(id).await?;
        ctx.calendar.go_to_date(event.date).await?;
    }
    let mut draft = ctx.calendar.select_event(id).await?;

    match field {
        EventField::Title => draft.title = value,
        EventField::Description => draft.description = value,
        EventField::Date => {
            draft.date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|_| validation_error(&format!("'{}' is not a YYYY-MM-DD date", value)))?;
        }
        EventField::Time => {
            let keeps_end = duration_between(&value, &draft.end_time)
                .is_some_and(|d| d.num_minutes() > 0);
            if !keeps_end {
                draft.end_time = default_end_time(&value).unwrap_or_default();
            }
            draft.time = normalise(&value);
        }
        EventField::End => draft.end_time = normalise(&value),
    }

    let moved_out = !ctx.calendar.displayed().contains(draft.date);
    let event = match ctx.calendar.save(draft).await {
        Ok(event) => event,
        Err(e) => {
            ctx.calendar.clear_selection();
            return Err(e);
        }
    };

    println!("{}", t!("event_updated", summary = describe(&event)));
    if moved_out {
        println!("{}", t!("event_moved", date = event.date));
    }
    Ok(())
}

pub async fn delete(ctx: &mut CommandContext, id: &str) -> CommandResult {
    ctx.calendar.delete_event(id).await?;
    println!("{}", t!("event_deleted", id = id));
    Ok(())
}

/// Every event of the user, not only the displayed month
pub async fn all(ctx: &mut CommandContext) -> CommandResult {
    let events = ctx.calendar.all_events().await?;
    if events.is_empty() {
        println!("{}", t!("no_events"));
    }
    for event in &events {
        println!("{}  {}", event.date, describe(event));
    }
    Ok(())
}

async fn render(ctx: &CommandContext, outcome: SelectOutcome) -> CommandResult {
    if outcome.is_superseded() {
        return Ok(());
    }

    let calendar = &ctx.calendar;
    println!();
    println!("{:^35}", calendar.displayed().to_string());
    let labels: Vec<String> = calendar
        .weekday_labels()
        .iter()
        .map(|label| format!("{:>4} ", label))
        .collect();
    println!("{}", labels.concat());

    let view = calendar.month_view().await?;
    for week in view.chunks(7) {
        let row: Vec<String> = week
            .iter()
            .map(|day| {
                let number = if day.cell.in_current_month {
                    day.cell.date.format("%e").to_string()
                } else {
                    " .".to_string()
                };
                let today = if day.cell.is_today { '>' } else { ' ' };
                let busy = if day.events.is_empty() { ' ' } else { '*' };
                format!("{}{:>3}{}", today, number, busy)
            })
            .map(|cell| format!("{} ", cell))
            .collect();
        println!("{}", row.concat());
    }
    println!();

    if let CacheState::Ready { events, .. } = calendar.displayed_state().await? {
        if events.is_empty() {
            println!("{}", t!("no_events"));
        }
        for day in view.iter().filter(|d| d.cell.in_current_month && !d.events.is_empty()) {
            println!("{}", day.cell.date.format("%a %e"));
            for event in &day.events {
                println!("  {}", describe(event));
            }
        }
    }
    Ok(())
}

/// One line summary of an event
fn describe(event: &Event) -> String {
    let mut line = format!("[{}] {}", event.id, event.time);
    if !event.end_time.is_empty() {
        line.push_str(&format!(" - {}", event.end_time));
    }
    line.push_str(&format!("  {}", event.title));

    let length = duration_between(&event.time, &event.end_time)
        .map(format_duration)
        .unwrap_or_default();
    if !length.is_empty() {
        line.push_str(&format!(" ({})", length));
    }
    line
}

fn normalise(value: &str) -> String {
    kalenteri::utils::time::parse_time(value)
        .map(kalenteri::utils::time::format_time)
        .unwrap_or_else(|| value.to_string())
}
