//! Subcommand handlers.

use std::io::{IsTerminal, Write};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use lexmarket_sdk::format::{format_currency, format_date, status_color, truncate_text};
use lexmarket_sdk::views::{self, ListItem, RowStyle, LOGIN_REQUIRED_TEXT};
use lexmarket_sdk::{
    AppContext, ClientError, LexClient, ListView, NewBid, NewCase, NewRating, Session, ViewState,
};
use serde_json::Value;
use tracing::info;

use crate::Command;

/// How long `emit` waits for the channel before giving up.
const EMIT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn row_style(no_color: bool) -> RowStyle {
    if !no_color && std::io::stdout().is_terminal() {
        RowStyle::Ansi
    } else {
        RowStyle::Plain
    }
}

pub(crate) async fn dispatch(
    ctx: &AppContext,
    command: Command,
    style: RowStyle,
) -> anyhow::Result<()> {
    match command {
        Command::Login { user_id, token } => {
            ctx.login(&Session::new(user_id.as_str(), token))?;
            println!("Logged in as {}", user_id);
        }
        Command::Logout => {
            ctx.logout()?;
            println!("Logged out");
        }
        Command::Whoami => match ctx.session() {
            Some(session) if !session.user_id.is_empty() => println!("{}", session.user_id),
            Some(_) => println!("Logged in (no user ID stored)"),
            None => bail!(LOGIN_REQUIRED_TEXT),
        },
        Command::Cases => show(ctx, views::cases(ctx), style).await?,
        Command::Case { id } => show_case(ctx, &id, style).await?,
        Command::NewCase {
            title,
            description,
            category,
            budget,
            deadline,
        } => {
            let mut case = NewCase::new(title, description)?;
            if let Some(category) = category {
                case = case.with_category(category);
            }
            if let Some(budget) = budget {
                case = case.with_budget(budget)?;
            }
            if let Some(deadline) = deadline {
                case = case.with_deadline(deadline);
            }
            let client = ctx.client()?;
            let created = authorized(ctx, client.create_case(&case).await)?;
            println!("Created {}", created);
        }
        Command::Bid {
            case_id,
            amount,
            message,
        } => {
            let bid = NewBid::new(amount, message)?;
            let client = ctx.client()?;
            let placed = authorized(ctx, client.place_bid(&case_id, &bid).await)?;
            println!("Placed bid {} for {}", placed.id, format_currency(placed.amount));
        }
        Command::Lawyers => show(ctx, views::lawyers(ctx), style).await?,
        Command::Ratings { lawyer_id } => show(ctx, views::ratings(ctx, lawyer_id), style).await?,
        Command::Rate {
            lawyer_id,
            score,
            comment,
            case,
        } => {
            let mut rating = NewRating::new(lawyer_id, score, comment)?;
            if let Some(case) = case {
                rating = rating.for_case(case);
            }
            let client = ctx.client()?;
            let saved = authorized(ctx, client.submit_rating(&rating).await)?;
            println!("Rated {} {}", saved.lawyer_id, saved.stars());
        }
        Command::Conversations => show(ctx, views::conversations(ctx), style).await?,
        Command::Messages { conversation_id } => {
            show(ctx, views::messages(ctx, conversation_id), style).await?;
        }
        Command::Send {
            conversation_id,
            body,
        } => {
            let client = ctx.client()?;
            let sent = authorized(ctx, client.send_message(&conversation_id, &body).await)?;
            println!("Sent message {}", sent.id);
        }
        Command::Appointments => show(ctx, views::appointments(ctx), style).await?,
        Command::Calendar {
            appointment_id,
            output,
            url_only,
        } => {
            let client = ctx.client()?;
            if url_only {
                println!("{}", authorized(ctx, client.calendar_url(&appointment_id))?);
                return Ok(());
            }
            let ics = authorized(ctx, client.download_calendar(&appointment_id).await)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &ics)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Saved {}", path.display());
                }
                None => std::io::stdout().write_all(&ics)?,
            }
        }
        Command::Listen { events, duration } => listen(ctx, &events, duration).await?,
        Command::Emit { event, payload } => emit(ctx, &event, &payload).await?,
    }
    Ok(())
}

/// Maps a rejected token to a logout.
fn authorized<T>(ctx: &AppContext, result: Result<T, ClientError>) -> anyhow::Result<T> {
    match result {
        Err(ClientError::Unauthorized) => {
            ctx.handle_unauthorized()?;
            bail!("session expired; log in again")
        }
        other => Ok(other?),
    }
}

async fn show<T>(ctx: &AppContext, mut view: ListView<T>, style: RowStyle) -> anyhow::Result<()>
where
    T: ListItem + Clone + Send + Sync + 'static,
{
    view.mount();
    match view.settled().await {
        ViewState::Loaded(_) => {
            println!("{}", view.render_styled(style));
            Ok(())
        }
        ViewState::Failed(message) => Err(anyhow!(message)),
        ViewState::LoginRequired if ctx.is_logged_in() => {
            ctx.handle_unauthorized()?;
            bail!("session expired; log in again")
        }
        ViewState::LoginRequired | ViewState::Loading => bail!(LOGIN_REQUIRED_TEXT),
    }
}

async fn show_case(ctx: &AppContext, id: &str, style: RowStyle) -> anyhow::Result<()> {
    let client: LexClient = ctx.client()?;
    let (case, bids) = tokio::join!(client.get_case(id), client.get_bids(id));
    let case = authorized(ctx, case)?;

    let status = match style {
        RowStyle::Ansi => status_color(&case.status).paint(&case.status),
        RowStyle::Plain => case.status.clone(),
    };

    println!("{}  {}", case.id, case.title);
    println!("Status:   {}", status);
    println!("Budget:   {}", format_currency(case.budget));
    print!("Deadline: {}", format_date(case.deadline));
    if case.is_overdue() {
        print!(" (overdue)");
    }
    println!();
    if let Some(category) = case.category.as_deref() {
        println!("Category: {}", category);
    }
    println!();
    println!("{}", case.description);

    let bids = authorized(ctx, bids)?;
    println!();
    println!("Bids ({}):", bids.len());
    for bid in &bids {
        println!(
            "  {}  {}  [{}]  {}",
            bid.id,
            format_currency(bid.amount),
            bid.status,
            truncate_text(&bid.message, 60)
        );
    }
    Ok(())
}

fn session_user(ctx: &AppContext) -> anyhow::Result<Option<String>> {
    let session = ctx.session().ok_or_else(|| anyhow!(LOGIN_REQUIRED_TEXT))?;
    Ok(Some(session.user_id).filter(|id| !id.is_empty()))
}

async fn listen(ctx: &AppContext, events: &[String], duration: Option<u64>) -> anyhow::Result<()> {
    let user_id = session_user(ctx)?;
    let manager = ctx.connections();
    let channel = manager
        .connect(user_id.as_deref())
        .ok_or_else(|| anyhow!("could not open realtime channel"))?;

    let mut subscriptions = Vec::with_capacity(events.len());
    for event in events {
        let name = event.clone();
        let sub = manager
            .subscribe(event, move |data: &Value| println!("{} {}", name, data))
            .ok_or_else(|| anyhow!("realtime channel closed"))?;
        subscriptions.push(sub);
    }
    info!("Listening for {}", events.join(", "));

    let limit = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = limit => {}
        () = channel.wait_until_closed() => bail!("realtime channel closed"),
    }

    for sub in subscriptions {
        sub.unsubscribe();
    }
    Ok(())
}

async fn emit(ctx: &AppContext, event: &str, payload: &str) -> anyhow::Result<()> {
    let payload: Value = serde_json::from_str(payload).context("payload must be JSON")?;
    let user_id = session_user(ctx)?;
    let manager = ctx.connections();
    let channel = manager
        .connect(user_id.as_deref())
        .ok_or_else(|| anyhow!("could not open realtime channel"))?;

    tokio::time::timeout(EMIT_TIMEOUT, channel.wait_until_open())
        .await
        .context("timed out connecting")??;
    manager.emit(event, &payload)?;

    manager.disconnect();
    let _ = tokio::time::timeout(EMIT_TIMEOUT, channel.wait_until_closed()).await;
    println!("Sent {}", event);
    Ok(())
}
