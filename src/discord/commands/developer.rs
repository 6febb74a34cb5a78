// Developer-only commands: git pull, log tailing, lifecycle control, and
// slash-command registration. Gated on the owner list from
// DEVELOPER_USER_IDS rather than guild permissions.

use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use tokio::process::Command;

type Context<'a> = poise::Context<'a, Data, Error>;

// Discord embed descriptions cap at 4096 chars; leave room for the fence.
const MAX_OUTPUT_CHARS: usize = 3900;

/// Developer commands.
#[poise::command(
    slash_command,
    guild_only,
    owners_only,
    subcommands("gitpull", "log", "shutdown", "restart"),
    rename = "dev"
)]
pub async fn dev(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Pull the latest changes from GitHub.
#[poise::command(slash_command, owners_only)]
pub async fn gitpull(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    tracing::info!("pulling latest changes from the git repository");

    let embed = serenity::CreateEmbed::new()
        .title("Git pull")
        .description("Pulling changes from GitHub...")
        .color(0x3498DB);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    let output = Command::new("git").arg("pull").output().await?;
    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        combined.push('\n');
        combined.push_str(stderr.trim());
    }
    for line in combined.lines() {
        tracing::info!("git: {}", line);
    }

    let body = clip_output(combined.trim(), MAX_OUTPUT_CHARS);

    let embed = serenity::CreateEmbed::new()
        .title("Git pull complete")
        .description(format!("```bash\n{}```", body))
        .color(0x00FF00);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Get the logs of the bot.
#[poise::command(slash_command, owners_only)]
pub async fn log(
    ctx: Context<'_>,
    #[description = "The number of lines to fetch from EOF"] lines: Option<usize>,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    match lines {
        Some(count) => {
            let content = tokio::fs::read_to_string(&ctx.data().log_path).await?;
            let tail: Vec<&str> = content.lines().rev().take(count).collect();
            let body = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            // Stay under the 2000-char message limit with the fence included
            let body: String = if body.chars().count() > 1900 {
                let skip = body.chars().count() - 1900;
                body.chars().skip(skip).collect()
            } else {
                body
            };
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("```log\n{}```", body))
                    .ephemeral(true),
            )
            .await?;
        }
        None => {
            let attachment = serenity::CreateAttachment::path(&ctx.data().log_path).await?;
            ctx.send(
                poise::CreateReply::default()
                    .attachment(attachment)
                    .ephemeral(true),
            )
            .await?;
        }
    }
    Ok(())
}

/// Shut down the bot.
#[poise::command(slash_command, owners_only)]
pub async fn shutdown(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    tracing::info!("shutting down");

    let embed = serenity::CreateEmbed::new()
        .title("Shutting down")
        .description("The bot has been shut down")
        .color(0xFF0000);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    ctx.framework().shard_manager.shutdown_all().await;
    Ok(())
}

/// Restart the bot.
#[poise::command(slash_command, owners_only)]
pub async fn restart(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    tracing::info!("restarting");

    let embed = serenity::CreateEmbed::new()
        .title("Restarting")
        .description("The bot is restarting")
        .color(0xFF0000);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    // Spawn a fresh copy of ourselves, then let this process wind down.
    let exe = std::env::current_exe()?;
    Command::new(exe).spawn()?;
    ctx.framework().shard_manager.shutdown_all().await;
    Ok(())
}

/// Interactively register or unregister slash commands.
#[poise::command(prefix_command, owners_only)]
pub async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

/// Cap `text` at `max_chars` characters, marking the cut with an ellipsis.
/// Counts chars, not bytes, so a multibyte cutoff cannot split a character.
fn clip_output(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let clipped: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", clipped)
    } else {
        clipped
    }
}

#[cfg(test)]
mod tests {
    use super::clip_output;

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(clip_output("Already up to date.", 3900), "Already up to date.");
    }

    #[test]
    fn long_output_is_clipped_with_ellipsis() {
        assert_eq!(clip_output("abcdef", 4), "abcd...");
    }

    #[test]
    fn clip_lands_safely_between_multibyte_chars() {
        // Non-ASCII output (commit messages, filenames) at the cutoff
        let text = "é".repeat(10);
        assert_eq!(clip_output(&text, 7), format!("{}...", "é".repeat(7)));
    }
}
