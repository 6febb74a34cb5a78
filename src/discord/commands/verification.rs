// Discord command for identity verification.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::mutes::MuteService;
use crate::core::relay::RelayService;
use crate::core::verification::{ProfileField, VerificationOutcome, VerificationService};
use crate::infra::auth::PortalAuthClient;
use crate::infra::mutes::SqliteMuteStore;
use crate::infra::relay::SqliteRelayStore;
use crate::infra::verification::SqliteServerStore;
use poise::serenity_prelude as serenity;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
/// This is where we store our services and configuration.
use std::sync::Arc;

pub struct Data {
    pub verification: Arc<VerificationService<SqliteServerStore, PortalAuthClient>>,
    pub mutes: Arc<MuteService<SqliteMuteStore>>,
    pub relay: Arc<RelayService<SqliteRelayStore>>,
    /// Channel anonymous relay posts go to.
    pub relay_channel_id: u64,
    /// Log file read back by `/dev log`.
    pub log_path: std::path::PathBuf,
}

/// Verify your Discord account with your academic portal credentials.
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn auth(
    ctx: Context<'_>,
    #[description = "Your portal username (SRN or PRN)"] username: String,
    #[description = "Your portal password"] password: String,
) -> Result<(), Error> {
    tracing::info!(user = %ctx.author().name, "verification attempt");
    ctx.defer_ephemeral().await?;

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let Some(role_id) = ctx.data().verification.configured_role(guild_id).await? else {
        send_failure(
            ctx,
            "This server does not have a verification role set. \
             Please contact an admin to set one up with `/mod setup`.",
        )
        .await?;
        return Ok(());
    };

    let member = ctx
        .author_member()
        .await
        .ok_or("Could not resolve you as a member of this server")?;

    if member.roles.contains(&serenity::RoleId::new(role_id)) {
        let embed = serenity::CreateEmbed::new()
            .title("Verification Failed")
            .description("You are already verified on this server")
            .color(0xFFA500);
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        return Ok(());
    }

    match ctx
        .data()
        .verification
        .verify(guild_id, &username, &password)
        .await?
    {
        VerificationOutcome::Verified { role_id, profile } => {
            let role_id = serenity::RoleId::new(role_id);
            if member.add_role(ctx.http(), role_id).await.is_err() {
                send_failure(
                    ctx,
                    &format!(
                        "I do not have permission to assign the <@&{}> role. \
                         Please contact an admin to give me the required permissions.",
                        role_id
                    ),
                )
                .await?;
                return Ok(());
            }

            let mut embed = serenity::CreateEmbed::new()
                .title("Verification Successful")
                .description(format!(
                    "You have successfully verified your account and have been \
                     assigned the <@&{}> role",
                    role_id
                ))
                .color(0x00FF00);
            for ProfileField { label, value } in &profile {
                embed = embed.field(format_field_label(label), value, true);
            }
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
                .await?;
        }
        VerificationOutcome::InvalidCredentials => {
            send_failure(ctx, "Your credentials are invalid. Please try again").await?;
        }
        VerificationOutcome::RoleNotConfigured => {
            // Role was removed between the lookup above and the check
            send_failure(
                ctx,
                "This server does not have a verification role set. \
                 Please contact an admin to set one up with `/mod setup`.",
            )
            .await?;
        }
    }

    Ok(())
}

async fn send_failure(ctx: Context<'_>, description: &str) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Verification Failed")
        .description(description)
        .color(0xFF0000);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// Turn an API field key like `preferred_name` into an embed label.
/// Short words (SRN, PRN, ...) read as acronyms, so they go upper-case.
fn format_field_label(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            if word.len() > 3 {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            } else {
                word.to_uppercase()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::format_field_label;

    #[test]
    fn short_words_become_acronyms() {
        assert_eq!(format_field_label("srn"), "SRN");
        assert_eq!(format_field_label("prn"), "PRN");
    }

    #[test]
    fn long_words_are_title_cased() {
        assert_eq!(format_field_label("branch"), "Branch");
        assert_eq!(format_field_label("preferred_name"), "Preferred Name");
    }

    #[test]
    fn mixed_lengths() {
        assert_eq!(format_field_label("srn_number"), "SRN Number");
    }
}
