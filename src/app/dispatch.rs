use crate::cli::commands::{Cli, Commands, StyleCommands};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::info;

use crate::Config;
use crate::app::AppState;
use crate::error::StyleError;
use crate::pipeline::GenerationRequest;
use crate::utils::text::{char_len, clip_chars, collapse_whitespace};

const PREVIEW_CHARS: usize = 80;

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// One-line preview for terminal listings.
fn preview(text: &str) -> String {
    let flat = collapse_whitespace(text);
    let clipped = clip_chars(&flat, PREVIEW_CHARS);
    if char_len(clipped) < char_len(&flat) {
        format!("{clipped}…")
    } else {
        clipped.to_string()
    }
}

async fn add_article(state: &AppState, user: &str, file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {} as UTF-8 text", file.display()))?;
    if text.trim().is_empty() {
        bail!("{} has no text", file.display());
    }
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("Article path has no file name")?;

    let article = state.articles.add_article(user, filename, &text).await?;
    println!(
        "✓ Added {} ({} chars, id {})",
        article.filename, article.char_count, article.id
    );
    Ok(())
}

async fn rebuild_style(state: &AppState, user: &str) -> Result<()> {
    match state.rebuilder.rebuild(user).await {
        Ok(profile) => {
            println!("✓ Style profile updated\n");
            println!("{}", profile.summary);
            Ok(())
        }
        Err(StyleError::NoSourceMaterial) => {
            bail!("No articles for {user}; add one with `stylegen style add-article` first")
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            info!(host = host.as_str(), port, "Starting gateway");
            crate::gateway::run_gateway(&host, port, config).await
        }

        Commands::Generate {
            user,
            target,
            outline,
            key_points,
            model,
            persona,
            constraints,
            cases,
            references,
            subheadings,
        } => {
            let state = AppState::from_config(&config).await?;
            let request = GenerationRequest {
                target_length: target,
                content_outline: outline,
                key_points,
                constraint_conditions: constraints,
                author_persona: persona,
                concrete_cases: cases,
                reference_sources: references,
                include_subheadings: subheadings,
                model_key: model,
            };
            match state.service.generate(&user, &request).await {
                Ok(response) => print_json(&response),
                Err(e) => {
                    tracing::debug!(error = %e, "Generation failed");
                    bail!("{}: {}", e.code(), e.user_message())
                }
            }
        }

        Commands::Models => {
            let catalog = config.model_catalog();
            for option in catalog.options() {
                let gate = if option.invite_required {
                    "  (invite required)"
                } else {
                    ""
                };
                println!("{:<10} {}{gate}", option.key.to_string(), option.label);
            }
            Ok(())
        }

        Commands::History {
            user,
            limit,
            delete,
        } => {
            let state = AppState::from_config(&config).await?;
            if let Some(id) = delete {
                if uuid::Uuid::parse_str(&id).is_err() {
                    bail!("Invalid record id: {id}");
                }
                if !state.generations.delete(&user, &id).await? {
                    bail!("Record {id} does not exist or belongs to someone else");
                }
                println!("✓ Deleted {id}");
                return Ok(());
            }

            let records = state.generations.list(&user, limit).await?;
            if records.is_empty() {
                println!("No generations yet.");
            }
            for record in records {
                println!(
                    "{}  {}  [{} / {}] {} chars (target {})",
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.id,
                    record.model_key,
                    record.model_id.as_deref().unwrap_or("-"),
                    record.article_char_count,
                    record.target_length
                );
                println!("    {}", preview(&record.title));
            }
            Ok(())
        }

        Commands::Style { style_command } => {
            let state = AppState::from_config(&config).await?;
            match style_command {
                StyleCommands::Rebuild { user } => rebuild_style(&state, &user).await,
                StyleCommands::AddArticle { user, file } => {
                    add_article(&state, &user, &file).await
                }
            }
        }

        Commands::Articles { user } => {
            let state = AppState::from_config(&config).await?;
            let articles = state.articles.list_articles(&user).await?;
            if articles.is_empty() {
                println!("No articles uploaded.");
            }
            for article in articles {
                println!(
                    "{}  {}  {} ({} chars)",
                    article.created_at.format("%Y-%m-%d %H:%M"),
                    article.id,
                    article.filename,
                    article.char_count
                );
                println!("    {}", preview(&article.text));
            }
            Ok(())
        }

        Commands::Verify { user, code } => {
            let code = code.trim();
            if code.is_empty() {
                bail!("Enter an invite code");
            }
            if code != config.invite_code.trim() {
                bail!("The invite code is incorrect");
            }
            let state = AppState::from_config(&config).await?;
            state.verification.mark_verified(&user).await?;
            println!("✓ {user} can now use invite-only models");
            Ok(())
        }
    }
}
