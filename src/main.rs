use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossterm::style::Stylize;
use dialoguer::{Input, Password, Select};
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod error;
mod highlight;
mod models;
mod reconcile;
mod transport;

use api::ParagraphsApi;
use error::ApiError;
use highlight::Segment;
use models::{RegisterRequest, SearchHit};
use reconcile::PollOutcome;
use transport::AuthenticatedTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::load()?;
    config.validate()?;

    // Logs go to stderr so the session UI owns stdout
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Paragraphs client starting");
    tracing::debug!("API base URL: {}", config.base_url);

    let transport = Arc::new(AuthenticatedTransport::new(
        &config.base_url,
        config.connect_timeout,
        config.request_timeout,
    )?);
    let api = ParagraphsApi::new(transport, config.poll());

    run_session(api).await
}

/// Interactive session loop. Credentials live exactly as long as this
/// process; logout or quit drops them.
async fn run_session(api: ParagraphsApi) -> Result<()> {
    println!("Paragraphs - your writing, searchable");

    loop {
        let authenticated = api.transport().store().is_authenticated().await;
        let proceed = if authenticated {
            session_menu(&api).await?
        } else {
            landing_menu(&api).await?
        };

        if !proceed {
            return Ok(());
        }
    }
}

async fn landing_menu(api: &ParagraphsApi) -> Result<bool> {
    let choice = Select::new()
        .with_prompt("Account")
        .items(&["Login", "Register", "Quit"])
        .default(0)
        .interact()?;

    match choice {
        0 => {
            let email: String = Input::new().with_prompt("Email").interact_text()?;
            let password = Password::new().with_prompt("Password").interact()?;

            match api.login(&email, &password).await {
                Ok(name) => println!("Welcome back, {name}!"),
                Err(e) => eprintln!("Login failed: {e}"),
            }
        }
        1 => {
            let name: String = Input::new().with_prompt("Full name").interact_text()?;
            let email: String = Input::new().with_prompt("Email").interact_text()?;
            let date_of_birth: String = Input::new()
                .with_prompt("Date of birth (YYYY-MM-DD)")
                .interact_text()?;
            let password = Password::new()
                .with_prompt("Password")
                .with_confirmation("Confirm password", "Passwords do not match")
                .interact()?;

            let request = RegisterRequest {
                name,
                email,
                password,
                date_of_birth,
            };
            match api.register(&request).await {
                Ok(()) => println!("Registered. You can log in now."),
                Err(e) => eprintln!("Registration failed: {e}"),
            }
        }
        _ => return Ok(false),
    }

    Ok(true)
}

async fn session_menu(api: &ParagraphsApi) -> Result<bool> {
    let who = api
        .transport()
        .store()
        .display_name()
        .await
        .unwrap_or_else(|| "you".to_string());

    let choice = Select::new()
        .with_prompt(format!("{who} - what next"))
        .items(&[
            "List paragraphs",
            "Add paragraphs",
            "Search",
            "Logout",
            "Quit",
        ])
        .default(0)
        .interact()?;

    match choice {
        0 => match api.list_paragraphs().await {
            Ok(paragraphs) if paragraphs.is_empty() => {
                println!("No paragraphs yet. Try adding some!");
            }
            Ok(paragraphs) => {
                for paragraph in &paragraphs {
                    println!();
                    println!("  {}", paragraph.content);
                    println!("  {}", format_timestamp(&paragraph.created_at).dim());
                }
            }
            Err(e) => report_error("Could not load paragraphs", &e),
        },
        1 => {
            let text: String = Input::new()
                .with_prompt("Text (blank lines split paragraphs)")
                .interact_text()?;

            match api.submit_and_wait(&text).await {
                Ok(PollOutcome::Converged(paragraphs)) => {
                    println!("Saved. You now have {} paragraph(s).", paragraphs.len());
                }
                Ok(PollOutcome::TimedOut { attempts }) => {
                    // Accepted but not yet indexed; not an error
                    println!(
                        "Accepted - still processing after {attempts} checks. It will appear shortly."
                    );
                }
                Err(e) => report_error("Could not submit", &e),
            }
        }
        2 => {
            let term: String = Input::new().with_prompt("Search term").interact_text()?;

            match api.search(&term, 1).await {
                Ok(response) if response.results.is_empty() => {
                    println!("No results for \"{term}\"");
                }
                Ok(response) => {
                    println!("{} matching paragraph(s) for \"{term}\":", response.count);
                    for hit in &response.results {
                        print_hit(hit);
                    }
                }
                Err(e) => report_error("Search failed", &e),
            }
        }
        3 => {
            api.logout().await;
            println!("Logged out.");
        }
        _ => return Ok(false),
    }

    Ok(true)
}

fn print_hit(hit: &SearchHit) {
    let segments = highlight::highlight(&hit.content, &hit.positions);
    let badge = match hit.match_count {
        1 => "1 match".to_string(),
        n => format!("{n} matches"),
    };

    println!();
    println!("  {}", render_segments(&segments));
    println!(
        "  {} | {}",
        format_timestamp(&hit.created_at).dim(),
        badge.dim()
    );
}

/// Join segments back with single spaces, styling the matched tokens
fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| {
            if segment.is_match {
                segment.text.as_str().black().on_yellow().to_string()
            } else {
                segment.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%b %-d, %Y, %-I:%M %p")
        .to_string()
}

fn report_error(prefix: &str, err: &ApiError) {
    match err {
        // The session stays as-is; the user decides whether to log in again
        ApiError::RefreshFailed(_) => {
            eprintln!("{prefix}: your session has expired. Please log in again.")
        }
        _ => eprintln!("{prefix}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_shape() {
        let timestamp: DateTime<Utc> = "2025-06-15T12:00:00Z".parse().unwrap();
        let rendered = format_timestamp(&timestamp);
        // Local offset may shift the day, never the year at mid-month
        assert!(rendered.contains("2025"));
        assert!(rendered.contains(','));
    }

    #[test]
    fn test_render_segments_plain_roundtrip() {
        let segments = highlight::highlight("the quick brown fox", &[]);
        assert_eq!(render_segments(&segments), "the quick brown fox");
    }

    #[test]
    fn test_render_segments_styles_matches() {
        let segments = highlight::highlight("the quick brown fox", &[4]);
        let rendered = render_segments(&segments);
        assert_ne!(rendered, "the quick brown fox");
        assert!(rendered.contains("quick"));
    }
}
