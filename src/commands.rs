use crate::cli::NewsArgs;
use crate::formatting::{digest_header, split_message};
use crate::model_settings::{validate_model, ModelSettings, DEFAULT_TENANT};
use crate::sessions::{render_history, SessionStore};
use chrono::{Local, Utc};
use llm_interface::{AnthropicClient, AnthropicConfig};
use news_service::{NewsFetcher, Summarizer};
use reddit_client::{RedditClient, RedditConfig};
use std::path::Path;
use std::sync::Arc;
use subtrends_core::{report_error, AppConfig, CoreError, ErrorExt};
use tracing::{info, warn};

pub fn list_groups(config: &AppConfig) {
    if config.groups.is_empty() {
        println!("No groups configured. Set SUB_<GROUP>=subreddit1,subreddit2 to add one.");
        return;
    }

    println!("Available groups:");
    for (name, subreddits) in &config.groups {
        println!("  {}: {}", name, subreddits.join(", "));
    }
}

pub async fn news(config: &AppConfig, args: NewsArgs) -> Result<(), CoreError> {
    let groups: Vec<String> = if args.all {
        config.groups.keys().cloned().collect()
    } else {
        args.groups.clone()
    };
    if groups.is_empty() {
        return Err(CoreError::InvalidInput {
            message: "no groups to summarize".to_string(),
        });
    }

    let model = match args.model.as_deref() {
        Some(model) => validate_model(model)?.to_string(),
        None => ModelSettings::load(&config.preferences_file_path)
            .await?
            .model_for(DEFAULT_TENANT, &config.anthropic.model)
            .to_string(),
    };
    info!("Using model {}", model);

    let reddit = RedditClient::new(RedditConfig::from_settings(&config.reddit))?;
    let fetcher = NewsFetcher::new(
        Arc::new(reddit),
        config.groups.clone(),
        config.reddit.num_posts,
        config.reddit.num_comments,
    );

    let anthropic = AnthropicClient::new(AnthropicConfig::from_settings(&config.anthropic))?;
    let language = if args.no_translate {
        None
    } else {
        config.translation_language.clone()
    };
    let summarizer = Summarizer::new(anthropic)
        .with_default_model(model)
        .with_translation_language(language);

    if let Some(dir) = &args.output_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut sessions = SessionStore::load(&config.sessions_file_path)
        .await
        .unwrap_or_else(|e| {
            report_error("load session history", &e);
            SessionStore::default()
        });
    let mut history_changed = false;
    let mut failures = 0usize;

    for group in &groups {
        match run_group(&fetcher, &summarizer, group, &args).await {
            Ok(Some(name)) => {
                history_changed |= sessions.record(DEFAULT_TENANT, &name, Utc::now());
            }
            Ok(None) => {}
            Err(e) => {
                failures += 1;
                report_error(group, &e);
                eprintln!("{}: {}", group.to_uppercase(), e.user_friendly_message());
            }
        }
    }

    if history_changed {
        if let Err(e) = sessions.save(&config.sessions_file_path).await {
            warn!("Could not save session history: {}", e);
        }
    }

    if failures > 0 {
        warn!("{} of {} groups failed", failures, groups.len());
    }
    Ok(())
}

async fn run_group(
    fetcher: &NewsFetcher<RedditClient>,
    summarizer: &Summarizer<AnthropicClient>,
    group: &str,
    args: &NewsArgs,
) -> Result<Option<String>, CoreError> {
    let source = fetcher.fetch_group(group).await?;
    if source.posts.is_empty() {
        println!(
            "{}: No posts found in the last 24 hours.",
            source.name.to_uppercase()
        );
        return Ok(None);
    }

    let digest = summarizer
        .summarize_and_translate(&source.name, &source.posts, None)
        .await?;

    println!("{}", digest_header(&source.name));
    for chunk in split_message(&digest, args.split) {
        println!("{}\n", chunk);
    }

    if let Some(dir) = &args.output_dir {
        let path = write_digest(dir, &source.name, &digest).await?;
        println!("Saved to {}", path.display());
    }
    Ok(Some(source.name))
}

async fn write_digest(
    dir: &Path,
    group_name: &str,
    digest: &str,
) -> Result<std::path::PathBuf, CoreError> {
    let file_name = format!("{}_news_{}.txt", group_name, Local::now().format("%Y-%m-%d"));
    let path = dir.join(file_name);
    let contents = format!("{}\n\n{}\n", digest_header(group_name), digest);
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}

pub async fn model(config: &AppConfig, name: Option<String>) -> Result<(), CoreError> {
    let path = &config.preferences_file_path;
    let mut settings = ModelSettings::load(path).await?;

    match name {
        None => {
            let current = settings.model_for(DEFAULT_TENANT, &config.anthropic.model);
            println!("Current model: {}", current);
        }
        Some(name) => {
            settings.set(DEFAULT_TENANT, &name)?;
            settings.save(path).await?;
            println!("Model set to {}", name.trim());
        }
    }
    Ok(())
}

pub async fn history(config: &AppConfig) -> Result<(), CoreError> {
    let sessions = SessionStore::load(&config.sessions_file_path).await?;
    println!("{}", render_history(sessions.history(DEFAULT_TENANT)));
    Ok(())
}

pub async fn clear(config: &AppConfig) -> Result<(), CoreError> {
    let path = &config.sessions_file_path;
    let mut sessions = SessionStore::load(path).await?;
    let removed = sessions.clear(DEFAULT_TENANT, Utc::now());
    if removed > 0 {
        sessions.save(path).await?;
    }
    println!("Cleared {} groups from history.", removed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_digest_names_file_by_group_and_date() {
        let dir = TempDir::new().unwrap();
        let path = write_digest(dir.path(), "world", "Summary body").await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("world_news_"));
        assert!(name.ends_with(".txt"));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("WORLD - NEWS SUMMARY\n"));
        assert!(contents.contains("Summary body"));
    }

    #[tokio::test]
    async fn test_model_command_persists_choice() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            preferences_file_path: dir.path().join("preferences.json"),
            ..AppConfig::default()
        };

        model(&config, Some("claude-haiku-4-5".to_string())).await.unwrap();
        let settings = ModelSettings::load(&config.preferences_file_path).await.unwrap();
        assert_eq!(settings.get(DEFAULT_TENANT), Some("claude-haiku-4-5"));

        let err = model(&config, Some("gpt-4o".to_string())).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_news_without_groups_is_rejected() {
        let args = NewsArgs {
            groups: Vec::new(),
            all: true,
            model: None,
            no_translate: true,
            split: 1900,
            output_dir: None,
        };
        let err = news(&AppConfig::default(), args).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_news_rejects_non_claude_model_override() {
        let args = NewsArgs {
            groups: vec!["world".to_string()],
            all: false,
            model: Some("gpt-4o".to_string()),
            no_translate: true,
            split: 1900,
            output_dir: None,
        };
        let err = news(&AppConfig::default(), args).await.unwrap_err();
        match err {
            CoreError::InvalidInput { message } => assert!(message.contains("gpt-4o")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_empties_recorded_history() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            sessions_file_path: dir.path().join("sessions.json"),
            ..AppConfig::default()
        };

        let mut sessions = SessionStore::default();
        sessions.record(DEFAULT_TENANT, "world", Utc::now());
        sessions.record(DEFAULT_TENANT, "tech", Utc::now());
        sessions.save(&config.sessions_file_path).await.unwrap();

        history(&config).await.unwrap();
        clear(&config).await.unwrap();

        let reloaded = SessionStore::load(&config.sessions_file_path).await.unwrap();
        assert!(reloaded.history(DEFAULT_TENANT).is_empty());
    }

    #[tokio::test]
    async fn test_history_without_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            sessions_file_path: dir.path().join("absent.json"),
            ..AppConfig::default()
        };
        history(&config).await.unwrap();
        clear(&config).await.unwrap();
        assert!(!config.sessions_file_path.exists());
    }
}
