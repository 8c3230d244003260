use crate::error::{ConfigError, Result as AppResult};
use crate::game::options::OptionPolicy;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSourceType {
    File,
    Http,
}

/// Where the question bank document is fetched from at session start.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub source_type: ContentSourceType,
    pub file_path: Option<String>,
    pub http_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizConfig {
    pub option_policy: OptionPolicy,
    pub option_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Public page URL embedded in the share post. Empty means no URL.
    pub page_url: String,
    pub hashtag: String,
}

#[derive(Debug, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub content: ContentConfig,
    pub quiz: QuizConfig,
    pub share: ShareConfig,
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("CLIPQUIZ")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

    let builder = apply_defaults(builder).map_err(|e| ConfigError::Load(e.to_string()))?;

    let settings: AppSettings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate(&settings)?;
    Ok(settings)
}

fn apply_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.port", 3000)?
        .set_default("server.cors_origins", Vec::<String>::new())?
        .set_default("content.source_type", "file")?
        .set_default("content.file_path", "data/questions.json")?
        .set_default("quiz.option_policy", "sampled")?
        .set_default("quiz.option_count", 4)?
        .set_default("share.page_url", "")?
        .set_default("share.hashtag", "#clipquiz")
}

fn validate(settings: &AppSettings) -> Result<(), ConfigError> {
    if settings.quiz.option_count < 2 {
        return Err(ConfigError::InvalidValue(format!(
            "quiz.option_count must be at least 2, got {}",
            settings.quiz.option_count
        )));
    }

    match settings.content.source_type {
        ContentSourceType::File if settings.content.file_path.is_none() => Err(
            ConfigError::Missing("content.file_path (required for file source)".to_string()),
        ),
        ContentSourceType::Http if settings.content.http_url.is_none() => Err(
            ConfigError::Missing("content.http_url (required for http source)".to_string()),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(quiz: QuizConfig, content: ContentConfig) -> AppSettings {
        AppSettings {
            server: ServerConfig {
                port: 3000,
                cors_origins: vec![],
            },
            content,
            quiz,
            share: ShareConfig {
                page_url: String::new(),
                hashtag: "#clipquiz".to_string(),
            },
        }
    }

    fn file_content() -> ContentConfig {
        ContentConfig {
            source_type: ContentSourceType::File,
            file_path: Some("data/questions.json".to_string()),
            http_url: None,
        }
    }

    #[test]
    fn accepts_sane_settings() {
        let settings = settings_with(
            QuizConfig {
                option_policy: OptionPolicy::Sampled,
                option_count: 4,
            },
            file_content(),
        );
        assert!(validate(&settings).is_ok());
    }

    #[test]
    fn rejects_single_option_quiz() {
        let settings = settings_with(
            QuizConfig {
                option_policy: OptionPolicy::Sampled,
                option_count: 1,
            },
            file_content(),
        );
        assert!(matches!(
            validate(&settings),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn rejects_http_source_without_url() {
        let settings = settings_with(
            QuizConfig {
                option_policy: OptionPolicy::Exhaustive,
                option_count: 4,
            },
            ContentConfig {
                source_type: ContentSourceType::Http,
                file_path: None,
                http_url: None,
            },
        );
        assert!(matches!(validate(&settings), Err(ConfigError::Missing(_))));
    }
}
