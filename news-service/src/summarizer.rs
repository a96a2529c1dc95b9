use llm_interface::{GenerationRequest, LlmProvider};
use subtrends_core::{CoreError, Post};
use tracing::info;

pub const SUMMARIZER_SYSTEM: &str = "You are a witty news summarizer with a dry sense of humor.
Given Reddit posts and their top comments, create a concise, informative summary that:

1. Highlights the most significant news stories
2. Incorporates insights from top comments when they add valuable context
3. Groups related stories together when appropriate
4. Uses clear, journalistic language with occasional subtle humor or witty observations
5. Maintains objectivity while noting community sentiment when relevant
6. Adds a touch of irony or clever commentary where appropriate
   (but don't overdo it - one or two witty remarks per story max)

Format: Use PLAIN TEXT with ASCII formatting (no markdown). For each major story:
- Use UPPERCASE for main headers, followed by a line of === underneath
- Use bullet points with • or - for lists
- Use *asterisks* for emphasis instead of bold
- Keep total length under 1500 words

Focus on the substance and key developments, not on Reddit-specific details.
Let your personality shine through occasionally.";

const UKRAINIAN_TRANSLATOR_SYSTEM: &str = "You are a professional Ukrainian translator specializing in news content.
Translate the following text to Ukrainian:

1. Maintain journalistic tone and style
2. Use standard Ukrainian (literary language, not Surzhyk)
3. Preserve ASCII formatting exactly (UPPERCASE headers, === lines, • bullets, *emphasis*)
4. Transliterate proper nouns appropriately (use Ukrainian conventions)
5. Keep the same structure and emphasis as the original
6. For technical terms, use commonly accepted Ukrainian equivalents

Provide only the translation, no explanations or notes.";

pub const DEFAULT_TRANSLATION_LANGUAGE: &str = "Ukrainian";

pub const MAX_CONTENT_LENGTH: usize = 100_000;
pub const MAX_SELFTEXT_LENGTH: usize = 1000;
pub const MAX_COMMENT_LENGTH: usize = 500;
pub const MAX_SOURCE_TITLE_LENGTH: usize = 60;

const TRUNCATION_MARKER: &str = "...";
const CONTENT_TRUNCATED_MARKER: &str = "\n\n[Content truncated due to length]";
const SOURCES_RULE_WIDTH: usize = 40;

/// Turns a group's posts into a summary, optionally translated, followed by
/// a list of source links.
pub struct Summarizer<P: LlmProvider> {
    provider: P,
    default_model: Option<String>,
    translation_language: Option<String>,
}

impl<P: LlmProvider> Summarizer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            default_model: None,
            translation_language: Some(DEFAULT_TRANSLATION_LANGUAGE.to_string()),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// `None` turns off the translation pass.
    pub fn with_translation_language(mut self, language: Option<String>) -> Self {
        self.translation_language = language;
        self
    }

    pub async fn summarize(
        &self,
        group_name: &str,
        posts: &[Post],
        model: Option<&str>,
    ) -> Result<String, CoreError> {
        if posts.is_empty() {
            return Ok(empty_group_message(group_name));
        }

        info!("Summarizing {} posts for group '{}'", posts.len(), group_name);
        let request = GenerationRequest::new(build_summary_prompt(group_name, posts))
            .with_system(SUMMARIZER_SYSTEM);
        self.provider.generate(self.with_model(request, model)).await
    }

    pub async fn translate(
        &self,
        text: &str,
        language: &str,
        model: Option<&str>,
    ) -> Result<String, CoreError> {
        if text.is_empty() {
            return Ok(String::new());
        }

        info!("Translating summary to {}", language);
        let request = GenerationRequest::new(format!(
            "Translate this news summary to {}:\n\n{}",
            language, text
        ))
        .with_system(translator_system(language));
        self.provider.generate(self.with_model(request, model)).await
    }

    /// Summary, then translation when a target language is configured, then
    /// the sources section. An empty group short-circuits without any call.
    pub async fn summarize_and_translate(
        &self,
        group_name: &str,
        posts: &[Post],
        model: Option<&str>,
    ) -> Result<String, CoreError> {
        if posts.is_empty() {
            return Ok(empty_group_message(group_name));
        }

        let summary = self.summarize(group_name, posts, model).await?;
        let mut output = match self.translation_language.as_deref() {
            Some(language) => self.translate(&summary, language, model).await?,
            None => summary,
        };

        output.push_str(&format_sources(posts, self.translation_language.as_deref()));
        Ok(output)
    }

    fn with_model(&self, request: GenerationRequest, model: Option<&str>) -> GenerationRequest {
        match model.or(self.default_model.as_deref()) {
            Some(model) => request.with_model(model),
            None => request,
        }
    }
}

pub fn empty_group_message(group_name: &str) -> String {
    format!(
        "No posts found for group '{}' in the last 24 hours.",
        group_name
    )
}

pub fn translator_system(language: &str) -> String {
    if language.eq_ignore_ascii_case(DEFAULT_TRANSLATION_LANGUAGE) {
        return UKRAINIAN_TRANSLATOR_SYSTEM.to_string();
    }

    format!(
        "You are a professional {language} translator specializing in news content.
Translate the following text to {language}:

1. Maintain journalistic tone and style
2. Use standard literary {language}
3. Preserve ASCII formatting exactly (UPPERCASE headers, === lines, • bullets, *emphasis*)
4. Transliterate proper nouns following {language} conventions
5. Keep the same structure and emphasis as the original

Provide only the translation, no explanations or notes."
    )
}

pub fn build_summary_prompt(group_name: &str, posts: &[Post]) -> String {
    let sections: Vec<String> = posts
        .iter()
        .enumerate()
        .map(|(i, post)| format_post(i + 1, post))
        .collect();
    let mut content = sections.join("\n---\n\n");

    let (kept, truncated) = split_at_chars(&content, MAX_CONTENT_LENGTH);
    if truncated {
        content = format!("{}{}", kept, CONTENT_TRUNCATED_MARKER);
    }

    format!(
        "Summarize the following Reddit posts from the '{}' news group. \
         These are the top posts and comments from the last 24 hours:\n\n{}",
        group_name.to_uppercase(),
        content
    )
}

fn format_post(index: usize, post: &Post) -> String {
    let mut section = format!(
        "## Post {}: {}\n**Subreddit:** r/{} | **Score:** {}\n\n",
        index, post.title, post.subreddit, post.score
    );

    if !post.selftext.trim().is_empty() {
        section.push_str(&format!(
            "**Content:**\n{}\n\n",
            truncate_chars(&post.selftext, MAX_SELFTEXT_LENGTH)
        ));
    }

    if !post.comments.is_empty() {
        section.push_str("**Top Comments:**\n");
        for (j, comment) in post.comments.iter().enumerate() {
            section.push_str(&format!(
                "{}. [{} points] {}\n",
                j + 1,
                comment.score,
                truncate_chars(&comment.body, MAX_COMMENT_LENGTH)
            ));
        }
    }

    section
}

/// Text of at most `max_chars` characters is returned whole; longer text keeps
/// its first `max_chars` characters followed by `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match split_at_chars(text, max_chars) {
        (kept, true) => format!("{}{}", kept, TRUNCATION_MARKER),
        (kept, false) => kept.to_string(),
    }
}

fn split_at_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

pub fn format_sources(posts: &[Post], translation_language: Option<&str>) -> String {
    let rule = "═".repeat(SOURCES_RULE_WIDTH);
    let heading = match translation_language {
        Some(language) if language.eq_ignore_ascii_case(DEFAULT_TRANSLATION_LANGUAGE) => {
            "SOURCES / ДЖЕРЕЛА"
        }
        _ => "SOURCES",
    };

    let mut section = format!("\n\n{}\n{}\n{}\n\n", rule, heading, rule);
    for post in posts {
        section.push_str(&format!(
            "• {}\n  {}\n\n",
            truncate_chars(&post.title, MAX_SOURCE_TITLE_LENGTH),
            post.full_url()
        ));
    }
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Mutex;
    use subtrends_core::{Comment, LlmError};

    #[derive(Default)]
    struct MockProvider {
        replies: Mutex<VecDeque<Result<String, CoreError>>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl MockProvider {
        fn replying(replies: Vec<Result<String, CoreError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LlmProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn generate(
            &self,
            request: GenerationRequest,
        ) -> impl Future<Output = Result<String, CoreError>> + Send {
            self.requests.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()));
            std::future::ready(reply)
        }
    }

    fn post(title: &str, selftext: &str, comments: Vec<Comment>) -> Post {
        Post {
            title: title.to_string(),
            url: "https://example.com/article".to_string(),
            score: 321,
            subreddit: "worldnews".to_string(),
            author: "author".to_string(),
            selftext: selftext.to_string(),
            num_comments: comments.len() as u64,
            permalink: format!("/r/worldnews/comments/{}/", title.len()),
            created_utc: 0,
            comments,
        }
    }

    fn comment(body: &str, score: i64) -> Comment {
        Comment {
            body: body.to_string(),
            score,
            author: "commenter".to_string(),
        }
    }

    #[test]
    fn test_truncate_chars_boundaries() {
        assert_eq!(truncate_chars("abcde", 5), "abcde");
        assert_eq!(truncate_chars("abcdef", 5), "abcde...");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("привіт світ", 6), "привіт...");
    }

    #[test]
    fn test_prompt_layout() {
        let posts = vec![
            post("Big news", "Some body text", vec![comment("Wow", 12), comment("Meh", -1)]),
            post("Link only", "   ", Vec::new()),
        ];

        let prompt = build_summary_prompt("world", &posts);
        assert!(prompt.starts_with(
            "Summarize the following Reddit posts from the 'WORLD' news group. \
             These are the top posts and comments from the last 24 hours:\n\n"
        ));
        assert!(prompt.contains(
            "## Post 1: Big news\n**Subreddit:** r/worldnews | **Score:** 321\n\n\
             **Content:**\nSome body text\n\n\
             **Top Comments:**\n1. [12 points] Wow\n2. [-1 points] Meh\n"
        ));
        assert!(prompt.contains("\n---\n\n## Post 2: Link only\n"));
        assert_eq!(prompt.matches("**Content:**").count(), 1);
    }

    #[test]
    fn test_selftext_is_capped() {
        let selftext = format!("{}{}", "a".repeat(1000), "b".repeat(500));
        let prompt = build_summary_prompt("world", &[post("Long", &selftext, Vec::new())]);

        assert!(prompt.contains(&format!("**Content:**\n{}...\n\n", "a".repeat(1000))));
        assert!(!prompt.contains("ab"));
    }

    #[test]
    fn test_comment_bodies_are_capped() {
        let body = "c".repeat(501);
        let prompt = build_summary_prompt("world", &[post("T", "", vec![comment(&body, 1)])]);
        assert!(prompt.contains(&format!("1. [1 points] {}...\n", "c".repeat(500))));
    }

    #[test]
    fn test_oversized_content_is_truncated_with_marker() {
        let posts: Vec<Post> = (0..150)
            .map(|i| post(&format!("Post {}", i), &"x".repeat(1000), Vec::new()))
            .collect();

        let prompt = build_summary_prompt("world", &posts);
        assert!(prompt.ends_with("\n\n[Content truncated due to length]"));
        let header_len = prompt.find("## Post 1:").unwrap();
        let body = &prompt[header_len..prompt.len() - CONTENT_TRUNCATED_MARKER.len()];
        assert_eq!(body.chars().count(), MAX_CONTENT_LENGTH);
    }

    #[test]
    fn test_sources_section() {
        let long_title = "T".repeat(61);
        let posts = vec![post(&long_title, "", Vec::new()), post(&"S".repeat(60), "", Vec::new())];

        let sources = format_sources(&posts, Some("Ukrainian"));
        let rule = "═".repeat(40);
        assert!(sources.starts_with(&format!("\n\n{}\nSOURCES / ДЖЕРЕЛА\n{}\n\n", rule, rule)));
        assert!(sources.contains(&format!(
            "• {}...\n  https://reddit.com/r/worldnews/comments/61/\n\n",
            "T".repeat(60)
        )));
        assert!(sources.contains(&format!("• {}\n", "S".repeat(60))));

        assert!(format_sources(&posts, None).contains("\nSOURCES\n"));
    }

    #[tokio::test]
    async fn test_empty_group_makes_no_calls() {
        let summarizer = Summarizer::new(MockProvider::default());

        let output = summarizer
            .summarize_and_translate("tech", &[], None)
            .await
            .unwrap();
        assert_eq!(output, "No posts found for group 'tech' in the last 24 hours.");
        assert!(summarizer.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_then_translate_then_sources() {
        let provider = MockProvider::replying(vec![
            Ok("SUMMARY".to_string()),
            Ok("ПІДСУМОК".to_string()),
        ]);
        let summarizer = Summarizer::new(provider).with_default_model("claude-default");
        let posts = vec![post("Headline", "", Vec::new())];

        let output = summarizer
            .summarize_and_translate("world", &posts, Some("claude-chosen"))
            .await
            .unwrap();

        assert!(output.starts_with("ПІДСУМОК\n\n"));
        assert!(output.contains("• Headline\n"));

        let requests = summarizer.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system.as_deref(), Some(SUMMARIZER_SYSTEM));
        assert_eq!(requests[0].model.as_deref(), Some("claude-chosen"));
        assert_eq!(
            requests[1].prompt,
            "Translate this news summary to Ukrainian:\n\nSUMMARY"
        );
        assert_eq!(
            requests[1].system.as_deref(),
            Some(UKRAINIAN_TRANSLATOR_SYSTEM)
        );
    }

    #[tokio::test]
    async fn test_translation_can_be_disabled() {
        let provider = MockProvider::replying(vec![Ok("SUMMARY".to_string())]);
        let summarizer = Summarizer::new(provider)
            .with_default_model("claude-default")
            .with_translation_language(None);
        let posts = vec![post("Headline", "", Vec::new())];

        let output = summarizer
            .summarize_and_translate("world", &posts, None)
            .await
            .unwrap();
        assert!(output.starts_with("SUMMARY\n\n"));

        let requests = summarizer.provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model.as_deref(), Some("claude-default"));
    }

    #[tokio::test]
    async fn test_translate_empty_text_skips_call() {
        let summarizer = Summarizer::new(MockProvider::default());
        let output = summarizer.translate("", "German", None).await.unwrap();
        assert_eq!(output, "");
        assert!(summarizer.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_other_language_uses_generic_translator() {
        let summarizer = Summarizer::new(MockProvider::default());
        summarizer.translate("Hello", "German", None).await.unwrap();

        let requests = summarizer.provider.requests();
        let system = requests[0].system.clone().unwrap();
        assert!(system.contains("professional German translator"));
        assert_eq!(requests[0].prompt, "Translate this news summary to German:\n\nHello");
    }

    #[tokio::test]
    async fn test_generation_errors_propagate() {
        let provider = MockProvider::replying(vec![Err(CoreError::Llm(
            LlmError::InvalidApiKey {
                provider: "mock".to_string(),
            },
        ))]);
        let summarizer = Summarizer::new(provider);
        let posts = vec![post("Headline", "", Vec::new())];

        let result = summarizer.summarize_and_translate("world", &posts, None).await;
        assert!(matches!(
            result,
            Err(CoreError::Llm(LlmError::InvalidApiKey { .. }))
        ));
        assert_eq!(summarizer.provider.requests().len(), 1);
    }
}
