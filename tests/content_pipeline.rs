use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use content_worker::{
    clients::{ChatCompletionClient, TextGenerator},
    pipeline::{
        DuplicateScreen, GenerationOrchestrator, LlmTranslator, TranslationFanout,
        TranslationOutcome,
    },
    store::{ContentItem, ContentKind, ContentRepository, GenerationParams, InMemoryContentRepository},
};

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

fn generator(server: &MockServer) -> Arc<dyn TextGenerator> {
    Arc::new(
        ChatCompletionClient::new(server.uri(), "sk-test", "test-model", Duration::from_secs(5))
            .expect("client builds"),
    )
}

fn params() -> GenerationParams {
    GenerationParams {
        category_id: "cat-travel".to_string(),
        writer_id: "writer-1".to_string(),
        image_prompt_pattern_id: "img-1".to_string(),
        target_audience: "wheelchair users".to_string(),
        extra: Some(json!({"season": "spring"})),
    }
}

#[tokio::test]
async fn generated_draft_is_screened_and_stored_with_unique_slug() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(
            "**TITLE:** バリアフリー観光ガイド\n\
             EXCERPT: 段差のない観光ルート\n\
             SLUG: barrier-free-guide\n\
             BODY:\n<p>エレベーターとスロープの情報</p>\n\
             FAQ:\nQ1: 車椅子で回れますか？\nA1: はい、回れます。",
        ))
        .mount(&server)
        .await;

    let content = Arc::new(InMemoryContentRepository::new());
    content
        .seed([ContentItem::new(
            "t1",
            ContentKind::Article,
            "バリアフリー観光地ガイド",
            "barrier-free-guide",
        )
        .published(true)])
        .await;
    let orchestrator =
        GenerationOrchestrator::new(generator(&server), content.clone(), DuplicateScreen::default());

    let draft = orchestrator
        .generate("t1", &params())
        .await
        .expect("generation succeeds");

    assert_eq!(draft.title, "バリアフリー観光ガイド");
    assert_eq!(draft.slug, "barrier-free-guide-2");
    assert_eq!(draft.faq.len(), 1);
    assert_eq!(draft.duplicates.len(), 1);
    assert_eq!(draft.warnings.len(), 1);

    let article = draft.into_content_item();
    content.insert(&article).await.expect("insert");
    assert!(article.body.contains("車椅子で回れますか？"));
    assert!(!article.published);

    let stored = content
        .find_by_slug("t1", "barrier-free-guide-2")
        .await
        .expect("lookup")
        .expect("stored draft");
    assert_eq!(stored.id, article.id);
}

#[tokio::test]
async fn translation_failure_in_one_language_falls_back_only_there() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("French"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Spring in Kyoto"))
        .mount(&server)
        .await;

    let fanout = TranslationFanout::new(
        Arc::new(LlmTranslator::new(generator(&server))),
        NonZeroUsize::new(2).expect("non-zero"),
        Duration::from_secs(5),
    );
    let targets = ["ja", "en", "fr"].map(String::from);

    let bundle = fanout
        .translate_fanout("春の京都", "ja", &targets, Some("travel article title"))
        .await;

    assert_eq!(bundle.translations.len(), 3);
    assert_eq!(
        bundle.translations["ja"],
        TranslationOutcome::Copied {
            text: "春の京都".to_string()
        }
    );
    assert_eq!(
        bundle.translations["en"],
        TranslationOutcome::Translated {
            text: "Spring in Kyoto".to_string()
        }
    );
    assert!(bundle.translations["fr"].is_fallback());
    assert_eq!(bundle.translations["fr"].text(), "春の京都");
}

#[tokio::test]
async fn provider_outage_fails_generation_without_storing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    let content = Arc::new(InMemoryContentRepository::new());
    let orchestrator =
        GenerationOrchestrator::new(generator(&server), content.clone(), DuplicateScreen::default());

    let result = orchestrator.generate("t1", &params()).await;

    assert!(result.is_err());
    assert!(content.all("t1").await.is_empty());
}
