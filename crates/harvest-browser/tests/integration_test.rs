use harvest_browser::actions::BrowserActions;
use harvest_browser::{BrowserEngine, BrowserError};
use harvest_core::AppConfig;

fn engine() -> BrowserEngine {
    BrowserEngine::new(&AppConfig::default())
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_session_launch_and_close() {
    let mut session = engine().launch_session().await.expect("launch session");
    assert!(!session.is_closed());

    session.close().await.expect("close session");
    assert!(session.is_closed());

    // Second close is a no-op
    session.close().await.expect("close twice");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_navigation() {
    let mut session = engine().launch_session().await.expect("launch session");

    let info = session
        .navigate("https://example.com")
        .await
        .expect("navigate");
    assert_eq!(info.status_code, 200);
    assert!(info.content_type.contains("html"));

    let title = session.title().await.expect("title");
    assert_eq!(title.as_deref(), Some("Example Domain"));

    let heading = session.extract_text("h1").await.expect("extract h1");
    assert_eq!(heading, "Example Domain");

    assert!(matches!(
        session.extract_text("#does-not-exist").await,
        Err(BrowserError::SelectorNotFound(_))
    ));

    session.close().await.expect("close session");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_closed_session_rejects_actions() {
    let mut session = engine().launch_session().await.expect("launch session");
    session.close().await.expect("close session");

    assert!(matches!(
        session.content().await,
        Err(BrowserError::SessionClosed)
    ));
}
