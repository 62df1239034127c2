use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fragment_scope::{
    LocationNavigationKind, MockResponse, Page, Result, ScopeConfig, ScopeSettings, ScopeStatus,
    ScopeView,
};

const TWO_SCOPES: &str = r#"
<head><title>Start</title></head>
<body>
  <sco-pe id="main"><a id="go" href="/next">go</a><p id="m">old main</p></sco-pe>
  <sco-pe id="sidebar"><p id="s">old side</p></sco-pe>
</body>
"#;

#[test]
fn full_document_swaps_only_matching_scopes() -> Result<()> {
    let mut page = Page::from_html_with_url("https://app.test/", TWO_SCOPES)?;
    page.set_fetch_mock(
        "/next",
        r#"<!DOCTYPE html>
<html><head><title>Next</title></head>
<body><sco-pe id="main"><p id="m">new main</p></sco-pe></body></html>"#,
    );
    page.flush()?;
    page.click("#go")?;
    page.flush()?;

    page.assert_text("#m", "new main")?;
    page.assert_text("#s", "old side")?;
    page.assert_missing("#go")?;
    assert_eq!(page.title(), "Next");
    assert_eq!(page.count("sco-pe")?, 2);
    assert_eq!(page.scope_status("#main")?, Some(ScopeStatus::Loaded));
    Ok(())
}

#[test]
fn missing_merge_target_skips_only_that_fragment() -> Result<()> {
    let html = r#"
        <sco-pe id="main"><button id="refresh" data-scope-action="/panels">refresh</button></sco-pe>
        <sco-pe id="sidebar"><p id="s">old side</p></sco-pe>
    "#;
    let mut page = Page::from_html(html)?;
    page.set_fetch_mock(
        "/panels",
        r#"<sco-pe id="ghost"><p>nobody home</p></sco-pe><sco-pe id="sidebar"><p id="s">new side</p></sco-pe>"#,
    );
    page.flush()?;
    page.click("#refresh")?;
    page.flush()?;

    page.assert_text("#s", "new side")?;
    page.assert_exists("#refresh")?;
    page.assert_missing("#ghost")?;
    Ok(())
}

#[test]
fn empty_and_anonymous_parsed_scopes_are_ignored() -> Result<()> {
    let mut page = Page::builder()
        .html(r#"<sco-pe id="main"><p id="m">kept</p></sco-pe>"#)
        .trace(true)
        .build()?;
    page.set_trace_stderr(false);
    page.set_fetch_mock(
        "/noop",
        r#"<sco-pe id="main">   </sco-pe><sco-pe><p>anonymous</p></sco-pe>"#,
    );
    page.flush()?;
    page.set_src("#main", "/noop")?;
    page.flush()?;

    page.assert_text("#m", "kept")?;
    let logs = page.take_trace_logs();
    assert!(logs.iter().any(|line| line == "[merge] empty scope for #main"));
    assert!(logs.iter().any(|line| line == "[merge] sco-pe without id"));
    Ok(())
}

#[test]
fn self_partial_sets_inner_content_and_settles_once() -> Result<()> {
    let settles = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&settles);
    let config = ScopeConfig::default().with_on_load(move |view: &mut ScopeView<'_>| {
        if view.id() == Some("main") {
            seen.set(seen.get() + 1);
        }
        Ok(())
    });
    let mut page = Page::builder()
        .html(r#"<sco-pe id="main" src="/content"></sco-pe>"#)
        .config(config)
        .build()?;
    page.set_fetch_mock("/content", "just text");
    page.flush()?;

    page.assert_text("#main", "just text")?;
    assert_eq!(settles.get(), 1);
    assert_eq!(page.scope_status("#main")?, Some(ScopeStatus::Loaded));
    page.assert_exists("#main.scope-loaded")?;
    page.assert_missing("#main.scope-loading")?;
    Ok(())
}

#[test]
fn truncated_markup_in_a_self_partial_is_kept_as_text() -> Result<()> {
    let settles = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&settles);
    let config = ScopeConfig::default().with_on_load(move |view: &mut ScopeView<'_>| {
        if view.id() == Some("main") {
            seen.set(seen.get() + 1);
        }
        Ok(())
    });
    let mut page = Page::builder()
        .html(r#"<sco-pe id="main" src="/cmp"></sco-pe>"#)
        .config(config)
        .build()?;
    page.set_fetch_mock("/cmp", "a<b");
    page.flush()?;

    page.assert_text("#main", "a<b")?;
    assert_eq!(settles.get(), 1);
    assert_eq!(page.scope_status("#main")?, Some(ScopeStatus::Loaded));
    Ok(())
}

#[test]
fn reload_header_stops_all_further_processing() -> Result<()> {
    let mut page = Page::from_html_with_url("https://app.test/", TWO_SCOPES)?;
    page.set_fetch_response(
        "/next",
        MockResponse::ok(
            r#"<!DOCTYPE html><html><head><title>Body title</title></head>
<body><script>boot()</script><sco-pe id="main"><p id="m">changed</p></sco-pe></body></html>"#,
        )
        .header("X-Reload", "1")
        .header("X-Title", "Header title")
        .header("x-include-js", "/app.js")
        .header("x-include-css", "/app.css"),
    );
    page.flush()?;
    page.click("#go")?;
    page.flush()?;

    assert_eq!(page.reload_count(), 1);
    let navigations = page.take_location_navigations();
    assert_eq!(navigations.len(), 1);
    assert_eq!(navigations[0].kind, LocationNavigationKind::Reload);
    assert_eq!(page.title(), "Start");
    page.assert_text("#m", "old main")?;
    assert_eq!(page.count("script")?, 0);
    assert_eq!(page.count("link")?, 0);
    assert!(page.take_executed_scripts().is_empty());
    Ok(())
}

#[test]
fn status_header_goes_to_alerts_without_a_handler() -> Result<()> {
    let mut page = Page::from_html(r#"<head><title>Start</title></head><sco-pe id="main"></sco-pe>"#)?;
    page.set_fetch_response(
        "/save",
        MockResponse::ok("saved")
            .status(201)
            .header("X-Status", "Saved!")
            .header("X-Title", "Updated"),
    );
    page.flush()?;
    page.set_src("#main", "/save")?;
    page.flush()?;

    assert_eq!(page.take_alert_messages(), vec!["Saved!".to_string()]);
    assert_eq!(page.title(), "Updated");
    page.assert_text("#main", "saved")?;
    Ok(())
}

#[test]
fn status_handler_receives_message_and_code() -> Result<()> {
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let config = ScopeConfig::default().with_status_handler(move |message, status| {
        sink.borrow_mut().push((message.to_string(), status));
    });
    let mut page = Page::builder()
        .html(r#"<sco-pe id="main" src="/fail"></sco-pe>"#)
        .config(config)
        .build()?;
    page.set_fetch_response(
        "/fail",
        MockResponse::ok("<p>nope</p>")
            .status(422)
            .header("x-status", "Invalid input"),
    );
    page.flush()?;

    assert_eq!(*received.borrow(), vec![("Invalid input".to_string(), 422)]);
    assert!(page.take_alert_messages().is_empty());
    Ok(())
}

#[test]
fn disabled_header_names_are_not_consulted() -> Result<()> {
    let settings = ScopeSettings {
        title_header: None,
        ..ScopeSettings::default()
    };
    let mut page = Page::builder()
        .html(r#"<head><title>Start</title></head><sco-pe id="main" src="/x"></sco-pe>"#)
        .settings(settings)
        .build()?;
    page.set_fetch_response("/x", MockResponse::ok("x").header("X-Title", "Ignored"));
    page.flush()?;

    assert_eq!(page.title(), "Start");
    Ok(())
}

#[test]
fn nested_parsed_scopes_swap_atomically_with_their_parent() -> Result<()> {
    let mut page = Page::builder()
        .html(r#"<sco-pe id="outer"><sco-pe id="inner"><p id="i">old</p></sco-pe></sco-pe>"#)
        .trace(true)
        .build()?;
    page.set_trace_stderr(false);
    page.set_fetch_mock(
        "/both",
        r#"<sco-pe id="outer"><p>frame</p><sco-pe id="inner"><p id="i">new</p></sco-pe></sco-pe>"#,
    );
    page.flush()?;
    page.take_trace_logs();
    page.set_src("#outer", "/both")?;
    page.flush()?;

    page.assert_text("#i", "new")?;
    assert_eq!(page.count("#inner")?, 1);
    assert_eq!(page.scope_count(), 2);
    let replaced = page
        .take_trace_logs()
        .into_iter()
        .filter(|line| line.starts_with("[merge] replaced"))
        .collect::<Vec<_>>();
    assert_eq!(replaced, vec!["[merge] replaced #outer".to_string()]);
    assert_eq!(page.scope_status("#inner")?, Some(ScopeStatus::Loaded));
    Ok(())
}
