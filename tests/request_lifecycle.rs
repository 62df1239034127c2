use std::rc::Rc;
use std::cell::Cell;

use fragment_scope::{
    Error, Method, MockResponse, Page, Result, ScopeConfig, ScopeStatus, ScopeView,
};

#[test]
fn second_scope_local_load_cancels_the_first() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"><p>ready</p></sco-pe>"#)?;
    page.set_fetch_response(
        "/slow",
        MockResponse::ok("slow body").header("X-Title", "Slow").delay(100),
    );
    page.set_fetch_response("/fast", MockResponse::ok("fast body").header("X-Title", "Fast"));
    page.flush()?;

    page.set_src("#main", "/slow")?;
    page.set_src("#main", "/fast")?;
    page.flush()?;

    assert_eq!(page.title(), "Fast");
    page.assert_text("#main", "fast body")?;
    assert_eq!(page.take_fetch_calls().len(), 2);
    let completed = page.mock_transport().take_requests();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].1, "https://app.test/fast");
    Ok(())
}

#[test]
fn untargeted_loads_share_one_page_wide_token() -> Result<()> {
    let html = r#"
        <head><title>Start</title></head>
        <sco-pe id="a"><a id="la" href="/a">a</a><p id="pa">a</p></sco-pe>
        <sco-pe id="b"><a id="lb" href="/b">b</a></sco-pe>
    "#;
    let mut page = Page::from_html(html)?;
    page.set_fetch_response("/a", MockResponse::ok("A body").header("X-Title", "A").delay(50));
    page.set_fetch_response("/b", MockResponse::ok("B body").header("X-Title", "B"));
    page.flush()?;
    page.click("#la")?;
    page.click("#lb")?;
    page.flush()?;

    assert_eq!(page.title(), "B");
    page.assert_text("#pa", "a")?;
    page.assert_text("#b", "B body")?;
    Ok(())
}

#[test]
fn transport_failure_surfaces_from_flush() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"><a id="go" href="/boom">go</a></sco-pe>"#)?;
    page.set_fetch_error("/boom", "connection reset");
    page.flush()?;
    page.click("#go")?;

    match page.flush() {
        Err(Error::Transport { url, message }) => {
            assert_eq!(url, "https://app.test/boom");
            assert_eq!(message, "connection reset");
        }
        other => panic!("expected transport error, got: {other:?}"),
    }
    page.assert_exists("#go")?;
    Ok(())
}

#[test]
fn unrouted_urls_fail_like_network_errors() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main" src="/nowhere"></sco-pe>"#)?;
    assert!(matches!(page.flush(), Err(Error::Transport { .. })));
    assert_eq!(page.scope_status("#main")?, Some(ScopeStatus::Loading));
    Ok(())
}

#[test]
fn removing_a_scope_aborts_its_pending_load() -> Result<()> {
    let mut page = Page::from_html(r#"<div id="host"><sco-pe id="main" src="/content"></sco-pe></div>"#)?;
    page.set_fetch_response(
        "/content",
        MockResponse::ok("late").header("X-Title", "Late").delay(50),
    );
    page.run_due_timers()?;
    assert_eq!(page.take_fetch_calls().len(), 1);

    page.remove("#main")?;
    page.flush()?;

    assert_eq!(page.title(), "");
    assert!(page.mock_transport().take_requests().is_empty());
    assert_eq!(page.scope_count(), 0);
    Ok(())
}

#[test]
fn document_merge_survives_removal_of_the_initiating_scope() -> Result<()> {
    let html = r#"
        <sco-pe id="main"><a id="go" href="/panels">go</a></sco-pe>
        <sco-pe id="side"><p id="s">old</p></sco-pe>
    "#;
    let mut page = Page::from_html(html)?;
    page.set_fetch_response(
        "/panels",
        MockResponse::ok(r#"<sco-pe id="side"><p id="s">new</p></sco-pe>"#).delay(50),
    );
    page.flush()?;
    page.click("#go")?;
    page.remove("#main")?;
    page.flush()?;

    page.assert_text("#s", "new")?;
    assert_eq!(page.scope_count(), 1);
    Ok(())
}

#[test]
fn self_partial_for_a_removed_scope_is_dropped() -> Result<()> {
    let html = r#"
        <sco-pe id="main"><a id="go" href="/plain">go</a></sco-pe>
        <sco-pe id="side"><p id="s">old</p></sco-pe>
    "#;
    let mut page = Page::from_html(html)?;
    page.set_fetch_response("/plain", MockResponse::ok("plain").delay(50));
    page.flush()?;
    page.click("#go")?;
    page.remove("#main")?;
    page.flush()?;

    assert_eq!(page.count("#main")?, 0);
    page.assert_text("#s", "old")?;
    assert_eq!(page.mock_transport().take_requests().len(), 1);
    Ok(())
}

#[test]
fn fetch_self_supersedes_the_pending_scope_load() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"><p>ready</p></sco-pe>"#)?;
    page.set_fetch_response(
        "/slow",
        MockResponse::ok("slow body").header("X-Title", "Slow").delay(100),
    );
    page.set_fetch_mock("/raw", "raw text");
    page.flush()?;

    page.set_src("#main", "/slow")?;
    let text = page.fetch_self("#main", "/raw", Method::Get, None)?;
    page.flush()?;

    assert_eq!(text, "raw text");
    assert_eq!(page.title(), "");
    page.assert_text("#main", "ready")?;
    assert_eq!(page.take_fetch_calls().len(), 2);
    let completed = page.mock_transport().take_requests();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].1, "https://app.test/raw");
    Ok(())
}

#[test]
fn fetch_self_reports_transport_failures() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"></sco-pe>"#)?;
    page.set_fetch_error("/down", "offline");
    page.flush()?;

    let err = page
        .fetch_self("#main", "/down", Method::Post, Some("a=1"))
        .err();
    assert!(matches!(err, Some(Error::Transport { .. })));
    let calls = page.take_fetch_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body.as_deref(), Some("a=1"));
    Ok(())
}

#[test]
fn prerendered_scope_skips_its_initial_fetch() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main" src="/x"><p>server rendered</p></sco-pe>"#)?;
    page.flush()?;

    assert!(page.take_fetch_calls().is_empty());
    assert_eq!(page.scope_status("#main")?, Some(ScopeStatus::Loaded));
    page.assert_text("#main", "server rendered")?;
    Ok(())
}

#[test]
fn src_changes_before_initialization_do_not_load_twice() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"></sco-pe>"#)?;
    page.set_fetch_mock("/later", "later");
    page.set_src("#main", "/later")?;
    assert!(page.take_fetch_calls().is_empty());
    page.flush()?;

    assert_eq!(page.take_fetch_calls().len(), 1);
    page.assert_text("#main", "later")?;
    Ok(())
}

#[test]
fn non_get_methods_send_params_as_body() -> Result<()> {
    let html = r#"<sco-pe id="m"><button id="save" data-scope-action="/save?x=1" data-scope-method="post" value="42">Save</button></sco-pe>"#;
    let mut page = Page::from_html_with_url("https://app.test/items?page=2", html)?;
    page.set_fetch_mock("/save?x=1", "saved");
    page.flush()?;
    page.click("#save")?;
    page.flush()?;

    let calls = page.take_fetch_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[0].url, "https://app.test/save?x=1");
    assert_eq!(calls[0].body.as_deref(), Some("page=2&x=1&value=42"));
    page.assert_text("#m", "saved")?;
    Ok(())
}

#[test]
fn clicked_link_becomes_the_only_active_one() -> Result<()> {
    let html = r#"
        <sco-pe id="nav">
          <a id="one" href="/one" class="active">one</a>
          <a id="two" href="/two">two</a>
        </sco-pe>
    "#;
    let mut page = Page::from_html(html)?;
    page.set_fetch_mock("/two", r#"<sco-pe id="elsewhere"><p>x</p></sco-pe>"#);
    page.flush()?;
    page.click("#two")?;
    page.flush()?;

    page.assert_exists("#two.active")?;
    page.assert_missing("#one.active")?;
    Ok(())
}

#[test]
fn settled_scope_marks_links_to_the_current_location() -> Result<()> {
    let mut page = Page::from_html_with_url(
        "https://app.test/docs",
        r#"<sco-pe id="menu" src="/menu"></sco-pe>"#,
    )?;
    page.set_fetch_mock(
        "/menu",
        r#"<a id="docs" href="/docs">Docs</a><a id="home" href="/">Home</a>"#,
    );
    page.flush()?;

    page.assert_exists("#docs.active")?;
    page.assert_missing("#home.active")?;
    Ok(())
}

#[test]
fn load_hook_can_edit_the_settled_scope() -> Result<()> {
    let calls = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&calls);
    let config = ScopeConfig::default().with_on_load(move |view: &mut ScopeView<'_>| {
        counter.set(counter.get() + 1);
        if !view.query(".stamp")?.is_empty() {
            view.set_text(".stamp", "stamped")?;
        }
        Ok(())
    });
    let mut page = Page::builder()
        .html(r#"<sco-pe id="a"><span class="stamp">raw</span></sco-pe><sco-pe id="b"></sco-pe>"#)
        .config(config)
        .build()?;
    page.flush()?;

    page.assert_text("#a .stamp", "stamped")?;
    assert_eq!(calls.get(), 2);
    Ok(())
}

#[test]
fn runaway_task_queues_hit_the_step_limit() -> Result<()> {
    let mut page = Page::from_html(
        r#"<sco-pe id="a"></sco-pe><sco-pe id="b"></sco-pe><sco-pe id="c"></sco-pe>"#,
    )?;
    page.set_timer_step_limit(2)?;
    assert!(matches!(page.flush(), Err(Error::Runtime(_))));
    Ok(())
}
