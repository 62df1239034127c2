use fragment_scope::{MockResponse, Page, Result, content_hash};

fn scoped(body: &str) -> String {
    format!(r#"{body}<sco-pe id="main"><p id="m">merged</p></sco-pe>"#)
}

#[test]
fn header_assets_are_loaded_once() -> Result<()> {
    let mut page = Page::from_html(r#"<head></head><sco-pe id="main"></sco-pe>"#)?;
    let response = MockResponse::ok("body")
        .header("x-include-js", "/app.js, /vendor.js")
        .header("x-include-css", "/app.css");
    page.set_fetch_response("/one", response.clone());
    page.set_fetch_response("/two", response);
    page.flush()?;

    page.set_src("#main", "/one")?;
    page.flush()?;
    page.set_src("#main", "/two")?;
    page.flush()?;

    assert_eq!(page.count("head script")?, 2);
    assert_eq!(page.count("head link")?, 1);
    page.assert_exists(r#"head script[src="/vendor.js"][type="text/javascript"]"#)?;
    page.assert_exists(r#"head link[rel="stylesheet"][href="/app.css"]"#)?;
    Ok(())
}

#[test]
fn inline_script_with_explicit_id_is_never_replaced() -> Result<()> {
    let mut page = Page::from_html(
        r#"<head><script id="boot">old()</script></head><sco-pe id="main"></sco-pe>"#,
    )?;
    page.set_fetch_mock("/x", &scoped(r#"<script id="boot">new()</script>"#));
    page.flush()?;
    page.set_src("#main", "/x")?;
    page.flush()?;

    page.assert_text("#boot", "old()")?;
    assert_eq!(page.count("script")?, 1);
    assert!(page.take_executed_scripts().is_empty());
    page.assert_text("#m", "merged")?;
    Ok(())
}

#[test]
fn derived_script_ids_follow_content() -> Result<()> {
    let mut page = Page::from_html(r#"<sco-pe id="main"></sco-pe>"#)?;
    page.set_fetch_mock("/one", &scoped("<script>init()</script>"));
    page.set_fetch_mock("/again", &scoped("<script>init()</script>"));
    page.set_fetch_mock("/two", &scoped("<script>init(2)</script>"));
    page.flush()?;

    for src in ["/one", "/again", "/two"] {
        page.set_src("#main", src)?;
        page.flush()?;
    }

    let first = format!("script-{}", content_hash("init()"));
    let second = format!("script-{}", content_hash("init(2)"));
    assert_eq!(page.take_executed_scripts(), vec![first.clone(), second.clone()]);
    assert_eq!(page.count("head script")?, 2);
    page.assert_text(&format!("#{first}"), "init()")?;
    page.assert_text(&format!("#{second}"), "init(2)")?;
    Ok(())
}

#[test]
fn live_inline_scripts_are_tagged_before_comparison() -> Result<()> {
    let mut page = Page::from_html(
        r#"<head><script>boot()</script></head><sco-pe id="main"></sco-pe>"#,
    )?;
    page.set_fetch_mock("/x", &scoped("<script>boot()</script>"));
    page.flush()?;
    page.set_src("#main", "/x")?;
    page.flush()?;

    page.assert_exists(&format!("#script-{}", content_hash("boot()")))?;
    assert_eq!(page.count("script")?, 1);
    assert!(page.take_executed_scripts().is_empty());
    Ok(())
}

#[test]
fn styles_with_an_existing_id_are_skipped() -> Result<()> {
    let mut page = Page::from_html(
        r#"<head><style id="theme">a{}</style></head><sco-pe id="main"></sco-pe>"#,
    )?;
    page.set_fetch_mock(
        "/x",
        &scoped(r#"<style id="theme">b{}</style><style>p{}</style>"#),
    );
    page.flush()?;
    page.set_src("#main", "/x")?;
    page.flush()?;

    page.assert_text("#theme", "a{}")?;
    assert_eq!(page.count("style")?, 2);
    page.assert_text(&format!("#style-{}", content_hash("p{}")), "p{}")?;
    Ok(())
}

#[test]
fn stylesheet_links_in_responses_are_deduplicated() -> Result<()> {
    let mut page = Page::from_html(
        r#"<head><link rel="stylesheet" href="/base.css"></head><sco-pe id="main"></sco-pe>"#,
    )?;
    page.set_fetch_mock(
        "/x",
        &scoped(r#"<link rel="stylesheet" href="/base.css"><link rel="stylesheet" href="/extra.css"><link rel="icon" href="/favicon.ico">"#),
    );
    page.flush()?;
    page.set_src("#main", "/x")?;
    page.flush()?;

    assert_eq!(page.count("link")?, 2);
    page.assert_exists(r#"link[href="/extra.css"]"#)?;
    page.assert_missing(r#"link[href="/favicon.ico"]"#)?;
    Ok(())
}

#[test]
fn self_partial_responses_skip_asset_processing() -> Result<()> {
    let mut page = Page::from_html(r#"<head></head><sco-pe id="main"></sco-pe>"#)?;
    page.set_fetch_mock("/x", "<p>text</p><script>inline()</script>");
    page.flush()?;
    page.set_src("#main", "/x")?;
    page.flush()?;

    assert_eq!(page.count("head script")?, 0);
    assert_eq!(page.count("#main script")?, 1);
    assert!(page.take_executed_scripts().is_empty());
    Ok(())
}
