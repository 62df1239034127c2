//! Pure derivation of a request from a triggering element.

use crate::dom::{Dom, NodeId};
use crate::transport::Method;
use crate::url::{
    LocationParts, has_fragment, parse_query_pairs, resolve_url, same_origin,
    serialize_query_pairs, set_query_pair,
};
use crate::{Error, Result};

pub(crate) const TRIGGER_SELECTOR: &str = "a,button,[data-scope-action]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Link,
    Button,
    FormSubmit,
    ExplicitAction,
}

impl TriggerKind {
    pub fn of(dom: &Dom, node: NodeId) -> Self {
        match dom.tag_name(node) {
            Some("a") => TriggerKind::Link,
            Some("button") => TriggerKind::Button,
            Some("form") => TriggerKind::FormSubmit,
            _ => TriggerKind::ExplicitAction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub kind: TriggerKind,
    /// Absolute action URL, including its own query.
    pub url: String,
    /// `url` with the merged parameters when a value was contributed.
    pub full_url: String,
    pub request_url: String,
    pub method: Method,
    pub body: Option<String>,
    pub push_history: bool,
    /// Id of another scope that should load `full_url` instead.
    pub target: Option<String>,
}

/// `"1"` and `"true"` are true; everything else, including absence, is false.
pub fn parse_bool(value: Option<&str>) -> bool {
    value.is_some_and(|raw| {
        let raw = raw.trim();
        raw == "1" || raw.eq_ignore_ascii_case("true")
    })
}

/// First non-empty of `action`, `data-scope-action`, `href`.
pub fn raw_action(dom: &Dom, node: NodeId) -> Option<String> {
    ["action", "data-scope-action", "href"]
        .iter()
        .filter_map(|name| dom.attr(node, name))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Event types an actionable element reacts to.
pub fn watched_events(dom: &Dom, node: NodeId) -> Vec<String> {
    if dom.is_tag(node, "form") {
        return vec!["submit".to_string()];
    }
    let events = dom
        .attr(node, "data-scope-on")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|event| !event.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if events.is_empty() {
        vec!["click".to_string()]
    } else {
        events
    }
}

/// Element `data-scope-history`, else scope `data-history`, else enabled.
pub fn history_enabled(dom: &Dom, node: NodeId, scope: NodeId) -> bool {
    match dom
        .attr(node, "data-scope-history")
        .or_else(|| dom.attr(scope, "data-history"))
    {
        Some(raw) => parse_bool(Some(raw)),
        None => true,
    }
}

/// Base URI: the first `<base href>` resolved against the location.
pub fn document_base(dom: &Dom, document_url: &str) -> String {
    dom.base_href()
        .and_then(|href| resolve_url(&href, document_url).ok())
        .unwrap_or_else(|| document_url.to_string())
}

pub fn is_external(url: &str, document_url: &str) -> bool {
    !same_origin(url, document_url)
}

/// Same-document navigation: anything carrying a fragment marker.
pub fn is_anchor(url: &str) -> bool {
    has_fragment(url)
}

fn target_of(dom: &Dom, node: NodeId, scope: NodeId) -> Option<String> {
    dom.attr(node, "data-scope-target")
        .or_else(|| dom.attr(scope, "data-target"))
        .map(str::trim)
        .filter(|target| !target.is_empty() && *target != "_self" && *target != "self")
        .map(str::to_string)
}

fn scalar_value(dom: &Dom, node: NodeId) -> Option<String> {
    match dom.tag_name(node) {
        Some("input" | "textarea" | "select") => dom.value(node),
        Some("button") if dom.has_attr(node, "value") => dom.value(node),
        _ => dom.attr(node, "data-scope-value").map(str::to_string),
    }
}

/// Successful controls of a form, in document order.
pub fn form_fields(dom: &Dom, form: NodeId) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for control in dom.descendants(form) {
        let Some(name) = dom.attr(control, "name").filter(|name| !name.is_empty()) else {
            continue;
        };
        if dom.has_attr(control, "disabled") {
            continue;
        }
        let name = name.to_string();
        match dom.tag_name(control) {
            Some("input") => {
                let kind = dom
                    .attr(control, "type")
                    .unwrap_or("text")
                    .to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "button" | "reset" | "image" | "file" => continue,
                    "checkbox" | "radio" if !dom.is_checked(control) => continue,
                    _ => {}
                }
                fields.push((name, dom.value(control).unwrap_or_default()));
            }
            Some("textarea" | "select") => {
                fields.push((name, dom.value(control).unwrap_or_default()));
            }
            _ => {}
        }
    }
    fields
}

pub fn resolve_action(
    dom: &Dom,
    document_url: &str,
    scope: NodeId,
    trigger: NodeId,
) -> Result<ResolvedAction> {
    let kind = TriggerKind::of(dom, trigger);
    let action = raw_action(dom, trigger).ok_or(Error::MissingAction)?;
    let url = resolve_url(&action, &document_base(dom, document_url))?;
    let method = Method::parse(dom.attr(trigger, "data-scope-method").unwrap_or_default());

    let mut contributions = Vec::new();
    if kind == TriggerKind::FormSubmit {
        contributions = form_fields(dom, trigger);
    }
    let value = scalar_value(dom, trigger);
    let contributed = value.is_some() || !contributions.is_empty();

    let mut params = LocationParts::parse(document_url)
        .map(|parts| parts.query_pairs())
        .unwrap_or_default();
    let mut action_parts =
        LocationParts::parse(&url).ok_or_else(|| Error::InvalidUrl(url.clone()))?;
    for (name, value) in parse_query_pairs(&action_parts.search) {
        set_query_pair(&mut params, &name, &value);
    }
    if !contributions.is_empty() {
        params.retain(|(name, _)| !contributions.iter().any(|(field, _)| field == name));
        params.extend(contributions);
    }
    if let Some(value) = &value {
        set_query_pair(&mut params, "value", value);
    }

    let full_url = if contributed {
        action_parts.set_query_pairs(&params);
        action_parts.href()
    } else {
        url.clone()
    };

    let (request_url, body) = if method == Method::Get {
        (full_url.clone(), None)
    } else {
        (url.clone(), Some(serialize_query_pairs(&params)))
    };

    let push_history = kind == TriggerKind::Link
        && !contributed
        && history_enabled(dom, trigger, scope)
        && dom.attr(scope, "id").is_some_and(|id| !id.is_empty());

    Ok(ResolvedAction {
        kind,
        url,
        full_url,
        request_url,
        method,
        body,
        push_history,
        target: target_of(dom, trigger, scope),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    fn resolve(html: &str, location: &str, trigger: &str) -> Result<ResolvedAction> {
        let dom = parse_html(html)?;
        let trigger = dom
            .query_selector(trigger)?
            .ok_or_else(|| Error::SelectorNotFound(trigger.into()))?;
        let scope = crate::scope::enclosing_scope(&dom, trigger)
            .ok_or_else(|| Error::SelectorNotFound("sco-pe".into()))?;
        resolve_action(&dom, location, scope, trigger)
    }

    #[test]
    fn link_resolves_against_base_and_is_history_eligible() -> Result<()> {
        let action = resolve(
            r#"<base href="/app/"><sco-pe id="main"><a href="items?page=2">x</a></sco-pe>"#,
            "https://a.test/start?q=1",
            "a",
        )?;
        assert_eq!(action.kind, TriggerKind::Link);
        assert_eq!(action.url, "https://a.test/app/items?page=2");
        assert_eq!(action.full_url, action.url);
        assert_eq!(action.request_url, action.url);
        assert_eq!(action.method, Method::Get);
        assert_eq!(action.body, None);
        assert!(action.push_history);
        assert_eq!(action.target, None);
        Ok(())
    }

    #[test]
    fn value_merges_into_page_query_and_suppresses_history() -> Result<()> {
        let action = resolve(
            r#"<sco-pe id="main"><a href="/search" data-scope-value="rust lang">x</a></sco-pe>"#,
            "https://a.test/list?sort=asc&value=old",
            "a",
        )?;
        assert_eq!(
            action.full_url,
            "https://a.test/search?sort=asc&value=rust+lang"
        );
        assert!(!action.push_history);
        Ok(())
    }

    #[test]
    fn non_get_methods_send_params_as_body_to_bare_url() -> Result<()> {
        let action = resolve(
            r#"<sco-pe><input name="q" value="42" data-scope-action="/save" data-scope-method="post"></sco-pe>"#,
            "https://a.test/?page=3",
            "input",
        )?;
        assert_eq!(action.kind, TriggerKind::ExplicitAction);
        assert_eq!(action.method, Method::Post);
        assert_eq!(action.request_url, "https://a.test/save");
        assert_eq!(action.body.as_deref(), Some("page=3&value=42"));
        Ok(())
    }

    #[test]
    fn form_submission_serializes_successful_controls() -> Result<()> {
        let action = resolve(
            r#"<sco-pe id="s"><form action="/find">
                <input name="q" value="a b">
                <input type="checkbox" name="all" value="yes">
                <input type="checkbox" name="fast" value="1" checked>
                <select name="kind"><option>x</option><option selected value="y">Y</option></select>
                <input type="submit" name="go" value="Go">
            </form></sco-pe>"#,
            "https://a.test/",
            "form",
        )?;
        assert_eq!(action.kind, TriggerKind::FormSubmit);
        assert_eq!(action.full_url, "https://a.test/find?q=a+b&fast=1&kind=y");
        assert!(!action.push_history);
        Ok(())
    }

    #[test]
    fn target_self_means_no_target() -> Result<()> {
        let own = resolve(
            r#"<sco-pe data-target="_self"><a href="/x">x</a></sco-pe>"#,
            "https://a.test/",
            "a",
        )?;
        assert_eq!(own.target, None);
        let other = resolve(
            r#"<sco-pe data-target="side"><a href="/x" data-scope-target="main">x</a></sco-pe>"#,
            "https://a.test/",
            "a",
        )?;
        assert_eq!(other.target.as_deref(), Some("main"));
        Ok(())
    }

    #[test]
    fn history_policy_prefers_element_over_scope() -> Result<()> {
        let dom = parse_html(
            r#"<sco-pe id="s" data-history="false"><a id="a" href="/x" data-scope-history="true">x</a><a id="b" href="/y">y</a></sco-pe>"#,
        )?;
        let scope = dom.by_id("s").expect("scope");
        assert!(history_enabled(&dom, dom.by_id("a").expect("a"), scope));
        assert!(!history_enabled(&dom, dom.by_id("b").expect("b"), scope));
        Ok(())
    }

    #[test]
    fn missing_action_is_an_error() {
        assert!(matches!(
            resolve("<sco-pe><button id='b'>x</button></sco-pe>", "https://a.test/", "#b"),
            Err(Error::MissingAction)
        ));
    }

    #[test]
    fn watched_events_trim_and_default_to_click() -> Result<()> {
        let dom = parse_html(
            r#"<form id="f" data-scope-on="input"></form><input id="i" data-scope-on=" input , change ,"><a id="a"></a>"#,
        )?;
        assert_eq!(watched_events(&dom, dom.by_id("f").expect("f")), vec!["submit"]);
        assert_eq!(
            watched_events(&dom, dom.by_id("i").expect("i")),
            vec!["input", "change"]
        );
        assert_eq!(watched_events(&dom, dom.by_id("a").expect("a")), vec!["click"]);
        Ok(())
    }

    #[test]
    fn external_and_anchor_classification() {
        assert!(is_external("https://b.test/x", "https://a.test/"));
        assert!(!is_external("https://a.test/x", "https://a.test/"));
        assert!(is_anchor("https://a.test/x#top"));
        assert!(is_anchor("https://a.test/x#"));
        assert!(!is_anchor("https://a.test/x"));
        assert!(parse_bool(Some("1")) && parse_bool(Some("TRUE")));
        assert!(!parse_bool(Some("")) && !parse_bool(None) && !parse_bool(Some("yes")));
    }
}
