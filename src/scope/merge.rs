//! Applying fetched HTML to the live document.

use std::sync::OnceLock;

use fancy_regex::Regex;

use super::{SCOPE_TAG, connected_scopes, scope_label};
use crate::Result;
use crate::dom::{Dom, NodeId};
use crate::html::parse_html;
use crate::page::Page;
use crate::runtime_state::{LocationNavigation, LocationNavigationKind};
use crate::transport::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeClassification {
    /// A complete document; every id-matched scope is swapped.
    FullDocument,
    /// A fragment carrying one or more `<sco-pe>` elements.
    MultiScopePartial,
    /// Plain content for the requesting scope.
    SelfPartial,
}

fn doctype_regex() -> Option<&'static Regex> {
    static DOCTYPE: OnceLock<Option<Regex>> = OnceLock::new();
    DOCTYPE
        .get_or_init(|| Regex::new(r"(?i)<!doctype\s+html[\s>]").ok())
        .as_ref()
}

fn has_html_doctype(body: &str) -> bool {
    match doctype_regex() {
        Some(regex) => regex.is_match(body).unwrap_or(false),
        None => body.to_ascii_lowercase().contains("<!doctype html"),
    }
}

pub fn classify(body: &str) -> MergeClassification {
    if has_html_doctype(body) {
        MergeClassification::FullDocument
    } else if body.contains("<sco-pe") {
        MergeClassification::MultiScopePartial
    } else {
        MergeClassification::SelfPartial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderOutcome {
    Continue,
    Reload,
}

fn header_value(response: &Response, name: Option<&str>) -> Option<String> {
    let name = name.filter(|name| !name.is_empty())?;
    response
        .headers
        .get(name)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn split_asset_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

impl Page {
    pub(crate) fn process_headers(&mut self, response: &Response) -> Result<HeaderOutcome> {
        let settings = self.config.settings.clone();

        if let Some(message) = header_value(response, settings.status_header.as_deref()) {
            self.report_status(&message, response.status);
        }

        if let Some(value) = header_value(response, settings.reload_header.as_deref()) {
            self.trace_line(format!("[merge] reload requested value={value}"));
            self.reload_location();
            return Ok(HeaderOutcome::Reload);
        }

        if let Some(title) = header_value(response, settings.title_header.as_deref()) {
            self.dom.set_title(&title)?;
        }

        let scripts = header_value(response, settings.js_header.as_deref());
        let styles = header_value(response, settings.css_header.as_deref());
        if scripts.is_some() || styles.is_some() {
            self.assets.reconcile(&self.dom);
        }
        for src in scripts.as_deref().map(split_asset_list).unwrap_or_default() {
            self.load_script(&src, None)?;
        }
        for href in styles.as_deref().map(split_asset_list).unwrap_or_default() {
            self.load_style(&href)?;
        }
        Ok(HeaderOutcome::Continue)
    }

    fn report_status(&mut self, message: &str, status: u16) {
        self.trace_line(format!("[merge] status {status} message={message}"));
        match self.config.status_handler.clone() {
            Some(handler) => handler(message, status),
            None => self.platform_mocks.alert_messages.push(message.to_string()),
        }
    }

    fn reload_location(&mut self) {
        self.location_state.reload_count += 1;
        self.location_state.navigations.push(LocationNavigation {
            kind: LocationNavigationKind::Reload,
            from: self.location.clone(),
            to: self.location.clone(),
        });
    }

    /// Merges `body` for `scope`. Returns `true` when the scope already
    /// settled as part of the merge.
    pub(crate) fn process_response(&mut self, scope: NodeId, body: &str) -> Result<bool> {
        let classification = classify(body);
        self.trace_line(format!(
            "[merge] {} {:?} bytes={}",
            scope_label(&self.dom, scope),
            classification,
            body.len()
        ));
        match classification {
            MergeClassification::SelfPartial => {
                // A detached scope has nowhere to put its own content.
                if !self.scopes.contains(scope) {
                    self.trace_line(format!(
                        "[merge] discard partial for detached {}",
                        scope_label(&self.dom, scope)
                    ));
                    return Ok(true);
                }
                self.dom.set_inner_html(scope, body)?;
                self.sync_scopes()?;
                self.after_load(scope)?;
                Ok(true)
            }
            MergeClassification::FullDocument | MergeClassification::MultiScopePartial => {
                let parsed = parse_html(body)?;
                self.merge_document(&parsed)?;
                Ok(false)
            }
        }
    }

    fn merge_document(&mut self, parsed: &Dom) -> Result<()> {
        if let Some(head) = parsed.head() {
            self.process_head(parsed, head)?;
        }
        self.process_scripts_and_styles(parsed)?;

        let mut applied: Vec<NodeId> = Vec::new();
        for incoming in connected_scopes(parsed) {
            if applied
                .iter()
                .any(|outer| parsed.is_descendant_of(incoming, *outer))
            {
                continue;
            }
            let Some(id) = parsed
                .attr(incoming, "id")
                .filter(|id| !id.is_empty())
                .map(str::to_string)
            else {
                self.trace_line(format!("[merge] {SCOPE_TAG} without id"));
                continue;
            };
            if parsed.is_node_empty(incoming) {
                self.trace_line(format!("[merge] empty scope for #{id}"));
                continue;
            }
            let Some(live) = self.dom.by_id(&id) else {
                self.trace_line(format!("[merge] no matching scope for #{id}"));
                continue;
            };
            self.dom.replace_with_subtree(live, parsed, incoming)?;
            applied.push(incoming);
            self.trace_line(format!("[merge] replaced #{id}"));
            self.sync_scopes()?;
        }
        Ok(())
    }

    fn process_head(&mut self, parsed: &Dom, head: NodeId) -> Result<()> {
        let title = parsed
            .descendants(head)
            .into_iter()
            .find(|node| parsed.is_tag(*node, "title"));
        if let Some(title) = title {
            self.dom.set_title(&parsed.text_content(title))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Headers;

    #[test]
    fn classification_prefers_doctype_then_scope_markers() {
        assert_eq!(
            classify("<!DOCTYPE html><html><body></body></html>"),
            MergeClassification::FullDocument
        );
        assert_eq!(
            classify("<!doctype   HTML>\n<p>x</p>"),
            MergeClassification::FullDocument
        );
        assert_eq!(
            classify("<div><sco-pe id=\"a\">x</sco-pe></div>"),
            MergeClassification::MultiScopePartial
        );
        assert_eq!(classify("<p>plain</p>"), MergeClassification::SelfPartial);
        assert_eq!(classify("<!doctype htmlx>"), MergeClassification::SelfPartial);
    }

    #[test]
    fn header_values_ignore_empty_and_disabled_names() {
        let mut headers = Headers::new();
        headers.insert("X-Title", "");
        headers.insert("X-Reload", "1");
        let response = Response {
            status: 200,
            headers,
            body: String::new(),
        };
        assert_eq!(header_value(&response, Some("x-title")), None);
        assert_eq!(header_value(&response, Some("x-reload")).as_deref(), Some("1"));
        assert_eq!(header_value(&response, None), None);
    }

    #[test]
    fn asset_lists_are_trimmed() {
        assert_eq!(
            split_asset_list(" /a.js, /b.js ,,"),
            vec!["/a.js".to_string(), "/b.js".to_string()]
        );
    }
}
