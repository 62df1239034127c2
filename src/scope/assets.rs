//! Script and style deduplication for merged responses.

use std::collections::{BTreeMap, HashMap};

use crate::Result;
use crate::dom::{Dom, NodeId};
use crate::page::Page;

const DEFAULT_SCRIPT_TYPE: &str = "text/javascript";

/// 32-bit `h * 31 + unit` over UTF-16 code units, rendered as unsigned base 36.
pub fn content_hash(content: &str) -> String {
    let mut hash = 0i32;
    for unit in content.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(i32::from(unit));
    }
    to_base36(hash as u32)
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Identity of a head-level asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetKey {
    ExternalScript(String),
    ExternalStyle(String),
    InlineScript(String),
    InlineStyle(String),
}

impl AssetKey {
    fn of(dom: &Dom, node: NodeId) -> Option<Self> {
        let non_empty = |name: &str| {
            dom.attr(node, name)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        match dom.tag_name(node)? {
            "script" => match non_empty("src") {
                Some(src) => Some(AssetKey::ExternalScript(src)),
                None => non_empty("id").map(AssetKey::InlineScript),
            },
            "link" => non_empty("href").map(AssetKey::ExternalStyle),
            "style" => non_empty("id").map(AssetKey::InlineStyle),
            _ => None,
        }
    }
}

/// Live assets by identity. Rebuilt from the document at the start of each
/// asset pass and updated as elements are inserted.
#[derive(Debug, Default)]
pub(crate) struct AssetRegistry {
    entries: BTreeMap<AssetKey, NodeId>,
}

impl AssetRegistry {
    pub(crate) fn reconcile(&mut self, dom: &Dom) {
        self.entries.clear();
        for node in dom.descendants(dom.root()) {
            if let Some(key) = AssetKey::of(dom, node) {
                self.entries.entry(key).or_insert(node);
            }
        }
    }

    pub(crate) fn get(&self, key: &AssetKey) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    fn insert(&mut self, key: AssetKey, node: NodeId) {
        self.entries.insert(key, node);
    }
}

fn is_stylesheet_link(dom: &Dom, node: NodeId) -> bool {
    dom.is_tag(node, "link")
        && dom.attr(node, "rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
}

impl Page {
    /// Appends `<script src>` to the head unless one with that exact `src` exists.
    pub(crate) fn load_script(&mut self, src: &str, kind: Option<&str>) -> Result<()> {
        let key = AssetKey::ExternalScript(src.to_string());
        if self.assets.get(&key).is_some() {
            self.trace_line(format!("[asset] script present src={src}"));
            return Ok(());
        }
        let kind = kind.unwrap_or(DEFAULT_SCRIPT_TYPE);
        let node = self.detached_element(
            "script",
            &[("type", kind), ("src", src)],
            None,
        );
        self.append_to_head(node)?;
        self.assets.insert(key, node);
        self.trace_line(format!("[asset] load script src={src}"));
        Ok(())
    }

    /// Appends `<link rel=stylesheet>` to the head unless one with that `href` exists.
    pub(crate) fn load_style(&mut self, href: &str) -> Result<()> {
        let key = AssetKey::ExternalStyle(href.to_string());
        if self.assets.get(&key).is_some() {
            self.trace_line(format!("[asset] style present href={href}"));
            return Ok(());
        }
        let node = self.detached_element("link", &[("rel", "stylesheet"), ("href", href)], None);
        self.append_to_head(node)?;
        self.assets.insert(key, node);
        self.trace_line(format!("[asset] load style href={href}"));
        Ok(())
    }

    pub(crate) fn process_scripts_and_styles(&mut self, parsed: &Dom) -> Result<()> {
        self.tag_inline_assets()?;
        self.assets.reconcile(&self.dom);

        let incoming = parsed.descendants(parsed.root());
        for script in incoming.iter().copied().filter(|node| parsed.is_tag(*node, "script")) {
            let kind = parsed
                .attr(script, "type")
                .filter(|kind| !kind.is_empty())
                .unwrap_or(DEFAULT_SCRIPT_TYPE);
            if let Some(src) = parsed.attr(script, "src").filter(|src| !src.is_empty()) {
                self.load_script(src, Some(kind))?;
                continue;
            }
            self.merge_inline_script(parsed, script, kind)?;
        }

        for style in incoming
            .iter()
            .copied()
            .filter(|node| parsed.is_tag(*node, "style") || is_stylesheet_link(parsed, *node))
        {
            if let Some(href) = parsed.attr(style, "href").filter(|href| !href.is_empty()) {
                self.load_style(href)?;
                continue;
            }
            if parsed.is_tag(style, "link") {
                continue;
            }
            let content = parsed.text_content(style);
            let id = parsed
                .attr(style, "id")
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("style-{}", content_hash(&content)));
            let key = AssetKey::InlineStyle(id.clone());
            if self.assets.get(&key).is_some() {
                self.trace_line(format!("[asset] style present id={id}"));
                continue;
            }
            let node = self.detached_element("style", &[("id", id.as_str())], Some(&content));
            self.append_to_head(node)?;
            self.assets.insert(key, node);
            self.trace_line(format!("[asset] insert style id={id}"));
        }
        Ok(())
    }

    fn merge_inline_script(&mut self, parsed: &Dom, script: NodeId, kind: &str) -> Result<()> {
        let content = parsed.text_content(script);
        let explicit_id = parsed.attr(script, "id").filter(|id| !id.is_empty());
        let id = explicit_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("script-{}", content_hash(&content)));
        let key = AssetKey::InlineScript(id.clone());
        let existing = self.assets.get(&key);
        if let Some(existing) = existing {
            if explicit_id.is_some() {
                self.trace_line(format!("[asset] script present id={id}"));
                return Ok(());
            }
            if self.dom.text_content(existing) == content {
                self.trace_line(format!("[asset] script unchanged id={id}"));
                return Ok(());
            }
        }

        let node = self.detached_element("script", &[("type", kind), ("id", id.as_str())], Some(&content));
        match existing {
            Some(existing) => {
                self.dom.replace_node(existing, node)?;
                self.trace_line(format!("[asset] replace script id={id}"));
            }
            None => {
                self.append_to_head(node)?;
                self.trace_line(format!("[asset] insert script id={id}"));
            }
        }
        self.assets.insert(key, node);
        self.platform_mocks.executed_scripts.push(id);
        Ok(())
    }

    /// Gives every live inline script and style without an id a derived one.
    fn tag_inline_assets(&mut self) -> Result<()> {
        let untagged = self
            .dom
            .descendants(self.dom.root())
            .into_iter()
            .filter_map(|node| {
                let tag = self.dom.tag_name(node)?;
                let inline = match tag {
                    "script" => !self.dom.has_attr(node, "src"),
                    "style" => true,
                    _ => false,
                };
                if !inline || self.dom.has_attr(node, "id") {
                    return None;
                }
                let id = format!("{tag}-{}", content_hash(&self.dom.text_content(node)));
                Some((node, id))
            })
            .collect::<Vec<_>>();
        for (node, id) in untagged {
            self.dom.set_attr(node, "id", &id)?;
        }
        Ok(())
    }

    fn detached_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: Option<&str>) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        let node = self.dom.create_element(None, tag.to_string(), attrs);
        if let Some(text) = text.filter(|text| !text.is_empty()) {
            self.dom.create_text(Some(node), text.to_string());
        }
        node
    }

    fn append_to_head(&mut self, node: NodeId) -> Result<()> {
        let head = self.dom.ensure_head();
        self.dom.append_child(head, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::parse_html;

    #[test]
    fn content_hash_matches_rolling_31_hash() {
        assert_eq!(content_hash(""), "0");
        assert_eq!(content_hash("a"), "2p");
        // 97 * 31 + 98 = 3105
        assert_eq!(content_hash("ab"), to_base36(3105));
        assert_eq!(to_base36(3105), "2e9");
        // wraps to a negative i32 and is read back unsigned
        let long = "x".repeat(64);
        let mut expected = 0i32;
        for _ in 0..64 {
            expected = expected.wrapping_mul(31).wrapping_add(120);
        }
        assert_eq!(content_hash(&long), to_base36(expected as u32));
    }

    #[test]
    fn hash_uses_utf16_code_units() {
        // U+1F600 is the surrogate pair D83D DE00
        let expected = 0xD83Di32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(content_hash("\u{1F600}"), to_base36(expected as u32));
    }

    #[test]
    fn registry_keys_follow_tag_and_identity() -> Result<()> {
        let dom = parse_html(
            r#"<head><script src="/a.js"></script><script id="s1">x()</script><script>y()</script>
               <link rel="stylesheet" href="/a.css"><style id="st">p{}</style><style>q{}</style></head>"#,
        )?;
        let mut registry = AssetRegistry::default();
        registry.reconcile(&dom);
        assert!(registry.get(&AssetKey::ExternalScript("/a.js".into())).is_some());
        assert!(registry.get(&AssetKey::InlineScript("s1".into())).is_some());
        assert!(registry.get(&AssetKey::ExternalStyle("/a.css".into())).is_some());
        assert!(registry.get(&AssetKey::InlineStyle("st".into())).is_some());
        assert_eq!(registry.entries.len(), 4);
        Ok(())
    }
}
