//! Arena-backed document tree.
//!
//! Nodes are never freed: detaching a subtree only unlinks it from its parent,
//! so a `NodeId` stays valid for the lifetime of its `Dom`. The id index only
//! covers nodes connected to the document root and is rebuilt after every
//! structural mutation.

use std::collections::{HashMap, HashSet};

use crate::html::{is_void_tag, parse_html};
use crate::selector::{SelectorPart, parse_selector_groups};
use crate::{Error, Result};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum NodeType {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag_name: String,
    pub attrs: HashMap<String, String>,
    /// Value typed by the user; overrides the `value` attribute / text.
    pub(crate) value: Option<String>,
    pub(crate) checked: bool,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) id_index: HashMap<String, Vec<NodeId>>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: Option<NodeId>,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let checked = attrs.contains_key("checked");
        let element = Element {
            tag_name,
            attrs,
            value: None,
            checked,
        };
        let id = self.create_node(parent, NodeType::Element(element));
        if parent.is_some_and(|parent| self.is_connected(parent)) {
            if let Some(id_attr) = self.attr(id, "id").map(str::to_string) {
                self.index_id(&id_attr, id);
            }
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: Option<NodeId>, text: String) -> NodeId {
        self.create_node(parent, NodeType::Text(text))
    }

    pub fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn node_type(&self, node_id: NodeId) -> &NodeType {
        &self.nodes[node_id.0].node_type
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub fn is_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        &self.nodes[node_id.0].children
    }

    pub fn element_children(&self, node_id: NodeId) -> Vec<NodeId> {
        self.children(node_id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id).and_then(|element| element.attr(name))
    }

    pub fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.attr(node_id, name).is_some()
    }

    pub fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("setAttribute target is not an element".into()))?;
        let name = name.to_ascii_lowercase();
        let is_id = name == "id";
        element.attrs.insert(name, value.to_string());
        if is_id {
            self.rebuild_id_index();
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("removeAttribute target is not an element".into()))?;
        let removed = element.attrs.remove(name).is_some();
        if removed && name == "id" {
            self.rebuild_id_index();
        }
        Ok(())
    }

    /// First connected element with `id`, in document order.
    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).and_then(|ids| ids.first().copied())
    }

    pub(crate) fn index_id(&mut self, id: &str, node_id: NodeId) {
        if id.is_empty() {
            return;
        }
        self.id_index
            .entry(id.to_string())
            .or_default()
            .push(node_id);
    }

    pub(crate) fn rebuild_id_index(&mut self) {
        let mut next: HashMap<String, Vec<NodeId>> = HashMap::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if let NodeType::Element(element) = &self.nodes[node.0].node_type {
                if let Some(id) = element.attrs.get("id").filter(|id| !id.is_empty()) {
                    next.entry(id.clone()).or_default().push(node);
                }
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        self.id_index = next;
    }

    pub fn class_contains(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| has_class(element, class_name))
    }

    pub fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
        if !classes.iter().any(|name| name == class_name) {
            classes.push(class_name.to_string());
        }
        set_class_attr(element, &classes);
        Ok(())
    }

    pub fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("classList target is not an element".into()))?;
        if element.attrs.contains_key("class") {
            let mut classes = class_tokens(element.attrs.get("class").map(String::as_str));
            classes.retain(|name| name != class_name);
            set_class_attr(element, &classes);
        }
        Ok(())
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node_id, &mut out);
        out
    }

    fn collect_text(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match &self.nodes[node_id.0].node_type {
                NodeType::Document | NodeType::Element(_) => {
                    for child in &self.nodes[node_id.0].children {
                        self.collect_text(*child, out);
                    }
                }
                NodeType::Text(text) => out.push_str(text),
                NodeType::Doctype(_) => {}
            }
        })
    }

    pub fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::Runtime("textContent target is not an element".into()));
        }
        self.detach_children(node_id);
        if !value.is_empty() {
            self.create_text(Some(node_id), value.to_string());
        }
        self.rebuild_id_index();
        Ok(())
    }

    /// No element children and only whitespace text.
    pub fn is_node_empty(&self, node_id: NodeId) -> bool {
        self.element_children(node_id).is_empty() && self.text_content(node_id).trim().is_empty()
    }

    pub fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.dump_node_into(node_id, &mut out);
        out
    }

    fn dump_node_into(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            match &self.nodes[node_id.0].node_type {
                NodeType::Document => {
                    for child in &self.nodes[node_id.0].children {
                        self.dump_node_into(*child, out);
                    }
                }
                NodeType::Doctype(name) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeType::Text(text) => out.push_str(&escape_html_text_for_serialization(text)),
                NodeType::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag_name);
                    let mut attrs = element.attrs.iter().collect::<Vec<_>>();
                    attrs.sort_by(|(left, _), (right, _)| left.cmp(right));
                    for (k, v) in attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        out.push_str(&escape_html_attr_for_serialization(v));
                        out.push('"');
                    }
                    out.push('>');
                    if is_void_tag(&element.tag_name) {
                        return;
                    }
                    let raw_text_container = is_raw_text_tag(&element.tag_name);
                    for child in &self.nodes[node_id.0].children {
                        match &self.nodes[child.0].node_type {
                            NodeType::Text(text) if raw_text_container => out.push_str(text),
                            _ => self.dump_node_into(*child, out),
                        }
                    }
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                }
            }
        })
    }

    pub fn set_inner_html(&mut self, node_id: NodeId, html: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::Runtime("innerHTML target is not an element".into()));
        }
        let fragment = parse_html(html)?;
        self.detach_children(node_id);
        for child in fragment.nodes[fragment.root.0].children.clone() {
            if matches!(fragment.node_type(child), NodeType::Doctype(_)) {
                continue;
            }
            self.clone_subtree_from_dom(&fragment, child, Some(node_id))?;
        }
        self.rebuild_id_index();
        Ok(())
    }

    /// Copies `source_node` and its descendants out of `source` into this arena.
    pub fn clone_subtree_from_dom(
        &mut self,
        source: &Dom,
        source_node: NodeId,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            let node_type = match &source.nodes[source_node.0].node_type {
                NodeType::Document => {
                    return Err(Error::Runtime(
                        "cannot clone a document node into an element".into(),
                    ));
                }
                other => other.clone(),
            };
            let node = self.create_node(parent, node_type);
            for child in &source.nodes[source_node.0].children {
                self.clone_subtree_from_dom(source, *child, Some(node))?;
            }
            Ok(node)
        })
    }

    /// Swaps `node_id` for a copy of `source_node` at the same position.
    pub fn replace_with_subtree(
        &mut self,
        node_id: NodeId,
        source: &Dom,
        source_node: NodeId,
    ) -> Result<NodeId> {
        let parent = self
            .parent(node_id)
            .ok_or_else(|| Error::Runtime("replace target is detached".into()))?;
        let index = self.child_index(parent, node_id)?;
        let replacement = self.clone_subtree_from_dom(source, source_node, None)?;
        self.nodes[parent.0].children[index] = replacement;
        self.nodes[replacement.0].parent = Some(parent);
        self.nodes[node_id.0].parent = None;
        self.rebuild_id_index();
        Ok(replacement)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::Runtime("appendChild would create a cycle".into()));
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.rebuild_id_index();
        Ok(())
    }

    /// Swaps `old` for the detached node `new`.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self
            .parent(old)
            .ok_or_else(|| Error::Runtime("replaceWith target is detached".into()))?;
        self.detach(new);
        let index = self.child_index(parent, old)?;
        self.nodes[parent.0].children[index] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        self.rebuild_id_index();
        Ok(())
    }

    pub fn remove_node(&mut self, node_id: NodeId) {
        self.detach(node_id);
        self.rebuild_id_index();
    }

    fn detach(&mut self, node_id: NodeId) {
        if let Some(parent) = self.nodes[node_id.0].parent.take() {
            self.nodes[parent.0]
                .children
                .retain(|candidate| *candidate != node_id);
        }
    }

    fn detach_children(&mut self, node_id: NodeId) {
        let old_children = std::mem::take(&mut self.nodes[node_id.0].children);
        for child in old_children {
            self.nodes[child.0].parent = None;
        }
    }

    fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == child)
            .ok_or_else(|| Error::Runtime("node is not a child of its parent".into()))
    }

    /// Element descendants of `root` in document order, `root` excluded.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = self.nodes[root.0]
            .children
            .iter()
            .rev()
            .copied()
            .collect::<Vec<_>>();
        while let Some(node) = stack.pop() {
            if self.element(node).is_some() {
                out.push(node);
            }
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.query_selector_all_from(self.root, selector)
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all_from(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for candidate in self.descendants(root) {
            if self.matches_any_group(candidate, &groups) && seen.insert(candidate) {
                matched.push(candidate);
            }
        }
        Ok(matched)
    }

    pub fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        if self.element(node_id).is_none() {
            return Ok(false);
        }
        let groups = parse_selector_groups(selector)?;
        Ok(self.matches_any_group(node_id, &groups))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node_id: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if self.element(current).is_some() && self.matches_any_group(current, &groups) {
                return Ok(Some(current));
            }
            cursor = self.parent(current);
        }
        Ok(None)
    }

    fn matches_any_group(&self, node_id: NodeId, groups: &[Vec<SelectorPart>]) -> bool {
        groups
            .iter()
            .any(|steps| self.matches_selector_chain(node_id, steps))
    }

    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.is_tag(*node, tag))
    }

    pub fn head(&self) -> Option<NodeId> {
        self.first_by_tag("head")
    }

    pub fn body(&self) -> Option<NodeId> {
        self.first_by_tag("body")
    }

    /// Returns `<head>`, creating it (and `<html>` when missing) on demand.
    pub fn ensure_head(&mut self) -> NodeId {
        if let Some(head) = self.head() {
            return head;
        }
        let html = match self.first_by_tag("html") {
            Some(html) => html,
            None => {
                let html = self.create_element(None, "html".into(), HashMap::new());
                let existing = std::mem::take(&mut self.nodes[self.root.0].children);
                let (prolog, content): (Vec<_>, Vec<_>) = existing
                    .into_iter()
                    .partition(|node| matches!(self.nodes[node.0].node_type, NodeType::Doctype(_)));
                self.nodes[self.root.0].children = prolog;
                self.nodes[self.root.0].children.push(html);
                self.nodes[html.0].parent = Some(self.root);
                for child in content {
                    self.nodes[child.0].parent = Some(html);
                    self.nodes[html.0].children.push(child);
                }
                html
            }
        };
        let head = self.create_element(None, "head".into(), HashMap::new());
        self.nodes[head.0].parent = Some(html);
        self.nodes[html.0].children.insert(0, head);
        head
    }

    pub fn title(&self) -> String {
        self.first_by_tag("title")
            .map(|title| self.text_content(title).trim().to_string())
            .unwrap_or_default()
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let node = match self.first_by_tag("title") {
            Some(node) => node,
            None => {
                let head = self.ensure_head();
                self.create_element(Some(head), "title".into(), HashMap::new())
            }
        };
        self.set_text_content(node, title)
    }

    /// `href` of the first `<base>` element carrying one.
    pub fn base_href(&self) -> Option<String> {
        self.descendants(self.root)
            .into_iter()
            .filter(|node| self.is_tag(*node, "base"))
            .find_map(|node| self.attr(node, "href").map(str::to_string))
    }

    /// Current value of a form control.
    pub fn value(&self, node_id: NodeId) -> Option<String> {
        let element = self.element(node_id)?;
        if let Some(value) = &element.value {
            return Some(value.clone());
        }
        match element.tag_name.as_str() {
            "input" => {
                let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                match element.attr("value") {
                    Some(value) => Some(value.to_string()),
                    None if kind == "checkbox" || kind == "radio" => Some("on".to_string()),
                    None => Some(String::new()),
                }
            }
            "textarea" => Some(self.text_content(node_id)),
            "select" => {
                let options = self
                    .descendants(node_id)
                    .into_iter()
                    .filter(|node| self.is_tag(*node, "option"))
                    .collect::<Vec<_>>();
                let selected = options
                    .iter()
                    .copied()
                    .find(|option| self.has_attr(*option, "selected"))
                    .or_else(|| options.first().copied())?;
                Some(
                    self.attr(selected, "value")
                        .map(str::to_string)
                        .unwrap_or_else(|| self.text_content(selected).trim().to_string()),
                )
            }
            "button" | "option" => element.attr("value").map(str::to_string),
            _ => None,
        }
    }

    pub fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        let is_select = self.is_tag(node_id, "select");
        if is_select {
            for option in self.descendants(node_id) {
                if !self.is_tag(option, "option") {
                    continue;
                }
                let option_value = self
                    .attr(option, "value")
                    .map(str::to_string)
                    .unwrap_or_else(|| self.text_content(option).trim().to_string());
                if option_value == value {
                    self.set_attr(option, "selected", "")?;
                } else {
                    self.remove_attr(option, "selected")?;
                }
            }
            return Ok(());
        }
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("value target is not an element".into()))?;
        element.value = Some(value.to_string());
        Ok(())
    }

    pub fn is_checked(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some_and(|element| element.checked)
    }

    pub fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        let element = self
            .element_mut(node_id)
            .ok_or_else(|| Error::Runtime("checked target is not an element".into()))?;
        element.checked = checked;
        Ok(())
    }
}

pub(crate) fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub(crate) fn class_tokens(class_attr: Option<&str>) -> Vec<String> {
    class_attr
        .map(|value| value.split_whitespace().map(ToOwned::to_owned).collect())
        .unwrap_or_default()
}

pub(crate) fn set_class_attr(element: &mut Element, classes: &[String]) {
    if classes.is_empty() {
        element.attrs.remove("class");
    } else {
        element.attrs.insert("class".to_string(), classes.join(" "));
    }
}

pub(crate) fn is_raw_text_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

pub(crate) fn escape_html_text_for_serialization(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub(crate) fn escape_html_attr_for_serialization(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
