//! Portable Text renderer.
//!
//! Rendering is a structural recursion over the document, dispatching every node to a rule
//! found in a flat [`RuleTable`]. The output node type `O` is left to the caller: the site
//! renders to [`Markup`](crate::html::Markup), tests render to a tree they can inspect.
//!
//! Nodes with no matching rule are passed through: their children are spliced in the
//! parent output, without any wrapping.

use std::collections::HashMap;

use tracing::debug;

use crate::portable_text::{Block, Inline, MarkDef, Node, Span};

pub type TextRule<O> = Box<dyn Fn(&str) -> O + Send + Sync>;
pub type BlockRule<O> = Box<dyn Fn(Vec<O>, &Block) -> O + Send + Sync>;
pub type ListRule<O> = Box<dyn Fn(Vec<O>, &str) -> O + Send + Sync>;
pub type MarkRule<O> = Box<dyn Fn(Vec<O>, &MarkValue) -> O + Send + Sync>;
pub type TypeRule<O> = Box<dyn Fn(&Node) -> O + Send + Sync>;

/// The value a mark rule is called with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkValue<'a> {
    /// A decorator such as `strong`, `em` or `code`.
    Decorator(&'a str),
    /// An annotation, e.g. a link, with its definition from the enclosing block.
    Annotation(&'a MarkDef),
}

/// Rendering rules, keyed by block style, list type, mark name and embedded object type.
pub struct RuleTable<O> {
    text: TextRule<O>,
    block: HashMap<String, BlockRule<O>>,
    list: HashMap<String, ListRule<O>>,
    list_item: HashMap<String, BlockRule<O>>,
    marks: HashMap<String, MarkRule<O>>,
    types: HashMap<String, TypeRule<O>>,
}

impl<O> RuleTable<O> {
    /// Creates an empty table. `text` converts raw span text to an output node.
    pub fn new(text: impl Fn(&str) -> O + Send + Sync + 'static) -> Self {
        RuleTable {
            text: Box::new(text),
            block: HashMap::new(),
            list: HashMap::new(),
            list_item: HashMap::new(),
            marks: HashMap::new(),
            types: HashMap::new(),
        }
    }

    pub fn block(mut self, style: &str, rule: impl Fn(Vec<O>, &Block) -> O + Send + Sync + 'static) -> Self {
        self.block.insert(style.to_string(), Box::new(rule));
        self
    }

    pub fn list(mut self, list_type: &str, rule: impl Fn(Vec<O>, &str) -> O + Send + Sync + 'static) -> Self {
        self.list.insert(list_type.to_string(), Box::new(rule));
        self
    }

    pub fn list_item(mut self, list_type: &str, rule: impl Fn(Vec<O>, &Block) -> O + Send + Sync + 'static) -> Self {
        self.list_item.insert(list_type.to_string(), Box::new(rule));
        self
    }

    /// Registers a rule for a decorator name or an annotation type.
    pub fn mark(mut self, name: &str, rule: impl Fn(Vec<O>, &MarkValue) -> O + Send + Sync + 'static) -> Self {
        self.marks.insert(name.to_string(), Box::new(rule));
        self
    }

    /// Registers a rule for a top-level object type, e.g. `image`.
    pub fn embedded(mut self, type_name: &str, rule: impl Fn(&Node) -> O + Send + Sync + 'static) -> Self {
        self.types.insert(type_name.to_string(), Box::new(rule));
        self
    }
}

/// Renders a document to a sequence of output nodes.
pub fn render<O>(document: &[Node], rules: &RuleTable<O>) -> Vec<O> {
    let mut out = Vec::new();
    let mut rest = document;

    while let Some((first, tail)) = rest.split_first() {
        if first.as_list_item().is_some() {
            // Take all contiguous list items, they're split into list runs afterwards
            let len = rest.iter().take_while(|n| n.as_list_item().is_some()).count();
            let items = rest[..len].iter().filter_map(Node::as_list_item).collect::<Vec<_>>();
            render_list_runs(&items, rules, &mut out);
            rest = &rest[len..];
            continue;
        }

        match first {
            Node::Block(block) => {
                let children = render_children(block, rules);
                wrap(rules.block.get(block.style()), children, &mut out, |rule, children| rule(children, block));
            }
            node => match rules.types.get(node.type_name()) {
                Some(rule) => out.push(rule(node)),
                None => debug!("No rule for embedded type '{}', skipping it", node.type_name()),
            },
        }
        rest = tail;
    }

    out
}

/// Length of the list run starting at the first item: following items at the same level and
/// with the same list type, and deeper items that will be nested.
fn list_run_len(items: &[&Block]) -> usize {
    let first = items[0];
    let base = first.level();

    1 + items[1..]
        .iter()
        .take_while(|item| item.level() > base || (item.level() == base && item.list_item == first.list_item))
        .count()
}

fn render_list_runs<O>(items: &[&Block], rules: &RuleTable<O>, out: &mut Vec<O>) {
    let mut rest = items;
    while !rest.is_empty() {
        let len = list_run_len(rest);
        render_list(&rest[..len], rules, out);
        rest = &rest[len..];
    }
}

fn render_list<O>(items: &[&Block], rules: &RuleTable<O>, out: &mut Vec<O>) {
    let base = items[0].level();
    let list_type = items[0].list_item.as_deref().unwrap_or_default();
    let item_rule = rules.list_item.get(list_type);

    let mut rendered = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let item = items[i];
        let mut children = render_children(item, rules);

        // Deeper items following this one are nested lists within this item
        let nested_end = items[i + 1..]
            .iter()
            .position(|next| next.level() <= base)
            .map_or(items.len(), |pos| i + 1 + pos);
        render_list_runs(&items[i + 1..nested_end], rules, &mut children);

        wrap(item_rule, children, &mut rendered, |rule, children| rule(children, item));
        i = nested_end;
    }

    wrap(rules.list.get(list_type), rendered, out, |rule, children| rule(children, list_type));
}

fn render_children<O>(block: &Block, rules: &RuleTable<O>) -> Vec<O> {
    block
        .children
        .iter()
        .filter_map(|child| match child {
            Inline::Span(span) => Some(render_span(span, block, rules)),
            Inline::Unknown { type_name, .. } => {
                debug!("No rule for inline type '{}', skipping it", type_name);
                None
            }
        })
        .collect()
}

/// Marks are nested in declaration order: the first mark is the outermost wrapper.
fn render_span<O>(span: &Span, block: &Block, rules: &RuleTable<O>) -> O {
    let mut node = (rules.text)(&span.text);

    for mark in span.marks.iter().rev() {
        let (rule_name, value) = match block.mark_def(mark) {
            Some(def) => (def.type_name.as_str(), MarkValue::Annotation(def)),
            None => (mark.as_str(), MarkValue::Decorator(mark)),
        };

        match rules.marks.get(rule_name) {
            Some(rule) => node = rule(vec![node], &value),
            // Also covers annotation references with no definition in the block
            None => debug!("Unresolved mark '{}', rendering as plain text", mark),
        }
    }

    node
}

/// Applies `rule` to `children` if there is one, otherwise passes the children through.
fn wrap<O, R: ?Sized>(rule: Option<&Box<R>>, children: Vec<O>, out: &mut Vec<O>, apply: impl FnOnce(&R, Vec<O>) -> O) {
    match rule {
        Some(rule) => out.push(apply(&**rule, children)),
        None => out.extend(children),
    }
}
