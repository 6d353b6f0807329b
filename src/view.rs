//! The retained view tree: typed nodes (block / text / input), a style
//! record split into layout-affecting and render-affecting fields, and the
//! dirty-version bookkeeping the render loop uses to skip whole frames.
//!
//! The source this core is modeled on represents style as a JS proxy that
//! intercepts property writes. There is no such mechanism in an
//! ownership-first language, so each layout-class and render-class field
//! gets an explicit setter on [`Node`] instead; the setter is where the
//! idempotence check ("writing the same value bumps nothing") and the
//! layout_version/render_version bump happen, which keeps the one proxy
//! behavior the design actually depends on without inventing a dynamic
//! field-interception layer to get there.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::color::ColorInput;
use crate::grapheme;
use crate::state::keyboard::KeyboardEvent;

/// Stable identity for a node within one process. Also used directly as
/// the id space for [`crate::state::focus`] and `state::keyboard`'s
/// focused-handler registry.
pub type NodeId = usize;

thread_local! {
    static NEXT_ID: Cell<NodeId> = const { Cell::new(0) };
    static LAYOUT_VERSION: Cell<u64> = const { Cell::new(0) };
    static RENDER_VERSION: Cell<u64> = const { Cell::new(0) };
}

fn next_id() -> NodeId {
    NEXT_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

/// Current layout dirty version. Any layout-affecting mutation anywhere in
/// the tree bumps this; the render loop recomputes layout only when it has
/// changed since the previous frame.
pub fn layout_version() -> u64 {
    LAYOUT_VERSION.with(Cell::get)
}

/// Current render dirty version, for the same purpose restricted to
/// render-affecting (non-layout) mutations.
pub fn render_version() -> u64 {
    RENDER_VERSION.with(Cell::get)
}

fn bump_layout() {
    LAYOUT_VERSION.with(|c| c.set(c.get() + 1));
}

fn bump_render() {
    RENDER_VERSION.with(|c| c.set(c.get() + 1));
}

// =============================================================================
// Style
// =============================================================================

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Display {
    Flex,
    None,
}

impl Default for Display {
    fn default() -> Self {
        Display::Flex
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Position {
    Relative,
    Absolute,
}

impl Default for Position {
    fn default() -> Self {
        Position::Relative
    }
}

/// A layout dimension: intrinsic, a fixed cell count, or a percentage of
/// the containing block. Percentages are pre-resolved against the
/// container before the layout engine call; this type still carries
/// them so a node's own style can be inspected/diffed before that happens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Dimension {
    Auto,
    Points(f32),
    Percent(f32),
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension::Auto
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Rect<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Rect<T> {
    pub fn all(v: T) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }
}

pub type EdgeDimensions = Rect<Dimension>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlexDirection {
    Row,
    Column,
    RowReverse,
    ColumnReverse,
}

impl Default for FlexDirection {
    fn default() -> Self {
        FlexDirection::Column
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

impl Default for FlexWrap {
    fn default() -> Self {
        FlexWrap::NoWrap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Justify {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

impl Default for Justify {
    fn default() -> Self {
        Justify::Start
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Align {
    Start,
    End,
    Center,
    Stretch,
}

impl Default for Align {
    fn default() -> Self {
        Align::Stretch
    }
}

/// `stack == "z"` in the source: children are laid out on top of one
/// another rather than flowed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stack {
    Normal,
    Z,
}

impl Default for Stack {
    fn default() -> Self {
        Stack::Normal
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutlineKind {
    Single,
    Double,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outline {
    pub kind: OutlineKind,
    pub color: Option<ColorInput>,
}

/// Layout-affecting and render-affecting fields, split exactly as the data
/// model describes. Field writes never happen directly (all fields are
/// `pub(crate)`-free but mutated only through [`Node`]'s setters), which is
/// what lets the setters enforce the idempotence-and-version-bump contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    // --- layout-affecting ---
    pub display: Display,
    pub position: Position,
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub min_height: Dimension,
    pub max_width: Dimension,
    pub max_height: Dimension,
    pub padding: EdgeDimensions,
    pub margin: EdgeDimensions,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: OrderedF32,
    pub flex_shrink: OrderedF32,
    pub flex_basis: Dimension,
    pub gap: u16,
    pub justify_content: Justify,
    pub align_items: Align,
    pub align_self: Option<Align>,
    pub stack: Stack,
    // --- render-affecting ---
    pub foreground: Option<ColorInput>,
    pub background: Option<ColorInput>,
    pub outline: Option<Outline>,
    pub scroll_region: bool,
}

/// `f32` wrapper with a `PartialEq` that only this module needs: NaN never
/// appears in practice (flex-grow/shrink are user-supplied finite
/// numbers), so deriving `PartialEq` on `Style` does not need `Eq`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderedF32(pub f32);

impl PartialEq for OrderedF32 {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl From<f32> for OrderedF32 {
    fn from(v: f32) -> Self {
        Self(v)
    }
}

// =============================================================================
// Node
// =============================================================================

pub type KeyHook = Box<dyn Fn(&KeyboardEvent) -> bool>;
pub type NodeRef = Rc<RefCell<Node>>;

pub enum NodeKind {
    Block { children: Vec<NodeRef> },
    Text { content: String },
    Input { value: String },
}

pub struct Node {
    id: NodeId,
    key: Option<String>,
    focusable: bool,
    style: Style,
    key_hooks: Vec<KeyHook>,
    kind: NodeKind,
}

impl Node {
    fn new(key: Option<String>, kind: NodeKind) -> NodeRef {
        Rc::new(RefCell::new(Node {
            id: next_id(),
            key,
            focusable: false,
            style: Style::default(),
            key_hooks: Vec::new(),
            kind,
        }))
    }

    pub fn block(key: Option<&str>) -> NodeRef {
        Self::new(key.map(str::to_string), NodeKind::Block { children: Vec::new() })
    }

    pub fn text(key: Option<&str>, content: impl Into<String>) -> NodeRef {
        Self::new(key.map(str::to_string), NodeKind::Text { content: content.into() })
    }

    pub fn input(key: Option<&str>, value: impl Into<String>) -> NodeRef {
        Self::new(key.map(str::to_string), NodeKind::Input { value: value.into() })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }

    /// This node's id, used as the focus identity, if it opted in via
    /// [`Self::set_focusable`]. A node that never opts in is simply absent
    /// from the focusable list the caller assembles for `state::focus`.
    pub fn focus_key(&self) -> Option<NodeId> {
        self.focusable.then_some(self.id)
    }

    pub fn set_focusable(&mut self, focusable: bool) {
        self.focusable = focusable;
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn key_hooks(&self) -> &[KeyHook] {
        &self.key_hooks
    }

    pub fn add_key_hook(&mut self, hook: KeyHook) {
        self.key_hooks.push(hook);
    }

    pub fn clear_key_hooks(&mut self) {
        self.key_hooks.clear();
    }

    // --- layout-affecting setters ---

    pub fn set_display(&mut self, v: Display) {
        set_layout(&mut self.style.display, v);
    }
    pub fn set_position(&mut self, v: Position) {
        set_layout(&mut self.style.position, v);
    }
    pub fn set_width(&mut self, v: Dimension) {
        set_layout(&mut self.style.width, v);
    }
    pub fn set_height(&mut self, v: Dimension) {
        set_layout(&mut self.style.height, v);
    }
    pub fn set_min_width(&mut self, v: Dimension) {
        set_layout(&mut self.style.min_width, v);
    }
    pub fn set_min_height(&mut self, v: Dimension) {
        set_layout(&mut self.style.min_height, v);
    }
    pub fn set_max_width(&mut self, v: Dimension) {
        set_layout(&mut self.style.max_width, v);
    }
    pub fn set_max_height(&mut self, v: Dimension) {
        set_layout(&mut self.style.max_height, v);
    }
    pub fn set_padding(&mut self, v: EdgeDimensions) {
        set_layout(&mut self.style.padding, v);
    }
    pub fn set_margin(&mut self, v: EdgeDimensions) {
        set_layout(&mut self.style.margin, v);
    }
    pub fn set_flex_direction(&mut self, v: FlexDirection) {
        set_layout(&mut self.style.flex_direction, v);
    }
    pub fn set_flex_wrap(&mut self, v: FlexWrap) {
        set_layout(&mut self.style.flex_wrap, v);
    }
    pub fn set_flex_grow(&mut self, v: f32) {
        set_layout(&mut self.style.flex_grow, OrderedF32(v));
    }
    pub fn set_flex_shrink(&mut self, v: f32) {
        set_layout(&mut self.style.flex_shrink, OrderedF32(v));
    }
    pub fn set_flex_basis(&mut self, v: Dimension) {
        set_layout(&mut self.style.flex_basis, v);
    }
    pub fn set_gap(&mut self, v: u16) {
        set_layout(&mut self.style.gap, v);
    }
    pub fn set_justify_content(&mut self, v: Justify) {
        set_layout(&mut self.style.justify_content, v);
    }
    pub fn set_align_items(&mut self, v: Align) {
        set_layout(&mut self.style.align_items, v);
    }
    pub fn set_align_self(&mut self, v: Option<Align>) {
        set_layout(&mut self.style.align_self, v);
    }
    pub fn set_stack(&mut self, v: Stack) {
        set_layout(&mut self.style.stack, v);
    }

    // --- render-affecting setters ---

    pub fn set_foreground(&mut self, v: Option<ColorInput>) {
        set_render(&mut self.style.foreground, v);
    }
    pub fn set_background(&mut self, v: Option<ColorInput>) {
        set_render(&mut self.style.background, v);
    }
    pub fn set_outline(&mut self, v: Option<Outline>) {
        set_render(&mut self.style.outline, v);
    }
    /// Also used by the render loop as a hint that this node's inner
    /// (padding-subtracted) rectangle is a scroll-band candidate.
    pub fn set_scroll_region(&mut self, v: bool) {
        set_render(&mut self.style.scroll_region, v);
    }

    // --- children (Block only) ---

    pub fn children(&self) -> &[NodeRef] {
        match &self.kind {
            NodeKind::Block { children } => children,
            _ => &[],
        }
    }

    pub fn push_child(&mut self, child: NodeRef) {
        if let NodeKind::Block { children } = &mut self.kind {
            children.push(child);
            bump_layout();
        }
    }

    pub fn set_children(&mut self, new_children: Vec<NodeRef>) {
        if let NodeKind::Block { children } = &mut self.kind {
            *children = new_children;
            bump_layout();
        }
    }

    // --- content (Text/Input) ---

    /// Update a text node's content. Per the data model: if the node's own
    /// width *and* height are both numeric (not auto), only `render_version`
    /// bumps; otherwise the content can change the node's intrinsic size,
    /// so `layout_version` bumps instead.
    pub fn set_text_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        let NodeKind::Text { content: slot } = &mut self.kind else {
            return;
        };
        if *slot == content {
            return;
        }
        *slot = content;
        if self.style.width_is_numeric() && self.style.height_is_numeric() {
            bump_render();
        } else {
            bump_layout();
        }
    }

    pub fn set_input_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        let NodeKind::Input { value: slot } = &mut self.kind else {
            return;
        };
        if *slot == value {
            return;
        }
        *slot = value;
        if self.style.width_is_numeric() && self.style.height_is_numeric() {
            bump_render();
        } else {
            bump_layout();
        }
    }

    /// Intrinsic measured size for the layout bridge's `measured_size`
    /// field: text/input nodes measure their content; blocks have
    /// none.
    pub fn measured_size(&self) -> Option<(usize, usize)> {
        match &self.kind {
            NodeKind::Text { content } => Some((grapheme::measure_text(content), 1)),
            NodeKind::Input { value } => Some((grapheme::measure_text(value), 1)),
            NodeKind::Block { .. } => None,
        }
    }

    /// A short string capturing this node's render-affecting state plus
    /// text content, used by the render loop to build the per-node
    /// signature map for the dirty-rect and scroll fast paths.
    pub fn signature(&self) -> String {
        let mut s = String::new();
        if let Some(fg) = &self.style.foreground {
            s.push_str(&format!("{fg:?}"));
        }
        s.push(';');
        if let Some(bg) = &self.style.background {
            s.push_str(&format!("{bg:?}"));
        }
        s.push(';');
        if let Some(outline) = &self.style.outline {
            s.push_str(&format!("{:?}/{:?}", outline.kind, outline.color));
        }
        s.push(';');
        match &self.kind {
            NodeKind::Text { content } => s.push_str(content),
            NodeKind::Input { value } => s.push_str(value),
            NodeKind::Block { .. } => {}
        }
        s
    }
}

impl Style {
    fn width_is_numeric(&self) -> bool {
        !matches!(self.width, Dimension::Auto)
    }
    fn height_is_numeric(&self) -> bool {
        !matches!(self.height, Dimension::Auto)
    }
}

fn set_layout<T: PartialEq>(slot: &mut T, value: T) {
    if *slot == value {
        return;
    }
    *slot = value;
    bump_layout();
}

fn set_render<T: PartialEq>(slot: &mut T, value: T) {
    if *slot == value {
        return;
    }
    *slot = value;
    bump_render();
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile the previous retained tree against a freshly-built immediate-
/// mode tree. Nodes match if they have the same kind and either
/// the same explicit key, or (when both are unkeyed) the same position
/// among siblings. On a match, the previous node's identity is kept and
/// its mutable fields are synced from `next`; otherwise `next` is adopted
/// wholesale. Returns the retained node to use going forward.
pub fn reconcile(prev: &NodeRef, next: NodeRef) -> NodeRef {
    let same_kind = {
        let p = prev.borrow();
        let n = next.borrow();
        std::mem::discriminant(&p.kind) == std::mem::discriminant(&n.kind)
            && p.key == n.key
    };

    if !same_kind {
        return next;
    }

    {
        let mut p = prev.borrow_mut();
        let n = next.borrow();

        if p.style != n.style {
            sync_style(&mut p, &n);
        }
        p.focusable = n.focusable;

        match (&mut p.kind, &n.kind) {
            (NodeKind::Text { .. }, NodeKind::Text { content }) => {
                p.set_text_content(content.clone());
            }
            (NodeKind::Input { .. }, NodeKind::Input { value }) => {
                p.set_input_value(value.clone());
            }
            _ => {}
        }
    }

    let next_children: Vec<NodeRef> = next.borrow().children().to_vec();
    if !next_children.is_empty() || matches!(next.borrow().kind, NodeKind::Block { .. }) {
        let reconciled = reconcile_children(prev.borrow().children(), next_children);
        prev.borrow_mut().set_children(reconciled);
    }

    prev.clone()
}

fn sync_style(p: &mut Node, n: &Node) {
    let layout_changed = {
        let a = &p.style;
        let b = &n.style;
        a.display != b.display
            || a.position != b.position
            || a.width != b.width
            || a.height != b.height
            || a.min_width != b.min_width
            || a.min_height != b.min_height
            || a.max_width != b.max_width
            || a.max_height != b.max_height
            || a.padding != b.padding
            || a.margin != b.margin
            || a.flex_direction != b.flex_direction
            || a.flex_wrap != b.flex_wrap
            || a.flex_grow != b.flex_grow
            || a.flex_shrink != b.flex_shrink
            || a.flex_basis != b.flex_basis
            || a.gap != b.gap
            || a.justify_content != b.justify_content
            || a.align_items != b.align_items
            || a.align_self != b.align_self
            || a.stack != b.stack
    };
    let render_changed = {
        let a = &p.style;
        let b = &n.style;
        a.foreground != b.foreground || a.background != b.background || a.outline != b.outline || a.scroll_region != b.scroll_region
    };
    p.style = n.style.clone();
    if layout_changed {
        bump_layout();
    }
    if render_changed {
        bump_render();
    }
}

/// Reconcile a Block's children: keyed children reconcile through a
/// key→node map, unkeyed children reconcile by position.
fn reconcile_children(prev: &[NodeRef], next: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut by_key: std::collections::HashMap<String, NodeRef> = std::collections::HashMap::new();
    for p in prev {
        if let Some(k) = p.borrow().key() {
            by_key.insert(k.to_string(), p.clone());
        }
    }

    let mut out = Vec::with_capacity(next.len());
    for (i, n) in next.into_iter().enumerate() {
        let key = n.borrow().key().map(str::to_string);
        let matched = match &key {
            Some(k) => by_key.get(k).cloned(),
            None => prev.get(i).cloned(),
        };
        match matched {
            Some(p) => out.push(reconcile(&p, n)),
            None => out.push(n),
        }
    }
    out
}
