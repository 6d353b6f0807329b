//! Layout bridge: translates the view tree into the external flexbox
//! engine's input contract and back into a `ComputedLayout` map.
//!
//! The flexbox solver itself is treated as an external collaborator and
//! consumed through a single function call, via [`taffy`]. Rather than
//! pulling styles out of a global registry by index, this bridge walks the
//! retained [`crate::view`] tree directly and keys the result by
//! [`NodeId`] (stable across reconciliation) rather than by an explicit
//! string key, since not every node carries one.

use std::collections::HashMap;

use taffy::{
    AlignItems as TaffyAlignItems, AlignSelf as TaffyAlignSelf, AvailableSpace,
    Dimension as TaffyDimension, Display as TaffyDisplay, FlexDirection as TaffyFlexDirection,
    FlexWrap as TaffyFlexWrap, JustifyContent as TaffyJustifyContent, LengthPercentage,
    LengthPercentageAuto, NodeId as TaffyNodeId, Position as TaffyPosition, Rect as TaffyRect,
    Size, Style as TaffyStyle, TaffyTree,
};

use crate::error::LayoutError;
use crate::grapheme;
use crate::view::{self, Dimension, Node, NodeId, NodeKind, NodeRef};

/// One node's resolved rectangle, relative to the root container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComputedRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// `map<key, {x,y,width,height}>`, keyed by [`NodeId`].
pub type ComputedLayout = HashMap<NodeId, ComputedRect>;

fn to_taffy_dimension(d: Dimension) -> TaffyDimension {
    match d {
        Dimension::Auto => TaffyDimension::Auto,
        Dimension::Points(n) => TaffyDimension::Length(n),
        Dimension::Percent(p) => TaffyDimension::Percent(p / 100.0),
    }
}

fn to_taffy_lpa(d: Dimension) -> LengthPercentageAuto {
    match d {
        Dimension::Auto => LengthPercentageAuto::Auto,
        Dimension::Points(n) => LengthPercentageAuto::Length(n),
        Dimension::Percent(p) => LengthPercentageAuto::Percent(p / 100.0),
    }
}

fn to_taffy_lp(d: Dimension) -> LengthPercentage {
    match d {
        Dimension::Auto => LengthPercentage::Length(0.0),
        Dimension::Points(n) => LengthPercentage::Length(n),
        Dimension::Percent(p) => LengthPercentage::Percent(p / 100.0),
    }
}

fn build_style(node: &Node) -> TaffyStyle {
    let s = node.style();

    if matches!(s.display, view::Display::None) {
        return TaffyStyle {
            display: TaffyDisplay::None,
            ..Default::default()
        };
    }

    let is_text_like = matches!(node.kind(), NodeKind::Text { .. } | NodeKind::Input { .. });

    TaffyStyle {
        display: TaffyDisplay::Flex,
        position: match s.position {
            view::Position::Relative => TaffyPosition::Relative,
            view::Position::Absolute => TaffyPosition::Absolute,
        },
        flex_direction: match s.flex_direction {
            view::FlexDirection::Row => TaffyFlexDirection::Row,
            view::FlexDirection::Column => TaffyFlexDirection::Column,
            view::FlexDirection::RowReverse => TaffyFlexDirection::RowReverse,
            view::FlexDirection::ColumnReverse => TaffyFlexDirection::ColumnReverse,
        },
        flex_wrap: match s.flex_wrap {
            view::FlexWrap::NoWrap => TaffyFlexWrap::NoWrap,
            view::FlexWrap::Wrap => TaffyFlexWrap::Wrap,
        },
        justify_content: Some(match s.justify_content {
            view::Justify::Start => TaffyJustifyContent::FlexStart,
            view::Justify::End => TaffyJustifyContent::FlexEnd,
            view::Justify::Center => TaffyJustifyContent::Center,
            view::Justify::SpaceBetween => TaffyJustifyContent::SpaceBetween,
            view::Justify::SpaceAround => TaffyJustifyContent::SpaceAround,
            view::Justify::SpaceEvenly => TaffyJustifyContent::SpaceEvenly,
        }),
        align_items: Some(match s.align_items {
            view::Align::Start => TaffyAlignItems::FlexStart,
            view::Align::End => TaffyAlignItems::FlexEnd,
            view::Align::Center => TaffyAlignItems::Center,
            view::Align::Stretch => TaffyAlignItems::Stretch,
        }),
        align_self: s.align_self.map(|a| match a {
            view::Align::Start => TaffyAlignSelf::FlexStart,
            view::Align::End => TaffyAlignSelf::FlexEnd,
            view::Align::Center => TaffyAlignSelf::Center,
            view::Align::Stretch => TaffyAlignSelf::Stretch,
        }),
        flex_grow: s.flex_grow.0,
        flex_shrink: s.flex_shrink.0,
        flex_basis: to_taffy_dimension(s.flex_basis),
        size: if is_text_like {
            Size::auto()
        } else {
            Size {
                width: to_taffy_dimension(s.width),
                height: to_taffy_dimension(s.height),
            }
        },
        min_size: Size {
            width: to_taffy_dimension(s.min_width),
            height: to_taffy_dimension(s.min_height),
        },
        max_size: Size {
            width: to_taffy_dimension(s.max_width),
            height: to_taffy_dimension(s.max_height),
        },
        margin: TaffyRect {
            top: to_taffy_lpa(s.margin.top),
            right: to_taffy_lpa(s.margin.right),
            bottom: to_taffy_lpa(s.margin.bottom),
            left: to_taffy_lpa(s.margin.left),
        },
        padding: TaffyRect {
            top: to_taffy_lp(s.padding.top),
            right: to_taffy_lp(s.padding.right),
            bottom: to_taffy_lp(s.padding.bottom),
            left: to_taffy_lp(s.padding.left),
        },
        gap: Size {
            width: LengthPercentage::Length(s.gap as f32),
            height: LengthPercentage::Length(s.gap as f32),
        },
        ..Default::default()
    }
}

/// Intrinsic size for text/input leaves: `(measure_text_width(content), 1)`
/// falling back to grapheme-aware wrapping when a definite width
/// is available and the content is wider than it (multi-line height).
fn measure_leaf(content: &str, known: Size<Option<f32>>, available: Size<AvailableSpace>) -> Size<f32> {
    if content.is_empty() {
        return Size::ZERO;
    }
    let intrinsic_width = grapheme::measure_text(content) as f32;

    let avail_width = match (known.width, available.width) {
        (Some(w), _) => Some(w),
        (None, AvailableSpace::Definite(w)) => Some(w),
        _ => None,
    };

    let width = known.width.unwrap_or(intrinsic_width.min(avail_width.unwrap_or(intrinsic_width)).max(1.0));
    let height = known.height.unwrap_or_else(|| {
        match avail_width {
            Some(w) if w > 0.0 && intrinsic_width > w => grapheme::wrap(content, w as usize).len() as f32,
            _ => 1.0,
        }
    });

    Size { width, height }
}

/// Build a fresh `taffy` tree from `root` and compute layout against a
/// `(cols, rows)` container, returning each node's resolved rectangle.
pub fn compute_layout(root: &NodeRef, cols: u16, rows: u16) -> Result<ComputedLayout, LayoutError> {
    let mut tree: TaffyTree<TextContext> = TaffyTree::new();
    let mut taffy_root = None;

    insert_node(&mut tree, root, &mut taffy_root)?;
    let taffy_root = taffy_root.expect("insert_node always sets the root");

    let available = Size {
        width: AvailableSpace::Definite(cols as f32),
        height: AvailableSpace::Definite(rows as f32),
    };

    let mut measure_fn = |known: Size<Option<f32>>, available: Size<AvailableSpace>, _id: TaffyNodeId, context: Option<&mut TextContext>, _style: &TaffyStyle| {
        match context {
            Some(ctx) => measure_leaf(&ctx.content, known, available),
            None => Size::ZERO,
        }
    };

    tree.compute_layout_with_measure(taffy_root, available, &mut measure_fn)
        .map_err(|e| LayoutError(format!("{e:?}")))?;

    let mut out = ComputedLayout::new();
    collect(&tree, root, taffy_root, &mut out)?;
    Ok(out)
}

struct TextContext {
    content: String,
}

fn insert_node(tree: &mut TaffyTree<TextContext>, node: &NodeRef, out_id: &mut Option<TaffyNodeId>) -> Result<TaffyNodeId, LayoutError> {
    let n = node.borrow();
    let style = build_style(&n);

    let taffy_id = match n.kind() {
        NodeKind::Text { content } => tree
            .new_leaf_with_context(style, TextContext { content: content.clone() })
            .map_err(|e| LayoutError(format!("{e:?}")))?,
        NodeKind::Input { value } => tree
            .new_leaf_with_context(style, TextContext { content: value.clone() })
            .map_err(|e| LayoutError(format!("{e:?}")))?,
        NodeKind::Block { children } => {
            let children = children.clone();
            drop(n);
            let mut child_ids = Vec::with_capacity(children.len());
            for child in &children {
                let mut unused = None;
                child_ids.push(insert_node(tree, child, &mut unused)?);
            }
            let id = tree.new_with_children(style, &child_ids).map_err(|e| LayoutError(format!("{e:?}")))?;
            if out_id.is_none() {
                *out_id = Some(id);
            }
            return Ok(id);
        }
    };

    if out_id.is_none() {
        *out_id = Some(taffy_id);
    }
    Ok(taffy_id)
}

fn collect(tree: &TaffyTree<TextContext>, node: &NodeRef, taffy_id: TaffyNodeId, out: &mut ComputedLayout) -> Result<(), LayoutError> {
    let layout = tree.layout(taffy_id).map_err(|e| LayoutError(format!("{e:?}")))?;
    let n = node.borrow();
    out.insert(
        n.id(),
        ComputedRect {
            x: layout.location.x.round().max(0.0) as u16,
            y: layout.location.y.round().max(0.0) as u16,
            width: layout.size.width.round().max(0.0) as u16,
            height: layout.size.height.round().max(0.0) as u16,
        },
    );

    if let NodeKind::Block { children } = n.kind() {
        let children = children.clone();
        drop(n);
        let child_taffy_ids = tree.children(taffy_id).map_err(|e| LayoutError(format!("{e:?}")))?;
        for (child, child_id) in children.iter().zip(child_taffy_ids) {
            collect(tree, child, child_id, out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Dimension as D, Node};

    #[test]
    fn single_fixed_size_block_resolves_its_rect() {
        let root = Node::block(Some("root"));
        root.borrow_mut().set_width(D::Points(40.0));
        root.borrow_mut().set_height(D::Points(10.0));

        let layout = compute_layout(&root, 80, 24).unwrap();
        let rect = layout[&root.borrow().id()];
        assert_eq!(rect.width, 40);
        assert_eq!(rect.height, 10);
    }

    #[test]
    fn text_leaf_measures_its_content_width() {
        let root = Node::text(Some("greeting"), "hello");
        let layout = compute_layout(&root, 80, 24).unwrap();
        let rect = layout[&root.borrow().id()];
        assert_eq!(rect.width, 5);
        assert_eq!(rect.height, 1);
    }

    #[test]
    fn column_children_stack_vertically() {
        let root = Node::block(Some("root"));
        root.borrow_mut().set_width(D::Points(20.0));
        root.borrow_mut().set_height(D::Points(4.0));
        root.borrow_mut().set_flex_direction(view::FlexDirection::Column);
        let a = Node::text(Some("a"), "A");
        let b = Node::text(Some("b"), "B");
        root.borrow_mut().set_children(vec![a.clone(), b.clone()]);

        let layout = compute_layout(&root, 80, 24).unwrap();
        let ra = layout[&a.borrow().id()];
        let rb = layout[&b.borrow().id()];
        assert_eq!(ra.y, 0);
        assert_eq!(rb.y, 1);
    }
}
