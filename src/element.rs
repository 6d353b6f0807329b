//! Element renderer: paints one view tree into one [`CellBuffer`] given a
//! [`ComputedLayout`]. Pure drawing — no reactivity, no I/O.

use crate::cell::CellBuffer;
use crate::color;
use crate::grapheme;
use crate::layout::ComputedLayout;
use crate::view::{NodeKind, NodeRef, OutlineKind};

/// Half-open rectangle in absolute buffer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl ClipRect {
    pub fn full(cols: u16, rows: u16) -> Self {
        Self { x: 0, y: 0, width: cols, height: rows }
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersection of two rectangles; `None` means no overlap.
    fn intersect(&self, other: &ClipRect) -> Option<ClipRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x as u32 + self.width as u32).min(other.x as u32 + other.width as u32);
        let y1 = (self.y as u32 + self.height as u32).min(other.y as u32 + other.height as u32);
        if x1 <= x0 as u32 || y1 <= y0 as u32 {
            return None;
        }
        Some(ClipRect {
            x: x0,
            y: y0,
            width: (x1 - x0 as u32) as u16,
            height: (y1 - y0 as u32) as u16,
        })
    }

    fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Paint `node` into `buf`, given its already-computed `layout`, at an
/// absolute origin `(parent_x, parent_y)` offset, restricted to `clip_rect`.
pub fn render_element(
    node: &NodeRef,
    buf: &mut CellBuffer,
    layout: &ComputedLayout,
    parent_x: u16,
    parent_y: u16,
    clip_rect: ClipRect,
) {
    let n = node.borrow();

    let Some(rect) = layout.get(&n.id()) else {
        return;
    };

    let abs_x = parent_x.saturating_add(rect.x);
    let abs_y = parent_y.saturating_add(rect.y);

    let node_rect = ClipRect {
        x: abs_x,
        y: abs_y,
        width: rect.width,
        height: rect.height,
    };

    // Step 3: early out if entirely outside the buffer (no margin needed —
    // the buffer's own bounds are the outermost clip).
    let buffer_rect = ClipRect::full(buf.cols(), buf.rows());
    if buffer_rect.intersect(&node_rect).is_none() {
        return;
    }

    let Some(visible) = clip_rect.intersect(&node_rect) else {
        return;
    };
    if visible.is_empty() {
        return;
    }

    let style = n.style();

    if let Some(bg) = &style.background {
        let tok = color::bg_token(bg);
        for y in visible.y..visible.y + visible.height {
            for x in visible.x..visible.x + visible.width {
                buf.set_code_point(y, x, ' ' as u32, None, Some(tok.clone()));
            }
        }
    }

    if let Some(outline) = &style.outline {
        draw_outline(buf, node_rect, visible, outline.kind, outline.color.as_ref());
    }

    match n.kind() {
        NodeKind::Text { content } => {
            draw_text(buf, content, abs_x, abs_y, visible, style.foreground.as_ref(), style.background.as_ref());
        }
        NodeKind::Input { value } => {
            draw_text(buf, value, abs_x, abs_y, visible, style.foreground.as_ref(), style.background.as_ref());
        }
        NodeKind::Block { children } => {
            let (pt, pr, pb, pl) = padding_cells(style);
            let inner = ClipRect {
                x: abs_x.saturating_add(pl),
                y: abs_y.saturating_add(pt),
                width: rect.width.saturating_sub(pl + pr),
                height: rect.height.saturating_sub(pt + pb),
            };
            let Some(child_clip) = visible.intersect(&inner) else {
                return;
            };

            // Z-stack children are already positioned to overlap by the
            // layout engine; painting in order is sufficient either way.
            for child in children {
                render_element(child, buf, layout, abs_x, abs_y, child_clip);
            }
        }
    }
}

fn padding_cells(style: &crate::view::Style) -> (u16, u16, u16, u16) {
    let px = |d: crate::view::Dimension| match d {
        crate::view::Dimension::Points(n) => n.max(0.0) as u16,
        _ => 0,
    };
    (
        px(style.padding.top),
        px(style.padding.right),
        px(style.padding.bottom),
        px(style.padding.left),
    )
}

fn draw_outline(
    buf: &mut CellBuffer,
    rect: ClipRect,
    visible: ClipRect,
    kind: OutlineKind,
    color_input: Option<&color::ColorInput>,
) {
    let (h, v, tl, tr, bl, br) = match kind {
        OutlineKind::Single => ('─', '│', '┌', '┐', '└', '┘'),
        OutlineKind::Double => ('═', '║', '╔', '╗', '╚', '╝'),
    };

    if rect.width == 0 || rect.height == 0 {
        return;
    }

    let fg = color_input.map(color::fg_token);
    let mut put = |x: u16, y: u16, ch: char| {
        if visible.contains(x, y) {
            buf.set_code_point(y, x, ch as u32, fg.clone(), None);
        }
    };

    let right = rect.x + rect.width - 1;
    let bottom = rect.y + rect.height - 1;

    // Sides first so the corners placed below overwrite their ends.
    for x in rect.x + 1..right {
        put(x, rect.y, h);
        put(x, bottom, h);
    }
    for y in rect.y + 1..bottom {
        put(rect.x, y, v);
        put(right, y, v);
    }

    put(rect.x, rect.y, tl);
    put(right, rect.y, tr);
    put(rect.x, bottom, bl);
    put(right, bottom, br);
}

/// Draw `content` starting at `(x, y)`, clipped to `visible`. Never wraps;
/// a grapheme that would be partially clipped at the visible boundary is
/// skipped whole rather than split.
fn draw_text(
    buf: &mut CellBuffer,
    content: &str,
    x: u16,
    y: u16,
    visible: ClipRect,
    fg: Option<&color::ColorInput>,
    bg: Option<&color::ColorInput>,
) {
    let fg_tok = fg.map(color::fg_token);
    let bg_tok = bg.map(color::bg_token);

    let mut col = x;
    for cluster in grapheme::segment(content) {
        let width = grapheme::measure(cluster);
        if width == 0 {
            continue;
        }
        let fits = (col..col + width as u16).all(|c| visible.contains(c, y));
        if fits {
            buf.set(y, col, cluster, fg_tok.clone(), bg_tok.clone());
        }
        col = col.saturating_add(width as u16);
        if col >= visible.x + visible.width {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::view::{Dimension as D, Node};

    #[test]
    fn text_node_draws_at_origin() {
        let root = Node::text(Some("greeting"), "Hello");
        let layout = compute_layout(&root, 80, 24).unwrap();
        let mut buf = CellBuffer::new(24, 80);
        render_element(&root, &mut buf, &layout, 0, 0, ClipRect::full(80, 24));
        assert_eq!(buf.get(0, 0).unwrap().glyph, "H");
        assert_eq!(buf.get(0, 4).unwrap().glyph, "o");
    }

    #[test]
    fn background_fills_rectangle() {
        let root = Node::block(Some("panel"));
        root.borrow_mut().set_width(D::Points(3.0));
        root.borrow_mut().set_height(D::Points(2.0));
        root.borrow_mut().set_background(Some(color::ColorInput::Named(color::NamedColor::Blue)));

        let layout = compute_layout(&root, 80, 24).unwrap();
        let mut buf = CellBuffer::new(24, 80);
        render_element(&root, &mut buf, &layout, 0, 0, ClipRect::full(80, 24));

        let cell = buf.get(0, 0).unwrap();
        assert!(cell.bg.is_some());
        assert_eq!(cell.glyph, " ");
    }

    #[test]
    fn single_outline_places_corners() {
        let root = Node::block(Some("box"));
        root.borrow_mut().set_width(D::Points(4.0));
        root.borrow_mut().set_height(D::Points(3.0));
        root.borrow_mut().set_outline(Some(crate::view::Outline {
            kind: OutlineKind::Single,
            color: None,
        }));

        let layout = compute_layout(&root, 80, 24).unwrap();
        let mut buf = CellBuffer::new(24, 80);
        render_element(&root, &mut buf, &layout, 0, 0, ClipRect::full(80, 24));

        assert_eq!(buf.get(0, 0).unwrap().glyph, "┌");
        assert_eq!(buf.get(0, 3).unwrap().glyph, "┐");
        assert_eq!(buf.get(2, 0).unwrap().glyph, "└");
        assert_eq!(buf.get(2, 3).unwrap().glyph, "┘");
    }

    #[test]
    fn clip_rect_outside_buffer_is_skipped() {
        let root = Node::text(Some("offscreen"), "hi");
        let mut layout = ComputedLayout::new();
        layout.insert(root.borrow().id(), crate::layout::ComputedRect { x: 0, y: 0, width: 2, height: 1 });
        let mut buf = CellBuffer::new(5, 5);
        // Clip rect entirely outside the node's drawn position.
        render_element(&root, &mut buf, &layout, 100, 100, ClipRect::full(5, 5));
        assert_eq!(buf.get(0, 0).unwrap().glyph, " ");
    }
}
