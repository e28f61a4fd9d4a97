//! Placement of the stamp on the 3x3 page grid.

use crate::config::{HorizontalAnchor, StampStyle, VerticalAnchor};
use crate::pdf::PageBox;
use crate::render::metrics::Font;

pub const STAMP_FONT: Font = Font::HelveticaBold;
pub const FONT_SIZE: f32 = 10.0;
pub const MARGIN: f32 = 10.0;
pub const TEXT_HEIGHT: f32 = 10.0;
pub const BOX_PADDING: f32 = 2.0;

/// Rectangle stroked around the label when a box width is configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub line_width: f32,
}

/// Resolved coordinates for one label on one page, in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampGeometry {
    /// Start of the text baseline.
    pub text_x: f32,
    pub text_y: f32,
    pub text_width: f32,
    pub frame: Option<Frame>,
}

impl StampGeometry {
    pub fn compute(label: &str, style: &StampStyle, page: &PageBox) -> Self {
        let text_width = STAMP_FONT.text_width(label, FONT_SIZE);
        let (width, height) = (page.width(), page.height());
        let vertical = style.position.vertical;
        let horizontal = style.position.horizontal;

        let anchor_y = match vertical {
            VerticalAnchor::Top => height - MARGIN - TEXT_HEIGHT,
            VerticalAnchor::Middle => height / 2.0,
            VerticalAnchor::Bottom => MARGIN + TEXT_HEIGHT,
        };
        let anchor_x = match horizontal {
            HorizontalAnchor::Left => MARGIN + text_width,
            HorizontalAnchor::Center => width / 2.0,
            HorizontalAnchor::Right => width - MARGIN,
        };

        let x = anchor_x + style.x_offset as f32;
        let y = anchor_y + style.y_offset as f32;

        let (text_x, text_y, frame) = if style.draws_box() {
            let box_width = text_width + 2.0 * BOX_PADDING;
            let box_height = TEXT_HEIGHT + 2.0 * BOX_PADDING;

            let box_x = match horizontal {
                HorizontalAnchor::Left | HorizontalAnchor::Right => x - text_width - BOX_PADDING,
                HorizontalAnchor::Center => x - box_width / 2.0,
            };
            let box_y = match vertical {
                VerticalAnchor::Top => y - TEXT_HEIGHT - BOX_PADDING,
                VerticalAnchor::Middle => y - box_height / 2.0,
                VerticalAnchor::Bottom => y - BOX_PADDING,
            };
            let text_x = match horizontal {
                HorizontalAnchor::Left => box_x + BOX_PADDING,
                HorizontalAnchor::Center => x - text_width / 2.0,
                HorizontalAnchor::Right => box_x + box_width - BOX_PADDING - text_width,
            };

            let frame = Frame {
                x: box_x,
                y: box_y,
                width: box_width,
                height: box_height,
                line_width: style.box_width,
            };
            (text_x, box_y + BOX_PADDING, Some(frame))
        } else {
            let text_x = match horizontal {
                HorizontalAnchor::Left | HorizontalAnchor::Right => x - text_width,
                HorizontalAnchor::Center => x - text_width / 2.0,
            };
            (text_x, y, None)
        };

        // Pages whose box does not start at the origin.
        let frame = frame.map(|f| Frame {
            x: f.x + page.left,
            y: f.y + page.bottom,
            ..f
        });

        StampGeometry {
            text_x: text_x + page.left,
            text_y: text_y + page.bottom,
            text_width,
            frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampPosition;

    const LABEL: &str = "ABC00001";

    fn style(position: &str) -> StampStyle {
        StampStyle {
            position: position.parse::<StampPosition>().unwrap(),
            ..StampStyle::default()
        }
    }

    fn boxed(position: &str) -> StampStyle {
        StampStyle {
            box_width: 1.0,
            ..style(position)
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_bottom_right_without_box() {
        let geometry = StampGeometry::compute(LABEL, &style("bottom-right"), &PageBox::LETTER);
        let tw = geometry.text_width;

        assert!(approx(tw, 49.46));
        assert!(approx(geometry.text_x, 612.0 - 10.0 - tw));
        assert!(approx(geometry.text_y, 20.0));
        assert!(geometry.frame.is_none());
    }

    #[test]
    fn test_left_and_center_without_box() {
        let left = StampGeometry::compute(LABEL, &style("top-left"), &PageBox::LETTER);
        assert!(approx(left.text_x, MARGIN), "left text starts at the margin");
        assert!(approx(left.text_y, 792.0 - 20.0));

        let center = StampGeometry::compute(LABEL, &style("middle-center"), &PageBox::LETTER);
        assert!(approx(center.text_x + center.text_width / 2.0, 306.0));
        assert!(approx(center.text_y, 396.0));
    }

    #[test]
    fn test_box_stays_inside_margin() {
        for position in [
            "top-left",
            "top-center",
            "top-right",
            "middle-left",
            "middle-center",
            "middle-right",
            "bottom-left",
            "bottom-center",
            "bottom-right",
        ] {
            let geometry = StampGeometry::compute(LABEL, &boxed(position), &PageBox::LETTER);
            let frame = geometry.frame.unwrap();
            assert!(frame.x >= 0.0, "{} box clips left edge", position);
            assert!(frame.y >= 0.0, "{} box clips bottom edge", position);
            assert!(frame.x + frame.width <= 612.0, "{} box clips right edge", position);
            assert!(frame.y + frame.height <= 792.0, "{} box clips top edge", position);

            assert!(geometry.text_x >= frame.x);
            assert!(geometry.text_x + geometry.text_width <= frame.x + frame.width + 0.01);
            assert!(approx(geometry.text_y, frame.y + BOX_PADDING));
        }
    }

    #[test]
    fn test_boxed_bottom_right_geometry() {
        let geometry = StampGeometry::compute(LABEL, &boxed("bottom-right"), &PageBox::LETTER);
        let tw = geometry.text_width;
        let frame = geometry.frame.unwrap();

        assert!(approx(frame.x, 602.0 - tw - BOX_PADDING));
        assert!(approx(frame.y, 18.0));
        assert!(approx(frame.width, tw + 4.0));
        assert!(approx(frame.height, 14.0));
        assert!(approx(geometry.text_x, frame.x + frame.width - BOX_PADDING - tw));
        assert_eq!(frame.line_width, 1.0);
    }

    #[test]
    fn test_offsets_are_additive() {
        let base = StampGeometry::compute(LABEL, &style("bottom-left"), &PageBox::LETTER);
        let shifted_style = StampStyle {
            x_offset: 15,
            y_offset: -5,
            ..style("bottom-left")
        };
        let shifted = StampGeometry::compute(LABEL, &shifted_style, &PageBox::LETTER);

        assert!(approx(shifted.text_x - base.text_x, 15.0));
        assert!(approx(shifted.text_y - base.text_y, -5.0));
    }

    #[test]
    fn test_page_box_origin_is_respected() {
        let cropped = PageBox {
            left: 100.0,
            bottom: 50.0,
            right: 712.0,
            top: 842.0,
        };
        let at_origin = StampGeometry::compute(LABEL, &boxed("bottom-right"), &PageBox::LETTER);
        let moved = StampGeometry::compute(LABEL, &boxed("bottom-right"), &cropped);

        assert!(approx(moved.text_x - at_origin.text_x, 100.0));
        assert!(approx(moved.text_y - at_origin.text_y, 50.0));
        assert!(approx(moved.frame.unwrap().y - at_origin.frame.unwrap().y, 50.0));
    }
}
