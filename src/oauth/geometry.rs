//! Usage: Popup window sizing and the `window.open` feature string.

pub const DEFAULT_POPUP_WIDTH: u32 = 500;
pub const DEFAULT_POPUP_HEIGHT: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Position and size of a popup in logical pixels. Offsets may be negative on screens
/// smaller than the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupGeometry {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
}

impl PopupGeometry {
    /// Centers the popup in integer pixels. When the leftover space is odd the half pixel is
    /// dropped toward zero, so the popup sits at most half a pixel off true center.
    pub fn centered(screen: ScreenSize, width: u32, height: u32) -> Self {
        let offset = |outer: u32, inner: u32| (i64::from(outer) - i64::from(inner)) / 2;
        Self {
            width,
            height,
            left: offset(screen.width, width) as i32,
            top: offset(screen.height, height) as i32,
        }
    }

    pub fn features(&self) -> String {
        format!(
            "width={},height={},left={},top={},scrollbars=yes,resizable=yes",
            self.width, self.height, self.left, self.top
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_leftover_space_rounds_toward_zero() {
        let wide = PopupGeometry::centered(
            ScreenSize {
                width: 1921,
                height: 1081,
            },
            500,
            600,
        );
        assert_eq!((wide.left, wide.top), (710, 240));

        let narrow = PopupGeometry::centered(
            ScreenSize {
                width: 401,
                height: 601,
            },
            500,
            600,
        );
        assert_eq!((narrow.left, narrow.top), (-49, 0));
    }

    #[test]
    fn centers_default_popup_on_full_hd() {
        let geometry = PopupGeometry::centered(
            ScreenSize {
                width: 1920,
                height: 1080,
            },
            DEFAULT_POPUP_WIDTH,
            DEFAULT_POPUP_HEIGHT,
        );
        assert_eq!(geometry.left, 710);
        assert_eq!(geometry.top, 240);
        assert_eq!(
            geometry.features(),
            "width=500,height=600,left=710,top=240,scrollbars=yes,resizable=yes"
        );
    }

    #[test]
    fn small_screens_yield_negative_offsets() {
        let geometry = PopupGeometry::centered(
            ScreenSize {
                width: 400,
                height: 500,
            },
            500,
            600,
        );
        assert_eq!(geometry.left, -50);
        assert_eq!(geometry.top, -50);
    }
}
