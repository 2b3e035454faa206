//! Rendered page frame

use std::fmt;

use serde::Serialize;

/// One overlay panel as rendered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AsideBlock {
    pub id: String,
    pub heading: String,
    pub body: String,
    pub open: bool,
}

/// One rendered snapshot of the page, as text blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub header: String,
    pub asides: Vec<AsideBlock>,
    /// Featured collection link; empty off the home page
    pub featured: String,
    pub main: String,
    /// Empty while the footer is pending
    pub footer: String,
}

impl Frame {
    pub fn aside(&self, id: &str) -> Option<&AsideBlock> {
        self.asides.iter().find(|a| a.id == id)
    }

    /// Id of the open overlay, if any
    pub fn open_overlay(&self) -> Option<&str> {
        self.asides.iter().find(|a| a.open).map(|a| a.id.as_str())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  [HEADER] {}", self.header)?;
        for aside in &self.asides {
            let marker = if aside.open { "*" } else { " " };
            writeln!(f, "{} [{}] {}", marker, aside.heading, aside.body)?;
        }
        if !self.featured.is_empty() {
            writeln!(f, "  [FEATURED] {}", self.featured)?;
        }
        writeln!(f, "  [MAIN] {}", self.main)?;
        write!(f, "  [FOOTER] {}", self.footer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame {
            header: "Shop | Cart 1".to_string(),
            asides: vec![
                AsideBlock {
                    id: "cart-aside".to_string(),
                    heading: "CART".to_string(),
                    body: "1 x Snowboard".to_string(),
                    open: true,
                },
                AsideBlock {
                    id: "search-aside".to_string(),
                    heading: "SEARCH".to_string(),
                    body: "Search the store".to_string(),
                    open: false,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_display_marks_open_overlay() {
        let text = frame().to_string();
        assert!(text.contains("* [CART] 1 x Snowboard"));
        assert!(text.contains("  [SEARCH] Search the store"));
        assert!(!text.contains("[FEATURED]"));

        let featured = Frame {
            featured: "Winter Collection /collections/winter".to_string(),
            ..frame()
        };
        assert!(featured.to_string().contains("  [FEATURED] Winter Collection /collections/winter\n  [MAIN]"));
    }

    #[test]
    fn test_lookup() {
        let frame = frame();
        assert_eq!(frame.open_overlay(), Some("cart-aside"));
        assert_eq!(frame.aside("search-aside").unwrap().heading, "SEARCH");
        assert!(frame.aside("mobile-menu-aside").is_none());
    }
}
