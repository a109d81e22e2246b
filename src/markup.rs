//! Markup conversion collaborators
//!
//! The reducer only needs two conversions: plain text to display markup, and
//! traceback lines (which carry terminal escapes) to display markup. Both are
//! behind traits so the host can supply its own renderer.

use regex::Regex;
use std::sync::OnceLock;
use strip_ansi_escapes::strip_str;

/// Converts text to display markup
pub trait MarkupRenderer: Send + Sync {
    /// Render plain text to markup
    fn render_text(&self, text: &str) -> String;

    /// Fresh converter for the lines of one traceback.
    ///
    /// Style state may carry from one line to the next; it never outlives
    /// the converter.
    fn traceback_converter(&self) -> Box<dyn LineConverter>;
}

/// Stateful line-by-line converter
pub trait LineConverter {
    fn convert_line(&mut self, line: &str) -> String;
}

/// HTML renderer with SGR escape support for tracebacks
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlMarkup;

impl MarkupRenderer for HtmlMarkup {
    fn render_text(&self, text: &str) -> String {
        escape_html(&strip_str(text))
    }

    fn traceback_converter(&self) -> Box<dyn LineConverter> {
        Box::new(AnsiLineConverter::new())
    }
}

/// Escape the five HTML-significant characters
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // CSI sequences (SGR included) and OSC sequences terminated by BEL or ST.
    // Only SGR is styled; the rest are dropped from traceback lines.
    RE.get_or_init(|| {
        Regex::new(r"\x1b\[([0-9;?]*)([@-~])|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
            .expect("escape pattern is valid")
    })
}

const COLOR_NAMES: [&str; 8] = [
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// Current SGR style
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SgrStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    fg: Option<String>,
    bg: Option<String>,
}

impl SgrStyle {
    fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    fn classes(&self) -> String {
        let mut classes = Vec::new();
        if let Some(fg) = &self.fg {
            classes.push(format!("ansi-{}-fg", fg));
        }
        if let Some(bg) = &self.bg {
            classes.push(format!("ansi-{}-bg", bg));
        }
        if self.bold {
            classes.push("ansi-bold".to_string());
        }
        if self.italic {
            classes.push("ansi-italic".to_string());
        }
        if self.underline {
            classes.push("ansi-underline".to_string());
        }
        classes.join(" ")
    }

    fn apply(&mut self, params: &str) {
        let codes: Vec<u32> = if params.is_empty() {
            vec![0]
        } else {
            params
                .split(';')
                .map(|p| p.parse().unwrap_or(0))
                .collect()
        };

        let mut iter = codes.into_iter();
        while let Some(code) = iter.next() {
            match code {
                0 => *self = Self::default(),
                1 => self.bold = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => self.bold = false,
                23 => self.italic = false,
                24 => self.underline = false,
                30..=37 => self.fg = Some(COLOR_NAMES[(code - 30) as usize].to_string()),
                39 => self.fg = None,
                40..=47 => self.bg = Some(COLOR_NAMES[(code - 40) as usize].to_string()),
                49 => self.bg = None,
                90..=97 => {
                    self.fg = Some(format!("bright-{}", COLOR_NAMES[(code - 90) as usize]))
                }
                100..=107 => {
                    self.bg = Some(format!("bright-{}", COLOR_NAMES[(code - 100) as usize]))
                }
                // Extended colours: 38;5;n / 38;2;r;g;b (and 48 for background)
                38 | 48 => {
                    let colour = match iter.next() {
                        Some(5) => iter.next().map(|n| format!("palette-{}", n)),
                        Some(2) => {
                            let rgb: Vec<u32> = iter.by_ref().take(3).collect();
                            (rgb.len() == 3)
                                .then(|| format!("rgb-{}-{}-{}", rgb[0], rgb[1], rgb[2]))
                        }
                        _ => None,
                    };
                    if code == 38 {
                        self.fg = colour;
                    } else {
                        self.bg = colour;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Converts traceback lines with SGR escapes into `<span>` markup.
///
/// An unterminated style on one line is reopened at the start of the next.
#[derive(Debug, Default)]
pub struct AnsiLineConverter {
    style: SgrStyle,
}

impl AnsiLineConverter {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_text(&self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.style.is_plain() {
            out.push_str(&escape_html(text));
        } else {
            out.push_str(&format!(
                "<span class=\"{}\">{}</span>",
                self.style.classes(),
                escape_html(text)
            ));
        }
    }
}

impl LineConverter for AnsiLineConverter {
    fn convert_line(&mut self, line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        let mut last = 0;
        for caps in escape_regex().captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            self.push_text(&mut out, &line[last..whole.start()]);
            last = whole.end();

            let is_sgr = caps.get(2).is_some_and(|m| m.as_str() == "m");
            if is_sgr {
                let params = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                self.style.apply(params);
            }
        }
        self.push_text(&mut out, &line[last..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_escapes() {
        assert_eq!(HtmlMarkup.render_text("a < b && c"), "a &lt; b &amp;&amp; c");
        assert_eq!(HtmlMarkup.render_text("42"), "42");
    }

    #[test]
    fn test_render_text_strips_escapes() {
        assert_eq!(HtmlMarkup.render_text("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(HtmlMarkup.render_text("\x1b]0;title\x07done"), "done");
        assert_eq!(HtmlMarkup.render_text("\x1b[2K\x1b[1A<ok>"), "&lt;ok&gt;");
    }

    #[test]
    fn test_converter_plain_line() {
        let mut conv = HtmlMarkup.traceback_converter();
        assert_eq!(conv.convert_line("line1"), "line1");
    }

    #[test]
    fn test_converter_colours() {
        let mut conv = AnsiLineConverter::new();
        assert_eq!(
            conv.convert_line("\x1b[0;31mValueError\x1b[0m: bad"),
            "<span class=\"ansi-red-fg\">ValueError</span>: bad"
        );
    }

    #[test]
    fn test_converter_carries_style_across_lines() {
        let mut conv = AnsiLineConverter::new();
        assert_eq!(
            conv.convert_line("\x1b[1;32mstart"),
            "<span class=\"ansi-green-fg ansi-bold\">start</span>"
        );
        assert_eq!(
            conv.convert_line("still\x1b[0m done"),
            "<span class=\"ansi-green-fg ansi-bold\">still</span> done"
        );
    }

    #[test]
    fn test_fresh_converter_has_no_state() {
        let mut first = HtmlMarkup.traceback_converter();
        first.convert_line("\x1b[31m");
        let mut second = HtmlMarkup.traceback_converter();
        assert_eq!(second.convert_line("x"), "x");
    }

    #[test]
    fn test_extended_colours() {
        let mut conv = AnsiLineConverter::new();
        assert_eq!(
            conv.convert_line("\x1b[38;5;208mx"),
            "<span class=\"ansi-palette-208-fg\">x</span>"
        );
        let mut conv = AnsiLineConverter::new();
        assert_eq!(
            conv.convert_line("\x1b[48;2;1;2;3my"),
            "<span class=\"ansi-rgb-1-2-3-bg\">y</span>"
        );
    }

    #[test]
    fn test_converter_escapes_html() {
        let mut conv = AnsiLineConverter::new();
        assert_eq!(conv.convert_line("<module>"), "&lt;module&gt;");
    }
}
