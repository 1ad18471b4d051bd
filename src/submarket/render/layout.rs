//! Markdown to styled, wrapped lines
//!
//! Supports the subset the report uses: ATX headings, bullet and numbered
//! lists, pipe tables, image references, rules, and inline emphasis markers
//! (which are stripped). Output depends only on the input text and width.

const PT_TO_MM: f32 = 0.3528;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Mono,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub style: FontStyle,
    /// Font size in points
    pub size: f32,
    /// Left indent in millimetres
    pub indent: f32,
    /// Extra space above the line in millimetres
    pub space_before: f32,
    /// Image drawn above the text, which becomes its caption
    pub image: Option<String>,
}

impl Line {
    /// Baseline-to-baseline height in millimetres
    pub fn height(&self) -> f32 {
        self.size * PT_TO_MM * 1.45
    }
}

const BODY_SIZE: f32 = 10.5;
const TABLE_SIZE: f32 = 8.0;
const BULLET_INDENT: f32 = 5.0;

/// Average glyph advance as a fraction of the font size
fn glyph_width(style: FontStyle) -> f32 {
    match style {
        FontStyle::Regular => 0.50,
        FontStyle::Bold => 0.55,
        FontStyle::Mono => 0.60,
    }
}

fn capacity(width_mm: f32, style: FontStyle, size: f32) -> usize {
    let per_char = size * PT_TO_MM * glyph_width(style);
    ((width_mm / per_char).floor() as usize).max(10)
}

/// Greedy word wrap; words longer than a line are split
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            lines.push(head);
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Drop emphasis and code markers, and turn links into their text
pub fn strip_inline(text: &str) -> String {
    let mut out = text.replace("**", "").replace("__", "").replace('`', "");
    // [label](target) -> label; a `[` whose `]` is not followed by `(` is plain text
    let mut from = 0;
    while let Some(offset) = out[from..].find('[') {
        let start = from + offset;
        let Some(mid) = out[start..].find(']').map(|i| start + i) else {
            break;
        };
        let end = if out[mid..].starts_with("](") {
            out[mid..].find(')').map(|i| mid + i)
        } else {
            None
        };
        match end {
            Some(end) => {
                let label = out[start + 1..mid].to_string();
                out.replace_range(start..=end, &label);
                from = start + label.len();
            }
            None => from = start + 1,
        }
    }
    out.split_whitespace()
        .map(|w| w.trim_matches('*'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replace characters the builtin PDF fonts cannot show
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2022}' => '-',
            '\u{2026}' => '.',
            c if (c as u32) < 0x100 => c,
            _ => '?',
        })
        .collect()
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(*marker))
}

fn is_table_separator(line: &str) -> bool {
    line.starts_with('|')
        && line
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// `![alt](target)` as `(alt, target)`
fn figure(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("![")?;
    let (alt, tail) = rest.split_once("](")?;
    let target = tail.strip_suffix(')')?;
    Some((alt.trim(), target.trim()))
}

fn push_wrapped(
    out: &mut Vec<Line>,
    text: &str,
    style: FontStyle,
    size: f32,
    indent: f32,
    space_before: f32,
    width_mm: f32,
) {
    let max_chars = capacity(width_mm - indent, style, size);
    let pieces = wrap(text, max_chars);
    for (i, piece) in pieces.into_iter().enumerate() {
        out.push(Line {
            text: piece,
            style,
            size,
            indent,
            space_before: if i == 0 { space_before } else { 0.0 },
            image: None,
        });
    }
}

/// Lay out markdown into lines that fit `width_mm`
pub fn layout(markdown: &str, width_mm: f32) -> Vec<Line> {
    let mut out = Vec::new();
    let mut gap = 0.0_f32;

    for raw in markdown.lines() {
        let line = to_latin1(raw.trim_end());
        let trimmed = line.trim_start();

        if trimmed.is_empty() || trimmed == "---" || trimmed == "***" {
            gap = gap.max(2.5);
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            let size = match level {
                1 => 18.0,
                2 => 14.5,
                _ => 12.0,
            };
            let text = strip_inline(text);
            let gap = gap.max(4.0);
            push_wrapped(&mut out, &text, FontStyle::Bold, size, 0.0, gap, width_mm);
        } else if let Some((alt, target)) = figure(trimmed) {
            // The image path is kept whole; only the caption wraps
            let first = out.len();
            let caption = format!("Figure: {}", alt);
            push_wrapped(
                &mut out,
                &caption,
                FontStyle::Regular,
                BODY_SIZE,
                0.0,
                gap,
                width_mm,
            );
            if let Some(line) = out.get_mut(first) {
                line.image = Some(target.to_string());
            }
        } else if trimmed.starts_with('|') {
            if !is_table_separator(trimmed) {
                let cells: Vec<String> = trimmed
                    .trim_matches('|')
                    .split('|')
                    .map(|c| strip_inline(c.trim()))
                    .collect();
                let text = cells.join(" | ");
                push_wrapped(
                    &mut out,
                    &text,
                    FontStyle::Mono,
                    TABLE_SIZE,
                    0.0,
                    gap,
                    width_mm,
                );
            }
        } else if let Some(item) = bullet(trimmed) {
            let text = format!("- {}", strip_inline(item));
            let indent = BULLET_INDENT;
            push_wrapped(
                &mut out,
                &text,
                FontStyle::Regular,
                BODY_SIZE,
                indent,
                gap,
                width_mm,
            );
        } else {
            let text = strip_inline(trimmed);
            push_wrapped(
                &mut out,
                &text,
                FontStyle::Regular,
                BODY_SIZE,
                0.0,
                gap,
                width_mm,
            );
        }
        gap = 0.0;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(
            lines.join(" "),
            "the quick brown fox jumps over the lazy dog"
        );
        assert_eq!(wrap("abcdefghijkl", 5), vec!["abcde", "fghij", "kl"]);
        assert!(wrap("   ", 5).is_empty());
    }

    #[test]
    fn test_strip_inline() {
        assert_eq!(
            strip_inline("**Median** price is `412000`"),
            "Median price is 412000"
        );
        assert_eq!(
            strip_inline("see [RentCast](https://rentcast.io) data"),
            "see RentCast data"
        );
        assert_eq!(strip_inline("*emphasis* stays"), "emphasis stays");
    }

    #[test]
    fn test_bare_bracket_before_link() {
        assert_eq!(strip_inline("[note] see [x](y)"), "[note] see x");
        assert_eq!(strip_inline("[a](b) and [c](d)"), "a and c");
        assert_eq!(strip_inline("range [1, 2] only"), "range [1, 2] only");
        assert_eq!(strip_inline("open [ bracket"), "open [ bracket");
    }

    #[test]
    fn test_layout_styles() {
        let markdown = "# Title\n\nIntro **text**.\n\n## Sales\n- first point\n\
                        | a | b |\n|---|---|\n| 1 | 2 |\n![Price trend](charts/p.png)\n";
        let lines = layout(markdown, 170.0);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Title",
                "Intro text.",
                "Sales",
                "- first point",
                "a | b",
                "1 | 2",
                "Figure: Price trend"
            ]
        );
        assert_eq!(lines[6].image.as_deref(), Some("charts/p.png"));
        assert!(lines[..6].iter().all(|l| l.image.is_none()));
        assert_eq!(lines[0].style, FontStyle::Bold);
        assert_eq!(lines[0].size, 18.0);
        assert_eq!(lines[3].indent, BULLET_INDENT);
        assert_eq!(lines[4].style, FontStyle::Mono);
        assert!(lines[1].space_before > 0.0);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let markdown = "# A\nsome long paragraph ".repeat(20);
        assert_eq!(layout(&markdown, 120.0), layout(&markdown, 120.0));
    }

    #[test]
    fn test_latin1_fallback() {
        assert_eq!(
            to_latin1("it\u{2019}s \u{2014} caf\u{e9} \u{1F3E0}"),
            "it's - caf\u{e9} ?"
        );
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        assert!(heading("#hashtag").is_none());
        assert_eq!(heading("### Deep"), Some((3, "Deep")));
    }
}
