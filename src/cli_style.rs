use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as CtColor, Stylize};
use unicode_width::UnicodeWidthStr;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

fn bold(color: AnsiColor) -> Style {
    Style::new().bold().fg_color(Some(Color::Ansi(color)))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(bold(AnsiColor::Cyan).underline())
        .header(bold(AnsiColor::Cyan).underline())
        .literal(bold(AnsiColor::Green))
        .invalid(bold(AnsiColor::Red))
        .error(bold(AnsiColor::Red))
        .valid(bold(AnsiColor::Green))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb { r: 0, g: 255, b: 255 };
    pub const PURPLE: Color = Color::Rgb { r: 180, g: 100, b: 255 };
    pub const GREEN: Color = Color::Rgb { r: 0, g: 255, b: 136 };
    pub const ORANGE: Color = Color::Rgb { r: 255, g: 165, b: 0 };
    pub const RED: Color = Color::Rgb { r: 255, g: 85, b: 85 };
    pub const DIM: Color = Color::Rgb { r: 128, g: 128, b: 128 };
    pub const WHITE: Color = Color::Rgb { r: 255, g: 255, b: 255 };
}

pub mod box_chars {
    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";
    pub const HORIZONTAL: &str = "─";
    pub const VERTICAL: &str = "│";
    pub const BULLET: &str = "●";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const SKIP: &str = "○";
}

const BOX_WIDTH: usize = 72;

// ═══════════════════════════════════════════════════════════════════════════════
// Status Lines
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        box_chars::CROSS_MARK.with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::PURPLE),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sections and Tables
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let title_len = title.width();
    let left = BOX_WIDTH.saturating_sub(title_len + 2) / 2;
    let right = BOX_WIDTH.saturating_sub(title_len + 2 + left);
    println!();
    println!(
        "{}{} {} {}{}",
        box_chars::ROUND_TOP_LEFT.with(colors::CYAN),
        box_chars::HORIZONTAL.repeat(left).with(colors::CYAN),
        title.with(colors::CYAN).bold(),
        box_chars::HORIZONTAL.repeat(right).with(colors::CYAN),
        box_chars::ROUND_TOP_RIGHT.with(colors::CYAN)
    );
}

pub fn print_section_footer() {
    println!(
        "{}{}{}",
        box_chars::ROUND_BOTTOM_LEFT.with(colors::CYAN),
        box_chars::HORIZONTAL.repeat(BOX_WIDTH).with(colors::CYAN),
        box_chars::ROUND_BOTTOM_RIGHT.with(colors::CYAN)
    );
    println!();
}

/// Pads `text` to `width` display columns; wide glyphs count double.
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

/// Outcome of a table row, which picks its marker and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Ok,
    Failed,
    Skipped,
    Neutral,
}

/// Prints one row of fixed-width cells inside the section box.
pub fn print_table_row(cells: &[(&str, usize)], state: RowState) {
    let (marker, color): (&str, CtColor) = match state {
        RowState::Ok => (box_chars::CHECK, colors::GREEN),
        RowState::Failed => (box_chars::CROSS_MARK, colors::RED),
        RowState::Skipped => (box_chars::SKIP, colors::ORANGE),
        RowState::Neutral => (" ", colors::WHITE),
    };
    let line: String = cells
        .iter()
        .map(|(text, width)| pad(text, *width))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{} {} {}",
        box_chars::VERTICAL.with(colors::CYAN),
        marker.with(color).bold(),
        line.with(color)
    );
}

pub fn print_table_detail(text: &str) {
    println!(
        "{}     {}",
        box_chars::VERTICAL.with(colors::CYAN),
        text.with(colors::DIM)
    );
}
