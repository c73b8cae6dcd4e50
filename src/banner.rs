// src/banner.rs

use std::io::Write;
use std::sync::Once;

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
};

static BANNER: Once = Once::new();

const LOGO: [&str; 7] = [
    "   ██    █   ",
    "  █ █     █  ",
    " █  █  █   █ ",
    "█   █  █   █ ",
    " █  █  █   █ ",
    "  █ █     █  ",
    "   ██    █   ",
];

const SKY: Color = Color::Rgb { r: 0x7d, g: 0xd3, b: 0xfc };
const INK: Color = Color::Rgb { r: 0x0f, g: 0x17, b: 0x2a };

/// Prints the AudioPlus banner to `out`. Only the first call in a process prints.
pub fn print_once(out: &mut impl Write) -> std::io::Result<()> {
    let mut result = Ok(());
    BANNER.call_once(|| result = print(out));
    result
}

fn print(out: &mut impl Write) -> std::io::Result<()> {
    queue!(
        out,
        SetBackgroundColor(SKY),
        SetForegroundColor(INK),
        Print(" AudioPlus "),
        ResetColor,
        Print("\n")
    )?;
    for line in LOGO {
        queue!(
            out,
            SetBackgroundColor(SKY),
            SetForegroundColor(INK),
            Print(line),
            ResetColor,
            Print("\n")
        )?;
    }
    queue!(
        out,
        Print("This terminal uses AudioPlus.\n"),
        SetForegroundColor(Color::Rgb { r: 0x16, g: 0xa3, b: 0x4a }),
        Print("Space: play/pause | click: seek | right click: speed menu | q: quit\n"),
        ResetColor
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_prints_once() {
        let mut first = Vec::new();
        let mut second = Vec::new();
        print_once(&mut first).unwrap();
        print_once(&mut second).unwrap();

        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("AudioPlus"));
        assert!(text.contains("   ██    █"));
        assert!(second.is_empty());
    }
}
