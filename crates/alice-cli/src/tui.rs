use crossterm::style::{Color, ResetColor, SetForegroundColor, Stylize};

const BAR_WIDTH: usize = 10;

/// Plain line output used outside of a turn: banner, notices between prompts.
pub struct SimpleOutput;

impl SimpleOutput {
    pub fn new() -> Self {
        Self
    }

    pub fn print(&self, text: &str) {
        println!("{}", text);
    }

    /// Title line followed by aligned `label: value` rows.
    pub fn print_banner(&self, title: &str, rows: &[(&str, String)]) {
        let width = rows.iter().map(|(label, _)| label.len() + 1).max().unwrap_or(0);

        println!();
        println!("{}", title.bold().cyan());
        for (label, value) in rows {
            let label = format!("{:<width$}", format!("{}:", label));
            println!("  {}  {}", label.dark_grey(), value);
        }
        println!();
    }

    pub fn print_context(&self, used: u32, total: u32, percentage: f32) {
        let (filled, empty) = bar_cells(percentage);

        let color = if percentage < 60.0 {
            Color::Green
        } else if percentage < 80.0 {
            Color::Yellow
        } else {
            Color::Red
        };

        print!("≈ Context: ");
        print!("{}", SetForegroundColor(color));
        print!("{}{}", "●".repeat(filled), "○".repeat(empty));
        print!("{}", ResetColor);
        println!(" {}/{} tokens ({:.1}%)", used, total, percentage);
    }

    pub fn print_context_estimate(&self, used: u32) {
        println!("{}", format!("≈ Context: ~{} tokens", used).dark_grey());
    }
}

impl Default for SimpleOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Filled and empty cells of the context bar.
fn bar_cells(percentage: f32) -> (usize, usize) {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f32) as usize;
    (filled, BAR_WIDTH - filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cells() {
        assert_eq!(bar_cells(0.0), (0, 10));
        assert_eq!(bar_cells(25.0), (2, 8));
        assert_eq!(bar_cells(100.0), (10, 0));
        // Estimates can overshoot the budget.
        assert_eq!(bar_cells(180.0), (10, 0));
    }
}
