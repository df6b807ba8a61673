//! Terminal progress bars for long-running phases.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over `total` work items, or a hidden one when `visible` is false
pub fn task_progress_bar(total: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
    }

    let pb = ProgressBar::new(total);
    let template = format!(
        "{{spinner:.green}} {label:<10} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})"
    );
    let style = ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_still_counts() {
        let pb = task_progress_bar(3, "Augmenting", false);
        pb.inc(2);
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
        assert!(pb.is_hidden());
    }

    #[test]
    fn test_visible_bar_has_length() {
        let pb = task_progress_bar(5, "Extracting", true);
        assert_eq!(pb.length(), Some(5));
        pb.finish_and_clear();
    }
}
