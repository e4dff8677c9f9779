//! Output formatting utilities

use aapso::experiment::ExperimentReport;
use aapso::viz::render_confusion;
use colored::Colorize;

/// Print a section header
pub(crate) fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").cyan().bold());
}

/// Print a key-value pair
pub(crate) fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key.white().bold(), value);
}

/// Print a warning message
pub(crate) fn warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Sparkline of the convergence curve, one glyph per iteration.
fn sparkline(values: &[f64]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                ' '
            } else if hi - lo < f64::EPSILON {
                BARS[BARS.len() - 1]
            } else {
                let level = ((v - lo) / (hi - lo) * (BARS.len() - 1) as f64).round() as usize;
                BARS[level.min(BARS.len() - 1)]
            }
        })
        .collect()
}

/// Prints the full experiment summary.
pub(crate) fn print_report(report: &ExperimentReport) {
    section("Dataset");
    kv("Classes", report.classes.join(", "));
    kv("Length of training loader", report.train_batches);
    kv("Length of validation loader", report.val_batches);

    section("Training");
    for (epoch, (train, val)) in report.history.train.iter().zip(&report.history.val).enumerate() {
        println!(
            "  Epoch {:>3}  train loss {:.4} acc {:.4}  |  val loss {:.4} acc {:.4}",
            epoch + 1,
            train.loss,
            train.accuracy,
            val.loss,
            val.accuracy
        );
    }
    let secs = report.history.elapsed.as_secs();
    kv("Training complete in", format!("{}mins {}s", secs / 60, secs % 60));
    kv("Best val Acc", format!("{:.4}", report.history.best_val_acc));

    section("AAPSO Feature Selection");
    kv("Feature matrix", format!("{} x {}", report.n_samples, report.n_features));
    kv(
        "Selected features",
        format!("{} / {}", report.selection.n_selected, report.n_features),
    );
    kv("Best fitness", format!("{:.4}", report.selection.score));
    match report.selection.accuracy {
        Some(acc) => kv("Wrapper accuracy", format!("{acc:.4}")),
        None => warning("best mask selects no feature"),
    }
    kv("Fitness evaluations", report.selection.evaluations);
    kv("Search time", format!("{:.2?}", report.selection.execution_time));
    kv("Convergence", sparkline(&report.selection.convergence_curve));

    section("Validation (k-NN on selected features)");
    let Some(v) = &report.validation else {
        warning("validation skipped, no feature to validate");
        return;
    };
    kv("Accuracy", format!("{:.4}", v.accuracy));
    kv("Precision", format!("{:.4}", v.precision));
    kv("F1 Score", format!("{:.4}", v.f1));
    println!("\n{}", v.report);

    section("Confusion Matrix");
    let colors = colored::control::SHOULD_COLORIZE.should_colorize();
    match render_confusion(&v.confusion, &report.classes, colors) {
        Ok(text) => print!("{text}"),
        Err(e) => warning(&e.to_string()),
    }
    if let Some(path) = &report.plot {
        kv("Plot", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparkline_spans_range() {
        let s = sparkline(&[0.1, 0.5, 0.9]);
        assert_eq!(s.chars().next(), Some('▁'));
        assert_eq!(s.chars().last(), Some('█'));
        assert_eq!(sparkline(&[0.3, 0.3]), "██");
        assert_eq!(sparkline(&[f64::NEG_INFINITY, 1.0]).chars().next(), Some(' '));
    }
}
