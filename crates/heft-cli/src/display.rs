//! Terminal rendering for predictions and the attribute table.

use heft_core::{AttributeSource, FeatureSchema, PredictionResult, RawInput};

const BAR_WIDTH: usize = 40;

const DISCLAIMER: &str = "Disclaimer: this prediction comes from a machine learning model and is \
not a medical diagnosis. Please consult a health professional.";

// ── Public API ──

/// Print a prediction as a card: the inputs, the category, then the
/// distribution as a descending bar chart.
pub fn print_prediction(raw: &RawInput, result: &PredictionResult) {
    println!("=== {} ===", result.category.display_name());
    println!("{:.1}% confidence", result.confidence() * 100.0);
    println!();

    println!("Inputs");
    for (name, value) in raw.iter() {
        println!("  {:<26} {}", name, format_value(value));
    }
    println!();

    println!("Probabilities");
    for (category, p) in result.ranked() {
        println!(
            "  {:<26} {:>6.2}% {}",
            category.display_name(),
            p * 100.0,
            bar(p)
        );
    }
    println!();

    println!("{DISCLAIMER}");
}

/// Print the declarative attribute table in schema order.
pub fn print_schema(schema: &FeatureSchema) {
    println!(
        "  {:<4} {:<32} {:<10} {:<14} {}",
        "pos", "attribute", "kind", "range/default", "selected"
    );
    for (pos, attr) in schema.attributes().iter().enumerate() {
        let (kind, source) = match attr.source {
            AttributeSource::Input { kind, min, max } => (
                kind.as_str(),
                format!("{}..={}", format_value(min), format_value(max)),
            ),
            AttributeSource::Default(v) => ("default", format!("{v:.4}")),
        };
        let selected = attr
            .selected
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<4} {:<32} {:<10} {:<14} {}",
            pos, attr.name, kind, source, selected
        );
    }
}

// ── Helpers ──

fn bar(p: f64) -> String {
    let filled = (p.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled)
}

/// Whole numbers print without a fractional part.
fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_scales_with_probability() {
        assert_eq!(bar(0.0).chars().count(), 0);
        assert_eq!(bar(0.5).chars().count(), BAR_WIDTH / 2);
        assert_eq!(bar(1.0).chars().count(), BAR_WIDTH);
        assert_eq!(bar(1.5).chars().count(), BAR_WIDTH);
    }

    #[test]
    fn whole_numbers_drop_fraction() {
        assert_eq!(format_value(70.0), "70");
        assert_eq!(format_value(1.75), "1.75");
    }
}
