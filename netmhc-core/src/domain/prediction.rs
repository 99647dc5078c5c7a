//! NetMHCIIpan prediction output
//!
//! Parses the fixed-column result table NetMHCIIpan prints and classifies each
//! prediction by its percentile rank.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Rank at or below which a peptide is a strong binder
pub const STRONG_BINDER_RANK: f64 = 1.0;
/// Rank at or below which a peptide is a weak binder
pub const WEAK_BINDER_RANK: f64 = 5.0;

/// Rank assigned when the table has no usable rank column
const MISSING_RANK: f64 = 100.0;

/// One row of the prediction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub position: u32,
    pub mhc: String,
    pub peptide: String,
    pub core: String,
    pub of: String,
    pub gp: String,
    pub gl: String,
    pub ip: String,
    pub il: String,
    pub icore: String,
    pub identity: String,
    pub score: Option<f64>,
    pub rank: f64,
    pub exp_bind: String,
    pub bind_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStrength {
    Strong,
    Weak,
    None,
}

impl Prediction {
    /// Parses one table row; `None` for anything that is not a prediction
    pub fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 10 {
            return None;
        }

        let column = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();
        let number = |i: usize| {
            parts
                .get(i)
                .filter(|s| **s != "NA")
                .map(|s| s.parse::<f64>())
                .transpose()
        };

        Some(Self {
            position: parts[0].parse().ok()?,
            mhc: column(1),
            peptide: column(2),
            core: column(3),
            of: column(4),
            gp: column(5),
            gl: column(6),
            ip: column(7),
            il: column(8),
            icore: column(9),
            identity: column(10),
            score: number(11).ok()?,
            rank: number(12).ok()?.unwrap_or(MISSING_RANK),
            exp_bind: column(13),
            bind_level: column(14),
        })
    }

    pub fn strength(&self) -> BindingStrength {
        if self.rank <= STRONG_BINDER_RANK {
            BindingStrength::Strong
        } else if self.rank <= WEAK_BINDER_RANK {
            BindingStrength::Weak
        } else {
            BindingStrength::None
        }
    }
}

/// All predictions of one output file, in table order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTable {
    pub predictions: Vec<Prediction>,
}

impl PredictionTable {
    /// Reads the rows between the ` Pos ... MHC ... Peptide` header and the
    /// first `Number of` footer
    pub fn parse(output: &str) -> Self {
        let mut predictions = Vec::new();
        let mut in_table = false;

        for line in output.lines() {
            if line.starts_with(" Pos ") && line.contains("MHC") && line.contains("Peptide") {
                in_table = true;
                continue;
            }

            if !in_table || line.trim().is_empty() || line.starts_with('-') {
                continue;
            }
            if line.starts_with("Number of") {
                break;
            }

            if let Some(prediction) = Prediction::parse_line(line) {
                predictions.push(prediction);
            }
        }

        Self { predictions }
    }

    pub fn strong_binders(&self) -> impl Iterator<Item = &Prediction> {
        self.with_strength(BindingStrength::Strong)
    }

    pub fn weak_binders(&self) -> impl Iterator<Item = &Prediction> {
        self.with_strength(BindingStrength::Weak)
    }

    fn with_strength(&self, strength: BindingStrength) -> impl Iterator<Item = &Prediction> {
        self.predictions
            .iter()
            .filter(move |p| p.strength() == strength)
    }

    /// Plain-text report with binder counts and the top five binders
    pub fn summary_report(&self) -> String {
        let strong: Vec<&Prediction> = self.strong_binders().collect();
        let weak: Vec<&Prediction> = self.weak_binders().collect();
        let total = self.predictions.len();
        let rule = "=".repeat(80);

        let mut report = String::new();
        let _ = writeln!(report, "{}", rule);
        let _ = writeln!(report, "NetMHCIIpan Prediction Summary");
        let _ = writeln!(report, "{}", rule);
        let _ = writeln!(report, "Total predictions: {}", total);
        let _ = writeln!(report, "Strong binders (≤1% rank): {}", strong.len());
        let _ = writeln!(report, "Weak binders (1-5% rank): {}", weak.len());
        let _ = writeln!(
            report,
            "Non-binders (>5% rank): {}",
            total - strong.len() - weak.len()
        );
        report.push('\n');

        // weak binders are only listed when there is no strong one
        let (title, top) = if !strong.is_empty() {
            ("Top Strong Binders:", strong)
        } else {
            ("Top Weak Binders:", weak)
        };

        if !top.is_empty() {
            let _ = writeln!(report, "{}", title);
            let _ = writeln!(report, "{}", "-".repeat(40));
            for (i, binder) in top.iter().take(5).enumerate() {
                let _ = writeln!(
                    report,
                    "  {}. {} (pos {}, rank {:.3}%)",
                    i + 1,
                    binder.peptide,
                    binder.position,
                    binder.rank
                );
            }
        }

        report.trim_end().to_string()
    }
}
