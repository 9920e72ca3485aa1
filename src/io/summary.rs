//! Read/write basis summary JSON files.
//!
//! The summary is the small, machine-readable companion of a basis text file:
//! singular values, section counts and a timestamp. The schema is
//! `domain::BasisSummary`.

use std::fs::File;
use std::path::Path;

use crate::domain::BasisSummary;
use crate::error::AppError;

pub fn write_summary_json(path: &Path, summary: &BasisSummary) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::io(format!("Failed to create summary JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::io(format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

pub fn read_summary_json(path: &Path) -> Result<BasisSummary, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::io(format!("Failed to open summary JSON '{}': {e}", path.display()))
    })?;
    let summary: BasisSummary = serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Statistics;
    use chrono::Utc;

    #[test]
    fn summary_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = BasisSummary {
            tool: "irb".to_string(),
            generated: Utc::now(),
            statistics: Statistics::Bosonic,
            lambda: 100.0,
            precision_bits: 53,
            dim: 2,
            singular_values: vec![0.5, 0.01],
            sections_x: 8,
            sections_y: 6,
            order: 19,
            u_at_one: vec![1.2, 3.4],
        };

        write_summary_json(&path, &summary).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"statistics\": \"bosonic\""));

        let back = read_summary_json(&path).unwrap();
        assert_eq!(back.statistics, Statistics::Bosonic);
        assert_eq!(back.singular_values, summary.singular_values);
        assert_eq!(back.generated, summary.generated);
        assert_eq!(back.sections_y, 6);
    }

    #[test]
    fn invalid_json_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_summary_json(&path).unwrap_err().exit_code(), 2);
    }
}
