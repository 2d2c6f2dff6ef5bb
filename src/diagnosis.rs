//! Structured diagnosis result produced by the external analysis API.

use serde::Deserialize;

/// One diagnosis result to narrate. All fields are optional narrative
/// strings in the source language; absent fields are skipped entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosisResult {
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub prevention: Option<String>,
}

impl DiagnosisResult {
    /// True when no field carries narratable text.
    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Present, non-blank fields in narration order.
    pub fn fields(&self) -> impl Iterator<Item = (Section, &str)> {
        [
            (Section::Symptoms, &self.symptoms),
            (Section::Diagnosis, &self.diagnosis),
            (Section::Treatment, &self.treatment),
            (Section::Prevention, &self.prevention),
        ]
        .into_iter()
        .filter_map(|(section, field)| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| (section, t))
        })
    }
}

/// The labeled sections of a narrated diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Intro,
    Symptoms,
    Diagnosis,
    Treatment,
    Prevention,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_no_fields() {
        let result = DiagnosisResult::default();
        assert!(result.is_empty());
    }

    #[test]
    fn blank_fields_are_skipped() {
        let result = DiagnosisResult {
            symptoms: Some("  ".to_string()),
            diagnosis: Some("Early blight detected".to_string()),
            ..Default::default()
        };
        let fields: Vec<_> = result.fields().collect();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, Section::Diagnosis);
        assert_eq!(fields[0].1, "Early blight detected");
    }

    #[test]
    fn fields_keep_narration_order() {
        let result = DiagnosisResult {
            symptoms: Some("a".into()),
            diagnosis: Some("b".into()),
            treatment: Some("c".into()),
            prevention: Some("d".into()),
        };
        let sections: Vec<_> = result.fields().map(|(s, _)| s).collect();
        assert_eq!(
            sections,
            vec![
                Section::Symptoms,
                Section::Diagnosis,
                Section::Treatment,
                Section::Prevention
            ]
        );
    }
}
