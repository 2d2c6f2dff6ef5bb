//! Builds the narration text for a diagnosis result.
//!
//! Output shape: intro label, then one blank-line-separated section per
//! present field (localized label + translated body). Translation failure
//! of any single piece degrades to dictionary or source text; only a fully
//! empty result is an error.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::diagnosis::{DiagnosisResult, Section};
use crate::lexicon::{self, primary_subtag};
use crate::translator::Translator;

#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("diagnosis result has no narratable content")]
    EmptyContent,
}

pub struct ContentPreparer {
    translator: Arc<dyn Translator>,
    source_language: String,
}

impl ContentPreparer {
    pub fn new(translator: Arc<dyn Translator>, source_language: &str) -> Self {
        Self {
            translator,
            source_language: source_language.to_string(),
        }
    }

    /// Produce the full narration text in the target language.
    pub async fn prepare(
        &self,
        result: &DiagnosisResult,
        target: &str,
    ) -> Result<String, PrepareError> {
        if result.is_empty() {
            return Err(PrepareError::EmptyContent);
        }

        // Only the exact source tag (or its bare primary subtag) skips
        // translation. Regional variants of the same primary language, like
        // zh-TW against a zh-CN source, still go through the translator.
        let passthrough =
            target == self.source_language || target == primary_subtag(&self.source_language);
        let (stop, colon) = punctuation(if passthrough {
            &self.source_language
        } else {
            target
        });

        let intro = self.localize_label(Section::Intro, target, passthrough).await;
        let mut sections = vec![format!("{intro}{stop}")];

        for (section, body) in result.fields() {
            let label = self.localize_label(section, target, passthrough).await;
            let content = if passthrough {
                body.to_string()
            } else {
                self.translate_body(body, target).await
            };
            sections.push(format!("{label}{colon}{content}"));
        }

        let text = sections.join("\n\n");
        debug!(
            "Prepared {} chars of narration for '{target}' ({} sections)",
            text.chars().count(),
            sections.len() - 1
        );
        Ok(text)
    }

    /// Section label in the target language: dictionary fast path, then the
    /// translation collaborator, then the nearest-family dictionary entry.
    async fn localize_label(&self, section: Section, target: &str, passthrough: bool) -> String {
        if passthrough {
            // An unlisted source language still gets a label, not a bare
            // separator.
            return lexicon::label(section, &self.source_language)
                .unwrap_or_else(|| lexicon::fallback_label(section, &self.source_language))
                .to_string();
        }

        if let Some(text) = lexicon::label(section, target) {
            return text.to_string();
        }

        let source_text = lexicon::label(section, &self.source_language).unwrap_or_default();
        match self
            .translator
            .translate(source_text, &self.source_language, target)
            .await
        {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => lexicon::fallback_label(section, target).to_string(),
            Err(e) => {
                warn!("Label translation to '{target}' failed: {e}, using dictionary fallback");
                lexicon::fallback_label(section, target).to_string()
            }
        }
    }

    /// Field body in the target language; the source text survives a failed
    /// translation so narration never drops a section.
    async fn translate_body(&self, body: &str, target: &str) -> String {
        match self
            .translator
            .translate(body, &self.source_language, target)
            .await
        {
            Ok(translated) if !translated.trim().is_empty() => translated,
            Ok(_) => {
                warn!("Translator returned empty body for '{target}', keeping source text");
                body.to_string()
            }
            Err(e) => {
                warn!("Body translation to '{target}' failed: {e}, keeping source text");
                body.to_string()
            }
        }
    }
}

/// Sentence and label punctuation for the output language.
fn punctuation(tag: &str) -> (&'static str, &'static str) {
    match primary_subtag(tag) {
        "zh" | "ja" => ("。", "："),
        _ => (".", ": "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::translator::TranslateError;

    /// Translator stub: counts calls, optionally always fails.
    struct ScriptedTranslator {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedTranslator {
        fn ok() -> Self {
            Self {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for ScriptedTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: &str,
            target: &str,
        ) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TranslateError::Unreachable("backend down".into()))
            } else {
                Ok(format!("[{target}] {text}"))
            }
        }
    }

    fn preparer(translator: Arc<ScriptedTranslator>) -> ContentPreparer {
        ContentPreparer::new(translator, "zh-CN")
    }

    #[tokio::test]
    async fn empty_result_is_an_error() {
        let p = preparer(Arc::new(ScriptedTranslator::ok()));
        let err = p.prepare(&DiagnosisResult::default(), "en-US").await;
        assert!(matches!(err, Err(PrepareError::EmptyContent)));
    }

    #[tokio::test]
    async fn same_language_makes_no_translation_calls() {
        let translator = Arc::new(ScriptedTranslator::ok());
        let p = preparer(translator.clone());
        let result = DiagnosisResult {
            diagnosis: Some("检测到早疫病".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "zh-CN").await.unwrap();
        assert_eq!(translator.call_count(), 0);
        assert!(text.starts_with("诊断结果。"));
        assert!(text.contains("病情分析：检测到早疫病"));
    }

    #[tokio::test]
    async fn regional_variant_of_source_is_still_translated() {
        let translator = Arc::new(ScriptedTranslator::ok());
        let p = preparer(translator.clone());
        let result = DiagnosisResult {
            diagnosis: Some("检测到早疫病".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "zh-TW").await.unwrap();

        // zh-TW is not the zh-CN source tag: the body goes to the backend.
        assert_eq!(translator.call_count(), 1);
        assert!(text.contains("[zh-TW] 检测到早疫病"));
    }

    #[tokio::test]
    async fn bare_primary_subtag_of_source_passes_through() {
        let translator = Arc::new(ScriptedTranslator::ok());
        let p = preparer(translator.clone());
        let result = DiagnosisResult {
            diagnosis: Some("检测到早疫病".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "zh").await.unwrap();
        assert_eq!(translator.call_count(), 0);
        assert!(text.contains("病情分析：检测到早疫病"));
    }

    #[tokio::test]
    async fn unlisted_source_passthrough_uses_fallback_labels() {
        let translator = Arc::new(ScriptedTranslator::ok());
        let p = ContentPreparer::new(translator.clone(), "ru-RU");
        let result = DiagnosisResult {
            treatment: Some("опрыскивание фунгицидом".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "ru-RU").await.unwrap();

        // Russian has no dictionary column; English is the degraded family.
        assert_eq!(translator.call_count(), 0);
        assert!(text.starts_with("Diagnosis Results."));
        assert!(text.contains("Treatment Recommendations: опрыскивание фунгицидом"));
    }

    #[tokio::test]
    async fn known_language_labels_skip_translator() {
        let translator = Arc::new(ScriptedTranslator::ok());
        let p = preparer(translator.clone());
        let result = DiagnosisResult {
            diagnosis: Some("检测到早疫病".into()),
            treatment: Some("喷施杀菌剂".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "en-US").await.unwrap();

        // Labels come from the dictionary; only the two bodies hit the API.
        assert_eq!(translator.call_count(), 2);
        assert!(text.contains("Diagnosis Results."));
        assert!(text.contains("Disease Analysis: [en-US] 检测到早疫病"));
        assert!(text.contains("Treatment Recommendations: [en-US] 喷施杀菌剂"));
        let diag_at = text.find("Disease Analysis").unwrap();
        let treat_at = text.find("Treatment Recommendations").unwrap();
        assert!(diag_at < treat_at);
    }

    #[tokio::test]
    async fn failed_body_translation_keeps_source_text() {
        let translator = Arc::new(ScriptedTranslator::failing());
        let p = preparer(translator);
        let result = DiagnosisResult {
            treatment: Some("喷施杀菌剂".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "en-US").await.unwrap();
        assert!(text.contains("Treatment Recommendations: 喷施杀菌剂"));
    }

    #[tokio::test]
    async fn unlisted_language_labels_fall_back_when_translator_is_down() {
        let translator = Arc::new(ScriptedTranslator::failing());
        let p = preparer(translator);
        let result = DiagnosisResult {
            prevention: Some("保持通风".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "sw-KE").await.unwrap();
        // Swahili has no dictionary entry; English is the degraded family.
        assert!(text.contains("Diagnosis Results."));
        assert!(text.contains("Prevention Measures: 保持通风"));
    }

    #[tokio::test]
    async fn absent_fields_produce_no_sections() {
        let p = preparer(Arc::new(ScriptedTranslator::ok()));
        let result = DiagnosisResult {
            symptoms: Some("叶片发黄".into()),
            ..Default::default()
        };
        let text = p.prepare(&result, "zh-CN").await.unwrap();
        assert!(text.contains("症状分析"));
        assert!(!text.contains("治疗建议"));
        assert!(!text.contains("预防措施"));
        assert_eq!(text.split("\n\n").count(), 2);
    }
}
