//! Language data tables: section labels, tag aliases, and voice preferences.
//!
//! Everything here is data, not logic — the preparer and voice resolver
//! stay generic and look values up in these tables. Label text for the
//! common languages avoids a round trip to the translation backend.

use crate::diagnosis::Section;

/// Languages with a built-in label dictionary (primary subtags).
const KNOWN_LANGUAGES: &[&str] = &["zh", "en", "ja", "ko", "fr", "de", "es"];

/// Section labels per primary language subtag.
/// Order of the columns matches `KNOWN_LANGUAGES`.
const LABELS: &[(Section, [&str; 7])] = &[
    (
        Section::Intro,
        [
            "诊断结果",
            "Diagnosis Results",
            "診断結果",
            "진단 결과",
            "Résultats du diagnostic",
            "Diagnoseergebnisse",
            "Resultados del diagnóstico",
        ],
    ),
    (
        Section::Symptoms,
        [
            "症状分析",
            "Symptom Analysis",
            "症状の分析",
            "증상 분석",
            "Analyse des symptômes",
            "Symptomanalyse",
            "Análisis de síntomas",
        ],
    ),
    (
        Section::Diagnosis,
        [
            "病情分析",
            "Disease Analysis",
            "病状の分析",
            "병세 분석",
            "Analyse de la maladie",
            "Krankheitsanalyse",
            "Análisis de la enfermedad",
        ],
    ),
    (
        Section::Treatment,
        [
            "治疗建议",
            "Treatment Recommendations",
            "治療の提案",
            "치료 권장 사항",
            "Conseils de traitement",
            "Behandlungsempfehlungen",
            "Recomendaciones de tratamiento",
        ],
    ),
    (
        Section::Prevention,
        [
            "预防措施",
            "Prevention Measures",
            "予防措置",
            "예방 조치",
            "Mesures de prévention",
            "Vorbeugende Maßnahmen",
            "Medidas de prevención",
        ],
    ),
];

/// Catalog tag aliases: one requested tag can match several vendor tags.
const TAG_ALIASES: &[(&str, &[&str])] = &[
    ("zh-CN", &["zh-CN", "zh", "cmn-Hans-CN", "zh-Hans-CN"]),
    ("zh-TW", &["zh-TW", "zh-Hant-TW", "cmn-Hant-TW"]),
    ("zh-HK", &["zh-HK", "zh-Hant-HK", "yue-Hant-HK"]),
    ("en-US", &["en-US", "en"]),
    ("en-GB", &["en-GB", "en-UK"]),
    ("ja-JP", &["ja-JP", "ja"]),
    ("ko-KR", &["ko-KR", "ko"]),
    ("fr-FR", &["fr-FR", "fr"]),
    ("de-DE", &["de-DE", "de"]),
    ("es-ES", &["es-ES", "es"]),
    ("ru-RU", &["ru-RU", "ru"]),
    ("it-IT", &["it-IT", "it"]),
    ("pt-PT", &["pt-PT", "pt"]),
    ("nl-NL", &["nl-NL", "nl"]),
    ("ar-SA", &["ar-SA", "ar"]),
    ("th-TH", &["th-TH", "th"]),
    ("vi-VN", &["vi-VN", "vi"]),
    ("hi-IN", &["hi-IN", "hi"]),
];

/// Nearest-family degraded fallback for label text when the translator is
/// unavailable. Anything unlisted falls back to English.
const FAMILY_FALLBACK: &[(&str, &str)] = &[
    ("cmn", "zh"),
    ("yue", "zh"),
    ("ca", "es"),
    ("gl", "es"),
    ("pt", "es"),
    ("it", "fr"),
    ("nl", "de"),
];

/// Curated higher-quality voice names per language tag, in priority order.
pub const PREFERRED_VOICES: &[(&str, &[&str])] = &[
    (
        "zh-CN",
        &[
            "Microsoft Xiaoxiao - Chinese (Simplified, PRC)",
            "Microsoft Yaoyao - Chinese (Simplified, PRC)",
            "Microsoft Hanhan - Chinese (Simplified, PRC)",
            "Microsoft Kangkang - Chinese (Simplified, PRC)",
            "Google 中文（中国大陆）",
            "Ting-Ting",
            "Sin-ji",
            "Mei-Jia",
        ],
    ),
    (
        "zh-TW",
        &[
            "Microsoft Yating - Chinese (Traditional, Taiwan)",
            "Microsoft Hanhan - Chinese (Traditional, Taiwan)",
            "Mei-Jia",
        ],
    ),
    (
        "en-US",
        &[
            "Microsoft Zira - English (United States)",
            "Microsoft Eva - English (United States)",
            "Google US English",
            "Samantha",
            "Alex",
        ],
    ),
    (
        "ja-JP",
        &[
            "Microsoft Haruka - Japanese",
            "Microsoft Ayumi - Japanese",
            "Google 日本語",
            "Kyoko",
        ],
    ),
];

/// Name fragments that mark a curated natural-sounding voice.
pub const QUALITY_NAME_HINTS: &[&str] = &[
    "xiaoxiao", "yaoyao", "hanhan", "zira", "eva", "haruka", "ayumi", "ting",
    "mei", "yating", "female",
];

/// Primary language subtag of a BCP-47 tag (`zh-CN` → `zh`).
pub fn primary_subtag(tag: &str) -> &str {
    tag.split('-').next().unwrap_or(tag)
}

/// Whether the label dictionary covers this language.
pub fn is_known_language(tag: &str) -> bool {
    KNOWN_LANGUAGES.contains(&primary_subtag(tag))
}

/// Dictionary label for a section, if the language is known.
pub fn label(section: Section, tag: &str) -> Option<&'static str> {
    let idx = KNOWN_LANGUAGES
        .iter()
        .position(|l| *l == primary_subtag(tag))?;
    LABELS
        .iter()
        .find(|(s, _)| *s == section)
        .map(|(_, texts)| texts[idx])
}

/// Degraded label when the translator fails on an unlisted language:
/// nearest known family, ultimately English.
pub fn fallback_label(section: Section, tag: &str) -> &'static str {
    let primary = primary_subtag(tag);
    let family = FAMILY_FALLBACK
        .iter()
        .find(|(from, _)| *from == primary)
        .map(|(_, to)| *to)
        .unwrap_or("en");
    label(section, family).unwrap_or("")
}

/// All catalog tags a requested tag may match, most specific first.
pub fn tag_aliases(tag: &str) -> Vec<&str> {
    match TAG_ALIASES.iter().find(|(t, _)| *t == tag) {
        Some((_, aliases)) => aliases.to_vec(),
        None => vec![tag, primary_subtag(tag)],
    }
}

/// Whether a voice name matches the curated quality pattern.
pub fn has_quality_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    QUALITY_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_all_known_languages() {
        for lang in KNOWN_LANGUAGES {
            for (section, _) in LABELS {
                let text = label(*section, lang).unwrap();
                assert!(!text.is_empty(), "missing {lang} label");
            }
        }
    }

    #[test]
    fn fallback_prefers_language_family() {
        assert_eq!(fallback_label(Section::Intro, "yue-CN"), "诊断结果");
        assert_eq!(fallback_label(Section::Intro, "pt-BR"), "Resultados del diagnóstico");
        assert_eq!(fallback_label(Section::Intro, "sw-KE"), "Diagnosis Results");
    }

    #[test]
    fn aliases_include_vendor_variants() {
        let aliases = tag_aliases("zh-CN");
        assert!(aliases.contains(&"cmn-Hans-CN"));
        // Unlisted tags still match themselves and their primary subtag.
        assert_eq!(tag_aliases("sw-KE"), vec!["sw-KE", "sw"]);
    }

    #[test]
    fn quality_pattern_is_case_insensitive() {
        assert!(has_quality_name("Microsoft Zira - English (United States)"));
        assert!(!has_quality_name("Microsoft David - English (United States)"));
    }
}
