//! Voice catalog resolution with per-session memoization.
//!
//! The resolver binds one voice per (session, language) and keeps returning
//! it for the whole narration, even if the catalog changes underneath —
//! re-resolving mid-session causes audible voice and accent drift between
//! segments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::lexicon::{self, primary_subtag};

/// One catalog entry from the synthesis backend.
#[derive(Debug, Clone)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub language: String,
    pub is_default: bool,
}

/// The fixed (language, voice) pair used for every segment of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceBinding {
    pub language: String,
    pub voice_id: String,
    pub voice_name: String,
}

impl VoiceBinding {
    /// Whether the bound voice matched the curated quality pattern.
    pub fn is_quality_voice(&self) -> bool {
        lexicon::has_quality_name(&self.voice_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("voice catalog is empty")]
    CatalogEmpty,
}

/// Voice catalog source. May legitimately be empty right after startup and
/// fill in later; the resolver re-queries.
#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    async fn list_voices(&self) -> Vec<VoiceInfo>;
}

/// Fixed catalog backed by a vector, for config-declared voice sets.
pub struct StaticCatalog {
    voices: Vec<VoiceInfo>,
}

impl StaticCatalog {
    pub fn new(voices: Vec<VoiceInfo>) -> Self {
        Self { voices }
    }
}

#[async_trait]
impl VoiceCatalog for StaticCatalog {
    async fn list_voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }
}

struct CachedBinding {
    session: u64,
    language: String,
    binding: VoiceBinding,
}

pub struct VoiceResolver {
    catalog: std::sync::Arc<dyn VoiceCatalog>,
    preferred: HashMap<String, Vec<String>>,
    retries: u32,
    retry_delay: Duration,
    cache: Mutex<Option<CachedBinding>>,
}

impl VoiceResolver {
    pub fn new(catalog: std::sync::Arc<dyn VoiceCatalog>, config: &VoiceConfig) -> Self {
        // Config entries shadow the built-in curated lists per language.
        let mut preferred: HashMap<String, Vec<String>> = lexicon::PREFERRED_VOICES
            .iter()
            .map(|(lang, names)| {
                (
                    lang.to_string(),
                    names.iter().map(|n| n.to_string()).collect(),
                )
            })
            .collect();
        for (lang, names) in &config.preferred {
            preferred.insert(lang.clone(), names.clone());
        }

        Self {
            catalog,
            preferred,
            retries: config.catalog_retries.max(1),
            retry_delay: Duration::from_millis(config.catalog_retry_delay_ms),
            cache: Mutex::new(None),
        }
    }

    /// Resolve the voice for a session's language. The first binding for a
    /// (session, language) pair is memoized and returned on all later calls.
    pub async fn select(&self, session: u64, language: &str) -> Result<VoiceBinding, VoiceError> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.session == session && cached.language == language {
                    debug!("Reusing session voice: {}", cached.binding.voice_name);
                    return Ok(cached.binding.clone());
                }
            }
        }

        let voices = self.load_catalog().await;
        if voices.is_empty() {
            return Err(VoiceError::CatalogEmpty);
        }

        let binding = self.pick(&voices, language);
        info!(
            "Bound voice '{}' ({}) for session {session}",
            binding.voice_name, binding.language
        );

        *self.cache.lock().unwrap() = Some(CachedBinding {
            session,
            language: language.to_string(),
            binding: binding.clone(),
        });
        Ok(binding)
    }

    /// Drop the memoized binding. Called when a session reaches a terminal
    /// state or is superseded.
    pub fn clear_cache(&self) {
        *self.cache.lock().unwrap() = None;
    }

    /// Query the catalog, tolerating a late-populating backend.
    async fn load_catalog(&self) -> Vec<VoiceInfo> {
        for attempt in 1..=self.retries {
            let voices = self.catalog.list_voices().await;
            if !voices.is_empty() {
                return voices;
            }
            if attempt < self.retries {
                debug!("Voice catalog empty, retrying (attempt {attempt}/{})", self.retries);
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        warn!("Voice catalog still empty after {} attempts", self.retries);
        Vec::new()
    }

    /// Resolution order: curated names, exact tag (incl. vendor aliases),
    /// primary-subtag prefix, then the catalog default or first entry.
    fn pick(&self, voices: &[VoiceInfo], language: &str) -> VoiceBinding {
        if let Some(names) = self.preferred.get(language) {
            for wanted in names {
                if let Some(voice) = voices
                    .iter()
                    .find(|v| v.name.contains(wanted.as_str()) || wanted.contains(&v.name))
                {
                    debug!("Matched curated voice '{}'", voice.name);
                    return bind(voice, language);
                }
            }
        }

        for alias in lexicon::tag_aliases(language) {
            let matching: Vec<&VoiceInfo> =
                voices.iter().filter(|v| v.language == alias).collect();
            if let Some(voice) = best_of(&matching) {
                debug!("Matched exact tag '{}' with '{}'", alias, voice.name);
                return bind(voice, language);
            }
        }

        let prefix = primary_subtag(language);
        let matching: Vec<&VoiceInfo> = voices
            .iter()
            .filter(|v| primary_subtag(&v.language) == prefix)
            .collect();
        if let Some(voice) = best_of(&matching) {
            debug!("Matched language prefix '{}' with '{}'", prefix, voice.name);
            return bind(voice, language);
        }

        let voice = voices
            .iter()
            .find(|v| v.is_default)
            .unwrap_or(&voices[0]);
        warn!(
            "No voice for '{language}', using default '{}' ({})",
            voice.name, voice.language
        );
        bind(voice, language)
    }
}

/// Prefer a curated-sounding name among equally matching voices.
fn best_of<'a>(matching: &[&'a VoiceInfo]) -> Option<&'a VoiceInfo> {
    matching
        .iter()
        .find(|v| lexicon::has_quality_name(&v.name))
        .or_else(|| matching.first())
        .copied()
}

fn bind(voice: &VoiceInfo, language: &str) -> VoiceBinding {
    VoiceBinding {
        language: language.to_string(),
        voice_id: voice.id.clone(),
        voice_name: voice.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn voice(id: &str, name: &str, language: &str, is_default: bool) -> VoiceInfo {
        VoiceInfo {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            is_default,
        }
    }

    fn resolver(voices: Vec<VoiceInfo>) -> VoiceResolver {
        let config = VoiceConfig {
            catalog_retry_delay_ms: 1,
            ..Default::default()
        };
        VoiceResolver::new(Arc::new(StaticCatalog::new(voices)), &config)
    }

    #[tokio::test]
    async fn curated_name_beats_exact_tag() {
        let r = resolver(vec![
            voice("v1", "Generic Chinese", "zh-CN", false),
            voice("v2", "Microsoft Xiaoxiao - Chinese (Simplified, PRC)", "zh-CN", false),
        ]);
        let binding = r.select(1, "zh-CN").await.unwrap();
        assert_eq!(binding.voice_id, "v2");
        assert!(binding.is_quality_voice());
    }

    #[tokio::test]
    async fn alias_counts_as_exact_match() {
        let r = resolver(vec![
            voice("v1", "Fallback", "en-US", true),
            voice("v2", "Mandarin Voice", "cmn-Hans-CN", false),
        ]);
        let binding = r.select(1, "zh-CN").await.unwrap();
        assert_eq!(binding.voice_id, "v2");
    }

    #[tokio::test]
    async fn prefix_match_when_no_exact_tag() {
        let r = resolver(vec![
            voice("v1", "British English", "en-GB", false),
            voice("v2", "Deutsch", "de-DE", false),
        ]);
        let binding = r.select(1, "en-AU").await.unwrap();
        assert_eq!(binding.voice_id, "v1");
    }

    #[tokio::test]
    async fn default_voice_is_last_resort() {
        let r = resolver(vec![
            voice("v1", "Deutsch", "de-DE", false),
            voice("v2", "Default Voice", "en-US", true),
        ]);
        let binding = r.select(1, "th-TH").await.unwrap();
        assert_eq!(binding.voice_id, "v2");
    }

    #[tokio::test]
    async fn empty_catalog_is_fatal() {
        let r = resolver(Vec::new());
        assert!(matches!(
            r.select(1, "zh-CN").await,
            Err(VoiceError::CatalogEmpty)
        ));
    }

    /// Catalog that changes contents between calls.
    struct ShiftingCatalog {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl VoiceCatalog for ShiftingCatalog {
        async fn list_voices(&self) -> Vec<VoiceInfo> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                vec![VoiceInfo {
                    id: "first".into(),
                    name: "First Voice".into(),
                    language: "en-US".into(),
                    is_default: true,
                }]
            } else {
                vec![VoiceInfo {
                    id: "second".into(),
                    name: "Second Voice".into(),
                    language: "en-US".into(),
                    is_default: true,
                }]
            }
        }
    }

    #[tokio::test]
    async fn binding_is_stable_within_a_session() {
        let config = VoiceConfig::default();
        let r = VoiceResolver::new(
            Arc::new(ShiftingCatalog {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
            &config,
        );
        let first = r.select(7, "en-US").await.unwrap();
        let again = r.select(7, "en-US").await.unwrap();
        assert_eq!(first, again, "voice drifted mid-session");

        // A new session re-resolves and may see the changed catalog.
        r.clear_cache();
        let next = r.select(8, "en-US").await.unwrap();
        assert_eq!(next.voice_id, "second");
    }

    /// Catalog that is empty on the first query and populated afterwards.
    struct LateCatalog {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl VoiceCatalog for LateCatalog {
        async fn list_voices(&self) -> Vec<VoiceInfo> {
            let n = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 0 {
                Vec::new()
            } else {
                vec![VoiceInfo {
                    id: "late".into(),
                    name: "Late Voice".into(),
                    language: "ja-JP".into(),
                    is_default: false,
                }]
            }
        }
    }

    #[tokio::test]
    async fn late_populating_catalog_is_retried() {
        let config = VoiceConfig {
            catalog_retry_delay_ms: 1,
            ..Default::default()
        };
        let r = VoiceResolver::new(
            Arc::new(LateCatalog {
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
            &config,
        );
        let binding = r.select(1, "ja-JP").await.unwrap();
        assert_eq!(binding.voice_id, "late");
    }
}
