use std::path::{Path, PathBuf};

pub const DEFAULT_LANG: &str = "en";
const MANIFEST_FILE: &str = "locales-manifest.json";

/// Read-only view of the static localization tree:
///
/// ```text
/// <root>/locales-manifest.json
/// <root>/locales/<lang>/disease_descriptions/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct LocaleStore {
    root: PathBuf,
}

impl LocaleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn manifest_path(&self) -> Option<PathBuf> {
        let path = self.root.join(MANIFEST_FILE);
        is_file(&path).await.then_some(path)
    }

    /// Resolves the description file for `disease_id` in `lang`, falling back to English.
    pub async fn disease_description_path(
        &self,
        disease_id: &str,
        lang: Option<&str>,
    ) -> Option<PathBuf> {
        let safe_id = sanitize_disease_id(disease_id);
        if safe_id.is_empty() {
            return None;
        }

        if let Some(lang) = lang.filter(|l| is_valid_lang(l)) {
            let path = self.description_file(lang, &safe_id);
            if is_file(&path).await {
                return Some(path);
            }
        }

        let path = self.description_file(DEFAULT_LANG, &safe_id);
        is_file(&path).await.then_some(path)
    }

    fn description_file(&self, lang: &str, safe_id: &str) -> PathBuf {
        self.root
            .join("locales")
            .join(lang)
            .join("disease_descriptions")
            .join(format!("{}.json", safe_id))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Strips path separators and `..` so the id stays a single file name.
pub fn sanitize_disease_id(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    while id.contains("..") {
        id = id.replace("..", "");
    }
    id
}

fn is_valid_lang(lang: &str) -> bool {
    !lang.is_empty()
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;

    use super::*;

    pub(crate) fn write_description(root: &Path, lang: &str, id: &str, body: &str) {
        let dir = root.join("locales").join(lang).join("disease_descriptions");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.json", id)), body).unwrap();
    }

    #[test]
    fn sanitize_removes_traversal() {
        assert_eq!(sanitize_disease_id("Tomato___healthy"), "Tomato___healthy");
        assert_eq!(sanitize_disease_id("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_disease_id("..\\..\\secret"), "secret");
        assert_eq!(sanitize_disease_id("./."), "");
        assert_eq!(sanitize_disease_id("...."), "");
        assert_eq!(sanitize_disease_id("a.b"), "a.b");
    }

    #[test]
    fn lang_must_be_a_plain_tag() {
        assert!(is_valid_lang("en"));
        assert!(is_valid_lang("pt-BR"));
        assert!(is_valid_lang("zh_Hant"));
        assert!(!is_valid_lang(""));
        assert!(!is_valid_lang("../en"));
        assert!(!is_valid_lang("en/.."));
    }

    #[tokio::test]
    async fn prefers_requested_language() {
        let dir = tempfile::tempdir().unwrap();
        write_description(dir.path(), "en", "Apple___scab", "{}");
        write_description(dir.path(), "hi", "Apple___scab", "{}");
        let store = LocaleStore::new(dir.path());

        let path = store
            .disease_description_path("Apple___scab", Some("hi"))
            .await
            .unwrap();
        assert!(path.ends_with("locales/hi/disease_descriptions/Apple___scab.json"));
    }

    #[tokio::test]
    async fn falls_back_to_english() {
        let dir = tempfile::tempdir().unwrap();
        write_description(dir.path(), "en", "Apple___scab", "{}");
        let store = LocaleStore::new(dir.path());

        for lang in [Some("fr"), Some("../../"), None] {
            let path = store
                .disease_description_path("Apple___scab", lang)
                .await
                .unwrap();
            assert!(path.ends_with("locales/en/disease_descriptions/Apple___scab.json"));
        }
    }

    #[tokio::test]
    async fn missing_everywhere_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocaleStore::new(dir.path());
        assert!(store
            .disease_description_path("Apple___scab", Some("fr"))
            .await
            .is_none());
        assert!(store.disease_description_path("..", None).await.is_none());
    }

    #[tokio::test]
    async fn traversal_id_cannot_escape_descriptions_dir() {
        let dir = tempfile::tempdir().unwrap();
        // A file the traversal would reach if separators survived.
        fs::write(dir.path().join("secret.json"), "{}").unwrap();
        let store = LocaleStore::new(dir.path());

        assert!(store
            .disease_description_path("../../../../secret", None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn manifest_only_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocaleStore::new(dir.path());
        assert!(store.manifest_path().await.is_none());

        fs::write(dir.path().join(MANIFEST_FILE), r#"{"languages":["en"]}"#).unwrap();
        assert!(store.manifest_path().await.is_some());
    }
}
