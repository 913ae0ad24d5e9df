use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use crate::config::EncodeConfig;

/// Placeholder used in file names when the episode number is unknown
pub const UNKNOWN_EPISODE: &str = "XX";

/// One recorded program as listed in `recorded.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgramRecord {
    /// Source path, relative to the scheduler directory
    pub recorded: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(rename = "subTitle", default, deserialize_with = "null_as_empty")]
    pub sub_title: String,
    #[serde(default, deserialize_with = "lenient_episode")]
    pub episode: Option<u32>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept integers and integer strings; anything else means "unknown"
fn lenient_episode<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl ProgramRecord {
    /// `ep03`, `ep12`, or `epXX` when the episode is unknown
    pub fn episode_label(&self) -> String {
        match self.episode {
            Some(n) => format!("ep{:02}", n),
            None => format!("ep{}", UNKNOWN_EPISODE),
        }
    }

    /// File name shared by the temporary and the published output
    pub fn output_file_name(&self, ext: &str) -> String {
        format!("{}_{}.{}", self.episode_label(), sanitize_component(&self.sub_title), ext)
    }
}

/// Load the whole program list from the scheduler's metadata file
pub fn load_programs(path: &Path) -> Result<Vec<ProgramRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program list: {}", path.display()))?;
    let programs: Vec<ProgramRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse program list: {}", path.display()))?;
    Ok(programs)
}

/// Make a title usable as a single path component
///
/// Separators become their full-width look-alikes so a title never adds a
/// directory level, and `.`/`..` cannot name the current or parent directory.
pub fn sanitize_component(name: &str) -> String {
    if name == "." || name == ".." {
        return name.replace('.', "\u{FF0E}");
    }

    name.chars()
        .map(|c| match c {
            '/' => '\u{FF0F}',
            '\\' if std::path::is_separator('\\') => '\u{FF3C}',
            c => c,
        })
        .collect()
}

/// Strip every leading occurrence of `prefix` from a recorded path
pub fn strip_recorded_prefix<'a>(recorded: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return recorded;
    }
    let mut rest = recorded;
    while let Some(stripped) = rest.strip_prefix(prefix) {
        rest = stripped;
    }
    rest
}

/// Every path involved in processing one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramPaths {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    pub temp: PathBuf,
    pub final_path: PathBuf,
}

impl ProgramPaths {
    pub fn resolve(record: &ProgramRecord, cfg: &EncodeConfig) -> Self {
        // an absolute recorded path replaces the root when joined
        let source = cfg
            .recorded_root
            .join(strip_recorded_prefix(&record.recorded, &cfg.recorded_prefix));
        let output_dir = cfg.encoded_dir.join(sanitize_component(&record.title));
        let file_name = record.output_file_name(&cfg.container_ext);

        Self {
            source,
            temp: cfg.temp_dir.join(&file_name),
            final_path: output_dir.join(&file_name),
            output_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(json: &str) -> ProgramRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_episode_label() {
        assert_eq!(record(r#"{"recorded": "a", "episode": 3}"#).episode_label(), "ep03");
        assert_eq!(record(r#"{"recorded": "a", "episode": 12}"#).episode_label(), "ep12");
        assert_eq!(record(r#"{"recorded": "a", "episode": 123}"#).episode_label(), "ep123");
        assert_eq!(record(r#"{"recorded": "a", "episode": 0}"#).episode_label(), "ep00");
    }

    #[test]
    fn test_episode_label_unknown() {
        assert_eq!(record(r#"{"recorded": "a"}"#).episode_label(), "epXX");
        assert_eq!(record(r#"{"recorded": "a", "episode": null}"#).episode_label(), "epXX");
        assert_eq!(record(r#"{"recorded": "a", "episode": "final"}"#).episode_label(), "epXX");
        assert_eq!(record(r#"{"recorded": "a", "episode": -1}"#).episode_label(), "epXX");
        assert_eq!(record(r#"{"recorded": "a", "episode": 2.5}"#).episode_label(), "epXX");
        assert_eq!(record(r#"{"recorded": "a", "episode": [1]}"#).episode_label(), "epXX");
    }

    #[test]
    fn test_episode_accepts_numeric_strings_and_whole_floats() {
        assert_eq!(record(r#"{"recorded": "a", "episode": "7"}"#).episode, Some(7));
        assert_eq!(record(r#"{"recorded": "a", "episode": 4.0}"#).episode, Some(4));
    }

    #[test]
    fn test_record_ignores_unknown_fields() {
        let r = record(
            r#"{"id": "abc", "channel": {"name": "NHK"}, "recorded": "./recorded/x.m2ts",
                "title": "News", "subTitle": "Morning", "episode": 1, "start": 1700000000000}"#,
        );
        assert_eq!(r.recorded, "./recorded/x.m2ts");
        assert_eq!(r.title, "News");
        assert_eq!(r.sub_title, "Morning");
        assert_eq!(r.episode, Some(1));
    }

    #[test]
    fn test_null_titles_are_empty() {
        let r = record(r#"{"recorded": "./a.m2ts", "title": null, "subTitle": null, "episode": 2}"#);
        assert_eq!(r.title, "");
        assert_eq!(r.sub_title, "");
        assert_eq!(r.output_file_name("mp4"), "ep02_.mp4");
    }

    #[test]
    fn test_record_requires_recorded_path() {
        assert!(serde_json::from_str::<ProgramRecord>(r#"{"title": "News"}"#).is_err());
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Fate/Zero"), "Fate\u{FF0F}Zero");
        assert_eq!(sanitize_component("a/b/c"), "a／b／c");
        assert_eq!(sanitize_component("plain"), "plain");
        assert_eq!(sanitize_component(""), "");
        assert_eq!(sanitize_component(".."), "．．");
        assert_eq!(sanitize_component("."), "．");
        assert_eq!(sanitize_component("...and more"), "...and more");
    }

    #[test]
    fn test_strip_recorded_prefix() {
        assert_eq!(strip_recorded_prefix("./recorded/x.m2ts", "./"), "recorded/x.m2ts");
        assert_eq!(strip_recorded_prefix("././recorded/x.m2ts", "./"), "recorded/x.m2ts");
        assert_eq!(strip_recorded_prefix("recorded/x.m2ts", "./"), "recorded/x.m2ts");
        assert_eq!(strip_recorded_prefix("./x", ""), "./x");
    }

    #[test]
    fn test_resolve_paths() {
        let mut cfg = EncodeConfig::with_home(Path::new("/home/rec"));
        cfg.temp_dir = PathBuf::from("/var/tmp");
        let r = record(
            r#"{"recorded": "./recorded/[220101-2300][GR27]Fate／Zero.m2ts",
                "title": "Fate/Zero", "subTitle": "A/B", "episode": 3}"#,
        );

        let paths = ProgramPaths::resolve(&r, &cfg);

        assert_eq!(
            paths.source,
            PathBuf::from("/home/rec/chinachu/recorded/[220101-2300][GR27]Fate／Zero.m2ts")
        );
        assert_eq!(paths.output_dir, PathBuf::from("/home/rec/enc/encoded/latest/Fate／Zero"));
        assert_eq!(paths.temp, PathBuf::from("/var/tmp/ep03_A／B.mp4"));
        assert_eq!(
            paths.final_path,
            PathBuf::from("/home/rec/enc/encoded/latest/Fate／Zero/ep03_A／B.mp4")
        );
        // no extra directory level from the title
        assert_eq!(paths.final_path.parent(), Some(paths.output_dir.as_path()));
        assert_eq!(paths.output_dir.parent(), Some(cfg.encoded_dir.as_path()));
    }

    #[test]
    fn test_resolve_absolute_recorded_path() {
        let cfg = EncodeConfig::with_home(Path::new("/home/rec"));
        let r = record(r#"{"recorded": "/mnt/rec/x.m2ts", "title": "T", "subTitle": "S"}"#);
        let paths = ProgramPaths::resolve(&r, &cfg);
        assert_eq!(paths.source, PathBuf::from("/mnt/rec/x.m2ts"));
        assert_eq!(paths.temp.file_name().unwrap(), "epXX_S.mp4");
    }

    #[test]
    fn test_load_programs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recorded.json");
        std::fs::write(
            &path,
            r#"[{"recorded": "./a.m2ts", "title": "A", "subTitle": "one", "episode": 1},
                {"recorded": "./b.m2ts", "title": "B", "subTitle": "two"},
                {"recorded": "./c.m2ts", "title": null, "subTitle": null}]"#,
        )
        .unwrap();

        let programs = load_programs(&path).unwrap();
        assert_eq!(programs.len(), 3);
        assert_eq!(programs[0].title, "A");
        assert_eq!(programs[1].episode, None);
    }

    #[test]
    fn test_load_programs_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_programs(&dir.path().join("recorded.json")).unwrap_err();
        assert!(format!("{:#}", missing).contains("Failed to read program list"));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let broken = load_programs(&path).unwrap_err();
        assert!(format!("{:#}", broken).contains("Failed to parse program list"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_sanitized_title_is_one_component(title in "[a-zA-Z0-9 ./_-]{1,30}") {
            let sanitized = sanitize_component(&title);
            prop_assert!(!sanitized.contains('/'));
            prop_assert_eq!(sanitized.chars().count(), title.chars().count());

            let root = Path::new("/lib");
            let joined = root.join(&sanitized);
            prop_assert_eq!(joined.parent(), Some(root));
        }

        #[test]
        fn prop_known_episodes_are_zero_padded(n in 0u32..1000) {
            let r = ProgramRecord {
                recorded: "a".to_string(),
                title: String::new(),
                sub_title: String::new(),
                episode: Some(n),
            };
            let label = r.episode_label();
            prop_assert!(label.starts_with("ep"));
            prop_assert!(label.len() >= 4);
            prop_assert_eq!(label[2..].parse::<u32>().unwrap(), n);
        }
    }
}
