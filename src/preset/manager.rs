use super::Preset;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory of `<name>.json` presets, indexed by preset name.
pub struct Manager {
    presets_dir: PathBuf,
    presets: BTreeMap<String, Preset>,
}

impl Manager {
    pub fn new(preset_dir: impl AsRef<Path>) -> Result<Self> {
        let presets_dir = preset_dir.as_ref().to_path_buf();
        fs::create_dir_all(&presets_dir).with_context(|| {
            format!("Failed to create presets directory {}", presets_dir.display())
        })?;

        let mut manager = Self {
            presets_dir,
            presets: BTreeMap::new(),
        };
        manager.load_presets()?;

        Ok(manager)
    }

    pub fn presets_dir(&self) -> &Path {
        &self.presets_dir
    }

    /// Rescans the directory. Unreadable files are skipped with a warning.
    pub fn load_presets(&mut self) -> Result<()> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.presets_dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        paths.retain(|path| path.extension().is_some_and(|ext| ext == "json"));
        paths.sort();

        self.presets.clear();
        for path in paths {
            let preset = match load_preset_file(&path) {
                Ok(preset) => preset,
                Err(e) => {
                    warn!("Skipping preset {}: {e:#}", path.display());
                    continue;
                }
            };

            if self.presets.contains_key(&preset.name) {
                warn!(
                    "Preset '{}' in {} shadows an earlier file, ignoring it",
                    preset.name,
                    path.display()
                );
                continue;
            }
            self.presets.insert(preset.name.clone(), preset);
        }

        debug!(
            "Loaded {} presets from {}",
            self.presets.len(),
            self.presets_dir.display()
        );
        Ok(())
    }

    pub fn save_preset(&mut self, preset: &Preset) -> Result<()> {
        let duplicates = preset.bands.duplicate_keys();
        if !duplicates.is_empty() {
            warn!(
                "Preset '{}' repeats band keys: {}",
                preset.name,
                duplicates.join(", ")
            );
        }

        let json = serde_json::to_string_pretty(preset).context("Failed to serialize preset")?;
        let path = self.preset_path(&preset.name);
        fs::write(&path, json)
            .with_context(|| format!("Failed to write preset {}", path.display()))?;

        self.load_presets()
    }

    pub fn delete_preset(&mut self, name: &str) -> Result<()> {
        let path = self.preset_path(name);
        if !path.exists() {
            bail!("Preset file not found: {name}");
        }

        fs::remove_file(&path).context("Failed to delete preset file")?;
        self.load_presets()
    }

    /// Saves `from` under `to` and removes the old file.
    pub fn rename_preset(&mut self, from: &str, to: &str) -> Result<()> {
        if self.preset_exists(to) {
            bail!("Preset '{to}' already exists");
        }
        let Some(preset) = self.presets.get(from) else {
            bail!("No preset named '{from}'");
        };

        let renamed = Preset {
            name: to.to_string(),
            ..preset.clone()
        };
        self.save_preset(&renamed)?;
        self.delete_preset(from)
    }

    pub fn preset_exists(&self, name: &str) -> bool {
        self.presets.contains_key(name)
    }

    /// Presets ordered by name.
    pub fn get_presets(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }

    pub fn get_preset_by_name(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    fn preset_path(&self, name: &str) -> PathBuf {
        self.presets_dir
            .join(format!("{}.json", sanitize_filename(name)))
    }
}

/// Reads a single preset file from anywhere on disk.
pub fn load_preset_file(path: impl AsRef<Path>) -> Result<Preset> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read preset file")?;

    serde_json::from_str(&content).context("Failed to parse preset JSON")
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BandEdit, default_bands};
    use crate::graph::FilterKind;

    fn names(manager: &Manager) -> Vec<&str> {
        manager.get_presets().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn save_then_reload_sorted_by_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = Manager::new(dir.path())?;

        manager.save_preset(&Preset::new("Vocal", default_bands()))?;
        manager.save_preset(&Preset::default().with_author("me"))?;
        assert_eq!(names(&manager), vec!["Default", "Vocal"]);

        let reopened = Manager::new(dir.path())?;
        let preset = reopened.get_preset_by_name("Default").unwrap();
        assert_eq!(preset.author.as_deref(), Some("me"));
        assert_eq!(preset.bands, default_bands());
        Ok(())
    }

    #[test]
    fn overwriting_keeps_one_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = Manager::new(dir.path())?;

        let bands = default_bands();
        manager.save_preset(&Preset::new("Air", bands.clone()))?;
        let louder = bands.with_edit("eq1", BandEdit::Gain(6.0))?;
        manager.save_preset(&Preset::new("Air", louder))?;

        assert_eq!(names(&manager), vec!["Air"]);
        let stored = manager.get_preset_by_name("Air").unwrap();
        assert_eq!(stored.bands.get("eq1").unwrap().g, 6.0);
        Ok(())
    }

    #[test]
    fn delete_removes_the_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = Manager::new(dir.path())?;
        manager.save_preset(&Preset::new("Bright / Wide", default_bands()))?;
        assert!(dir.path().join("Bright___Wide.json").exists());

        manager.delete_preset("Bright / Wide")?;
        assert!(!manager.preset_exists("Bright / Wide"));
        assert!(manager.delete_preset("Bright / Wide").is_err());
        Ok(())
    }

    #[test]
    fn rename_moves_the_preset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manager = Manager::new(dir.path())?;
        manager.save_preset(&Preset::new("Old", default_bands()))?;
        manager.save_preset(&Preset::new("Taken", default_bands()))?;

        assert!(manager.rename_preset("Old", "Taken").is_err());
        assert!(manager.rename_preset("Missing", "Other").is_err());

        manager.rename_preset("Old", "New")?;
        assert_eq!(names(&manager), vec!["New", "Taken"]);
        assert!(!dir.path().join("Old.json").exists());
        Ok(())
    }

    #[test]
    fn same_name_in_two_files_keeps_the_first() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("a.json"),
            r#"{"name":"Twin","description":"first","bands":[]}"#,
        )?;
        fs::write(
            dir.path().join("b.json"),
            r#"{"name":"Twin","description":"second","bands":[]}"#,
        )?;

        let manager = Manager::new(dir.path())?;
        let twin = manager.get_preset_by_name("Twin").unwrap();
        assert_eq!(twin.description.as_deref(), Some("first"));
        Ok(())
    }

    #[test]
    fn broken_files_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("broken.json"), "{ not json")?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;
        fs::write(
            dir.path().join("routing.json"),
            r#"{"name":"Bad","bands":[
                {"key":"a","type":"peak","fc":100,"q":1,"g":0,"bypass":false,"channels":"center"}]}"#,
        )?;
        fs::write(
            dir.path().join("legacy.json"),
            r#"{"name":"Legacy","bands":[
                {"key":"a","type":"tilt","fc":100,"q":1,"g":2,"bypass":false,"channels":"mid"}]}"#,
        )?;

        let manager = Manager::new(dir.path())?;
        assert_eq!(names(&manager), vec!["Legacy"]);

        let band = manager.get_preset_by_name("Legacy").unwrap().bands.get("a").unwrap();
        assert_eq!(band.kind, FilterKind::Peak);
        Ok(())
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("My Preset!"), "My_Preset_");
        assert_eq!(sanitize_filename("ok-name_1"), "ok-name_1");
    }
}
