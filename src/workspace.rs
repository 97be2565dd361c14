use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::state::GarmentKind;

/// On-disk handoff between pipeline steps. Each step overwrites its slot file;
/// the presence of a slot file is the signal that the slot has been chosen.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

pub const REFERENCE_COLLAGE: &str = "reference_collage";
pub const PERSON_SLOT: &str = "person";

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Workspace {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn input_path(&self, slot: &str) -> PathBuf {
        self.input_dir().join(format!("{slot}.png"))
    }

    pub fn garment_path(&self, kind: GarmentKind) -> PathBuf {
        self.input_path(kind.slot())
    }

    pub fn person_path(&self) -> PathBuf {
        self.input_path(PERSON_SLOT)
    }

    pub fn collage_path(&self) -> PathBuf {
        self.input_path(REFERENCE_COLLAGE)
    }

    pub fn generated_path(&self) -> PathBuf {
        self.output_dir().join("generated_tryon.png")
    }

    pub fn save_input(&self, slot: &str, image: &RgbaImage) -> Result<PathBuf> {
        let dir = self.input_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create input directory {}", dir.display()))?;
        let path = self.input_path(slot);
        image
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(path)
    }

    pub fn save_generated(&self, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.output_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        let path = self.generated_path();
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn load_input(&self, slot: &str) -> Result<RgbaImage> {
        let path = self.input_path(slot);
        let image = image::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(image.to_rgba8())
    }

    pub fn has_input(&self, slot: &str) -> bool {
        self.input_path(slot).is_file()
    }

    /// Slots the collage still needs. The compositor requires all four panels,
    /// so the controller refuses to composite until this comes back empty.
    pub fn missing_collage_slots(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_input(PERSON_SLOT) {
            missing.push(PERSON_SLOT);
        }
        for kind in GarmentKind::ALL {
            if !self.has_input(kind.slot()) {
                missing.push(kind.slot());
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
    }

    #[test]
    fn slot_paths_follow_the_fixed_layout() {
        let ws = Workspace::new("/tmp/tryon");
        assert_eq!(ws.person_path(), PathBuf::from("/tmp/tryon/input/person.png"));
        assert_eq!(
            ws.garment_path(GarmentKind::Lower),
            PathBuf::from("/tmp/tryon/input/lower.png")
        );
        assert_eq!(
            ws.collage_path(),
            PathBuf::from("/tmp/tryon/input/reference_collage.png")
        );
        assert_eq!(
            ws.generated_path(),
            PathBuf::from("/tmp/tryon/output/generated_tryon.png")
        );
    }

    #[test]
    fn save_then_load_round_trips_a_slot() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());

        ws.save_input(PERSON_SLOT, &solid(4, 6)).unwrap();
        let loaded = ws.load_input(PERSON_SLOT).unwrap();
        assert_eq!(loaded.dimensions(), (4, 6));
        assert!(ws.has_input(PERSON_SLOT));
    }

    #[test]
    fn missing_slots_reports_everything_not_yet_saved() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());

        assert_eq!(
            ws.missing_collage_slots(),
            vec!["person", "upper", "lower", "shoes"]
        );

        ws.save_input("shoes", &solid(2, 2)).unwrap();
        ws.save_input(PERSON_SLOT, &solid(2, 2)).unwrap();
        assert_eq!(ws.missing_collage_slots(), vec!["upper", "lower"]);
    }
}
