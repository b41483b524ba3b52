//! Platform services the customizer delegates to: saving a snapshot of the
//! view and sharing a link.

use image::RgbaImage;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Sharing is not supported on this platform.")]
    ShareUnsupported,
    #[error("failed to save snapshot to {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Rendered 3D view without UI.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: RgbaImage,
    pub suggested_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRequest {
    pub title: String,
    pub text: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Saved(PathBuf),
    Cancelled,
}

pub trait HostServices {
    fn print(&mut self, snapshot: &Snapshot) -> Result<PrintOutcome, HostError>;
    fn share(&mut self, request: &ShareRequest) -> Result<(), HostError>;
}

type SaveDialog = Box<dyn FnMut(&str) -> Option<PathBuf>>;

/// Native desktop host: "print" saves a PNG through a file dialog.
pub struct DesktopHost {
    save_dialog: SaveDialog,
}

impl DesktopHost {
    pub fn new() -> Self {
        Self::with_save_dialog(|suggested| {
            rfd::FileDialog::new()
                .add_filter("PNG image", &["png"])
                .set_title("Download View")
                .set_file_name(suggested)
                .save_file()
        })
    }

    pub fn with_save_dialog(dialog: impl FnMut(&str) -> Option<PathBuf> + 'static) -> Self {
        Self {
            save_dialog: Box::new(dialog),
        }
    }
}

impl Default for DesktopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostServices for DesktopHost {
    fn print(&mut self, snapshot: &Snapshot) -> Result<PrintOutcome, HostError> {
        let Some(mut path) = (self.save_dialog)(&snapshot.suggested_name) else {
            log::debug!("Snapshot save cancelled");
            return Ok(PrintOutcome::Cancelled);
        };
        if path.extension().is_none() {
            path.set_extension("png");
        }
        snapshot
            .image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|source| HostError::Save {
                path: path.display().to_string(),
                source,
            })?;
        log::info!("Saved snapshot to {}", path.display());
        Ok(PrintOutcome::Saved(path))
    }

    fn share(&mut self, request: &ShareRequest) -> Result<(), HostError> {
        log::warn!("Share requested for '{}' but no share target exists", request.title);
        Err(HostError::ShareUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("{}-{}-{}", name, std::process::id(), nonce))
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            image: RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255])),
            suggested_name: "house.png".to_string(),
        }
    }

    #[test]
    fn print_writes_png_with_extension() {
        let target = temp_path("snapshot");
        let chosen = target.clone();
        let mut host = DesktopHost::with_save_dialog(move |suggested| {
            assert_eq!(suggested, "house.png");
            Some(chosen.clone())
        });
        let outcome = host.print(&snapshot()).unwrap();
        let expected = target.with_extension("png");
        assert_eq!(outcome, PrintOutcome::Saved(expected.clone()));

        let loaded = image::open(&expected).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (4, 2));
        assert_eq!(loaded.get_pixel(3, 1).0, [10, 20, 30, 255]);
        let _ = std::fs::remove_file(expected);
    }

    #[test]
    fn cancelled_dialog_is_a_no_op() {
        let mut host = DesktopHost::with_save_dialog(|_| None);
        assert_eq!(host.print(&snapshot()).unwrap(), PrintOutcome::Cancelled);
    }

    #[test]
    fn share_is_unsupported_on_desktop() {
        let mut host = DesktopHost::with_save_dialog(|_| None);
        let request = ShareRequest {
            title: "House".to_string(),
            text: "My design".to_string(),
            url: None,
        };
        let err = host.share(&request).unwrap_err();
        assert!(matches!(err, HostError::ShareUnsupported));
        assert_eq!(err.to_string(), "Sharing is not supported on this platform.");
    }
}
