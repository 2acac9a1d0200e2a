pub mod config_io;

use std::path::PathBuf;
use std::sync::Arc;

use boxr::boxes::{DirectoryBox, ResourceBox};
use boxr::overlay::OverlayBox;

/// Stack directory boxes in priority order, highest first.
pub fn overlay_from_dirs(dirs: &[PathBuf]) -> boxr::Result<OverlayBox> {
    let mut overlay = OverlayBox::default();
    for dir in dirs {
        let dir_box: Arc<dyn ResourceBox> = Arc::new(DirectoryBox::new(dir)?);
        overlay = overlay.with(dir_box);
    }
    Ok(overlay)
}
