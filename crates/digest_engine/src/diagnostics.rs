use std::path::PathBuf;

use digest_logging::{digest_info, digest_warn};

use crate::persist::AtomicFileWriter;
use crate::PageDriver;

/// Best-effort page screenshots for post-mortem debugging.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCapture {
    dir: Option<PathBuf>,
}

impl DiagnosticCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Writes `{dir}/{name}.png`. Every failure is logged and swallowed.
    pub async fn capture(&self, driver: &dyn PageDriver, name: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let png = match driver.screenshot_png().await {
            Ok(bytes) => bytes,
            Err(err) => {
                digest_warn!("Could not capture screenshot {}: {}", name, err);
                return None;
            }
        };

        let filename = format!("{}.png", sanitize(name));
        match AtomicFileWriter::new(dir.clone()).write_bytes(&filename, &png) {
            Ok(path) => {
                digest_info!("Diagnostic screenshot saved to {:?}", path);
                Some(path)
            }
            Err(err) => {
                digest_warn!("Could not save screenshot {}: {}", filename, err);
                None
            }
        }
    }
}

fn sanitize(name: &str) -> String {
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
    use super::sanitize;

    #[test]
    fn sanitize_keeps_safe_characters_only() {
        assert_eq!(sanitize("extract_failure_veatch"), "extract_failure_veatch");
        assert_eq!(sanitize("extract_failure_../x y"), "extract_failure____x_y");
    }
}
