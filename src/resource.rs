use std::path::Path;

use crate::error::Error;

/// Resolve an `href`/`src` value against `base` (a directory path or URL
/// prefix ending in `/`).
///
/// Returns `None` for fragment-only and `mailto:` references, which never
/// name a fetchable resource. `../` segments backtrack through `base` but
/// never above its root.
pub fn resolve_path(base: &str, path: &str) -> Option<String> {
    let mut path = path.trim().replace('\\', "/");
    if let Some(rest) = path.strip_prefix("//") {
        path = format!("http://{rest}");
    }
    if let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }
    if path.starts_with('#') || path.to_ascii_lowercase().contains("mailto:") {
        return None;
    }

    let mut base = base.replace('\\', "/");
    if !base.is_empty() && !base.ends_with('/') {
        base.push('/');
    }

    if path.contains("../") {
        let backtrack = path.matches("../").count();
        let local_part = match url_root(&base) {
            Some(root) => &base[root.len()..],
            None => base.as_str(),
        };
        let max_backtrack = local_part.matches('/').count().saturating_sub(1);
        let file_part = path.replace("../", "");
        let mut resolved = base.clone();
        for _ in 0..backtrack.min(max_backtrack) + 1 {
            match resolved.rfind('/') {
                Some(idx) => resolved.truncate(idx),
                None => resolved.clear(),
            }
        }
        return Some(format!("{resolved}/{file_part}"));
    }

    let scheme_pos = path.find(":/");
    if scheme_pos.is_none_or(|p| p > 10) {
        if path.starts_with('/') {
            // Root-relative: keep the scheme and host of a URL base, otherwise
            // the path is already absolute on disk.
            if let Some(root) = url_root(&base) {
                return Some(format!("{root}{path}"));
            }
            return Some(path);
        }
        return Some(format!("{base}{path}"));
    }
    Some(path)
}

fn url_root(base: &str) -> Option<&str> {
    let scheme_end = base.find("://")?;
    let host_start = scheme_end + 3;
    let host_end = base[host_start..]
        .find('/')
        .map(|i| host_start + i)
        .unwrap_or(base.len());
    Some(&base[..host_end])
}

/// Fetches the bytes of images and linked stylesheets.
pub trait ResourceLoader {
    fn load(&self, location: &str) -> Result<Vec<u8>, Error>;

    fn load_text(&self, location: &str) -> Result<String, Error> {
        let bytes = self.load(location)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Loads `file://` URLs and plain paths from the local filesystem. Remote
/// URLs are reported as missing.
#[derive(Default)]
pub struct FsLoader;

impl ResourceLoader for FsLoader {
    fn load(&self, location: &str) -> Result<Vec<u8>, Error> {
        let local = location.strip_prefix("file://").unwrap_or(location);
        if local.contains("://") {
            return Err(Error::MissingResource(format!(
                "{location}: remote resources are not fetched"
            )));
        }
        std::fs::read(Path::new(local))
            .map_err(|e| Error::MissingResource(format!("{location}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_base() {
        assert_eq!(
            resolve_path("/srv/site/docs/", "img/a.png").as_deref(),
            Some("/srv/site/docs/img/a.png")
        );
        assert_eq!(
            resolve_path("/srv/site/docs/", "./a.css").as_deref(),
            Some("/srv/site/docs/a.css")
        );
    }

    #[test]
    fn backtracking_is_bounded_by_base_depth() {
        assert_eq!(
            resolve_path("/srv/site/docs/", "../a.png").as_deref(),
            Some("/srv/site/a.png")
        );
        assert_eq!(
            resolve_path("http://host/a/", "../../../../x.png").as_deref(),
            Some("http://host/x.png")
        );
    }

    #[test]
    fn absolute_and_non_resources() {
        assert_eq!(
            resolve_path("/base/", "https://x.org/i.png").as_deref(),
            Some("https://x.org/i.png")
        );
        assert_eq!(
            resolve_path("http://host/a/b/", "/i.png").as_deref(),
            Some("http://host/i.png")
        );
        assert_eq!(resolve_path("/base/", "#top"), None);
        assert_eq!(resolve_path("/base/", "mailto:a@b.c"), None);
        assert_eq!(resolve_path("C:\\docs\\", "a.png").as_deref(), Some("C:/docs/a.png"));
    }
}
