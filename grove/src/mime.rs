// mime guessing tuned for version-controlled content: try the
// filename first, sniff the bytes only when the name says nothing,
// and assume plain text as the final fallback since most tracked
// files are source code.

use std::path::Path;

pub(crate) const BINARY: &str = "application/octet-stream";

pub(crate) const TEXT: &str = "text/plain";

// well-known filenames that carry no (or a misleading) extension
const PLAIN_NAMES: &[&str] = &[
    "AUTHORS",
    "CONTRIBUTING",
    "COPYING",
    "Cargo.lock",
    "Dockerfile",
    "INSTALL",
    "LICENSE",
    "Makefile",
    "README",
    "configure",
    "go.mod",
    "go.sum",
    "readme",
];

pub(crate) fn guess_from_path<P: AsRef<Path>>(path: P) -> Option<(&'static str, bool)> {
    let Some(filename) = path.as_ref().file_name() else {
        return Some((BINARY, false));
    };

    if PLAIN_NAMES.iter().any(|known| filename == *known) {
        return Some((TEXT, true));
    }

    if let Some(ext) = path.as_ref().extension() {
        // mime_guess maps java to octet-stream and knows nothing
        // about go files
        if ext == "java" {
            return Some(("text/x-java", true));
        }
        if ext == "go" {
            return Some((TEXT, true));
        }
    }

    if let Some(mime) = mime_guess::from_path(path.as_ref()).first_raw() {
        return Some((mime, is_text(mime)));
    }

    // dotfiles are overwhelmingly configuration, i.e. text
    if filename.as_encoded_bytes().first() == Some(&b'.') {
        return Some((TEXT, true));
    }

    None
}

pub(crate) fn guess_from_data(data: &[u8]) -> (&'static str, bool) {
    infer::get(data).map_or((TEXT, true), |m| (m.mime_type(), is_text(m.mime_type())))
}

pub(crate) fn guess<P: AsRef<Path>>(path: P, data: &[u8]) -> (&'static str, bool) {
    guess_from_path(&path).unwrap_or_else(|| {
        if !data.is_empty() {
            tracing::trace!(
                path = tracing::field::debug(path.as_ref()),
                "sniffing bytes to infer mime"
            );
        }
        guess_from_data(data)
    })
}

fn is_text(mime: &'static str) -> bool {
    let (mime, _param) = mime.split_once(';').unwrap_or((mime, ""));
    let (mime, suffix) = mime.split_once('+').unwrap_or((mime, ""));
    let Some((mtype, subtype)) = mime.split_once('/') else {
        return false;
    };

    match mtype {
        "text" => true,
        "application" => {
            matches!(suffix, "xml" | "json")
                || matches!(
                    subtype,
                    "javascript" | "json" | "xml" | "x-sh" | "x-tcl" | "x-tex" | "x-texinfo"
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_based_guessing() {
        assert_eq!(Some((TEXT, true)), guess_from_path("go.mod"));
        assert_eq!(Some((TEXT, true)), guess_from_path("src/main.go"));
        assert_eq!(Some((TEXT, true)), guess_from_path(".gitignore"));
        assert_eq!(Some(("text/x-java", true)), guess_from_path("A.java"));
        assert!(guess_from_path("picture.png").is_some_and(|(_, is_text)| !is_text));
        // nothing to go by: let the caller sniff
        assert_eq!(None, guess_from_path("mystery"));
    }

    #[test]
    fn textiness() {
        assert!(is_text("text/x-whatever"));
        assert!(is_text("application/json"));
        assert!(is_text("application/svg+xml"));
        assert!(!is_text("application/octet-stream"));
        assert!(!is_text("image/png"));
        assert!(!is_text("garbage"));
    }
}
