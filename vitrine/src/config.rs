use std::net::SocketAddr;

use crate::view::Theme;

#[derive(Debug, Clone)]
pub(crate) struct GlobalConfig {
    pub site: Site,
    pub max_file_size_bytes: u64,
    pub repo_object_cache_size: usize,
    pub num_threads: Option<usize>,
    pub listen_addr: SocketAddr,
    pub theme: Theme,
}

#[derive(Debug, Clone)]
pub(crate) struct Site {
    pub listing_title: String,
    pub listing_html_header: String,

    // for mounting the whole thing as a subfolder when reverse
    // proxying. every emitted url gets it prepended
    pub reverse_proxy_base: Option<String>,
}

impl GlobalConfig {
    // XXX iffy but not doing a builder for this thing
    pub fn check(self) -> crate::Result<Self> {
        if self
            .site
            .reverse_proxy_base
            .as_ref()
            .is_some_and(|p| !p.starts_with('/') || p.ends_with('/'))
        {
            return Err(
                "reverse proxy base must start with / and not end with it. ex: /valid".into(),
            );
        }

        if self.max_file_size_bytes == 0 {
            return Err("max file size must be larger than zero".into());
        }

        Ok(self)
    }

    pub fn base(&self) -> &str {
        self.site.reverse_proxy_base.as_deref().unwrap_or_default()
    }

    pub fn repo_url(&self, name: &str) -> String {
        format!("{}/{name}/", self.base())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(reverse_proxy_base: Option<&str>) -> GlobalConfig {
        GlobalConfig {
            site: Site {
                listing_title: "test".into(),
                listing_html_header: String::new(),
                reverse_proxy_base: reverse_proxy_base.map(String::from),
            },
            max_file_size_bytes: 1024,
            repo_object_cache_size: 1024,
            num_threads: None,
            listen_addr: "[::1]:0".parse().expect("valid addr"),
            theme: Theme::Static,
        }
    }

    #[test]
    fn reverse_proxy_base_shape() {
        assert!(config(None).check().is_ok());
        assert!(config(Some("/code")).check().is_ok());
        assert!(config(Some("code")).check().is_err(), "must start with /");
        assert!(config(Some("/code/")).check().is_err(), "must not end with /");
    }

    #[test]
    fn urls_honor_the_base() {
        let plain = config(None).check().expect("valid");
        assert_eq!("/forge/", plain.repo_url("forge"));

        let mounted = config(Some("/code")).check().expect("valid");
        assert_eq!("/code/forge/", mounted.repo_url("forge"));
    }
}
