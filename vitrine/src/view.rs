use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::IntoResponse,
};
use minijinja::Environment;

use crate::repo::{BlobPage, Listing, RefsPage, TreePage};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Theme {
    Static,
    Dir(String),
}

impl Theme {
    pub(crate) fn env(&self) -> Result<Environment<'static>, minijinja::Error> {
        match self {
            Theme::Static => static_env(),
            Theme::Dir(n) => dir_env(n),
        }
    }
}

pub(crate) fn static_env() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();

    env.add_template("base.html", include_str!("../theme/base.html"))?;
    env.add_template("index.html", include_str!("../theme/index.html"))?;
    env.add_template("tree.html", include_str!("../theme/tree.html"))?;
    env.add_template("blob.html", include_str!("../theme/blob.html"))?;
    env.add_template("refs.html", include_str!("../theme/refs.html"))?;
    env.add_template("404.html", include_str!("../theme/404.html"))?;
    env.add_template("500.html", include_str!("../theme/500.html"))?;

    check_env(&env)?;

    Ok(env)
}

pub(crate) fn dir_env(dir: &str) -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(dir));
    check_env(&env)?;
    Ok(env)
}

fn check_env(env: &Environment<'_>) -> Result<(), minijinja::Error> {
    for kind in Kind::VALUES {
        env.get_template(kind.path())?;
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub(crate) struct View {
    kind: Kind,
    data: minijinja::Value,
}

impl View {
    pub(crate) fn index(data: Listing<'_>) -> Self {
        Self {
            kind: Kind::Index,
            data: minijinja::Value::from_serialize(&data),
        }
    }

    pub(crate) fn tree(data: TreePage<'_>) -> Self {
        Self {
            kind: Kind::Tree,
            data: minijinja::Value::from_serialize(&data),
        }
    }

    pub(crate) fn blob(data: BlobPage<'_>) -> Self {
        Self {
            kind: Kind::Blob,
            data: minijinja::Value::from_serialize(&data),
        }
    }

    pub(crate) fn refs(data: RefsPage<'_>) -> Self {
        Self {
            kind: Kind::Refs,
            data: minijinja::Value::from_serialize(&data),
        }
    }

    pub(crate) fn not_found() -> Self {
        Self {
            kind: Kind::NotFound,
            data: minijinja::Value::UNDEFINED,
        }
    }

    pub(crate) fn error(message: String) -> Self {
        Self {
            kind: Kind::Error,
            data: minijinja::context! { message },
        }
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Index,
    Tree,
    Blob,
    Refs,
    NotFound,
    Error,
}

impl Kind {
    const VALUES: [Kind; 6] = [
        Kind::Index,
        Kind::Tree,
        Kind::Blob,
        Kind::Refs,
        Kind::NotFound,
        Kind::Error,
    ];

    const fn path(&self) -> &'static str {
        match self {
            Kind::Index => "index.html",
            Kind::Tree => "tree.html",
            Kind::Blob => "blob.html",
            Kind::Refs => "refs.html",
            Kind::NotFound => "404.html",
            Kind::Error => "500.html",
        }
    }
}

pub(crate) fn render(env: &Environment<'_>, view: View) -> axum::response::Response {
    let Ok(tmpl) = env.get_template(view.kind.path()) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("template not found: {}", view.kind.path()),
        )
            .into_response();
    };
    match tmpl.render(view.data) {
        Ok(rendered) => (
            [(CONTENT_TYPE, HeaderValue::from_static("text/html"))],
            rendered,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("rendering template: {err:?}"),
        )
            .into_response(),
    }
}

pub(crate) fn render_markdown(data: &[u8]) -> String {
    let mut opts = markdown::Options::gfm();
    opts.compile.allow_dangerous_html = true;
    markdown::to_html_with_options(
        // FIXME assuming markdown files are always utf8 encoded
        &String::from_utf8_lossy(data),
        &opts,
    )
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_theme_is_complete() {
        static_env().expect("every known view has a working template");
    }

    #[test]
    fn markdown_renders_to_html() {
        let html = render_markdown(b"# hello\n\nworld");
        assert!(html.contains("<h1>hello</h1>"), "got: {html}");
        assert!(html.contains("<p>world</p>"), "got: {html}");
    }
}
