use std::{path::PathBuf, sync::Arc};

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    config::GlobalConfig,
    view::{render, View},
};

mod handler;
mod workers;

pub(crate) use workers::Workers;

use handler::Output;

#[derive(Clone)]
pub(crate) struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<GlobalConfig>,
    env: minijinja::Environment<'static>,
    workers: Workers,
    root: PathBuf,
    base: String,
}

impl Client {
    pub(crate) fn new(
        config: Arc<GlobalConfig>,
        env: minijinja::Environment<'static>,
        workers: Workers,
        root: PathBuf,
    ) -> Self {
        let base = config.base().to_string();
        Self {
            inner: Arc::new(Inner {
                config,
                env,
                workers,
                root,
                base,
            }),
        }
    }

    pub(crate) async fn handle(&self, uri: Uri) -> Response {
        match handler::route(&self.inner, &uri).await {
            Output::Template(view) => render(&self.inner.env, view),
            Output::NotFound => {
                with_status(render(&self.inner.env, View::not_found()), StatusCode::NOT_FOUND)
            }
            Output::Error(message) => with_status(
                render(&self.inner.env, View::error(message)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            Output::Redirect(location) => Redirect::permanent(&location).into_response(),
        }
    }
}

fn with_status(mut response: Response, status: StatusCode) -> Response {
    // keep whatever the renderer produced (including its own 500
    // on template failure), just don't let an error page say 200
    if response.status() == StatusCode::OK {
        *response.status_mut() = status;
    }
    response
}
