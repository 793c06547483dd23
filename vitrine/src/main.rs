#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::await_holding_lock,
    clippy::char_lit_as_u8,
    clippy::checked_conversions,
    clippy::dbg_macro,
    clippy::debug_assert_with_mut_call,
    clippy::doc_markdown,
    clippy::empty_enum,
    clippy::enum_glob_use,
    clippy::exit,
    clippy::expl_impl_clone_on_copy,
    clippy::explicit_deref_methods,
    clippy::explicit_into_iter_loop,
    clippy::fallible_impl_from,
    clippy::filter_map_next,
    clippy::flat_map_option,
    clippy::float_cmp_const,
    clippy::fn_params_excessive_bools,
    clippy::from_iter_instead_of_collect,
    clippy::if_let_mutex,
    clippy::implicit_clone,
    clippy::imprecise_flops,
    clippy::inefficient_to_string,
    clippy::invalid_upcast_comparisons,
    clippy::large_digit_groups,
    clippy::large_stack_arrays,
    clippy::large_types_passed_by_value,
    clippy::let_unit_value,
    clippy::linkedlist,
    clippy::lossy_float_literal,
    clippy::macro_use_imports,
    clippy::manual_ok_or,
    clippy::map_err_ignore,
    clippy::map_flatten,
    clippy::map_unwrap_or,
    clippy::match_on_vec_items,
    clippy::match_same_arms,
    clippy::match_wild_err_arm,
    clippy::match_wildcard_for_single_variants,
    clippy::mem_forget,
    clippy::mismatched_target_os,
    clippy::missing_enforced_import_renames,
    clippy::mut_mut,
    clippy::mutex_integer,
    clippy::needless_borrow,
    clippy::needless_continue,
    clippy::needless_for_each,
    clippy::option_option,
    clippy::path_buf_push_overwrite,
    clippy::ptr_as_ptr,
    clippy::rc_mutex,
    clippy::ref_option_ref,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_functions_in_if_condition,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::string_add_assign,
    clippy::string_add,
    clippy::string_lit_as_bytes,
    clippy::string_to_string,
    clippy::trait_duplication_in_bounds,
    clippy::unimplemented,
    clippy::unnested_or_patterns,
    clippy::unused_self,
    clippy::useless_transmute,
    clippy::verbose_file_reads,
    clippy::zero_sized_map_values,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms
)]

use std::{path::PathBuf, sync::Arc};

use tokio::net::TcpListener as AsyncTcpListener;

use axum::{
    extract::State,
    http::Uri,
    response::Response,
    routing::get,
    Router,
};

use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
};

mod catalog;
mod client;
mod config;
mod repo;
mod view;

use crate::{
    client::{Client, Workers},
    config::GlobalConfig,
    view::Theme,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>; // yolo

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::Layer::default().compact().without_time())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // point VITRINE_THEME at a template directory to iterate on the
    // theme without recompiling
    let theme = match std::env::var("VITRINE_THEME") {
        Ok(dir) => Theme::Dir(dir),
        Err(_unset) => Theme::Static,
    };

    let config = Arc::new(
        GlobalConfig {
            site: config::Site {
                listing_title: String::from("repositories"),
                listing_html_header: String::from("<h1>vitrine</h1>"),
                // to allow mounting vitrine as a subdirectory
                reverse_proxy_base: None,
            },
            max_file_size_bytes: 2 * 1024 * 1024,
            repo_object_cache_size: 20 * 1024 * 1024,
            num_threads: None,
            listen_addr: "[::]:42080".parse()?,
            theme,
        }
        .check()?,
    );

    let listener = std::net::TcpListener::bind(config.listen_addr)?;
    listener.set_nonblocking(true)?;

    let num_threads = config
        .num_threads
        .unwrap_or(std::thread::available_parallelism()?.get());

    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .thread_name(|number| format!("vitrine-cpu-{number:02}"))
            .num_threads(num_threads)
            .build()?,
    );

    let basedir =
        PathBuf::from(std::env::args().nth(1).expect("path as first arg")).canonicalize()?;
    if !basedir.is_dir() {
        return Err(format!("scan root is not a directory: {basedir:?}").into());
    }

    // repositories are discovered per request; this early scan only
    // tells whether serving makes sense right now
    let found = catalog::scan(&basedir, &config);
    if found.is_empty() {
        tracing::warn!(?basedir, "no browsable repositories found (yet)");
    } else {
        tracing::info!("{} repositories found", found.len());
    }

    let env = config.theme.env()?;
    let client = Client::new(
        Arc::clone(&config),
        env,
        Workers::new(Arc::clone(&pool)),
        basedir,
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let listener = AsyncTcpListener::from_std(listener)?;

        let app = Router::new()
            .route("/", get(handler))
            .route("/*rest", get(handler))
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(0))
            .with_state(client);

        let addr = listener.local_addr()?;
        tracing::info!(?addr, "Server started");
        axum::serve(listener, app).await?;
        Ok(())
    })
}

async fn handler(State(client): State<Client>, uri: Uri) -> Response {
    client.handle(uri).await
}
