//! Prebuilt UI pages, served verbatim from the static directory.

use crate::startup::AppState;
use axum::{response::Redirect, Router};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Page route and the file it serves.
pub const PAGES: [(&str, &str); 3] = [
    ("/ai", "ai.html"),
    ("/ai/chat", "chat.html"),
    ("/ai/generate", "generate.html"),
];

pub async fn root_redirect() -> Redirect {
    Redirect::temporary("/ai")
}

/// Page routes plus the `/static` mount.
pub fn page_routes(static_dir: &Path) -> Router<AppState> {
    PAGES
        .iter()
        .fold(Router::new(), |router, (route, file)| {
            router.route_service(route, ServeFile::new(static_dir.join(file)))
        })
        .nest_service("/static", ServeDir::new(static_dir))
}
