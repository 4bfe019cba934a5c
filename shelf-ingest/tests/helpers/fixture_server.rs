//! Local HTTP fixture server for adapter tests

use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral localhost port; returns the base URL
pub async fn spawn_fixture_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}
