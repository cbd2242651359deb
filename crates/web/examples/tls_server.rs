use bytes::Bytes;
use http::Request;
use micro_h2::connection::H2Config;
use micro_h2_web::router::{Router, get};
use micro_h2_web::{Server, handler_fn};
use tokio::sync::mpsc;
use tracing::warn;

async fn hello_world(_req: Request<Bytes>) -> &'static str {
    "hello world over h2"
}

// cargo run --example tls_server -- cert.pem key.pem
#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(cert_path), Some(key_path)) = (args.next(), args.next()) else {
        eprintln!("usage: tls_server <cert.pem> <key.pem>");
        return;
    };

    let router = Router::builder().route("/", get(handler_fn(hello_world))).build().unwrap();

    let (error_sender, mut error_receiver) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(e) = error_receiver.recv().await {
            warn!(cause = %e, "connection failed");
        }
    });

    Server::builder()
        .router(router)
        .address("127.0.0.1:8443")
        .tls(cert_path, key_path)
        .config(H2Config::default().max_concurrent_streams(64))
        .error_sender(error_sender)
        .build()
        .unwrap()
        .start()
        .await;
}
