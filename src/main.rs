use log::info;

use chathub::directory::Directory;
use chathub::server::{routes, Server};

#[tokio::main]
async fn main() {
    env_logger::init();

    let directory = Directory::seeded();
    let server = Server::new();

    info!("chat server listening on port 3000");
    warp::serve(routes(directory, server))
        .run(([0, 0, 0, 0], 3000))
        .await;
}
