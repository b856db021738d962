pub mod server;

pub use server::{SCRAPE_METRIC, ServerState, build_router, serve};
