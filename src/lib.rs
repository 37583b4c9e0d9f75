pub mod alerts;
pub mod api;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod eta;
pub mod feeds;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod routes;
pub mod stats;
pub mod stops;
pub mod vehicles;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
