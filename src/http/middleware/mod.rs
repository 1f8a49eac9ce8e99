pub mod route_match;

pub use route_match::route_match_middleware;
