pub use app::App;

mod app;
mod auth;
mod page;
mod protected;
